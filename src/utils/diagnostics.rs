//! Diagnostic sinks
//!
//! Every phase reports through the same two-method interface. Errors abort the
//! happy path of the construct that raised them; warnings are advisory.

/// A sink for one phase's errors and warnings
pub trait DiagnosticHandler<E, W> {
    fn handle_error(&mut self, error: E);
    fn handle_warning(&mut self, warning: W);
}

/// A handler that keeps everything it is given, in order
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticLog<E, W> {
    pub errors: Vec<E>,
    pub warnings: Vec<W>,
}

impl<E, W> DiagnosticLog<E, W> {
    pub fn new() -> Self {
        Self { errors: Vec::new(), warnings: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Forward everything collected so far to `handler`, leaving the log empty
    pub fn drain_into<H: DiagnosticHandler<E, W> + ?Sized>(&mut self, handler: &mut H) {
        for error in self.errors.drain(..) {
            handler.handle_error(error);
        }
        for warning in self.warnings.drain(..) {
            handler.handle_warning(warning);
        }
    }
}

impl<E, W> Default for DiagnosticLog<E, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, W> DiagnosticHandler<E, W> for DiagnosticLog<E, W> {
    fn handle_error(&mut self, error: E) {
        self.errors.push(error);
    }

    fn handle_warning(&mut self, warning: W) {
        self.warnings.push(warning);
    }
}
