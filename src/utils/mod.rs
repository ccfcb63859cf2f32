//! Utility module

mod span;
mod error;
mod diagnostics;

pub use span::{Position, Span};
pub use error::{LexicalError, LexicalWarning, Result, RuntimeError, SyntaxError, SyntaxWarning};
pub use diagnostics::{DiagnosticHandler, DiagnosticLog};
