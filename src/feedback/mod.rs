//! Structured Feedback Module
//!
//! Machine-readable diagnostics for a run: every lexical, syntax and runtime
//! diagnostic becomes an [`ErrorReport`], collected in a [`RunFeedback`] that
//! serializes to JSON.

use serde::Serialize;

use crate::interpreter::ExecutionStats;
use crate::utils::{
    DiagnosticHandler, LexicalError, LexicalWarning, Position, RuntimeError, SyntaxError,
    SyntaxWarning,
};

// ==================== Structured Error Report ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lexical,
    Syntax,
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// One diagnostic in a form tools can consume
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Stable code, e.g. "S0002"
    pub code: String,
    pub severity: Severity,
    pub phase: Phase,
    pub message: String,
    pub location: Location,
}

impl ErrorReport {
    fn new(
        code: &str,
        severity: Severity,
        phase: Phase,
        message: String,
        position: Position,
        file: &str,
    ) -> Self {
        Self {
            code: code.to_string(),
            severity,
            phase,
            message,
            location: Location {
                file: file.to_string(),
                line: position.line,
                column: position.column,
                offset: position.offset,
            },
        }
    }

    pub fn from_lexical_error(error: &LexicalError, file: &str) -> Self {
        let code = match error {
            LexicalError::UnknownToken { .. } => "L0001",
            LexicalError::UnexpectedEndOfText { .. } => "L0002",
            LexicalError::InvalidNonDecimalPrefix { .. } => "L0003",
            LexicalError::MissingNonDecimalDigits { .. } => "L0004",
            LexicalError::NumberLiteralTooLarge { .. } => "L0005",
            LexicalError::MissingExponent { .. } => "L0006",
            LexicalError::ExceededMaxLexemeLength { .. } => "L0007",
        };
        Self::new(code, Severity::Error, Phase::Lexical, error.to_string(), error.position(), file)
    }

    pub fn from_lexical_warning(warning: &LexicalWarning, file: &str) -> Self {
        let code = match warning {
            LexicalWarning::UnknownEscapeSequence { .. } => "L1001",
            LexicalWarning::MissingHexCharCode { .. } => "L1002",
        };
        Self::new(code, Severity::Warning, Phase::Lexical, warning.to_string(), warning.position(), file)
    }

    pub fn from_syntax_error(error: &SyntaxError, file: &str) -> Self {
        let code = match error {
            SyntaxError::UnexpectedToken { .. } => "S0001",
            SyntaxError::ExpectedExpression { .. } => "S0002",
            SyntaxError::ExpectedType { .. } => "S0003",
            SyntaxError::ImplicitConstInitialization { .. } => "S0004",
            SyntaxError::DuplicateParameter { .. } => "S0005",
            SyntaxError::DuplicateDefaultBranch { .. } => "S0006",
            SyntaxError::InvalidAssignmentTarget { .. } => "S0007",
        };
        Self::new(code, Severity::Error, Phase::Syntax, error.to_string(), error.position(), file)
    }

    pub fn from_syntax_warning(warning: &SyntaxWarning, file: &str) -> Self {
        let code = match warning {
            SyntaxWarning::NullInitialization { .. } => "S1001",
            SyntaxWarning::IgnoredResult { .. } => "S1002",
        };
        Self::new(code, Severity::Warning, Phase::Syntax, warning.to_string(), warning.position(), file)
    }

    pub fn from_runtime_error(error: &RuntimeError, file: &str) -> Self {
        let code = match error {
            RuntimeError::UndefinedVariable { .. } => "R0001",
            RuntimeError::VariableAlreadyDefined { .. } => "R0002",
            RuntimeError::AssignmentToConst { .. } => "R0003",
            RuntimeError::BreakOutsideOfLoop { .. } => "R0004",
            RuntimeError::ReturnOutsideOfFunction { .. } => "R0005",
            RuntimeError::NonNullArgumentRequired { .. } => "R0006",
            RuntimeError::BadArgumentCount { .. } => "R0007",
            RuntimeError::ZeroDivision { .. } => "R0008",
            RuntimeError::NotCallable { .. } => "R0009",
            RuntimeError::UnsupportedOperands { .. } => "R0010",
            RuntimeError::UnsupportedOperand { .. } => "R0011",
            RuntimeError::ExpectedBoolean { .. } => "R0012",
            RuntimeError::InvalidCast { .. } => "R0013",
            RuntimeError::InvalidAccess { .. } => "R0014",
            RuntimeError::UnknownNamespace { .. } => "R0015",
            RuntimeError::UnknownMember { .. } => "R0016",
            RuntimeError::InvalidRangeBound { .. } => "R0017",
            RuntimeError::InvalidRangeStep { .. } => "R0018",
            RuntimeError::InvalidAssignmentTarget { .. } => "R0019",
            RuntimeError::CallDepthExceeded { .. } => "R0020",
            RuntimeError::HostFunction { .. } => "R0021",
            RuntimeError::Internal { .. } => "R9999",
        };
        Self::new(code, Severity::Error, Phase::Runtime, error.to_string(), error.position(), file)
    }

    /// `file:line:column: severity: message`
    pub fn to_text(&self) -> String {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        format!(
            "{}:{}:{}: {}: {}",
            self.location.file, self.location.line, self.location.column, severity, self.message
        )
    }
}

// ==================== Run Feedback ====================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub statements_run: usize,
    pub statements_failed: usize,
    pub statements_skipped: usize,
}

impl From<ExecutionStats> for RunStats {
    fn from(stats: ExecutionStats) -> Self {
        Self {
            statements_run: stats.statements_run,
            statements_failed: stats.statements_failed,
            statements_skipped: stats.statements_skipped,
        }
    }
}

/// Everything reported while processing one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFeedback {
    /// No error of any phase was reported
    pub success: bool,
    pub source_file: String,
    pub diagnostics: Vec<ErrorReport>,
    pub stats: RunStats,
}

impl RunFeedback {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            success: true,
            source_file: source_file.into(),
            diagnostics: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn push(&mut self, report: ErrorReport) {
        if report.severity == Severity::Error {
            self.success = false;
        }
        self.diagnostics.push(report);
    }

    pub fn add_runtime_errors(&mut self, errors: impl IntoIterator<Item = RuntimeError>) {
        for error in errors {
            let report = ErrorReport::from_runtime_error(&error, &self.source_file);
            self.push(report);
        }
    }

    /// Diagnostics in source order; phases interleave
    pub fn sort(&mut self) {
        self.diagnostics.sort_by_key(|report| report.location.offset);
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl DiagnosticHandler<LexicalError, LexicalWarning> for RunFeedback {
    fn handle_error(&mut self, error: LexicalError) {
        let report = ErrorReport::from_lexical_error(&error, &self.source_file);
        self.push(report);
    }

    fn handle_warning(&mut self, warning: LexicalWarning) {
        let report = ErrorReport::from_lexical_warning(&warning, &self.source_file);
        self.push(report);
    }
}

impl DiagnosticHandler<SyntaxError, SyntaxWarning> for RunFeedback {
    fn handle_error(&mut self, error: SyntaxError) {
        let report = ErrorReport::from_syntax_error(&error, &self.source_file);
        self.push(report);
    }

    fn handle_warning(&mut self, warning: SyntaxWarning) {
        let report = ErrorReport::from_syntax_warning(&warning, &self.source_file);
        self.push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_format() {
        let error = RuntimeError::zero_division().at(Position::new(12, 2, 5));
        let report = ErrorReport::from_runtime_error(&error, "main.ks");
        assert_eq!(report.to_text(), "main.ks:2:5: error: Division by zero");
        assert_eq!(report.code, "R0008");
    }

    #[test]
    fn test_warnings_keep_success() {
        let mut feedback = RunFeedback::new("a.ks");
        let mut parser = Parser::new("1;");
        while parser.next().is_some() {}
        parser.drain_syntax_into(&mut feedback);

        assert!(feedback.success);
        assert_eq!(feedback.diagnostics.len(), 1);
        assert_eq!(feedback.diagnostics[0].code, "S1002");
    }

    #[test]
    fn test_collects_all_phases_in_source_order() {
        let mut feedback = RunFeedback::new("a.ks");
        let mut parser = Parser::new("init x = 1 +;\n$");
        while parser.next().is_some() {}
        parser.drain_syntax_into(&mut feedback);
        parser.drain_lexical_into(&mut feedback);
        feedback.add_runtime_errors(vec![RuntimeError::zero_division().at(Position::new(0, 1, 1))]);
        feedback.sort();

        assert!(!feedback.success);
        let phases: Vec<Phase> = feedback.diagnostics.iter().map(|d| d.phase).collect();
        assert_eq!(phases[0], Phase::Runtime);
        assert_eq!(phases[1], Phase::Syntax);
        assert!(phases.contains(&Phase::Lexical));
        assert_eq!(feedback.diagnostics[1].location.line, 1);
    }

    #[test]
    fn test_json_shape() {
        let mut feedback = RunFeedback::new("a.ks");
        feedback.add_runtime_errors(vec![RuntimeError::undefined_variable("y")]);
        let json: serde_json::Value = serde_json::from_str(&feedback.to_json()).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["diagnostics"][0]["severity"], "error");
        assert_eq!(json["diagnostics"][0]["phase"], "runtime");
        assert_eq!(json["diagnostics"][0]["location"]["line"], 1);
        assert_eq!(json["stats"]["statements_run"], 0);
    }
}
