//! Diagnostic taxonomies for Kestrel
//!
//! One error/warning pair per phase. Every record carries the `Position` it
//! refers to.

use thiserror::Error;

use crate::frontend::token::TokenKind;
use crate::utils::Position;

/// Result type alias for evaluation
pub type Result<T> = std::result::Result<T, RuntimeError>;

// ==================== Lexical Diagnostics ====================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexicalError {
    #[error("Unknown token `{text}`")]
    UnknownToken { text: String, position: Position },

    #[error("Unexpected end of text")]
    UnexpectedEndOfText { position: Position },

    #[error("Invalid non-decimal prefix `{prefix}`")]
    InvalidNonDecimalPrefix { prefix: char, position: Position },

    #[error("Missing digits after non-decimal prefix")]
    MissingNonDecimalDigits { position: Position },

    #[error("Number literal too large")]
    NumberLiteralTooLarge { position: Position },

    #[error("Missing exponent digits")]
    MissingExponent { position: Position },

    #[error("Lexeme exceeds the maximum length of {limit} characters")]
    ExceededMaxLexemeLength { limit: usize, position: Position },
}

impl LexicalError {
    pub fn position(&self) -> Position {
        match self {
            Self::UnknownToken { position, .. }
            | Self::UnexpectedEndOfText { position }
            | Self::InvalidNonDecimalPrefix { position, .. }
            | Self::MissingNonDecimalDigits { position }
            | Self::NumberLiteralTooLarge { position }
            | Self::MissingExponent { position }
            | Self::ExceededMaxLexemeLength { position, .. } => *position,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexicalWarning {
    #[error("Unknown escape sequence `\\{character}`")]
    UnknownEscapeSequence { character: char, position: Position },

    #[error("Missing hexadecimal character code after `\\x`")]
    MissingHexCharCode { position: Position },
}

impl LexicalWarning {
    pub fn position(&self) -> Position {
        match self {
            Self::UnknownEscapeSequence { position, .. } | Self::MissingHexCharCode { position } => {
                *position
            }
        }
    }
}

// ==================== Syntax Diagnostics ====================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("Unexpected token: expected {expected}, got {actual}")]
    UnexpectedToken {
        actual: TokenKind,
        expected: TokenKind,
        position: Position,
    },

    #[error("Expected expression, got {actual}")]
    ExpectedExpression { actual: TokenKind, position: Position },

    #[error("Expected type name, got {actual}")]
    ExpectedType { actual: TokenKind, position: Position },

    #[error("Constant `{name}` must be initialized")]
    ImplicitConstInitialization { name: String, position: Position },

    #[error("Duplicate parameter `{name}`")]
    DuplicateParameter { name: String, position: Position },

    #[error("Duplicate `default` branch")]
    DuplicateDefaultBranch { position: Position },

    #[error("Invalid assignment target")]
    InvalidAssignmentTarget { position: Position },
}

impl SyntaxError {
    pub fn position(&self) -> Position {
        match self {
            Self::UnexpectedToken { position, .. }
            | Self::ExpectedExpression { position, .. }
            | Self::ExpectedType { position, .. }
            | Self::ImplicitConstInitialization { position, .. }
            | Self::DuplicateParameter { position, .. }
            | Self::DuplicateDefaultBranch { position }
            | Self::InvalidAssignmentTarget { position } => *position,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxWarning {
    #[error("Variable `{name}` is explicitly initialized with null")]
    NullInitialization { name: String, position: Position },

    #[error("Expression result is ignored")]
    IgnoredResult { position: Position },
}

impl SyntaxWarning {
    pub fn position(&self) -> Position {
        match self {
            Self::NullInitialization { position, .. } | Self::IgnoredResult { position } => {
                *position
            }
        }
    }
}

// ==================== Runtime Errors ====================

/// Errors raised while evaluating a statement.
///
/// Errors are raised without a meaningful position; the interpreter stamps the
/// start of the failing top-level statement before reporting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String, position: Position },

    #[error("Variable already defined: {name}")]
    VariableAlreadyDefined { name: String, position: Position },

    #[error("Assignment to constant: {name}")]
    AssignmentToConst { name: String, position: Position },

    #[error("`break` outside of loop")]
    BreakOutsideOfLoop { position: Position },

    #[error("`return` outside of function")]
    ReturnOutsideOfFunction { position: Position },

    #[error("Argument `{name}` must not be null")]
    NonNullArgumentRequired { name: String, position: Position },

    #[error("Argument count mismatch: expected {expected}, got {actual}")]
    BadArgumentCount {
        expected: usize,
        actual: usize,
        position: Position,
    },

    #[error("Division by zero")]
    ZeroDivision { position: Position },

    #[error("Value of type {type_name} is not callable")]
    NotCallable { type_name: String, position: Position },

    #[error("Unsupported operands for `{operator}`: {left} and {right}")]
    UnsupportedOperands {
        operator: String,
        left: String,
        right: String,
        position: Position,
    },

    #[error("Unsupported operand for `{operator}`: {operand}")]
    UnsupportedOperand {
        operator: String,
        operand: String,
        position: Position,
    },

    #[error("Expected boolean, got {actual}")]
    ExpectedBoolean { actual: String, position: Position },

    #[error("Cannot cast {from} to {to}")]
    InvalidCast {
        from: String,
        to: String,
        position: Position,
    },

    #[error("Cannot access a member of {type_name}")]
    InvalidAccess { type_name: String, position: Position },

    #[error("Unknown namespace: {name}")]
    UnknownNamespace { name: String, position: Position },

    #[error("Namespace {namespace} has no member {member}")]
    UnknownMember {
        namespace: String,
        member: String,
        position: Position,
    },

    #[error("Range bound must be a number, got {type_name}")]
    InvalidRangeBound { type_name: String, position: Position },

    #[error("Range step must not be zero")]
    InvalidRangeStep { position: Position },

    #[error("Invalid assignment target")]
    InvalidAssignmentTarget { position: Position },

    #[error("Maximum call depth of {limit} exceeded")]
    CallDepthExceeded { limit: usize, position: Position },

    #[error("{name}: {message}")]
    HostFunction {
        name: String,
        message: String,
        position: Position,
    },

    #[error("Internal error: {message}")]
    Internal { message: String, position: Position },
}

impl RuntimeError {
    pub fn undefined_variable(name: impl Into<String>) -> Self {
        Self::UndefinedVariable { name: name.into(), position: Position::default() }
    }

    pub fn already_defined(name: impl Into<String>) -> Self {
        Self::VariableAlreadyDefined { name: name.into(), position: Position::default() }
    }

    pub fn assignment_to_const(name: impl Into<String>) -> Self {
        Self::AssignmentToConst { name: name.into(), position: Position::default() }
    }

    pub fn not_callable(type_name: impl Into<String>) -> Self {
        Self::NotCallable { type_name: type_name.into(), position: Position::default() }
    }

    pub fn expected_boolean(actual: impl Into<String>) -> Self {
        Self::ExpectedBoolean { actual: actual.into(), position: Position::default() }
    }

    pub fn unsupported_operands(
        operator: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self::UnsupportedOperands {
            operator: operator.into(),
            left: left.into(),
            right: right.into(),
            position: Position::default(),
        }
    }

    pub fn unsupported_operand(operator: impl Into<String>, operand: impl Into<String>) -> Self {
        Self::UnsupportedOperand {
            operator: operator.into(),
            operand: operand.into(),
            position: Position::default(),
        }
    }

    pub fn invalid_cast(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidCast { from: from.into(), to: to.into(), position: Position::default() }
    }

    pub fn host(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HostFunction {
            name: name.into(),
            message: message.into(),
            position: Position::default(),
        }
    }

    pub fn zero_division() -> Self {
        Self::ZeroDivision { position: Position::default() }
    }

    pub fn break_outside_of_loop() -> Self {
        Self::BreakOutsideOfLoop { position: Position::default() }
    }

    pub fn return_outside_of_function() -> Self {
        Self::ReturnOutsideOfFunction { position: Position::default() }
    }

    pub fn non_null_argument_required(name: impl Into<String>) -> Self {
        Self::NonNullArgumentRequired { name: name.into(), position: Position::default() }
    }

    pub fn bad_argument_count(expected: usize, actual: usize) -> Self {
        Self::BadArgumentCount { expected, actual, position: Position::default() }
    }

    pub fn invalid_access(type_name: impl Into<String>) -> Self {
        Self::InvalidAccess { type_name: type_name.into(), position: Position::default() }
    }

    pub fn unknown_namespace(name: impl Into<String>) -> Self {
        Self::UnknownNamespace { name: name.into(), position: Position::default() }
    }

    pub fn unknown_member(namespace: impl Into<String>, member: impl Into<String>) -> Self {
        Self::UnknownMember {
            namespace: namespace.into(),
            member: member.into(),
            position: Position::default(),
        }
    }

    pub fn invalid_range_bound(type_name: impl Into<String>) -> Self {
        Self::InvalidRangeBound { type_name: type_name.into(), position: Position::default() }
    }

    pub fn invalid_range_step() -> Self {
        Self::InvalidRangeStep { position: Position::default() }
    }

    pub fn invalid_assignment_target() -> Self {
        Self::InvalidAssignmentTarget { position: Position::default() }
    }

    pub fn call_depth_exceeded(limit: usize) -> Self {
        Self::CallDepthExceeded { limit, position: Position::default() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), position: Position::default() }
    }

    /// Get the position associated with this error
    pub fn position(&self) -> Position {
        *self.position_slot()
    }

    /// Stamp the error with `position`
    pub fn at(mut self, position: Position) -> Self {
        *self.position_slot_mut() = position;
        self
    }

    fn position_slot(&self) -> &Position {
        match self {
            Self::UndefinedVariable { position, .. }
            | Self::VariableAlreadyDefined { position, .. }
            | Self::AssignmentToConst { position, .. }
            | Self::BreakOutsideOfLoop { position }
            | Self::ReturnOutsideOfFunction { position }
            | Self::NonNullArgumentRequired { position, .. }
            | Self::BadArgumentCount { position, .. }
            | Self::ZeroDivision { position }
            | Self::NotCallable { position, .. }
            | Self::UnsupportedOperands { position, .. }
            | Self::UnsupportedOperand { position, .. }
            | Self::ExpectedBoolean { position, .. }
            | Self::InvalidCast { position, .. }
            | Self::InvalidAccess { position, .. }
            | Self::UnknownNamespace { position, .. }
            | Self::UnknownMember { position, .. }
            | Self::InvalidRangeBound { position, .. }
            | Self::InvalidRangeStep { position }
            | Self::InvalidAssignmentTarget { position }
            | Self::CallDepthExceeded { position, .. }
            | Self::HostFunction { position, .. }
            | Self::Internal { position, .. } => position,
        }
    }

    fn position_slot_mut(&mut self) -> &mut Position {
        match self {
            Self::UndefinedVariable { position, .. }
            | Self::VariableAlreadyDefined { position, .. }
            | Self::AssignmentToConst { position, .. }
            | Self::BreakOutsideOfLoop { position }
            | Self::ReturnOutsideOfFunction { position }
            | Self::NonNullArgumentRequired { position, .. }
            | Self::BadArgumentCount { position, .. }
            | Self::ZeroDivision { position }
            | Self::NotCallable { position, .. }
            | Self::UnsupportedOperands { position, .. }
            | Self::UnsupportedOperand { position, .. }
            | Self::ExpectedBoolean { position, .. }
            | Self::InvalidCast { position, .. }
            | Self::InvalidAccess { position, .. }
            | Self::UnknownNamespace { position, .. }
            | Self::UnknownMember { position, .. }
            | Self::InvalidRangeBound { position, .. }
            | Self::InvalidRangeStep { position }
            | Self::InvalidAssignmentTarget { position }
            | Self::CallDepthExceeded { position, .. }
            | Self::HostFunction { position, .. }
            | Self::Internal { position, .. } => position,
        }
    }
}
