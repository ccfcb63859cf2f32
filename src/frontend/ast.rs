//! Abstract Syntax Tree definitions for Kestrel

use std::fmt;
use std::rc::Rc;

use crate::utils::Span;

/// A statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    /// A trailing semicolon was consumed
    pub terminated: bool,
    pub span: Span,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// pull name{.name}
    NamespaceImport { path: Vec<String> },
    /// init [const] name [= expr] {, ...}
    VariableInitList(Vec<VariableInit>),
    /// break
    Break,
    /// break_if ( expr )
    BreakIf(Expression),
    /// return [expr]
    Return(Option<Expression>),
    /// Expression statement
    Expression(Expression),
}

/// One binding of a variable-init list
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInit {
    pub name: String,
    pub is_const: bool,
    pub value: Option<Expression>,
    pub span: Span,
}

/// An expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// { statements }; an unterminated last statement yields the block's value
    Block(Vec<Statement>),
    /// if (cond) body {elif (cond) body} [else body]
    Conditional {
        branches: Vec<ConditionalBranch>,
        otherwise: Option<Box<Expression>>,
    },
    /// for ([counter,] range) body
    ForLoop {
        counter: Option<String>,
        range: Range,
        body: Box<Expression>,
    },
    /// while (cond) body
    WhileLoop {
        condition: Box<Expression>,
        body: Box<Expression>,
    },
    /// functi (params) body
    FunctionDefinition(Rc<FunctionDefinition>),
    /// match (argument) { branches }
    PatternMatching {
        argument: Box<Expression>,
        branches: Vec<MatchBranch>,
    },
    /// ( expr )
    Grouping(Box<Expression>),
    Binary {
        left: Box<Expression>,
        operator: Operator,
        right: Box<Expression>,
    },
    Unary {
        operator: Operator,
        operand: Box<Expression>,
    },
    FunctionCall {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Identifier(String),
    Literal(Literal),
    /// int(expr), string(expr), ...
    TypeCast {
        target: TypeName,
        operand: Box<Expression>,
    },
    /// A bare type name, as used by `is`
    Type(TypeName),
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn binary(left: Expression, operator: Operator, right: Expression) -> Self {
        let span = left.span.merge(&right.span);
        Self::new(
            ExpressionKind::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        )
    }

    /// A prefix operator starting at `start`
    pub fn unary(operator: Operator, operand: Expression, start: Span) -> Self {
        let span = start.merge(&operand.span);
        Self::new(
            ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            span,
        )
    }

    /// Whether evaluating this expression on its own can have no effect
    pub fn is_inert(&self) -> bool {
        match &self.kind {
            ExpressionKind::Literal(_) | ExpressionKind::Identifier(_) | ExpressionKind::Type(_) => true,
            ExpressionKind::Grouping(inner) => inner.is_inert(),
            _ => false,
        }
    }
}

/// One `if`/`elif` arm
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    pub condition: Expression,
    pub body: Expression,
}

/// Loop range: `end`, `start:end` or `start:end:step`. The end is exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub start: Option<Box<Expression>>,
    pub end: Box<Expression>,
    pub step: Option<Box<Expression>>,
}

/// Function definition
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub parameters: Vec<Parameter>,
    pub body: Expression,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub is_const: bool,
    /// Declared with `!`: the argument must not be null
    pub non_null: bool,
    pub span: Span,
}

/// One `match` branch. A missing pattern is the `default` branch.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchBranch {
    pub pattern: Option<Expression>,
    pub consequent: Expression,
    pub span: Span,
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(u64),
    Float(f64),
    String(String),
}

/// Runtime type names usable in casts and type checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    Int,
    Float,
    String,
    Bool,
    Null,
    Function,
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeName::Int => "int",
            TypeName::Float => "float",
            TypeName::String => "string",
            TypeName::Bool => "bool",
            TypeName::Null => "null",
            TypeName::Function => "function",
        };
        f.write_str(name)
    }
}

/// Operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Exponent,
    Concatenate,
    // Prefix
    Plus,
    Negate,
    Not,
    // Comparison
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    // Logical
    And,
    Or,
    // Null handling
    NullCoalescing,
    NullsafePipe,
    // Type check
    Is,
    IsNot,
    // Assignment
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    RemainderAssign,
    /// Member access (namespace.member)
    Access,
    // Match-only: the left operand is the implicit match argument
    MatchLess,
    MatchLessEqual,
    MatchGreater,
    MatchGreaterEqual,
    MatchEqual,
    MatchNotEqual,
    MatchIs,
    MatchIsNot,
    MatchAnd,
    MatchOr,
}

impl Operator {
    /// The plain operator a compound assignment applies before assigning
    pub fn compound_base(&self) -> Option<Operator> {
        match self {
            Operator::AddAssign => Some(Operator::Add),
            Operator::SubtractAssign => Some(Operator::Subtract),
            Operator::MultiplyAssign => Some(Operator::Multiply),
            Operator::DivideAssign => Some(Operator::Divide),
            Operator::RemainderAssign => Some(Operator::Remainder),
            _ => None,
        }
    }

    pub fn is_assignment(&self) -> bool {
        *self == Operator::Assign || self.compound_base().is_some()
    }

    /// The ordinary comparison a match-only operator stands for
    pub fn match_comparison(&self) -> Option<Operator> {
        match self {
            Operator::MatchLess => Some(Operator::Less),
            Operator::MatchLessEqual => Some(Operator::LessEqual),
            Operator::MatchGreater => Some(Operator::Greater),
            Operator::MatchGreaterEqual => Some(Operator::GreaterEqual),
            Operator::MatchEqual => Some(Operator::Equal),
            Operator::MatchNotEqual => Some(Operator::NotEqual),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add | Operator::Plus => "+",
            Operator::Subtract | Operator::Negate => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Remainder => "%",
            Operator::Exponent => "^",
            Operator::Concatenate => "..",
            Operator::Not => "!",
            Operator::Less | Operator::MatchLess => "<",
            Operator::LessEqual | Operator::MatchLessEqual => "<=",
            Operator::Greater | Operator::MatchGreater => ">",
            Operator::GreaterEqual | Operator::MatchGreaterEqual => ">=",
            Operator::Equal | Operator::MatchEqual => "==",
            Operator::NotEqual | Operator::MatchNotEqual => "!=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::NullCoalescing => "??",
            Operator::NullsafePipe => "?>",
            Operator::Is | Operator::MatchIs => "is",
            Operator::IsNot | Operator::MatchIsNot => "is not",
            Operator::Assign => "=",
            Operator::AddAssign => "+=",
            Operator::SubtractAssign => "-=",
            Operator::MultiplyAssign => "*=",
            Operator::DivideAssign => "/=",
            Operator::RemainderAssign => "%=",
            Operator::Access => ".",
            Operator::MatchAnd => "and",
            Operator::MatchOr => "or",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
