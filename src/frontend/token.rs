//! Token definitions for Kestrel

use std::fmt;

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Option<TokenValue>,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, value: Option<TokenValue>, span: Span) -> Self {
        Self { kind, value, span }
    }

    pub fn end_of_text(span: Span) -> Self {
        Self { kind: TokenKind::EndOfText, value: None, span }
    }

    /// The textual content of identifiers, strings and comments
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            Some(TokenValue::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// Content carried by a token. Its shape is fixed by the token kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// Identifiers, string literals and comments
    String(String),
    /// Integer literals
    Integer(u64),
    /// Floating-point literals
    Float(f64),
}

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ============ Special ============
    /// End of the source text
    EndOfText,
    /// A character no matcher claimed, or an unmapped operator string
    Unknown,

    // ============ Identifiers, Literals and Comments ============
    Identifier,
    LiteralInteger,
    LiteralFloat,
    LiteralString,
    LineComment,
    BlockComment,

    // ============ Keywords ============
    /// pull
    Pull,
    /// init
    Init,
    /// const
    Const,
    /// break
    Break,
    /// break_if
    BreakIf,
    /// return
    Return,
    /// if
    If,
    /// elif
    Elif,
    /// else
    Else,
    /// for
    For,
    /// while
    While,
    /// functi
    Functi,
    /// match
    Match,
    /// default
    Default,
    /// and
    And,
    /// or
    Or,
    /// is
    Is,
    /// not
    Not,
    /// true
    True,
    /// false
    False,
    /// null
    Null,
    /// int
    TypeInt,
    /// float
    TypeFloat,
    /// string
    TypeString,
    /// bool
    TypeBool,
    /// function
    TypeFunction,

    // ============ Operators ============
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// ^
    Caret,
    /// =
    Assign,
    /// +=
    PlusAssign,
    /// -=
    MinusAssign,
    /// *=
    StarAssign,
    /// /=
    SlashAssign,
    /// %=
    PercentAssign,
    /// ==
    EqualEqual,
    /// !=
    NotEqual,
    /// <
    Less,
    /// <=
    LessEqual,
    /// >
    Greater,
    /// >=
    GreaterEqual,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// !
    Bang,
    /// ??
    QuestionQuestion,
    /// ?>
    QuestionGreater,
    /// ..
    DotDot,
    /// .
    Dot,

    // ============ Delimiters ============
    /// ,
    Comma,
    /// :
    Colon,
    /// ;
    Semicolon,
    /// (
    LeftParen,
    /// )
    RightParen,
    /// {
    LeftBrace,
    /// }
    RightBrace,
}

/// Every operator and punctuation string the lexer maps to a token.
pub const OPERATORS: &[(&str, TokenKind)] = &[
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("^", TokenKind::Caret),
    ("=", TokenKind::Assign),
    ("+=", TokenKind::PlusAssign),
    ("-=", TokenKind::MinusAssign),
    ("*=", TokenKind::StarAssign),
    ("/=", TokenKind::SlashAssign),
    ("%=", TokenKind::PercentAssign),
    ("==", TokenKind::EqualEqual),
    ("!=", TokenKind::NotEqual),
    ("<", TokenKind::Less),
    ("<=", TokenKind::LessEqual),
    (">", TokenKind::Greater),
    (">=", TokenKind::GreaterEqual),
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    ("!", TokenKind::Bang),
    ("??", TokenKind::QuestionQuestion),
    ("?>", TokenKind::QuestionGreater),
    ("..", TokenKind::DotDot),
    (".", TokenKind::Dot),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    ("(", TokenKind::LeftParen),
    (")", TokenKind::RightParen),
    ("{", TokenKind::LeftBrace),
    ("}", TokenKind::RightBrace),
];

/// Line comment opener
pub const LINE_COMMENT: &str = "//";
/// Block comment opener
pub const BLOCK_COMMENT_OPEN: &str = "/*";
/// Block comment closer
pub const BLOCK_COMMENT_CLOSE: &str = "*/";

impl TokenKind {
    /// Try to convert an identifier to a keyword
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "pull" => Some(TokenKind::Pull),
            "init" => Some(TokenKind::Init),
            "const" => Some(TokenKind::Const),
            "break" => Some(TokenKind::Break),
            "break_if" => Some(TokenKind::BreakIf),
            "return" => Some(TokenKind::Return),
            "if" => Some(TokenKind::If),
            "elif" => Some(TokenKind::Elif),
            "else" => Some(TokenKind::Else),
            "for" => Some(TokenKind::For),
            "while" => Some(TokenKind::While),
            "functi" => Some(TokenKind::Functi),
            "match" => Some(TokenKind::Match),
            "default" => Some(TokenKind::Default),
            "and" => Some(TokenKind::And),
            "or" => Some(TokenKind::Or),
            "is" => Some(TokenKind::Is),
            "not" => Some(TokenKind::Not),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            "null" => Some(TokenKind::Null),
            // Type names
            "int" => Some(TokenKind::TypeInt),
            "float" => Some(TokenKind::TypeFloat),
            "string" => Some(TokenKind::TypeString),
            "bool" => Some(TokenKind::TypeBool),
            "function" => Some(TokenKind::TypeFunction),
            _ => None,
        }
    }

    /// Look up an operator or punctuation string
    pub fn operator_from_str(s: &str) -> Option<TokenKind> {
        OPERATORS
            .iter()
            .find(|(text, _)| *text == s)
            .map(|(_, kind)| *kind)
    }

    /// Check whether `s` is a prefix of some operator or comment opener.
    ///
    /// This is the live-prefix predicate that drives maximal munch.
    pub fn is_operator_prefix(s: &str) -> bool {
        OPERATORS.iter().any(|(text, _)| text.starts_with(s))
            || LINE_COMMENT.starts_with(s)
            || BLOCK_COMMENT_OPEN.starts_with(s)
    }

    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Pull
                | TokenKind::Init
                | TokenKind::Const
                | TokenKind::Break
                | TokenKind::BreakIf
                | TokenKind::Return
                | TokenKind::If
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Functi
                | TokenKind::Match
                | TokenKind::Default
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Is
                | TokenKind::Not
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        ) || self.is_type_name()
    }

    /// Check if this token names a runtime type
    pub fn is_type_name(&self) -> bool {
        matches!(
            self,
            TokenKind::TypeInt
                | TokenKind::TypeFloat
                | TokenKind::TypeString
                | TokenKind::TypeBool
                | TokenKind::TypeFunction
        )
    }

    /// Comments are dropped before the parser sees the stream
    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::EndOfText => "end of text",
            TokenKind::Unknown => "unknown token",
            TokenKind::Identifier => "identifier",
            TokenKind::LiteralInteger => "integer literal",
            TokenKind::LiteralFloat => "float literal",
            TokenKind::LiteralString => "string literal",
            TokenKind::LineComment => "line comment",
            TokenKind::BlockComment => "block comment",
            TokenKind::Pull => "`pull`",
            TokenKind::Init => "`init`",
            TokenKind::Const => "`const`",
            TokenKind::Break => "`break`",
            TokenKind::BreakIf => "`break_if`",
            TokenKind::Return => "`return`",
            TokenKind::If => "`if`",
            TokenKind::Elif => "`elif`",
            TokenKind::Else => "`else`",
            TokenKind::For => "`for`",
            TokenKind::While => "`while`",
            TokenKind::Functi => "`functi`",
            TokenKind::Match => "`match`",
            TokenKind::Default => "`default`",
            TokenKind::And => "`and`",
            TokenKind::Or => "`or`",
            TokenKind::Is => "`is`",
            TokenKind::Not => "`not`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::Null => "`null`",
            TokenKind::TypeInt => "`int`",
            TokenKind::TypeFloat => "`float`",
            TokenKind::TypeString => "`string`",
            TokenKind::TypeBool => "`bool`",
            TokenKind::TypeFunction => "`function`",
            other => {
                let text = OPERATORS
                    .iter()
                    .find(|(_, kind)| kind == other)
                    .map(|(text, _)| *text)
                    .unwrap_or("?");
                return write!(f, "`{}`", text);
            }
        };
        f.write_str(text)
    }
}
