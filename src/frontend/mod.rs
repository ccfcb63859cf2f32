//! Frontend module - Scanner, Lexer, Parser

pub mod scanner;
pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;

pub use lexer::{Lexer, LexerConfig};
pub use parser::{ParseOutcome, Parser};
pub use token::{Token, TokenKind, TokenValue};
