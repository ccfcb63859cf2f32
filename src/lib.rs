//! Kestrel
//!
//! A small scripting language: a pull-based lexer and parser feeding a
//! tree-walking evaluator, with host functions injected by the embedder.

pub mod utils;
pub mod frontend;
pub mod interpreter;
pub mod stdlib;
pub mod feedback;
