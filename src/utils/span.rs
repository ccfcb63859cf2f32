//! Source location tracking

use std::fmt;

/// A location in the source text.
///
/// `offset` counts raw characters consumed from the source (0-based), while
/// `line` and `column` are 1-based and count logical characters, so a `\r\n`
/// pair advances the offset by two but the line by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self { offset, line, column }
    }

    /// The position of the first character of a source
    pub fn start() -> Self {
        Self { offset: 0, line: 1, column: 1 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span represents a range in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Position of the first character
    pub start: Position,
    /// Position just past the last character
    pub end: Position,
}

impl Span {
    /// Create a new span
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width span at `position`
    pub fn at(position: Position) -> Self {
        Self { start: position, end: position }
    }

    /// Merge two spans
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Length of the span in raw characters
    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    /// Check if the span is empty
    pub fn is_empty(&self) -> bool {
        self.start.offset == self.end.offset
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::at(Position::start())
    }
}
