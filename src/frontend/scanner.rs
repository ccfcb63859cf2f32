//! Character cursor over the source text
//!
//! Collapses every newline sequence (`\r\n`, `\n\r`, `\n`, `\r`, U+2028) into a
//! single logical `\n` and tracks the position of the current character.

use std::iter::Peekable;
use std::str::Chars;

use crate::utils::Position;

const LINE_SEPARATOR: char = '\u{2028}';

/// A logical character and the number of raw characters it was built from
type Logical = (char, usize);

pub struct Scanner<'a> {
    source: Peekable<Chars<'a>>,
    current: Option<Logical>,
    next: Option<Logical>,
    position: Position,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut source = source.chars().peekable();
        let current = read_logical(&mut source);
        let next = read_logical(&mut source);
        Self {
            source,
            current,
            next,
            position: Position::start(),
        }
    }

    /// The character under the cursor, or `None` at the end of the text
    pub fn current_character(&self) -> Option<char> {
        self.current.map(|(c, _)| c)
    }

    /// The character after the current one
    pub fn peek_character(&self) -> Option<char> {
        self.next.map(|(c, _)| c)
    }

    /// Position of the current character
    pub fn current_position(&self) -> Position {
        self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.current.is_none()
    }

    /// Move to the next logical character. Does nothing at the end of the text.
    pub fn advance(&mut self) {
        let Some((c, width)) = self.current else {
            return;
        };
        self.position.offset += width;
        if c == '\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        self.current = self.next.take();
        self.next = read_logical(&mut self.source);
    }
}

fn read_logical(source: &mut Peekable<Chars<'_>>) -> Option<Logical> {
    let c = source.next()?;
    let logical = match c {
        '\r' => {
            if source.next_if_eq(&'\n').is_some() {
                ('\n', 2)
            } else {
                ('\n', 1)
            }
        }
        '\n' => {
            if source.next_if_eq(&'\r').is_some() {
                ('\n', 2)
            } else {
                ('\n', 1)
            }
        }
        LINE_SEPARATOR => ('\n', 1),
        c => (c, 1),
    };
    Some(logical)
}
