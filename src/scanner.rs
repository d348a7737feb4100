//! Position-tracking text scanner.
//!
//! The grammar parser drives everything through four primitives, all
//! of which commit only on success: a failed `try_literals` or
//! `expect_literals` leaves the scanner exactly where it was, so the
//! parser can probe alternatives without backtracking over consumed
//! input.

use std::fmt;

use crate::errors::ScanError;

/// Default ceiling on a single token, mostly guarding against an
/// unterminated `@` string swallowing the rest of a large file.
pub const DEFAULT_MAX_TOKEN: usize = 64 * 1024 * 1024;

/// How much of the remaining input to quote in error messages.
const ERROR_CONTEXT: usize = 24;

/// A line/column cursor, lines counted from 1 and columns from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Default for Pos {
    fn default() -> Pos {
        Pos { line: 1, column: 0 }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

pub struct Scanner<'a> {
    input: &'a str,
    offset: usize,
    pos: Pos,
    max_token: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Scanner<'a> {
        Scanner::with_max_token(input, DEFAULT_MAX_TOKEN)
    }

    pub fn with_max_token(input: &'a str, max_token: usize) -> Scanner<'a> {
        Scanner {
            input,
            offset: 0,
            pos: Pos::default(),
            max_token,
        }
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.offset == self.input.len()
    }

    pub fn rest(&self) -> &'a str {
        &self.input[self.offset..]
    }

    fn found(&self) -> String {
        let rest = self.rest();
        if rest.len() <= ERROR_CONTEXT {
            return rest.to_string();
        }
        let mut end = ERROR_CONTEXT;
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        rest[..end].to_string()
    }

    /// Consume `len` bytes and update the cursor.
    fn advance(&mut self, len: usize) -> &'a str {
        let span = &self.input[self.offset..self.offset + len];
        self.offset += len;
        match span.rfind('\n') {
            Some(last) => {
                self.pos.line += span.bytes().filter(|b| *b == b'\n').count();
                self.pos.column = span.len() - last - 1;
            }
            None => self.pos.column += span.len(),
        }
        span
    }

    /// Consume the first literal that matches here.  The empty literal
    /// matches only at end of input.  No match consumes nothing.
    pub fn try_literals(&mut self, literals: &[&str]) -> Option<&'a str> {
        for literal in literals {
            if literal.is_empty() {
                if self.is_eof() {
                    return Some("");
                }
            } else if self.rest().starts_with(literal) {
                return Some(self.advance(literal.len()));
            }
        }
        None
    }

    /// Like `try_literals` but a non-match is an error naming the
    /// alternatives.
    pub fn expect_literals(&mut self, literals: &[&str]) -> Result<&'a str, ScanError> {
        match self.try_literals(literals) {
            Some(token) => Ok(token),
            None => Err(ScanError::NotFound {
                expected: literals.iter().map(|l| l.to_string()).collect(),
                pos: self.pos,
                found: self.found(),
            }),
        }
    }

    /// Consume everything up to (not including) the earliest
    /// occurrence of any literal.  Listing `""` makes end of input an
    /// acceptable terminator; otherwise running out of input is an
    /// error.
    pub fn scan_until_literals(&mut self, literals: &[&str]) -> Result<&'a str, ScanError> {
        let rest = self.rest();
        let mut earliest: Option<usize> = None;
        let mut eof_ok = false;
        for literal in literals {
            if literal.is_empty() {
                eof_ok = true;
                continue;
            }
            if let Some(at) = rest.find(literal) {
                if earliest.map_or(true, |e| at < e) {
                    earliest = Some(at);
                }
            }
        }
        let end = match earliest {
            Some(end) => end,
            None if eof_ok => rest.len(),
            None => {
                return Err(if rest.len() > self.max_token {
                    ScanError::TokenTooLong {
                        limit: self.max_token,
                        pos: self.pos,
                    }
                } else {
                    ScanError::NotFound {
                        expected: literals.iter().map(|l| l.to_string()).collect(),
                        pos: self.pos,
                        found: self.found(),
                    }
                })
            }
        };
        if end > self.max_token {
            return Err(ScanError::TokenTooLong {
                limit: self.max_token,
                pos: self.pos,
            });
        }
        Ok(self.advance(end))
    }

    /// Consume the maximal run of characters satisfying `pred`,
    /// requiring at least `min` of them.  `name` describes the token
    /// class in errors.
    pub fn scan_while(
        &mut self,
        name: &'static str,
        min: usize,
        pred: impl Fn(char) -> bool,
    ) -> Result<&'a str, ScanError> {
        let rest = self.rest();
        let mut end = rest.len();
        let mut count = 0usize;
        for (at, ch) in rest.char_indices() {
            if !pred(ch) {
                end = at;
                break;
            }
            count += 1;
        }
        if count < min {
            return Err(ScanError::RunNotFound {
                name,
                pos: self.pos,
                found: self.found(),
            });
        }
        if end > self.max_token {
            return Err(ScanError::TokenTooLong {
                limit: self.max_token,
                pos: self.pos,
            });
        }
        Ok(self.advance(end))
    }
}
