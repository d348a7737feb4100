//! Errors specific to the delta code.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Either kind of failure the crate can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Delta(#[from] DeltaError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Failures while parsing or applying an ed script.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("malformed ed command {line:?}: {reason}")]
    Malformed { line: String, reason: &'static str },

    #[error("script ended while reading {expected} line(s) of an a{after} command")]
    TruncatedAdd { after: usize, expected: usize },

    #[error("d{start} {count} reaches past the end of a {len}-line input")]
    DeleteOutOfBounds {
        start: usize,
        count: usize,
        len: usize,
    },

    #[error("a{after} refers past the end of a {len}-line input")]
    AddOutOfBounds { after: usize, len: usize },

    #[error("command touching line {line} arrives after that line was already consumed")]
    OutOfOrder { line: usize },
}

/// Failures looking up a diff algorithm by name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no diff algorithm named {0:?}")]
    UnknownAlgorithm(String),

    #[error("no diff algorithms registered")]
    Empty,
}
