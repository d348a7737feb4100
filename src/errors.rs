//! Error types, one enum per stage of the pipeline.

use thiserror::Error;

use crate::scanner::Pos;

pub type Result<T> = std::result::Result<T, Error>;

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Delta(#[from] eddiff::Error),
}

/// Low-level tokenization failures.  Every variant carries the
/// position the scanner was at when it gave up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("expected one of {expected:?} at {pos}, found {found:?}")]
    NotFound {
        expected: Vec<String>,
        pos: Pos,
        found: String,
    },

    #[error("expected {name} at {pos}, found {found:?}")]
    RunNotFound {
        name: &'static str,
        pos: Pos,
        found: String,
    },

    #[error("token starting at {pos} exceeds the {limit}-byte limit")]
    TokenTooLong { limit: usize, pos: Pos },
}

/// Grammar-level failures while parsing an archive.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("in {field}: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: Box<ParseError>,
    },

    #[error("unknown keyword {keyword:?} at {pos}, expected one of {expected:?}")]
    UnknownKeyword {
        keyword: String,
        pos: Pos,
        expected: &'static [&'static str],
    },

    #[error("integrity value at {pos} must be @-quoted")]
    UnquotedIntegrity { pos: Pos },

    #[error("{count} consecutive blank lines at {pos}, at most {limit} are allowed")]
    TooManyBlankLines {
        count: usize,
        pos: Pos,
        limit: usize,
    },

    #[error("timestamp {value:?} does not match YYYY.MM.DD.hh.mm.ss")]
    InvalidTimestamp { value: String },

    #[error("revision {revision} has a header but no content block")]
    MissingContent { revision: String },

    #[error("revision {revision} has a content block but no header")]
    MissingHeader { revision: String },

    #[error("content block {index} is for {found} but header {index} is for {expected}")]
    MisalignedRevision {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("input is not valid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },
}

impl ParseError {
    /// Wrap an error with the admin field or header keyword being
    /// parsed when it occurred.
    pub(crate) fn in_field(field: &'static str) -> impl FnOnce(ParseError) -> ParseError {
        move |source| ParseError::Field {
            field,
            source: Box::new(source),
        }
    }
}

/// Failures while resolving revision content or mutating locks.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("archive has no head revision")]
    MissingHead,

    #[error("no header for revision {0:?}")]
    HeaderNotFound(String),

    #[error("no content block for revision {0:?}")]
    ContentNotFound(String),

    #[error("revision chain loops back through {0:?}")]
    LoopDetected(String),

    #[error("revision {target:?} is not reachable from head {head:?}")]
    NotReachable { target: String, head: String },

    #[error("lock operations require a user name")]
    LockRequiresUser,

    #[error("user {0:?} holds no lock")]
    NoLockForUser(String),

    #[error("bad delta for revision {revision:?}: {source}")]
    Delta {
        revision: String,
        #[source]
        source: eddiff::DeltaError,
    },

    #[error("revision {revision:?} carries an unparsable timestamp")]
    InvalidTimestamp { revision: String },

    #[error("no revision on or before the requested time")]
    NoRevisionAtDate,
}
