//! Reading, writing, and resolving RCS `,v` archive files.
//!
//! The parser keeps formatting details alongside the document model,
//! so an archive that came from a conforming writer serializes back
//! byte for byte.  On top of the model sit the operations a version
//! control porcelain needs: checking revisions out by number, symbol,
//! or date, reconstructing content through the stored ed-script
//! deltas, lock bookkeeping, and rlog-style line statistics.
//!
//! ```no_run
//! use rcsfile::{parse, LockAction};
//!
//! # fn main() -> Result<(), rcsfile::Error> {
//! let bytes = std::fs::read("project/file.txt,v").unwrap();
//! let mut archive = parse(&bytes)?;
//! let outcome = archive.checkout("alice", None, LockAction::Set)?;
//! println!("{}: {} bytes", outcome.revision, outcome.content.len());
//! # Ok(())
//! # }
//! ```

mod checkout;
pub mod date;
mod errors;
mod model;
mod parse;
pub mod scanner;

pub use crate::checkout::{CheckoutOutcome, CleanOutcome, LockAction};
pub use crate::errors::{Error, ParseError, ResolutionError, Result, ScanError};
pub use crate::model::{
    Archive, ArchiveLayout, ContentLayout, HeaderLayout, Lock, Newline, Phrase, PhraseValue,
    RevisionContent, RevisionHeader, Symbol,
};
pub use crate::parse::{parse, parse_str, MAX_BLANK_LINES};

// The delta engine is part of the public contract; re-export it so
// callers can generate scripts without naming the crate separately.
pub use eddiff;
