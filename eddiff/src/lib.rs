//! Line-oriented ed-script deltas.
//!
//! RCS archives store every non-head revision as a delta in the
//! classic ed diff subset.  This crate owns that format: the
//! [`EdScript`] type with its parser and printer, a strict
//! single-pass [`EdScript::apply`], and two script generators (plain
//! LCS and a hashed variant with identical output) selectable through
//! a [`Registry`].

mod errors;
pub mod hashline;
pub mod lcs;
mod registry;
mod script;

pub use crate::errors::{DeltaError, Error, RegistryError, Result};
pub use crate::registry::{Generator, Registry};
pub use crate::script::{Command, EdScript};
