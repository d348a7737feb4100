//! Hash-accelerated diff generator.
//!
//! Hashes every line once with SipHash-1-3 and runs the same LCS core
//! as the plain generator over the hashes, comparing the actual line
//! text only when the hashes agree.  Long lines are therefore compared
//! in constant time on the hot path while collisions cannot change the
//! output: the result is always identical to [`crate::lcs::generate`].

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::errors::DeltaError;
use crate::lcs::generate_matched;
use crate::script::EdScript;

fn hash_line(line: &str) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write(line.as_bytes());
    hasher.finish()
}

/// Generate an ed script turning `from` into `to`.
pub fn generate(from: &[&str], to: &[&str]) -> Result<EdScript, DeltaError> {
    let from_hashes: Vec<u64> = from.iter().map(|l| hash_line(l)).collect();
    let to_hashes: Vec<u64> = to.iter().map(|l| hash_line(l)).collect();
    Ok(generate_matched(
        from.len(),
        to.len(),
        |i, j| from_hashes[i] == to_hashes[j] && from[i] == to[j],
        to,
    ))
}
