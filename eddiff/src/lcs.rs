//! Longest-common-subsequence diff generator.
//!
//! Builds the full O(n*m) LCS length table, backtracks preferring
//! deletions when both directions score equally, and coalesces the
//! resulting per-line actions into ed commands.  The tie-break makes
//! the output deterministic, which the registry relies on: every
//! generator producing LCS output must emit exactly these commands.

use log::trace;

use crate::errors::DeltaError;
use crate::script::{Command, EdScript};

/// Generate an ed script turning `from` into `to`.
pub fn generate(from: &[&str], to: &[&str]) -> Result<EdScript, DeltaError> {
    Ok(generate_matched(from.len(), to.len(), |i, j| {
        from[i] == to[j]
    }, to))
}

/// Core shared by the plain and hashed generators: the caller supplies
/// the line-equality predicate, everything else is identical.
pub(crate) fn generate_matched(
    from_len: usize,
    to_len: usize,
    eq: impl Fn(usize, usize) -> bool,
    to: &[&str],
) -> EdScript {
    // lengths[i][j] is the LCS length of from[..i] and to[..j].
    let mut lengths = vec![vec![0usize; to_len + 1]; from_len + 1];
    for i in 1..=from_len {
        for j in 1..=to_len {
            lengths[i][j] = if eq(i - 1, j - 1) {
                lengths[i - 1][j - 1] + 1
            } else {
                lengths[i - 1][j].max(lengths[i][j - 1])
            };
        }
    }

    // Walk back from the corner collecting keep/delete/add steps, then
    // reverse into input order.
    #[derive(Debug)]
    enum Step {
        Keep,
        Delete,
        Add(usize),
    }
    let mut steps = Vec::with_capacity(from_len + to_len);
    let (mut i, mut j) = (from_len, to_len);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && eq(i - 1, j - 1) {
            steps.push(Step::Keep);
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || lengths[i][j - 1] > lengths[i - 1][j]) {
            steps.push(Step::Add(j - 1));
            j -= 1;
        } else {
            // Ties fall through to here, preferring the delete.
            steps.push(Step::Delete);
            i -= 1;
        }
    }
    steps.reverse();

    // Coalesce adjacent same-kind steps into commands.  `line` is the
    // 1-based number of the current from-side line.
    let mut commands: Vec<Command> = Vec::new();
    let mut line = 0usize;
    for step in steps {
        match step {
            Step::Keep => line += 1,
            Step::Delete => {
                line += 1;
                match commands.last_mut() {
                    Some(Command::Delete { start, count }) if *start + *count == line => {
                        *count += 1
                    }
                    _ => commands.push(Command::Delete {
                        start: line,
                        count: 1,
                    }),
                }
            }
            Step::Add(to_index) => match commands.last_mut() {
                Some(Command::Add { after, lines }) if *after == line => {
                    lines.push(to[to_index].to_string())
                }
                _ => commands.push(Command::Add {
                    after: line,
                    lines: vec![to[to_index].to_string()],
                }),
            },
        }
    }
    trace!(
        "lcs: {} -> {} lines, {} command(s)",
        from_len,
        to_len,
        commands.len()
    );
    EdScript { commands }
}
