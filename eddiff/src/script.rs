//! The ed-script delta representation.
//!
//! A script is an ordered list of commands in the classic ed diff
//! subset: `d<START> <COUNT>` deletes COUNT lines starting at the
//! 1-based line START of the input, and `a<AFTER> <COUNT>` inserts the
//! COUNT following literal lines after the 0-based line AFTER (`a0`
//! inserts at the very beginning).  Commands must reference the input
//! in strictly increasing order so a script can be applied in a single
//! pass.

use std::fmt;

use log::trace;

use crate::errors::DeltaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Delete `count` lines, the first being the 1-based line `start`.
    Delete { start: usize, count: usize },
    /// Insert `lines` after the 0-based line `after`.
    Add { after: usize, lines: Vec<String> },
}

impl Command {
    /// The first input line this command touches, in input order.
    /// Used to check the strictly-increasing invariant.
    fn anchor(&self) -> usize {
        match self {
            Command::Delete { start, .. } => start - 1,
            Command::Add { after, .. } => *after,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdScript {
    pub commands: Vec<Command>,
}

impl EdScript {
    pub fn new(commands: Vec<Command>) -> EdScript {
        EdScript { commands }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Parse the textual form.  Blank lines between commands are
    /// ignored; the literal lines of an `a` command are taken verbatim
    /// and may be blank.
    pub fn parse(text: &str) -> Result<EdScript, DeltaError> {
        let mut commands = Vec::new();
        let mut lines = text.split('\n');
        while let Some(line) = lines.next() {
            if line.is_empty() {
                continue;
            }
            let kind = match line.chars().next() {
                Some(k) => k,
                None => continue,
            };
            let (first, second) = split_counts(&line[kind.len_utf8()..])
                .ok_or_else(|| DeltaError::Malformed {
                    line: line.to_string(),
                    reason: "expected two decimal arguments",
                })?;
            match kind {
                'd' => {
                    if first == 0 || second == 0 {
                        return Err(DeltaError::Malformed {
                            line: line.to_string(),
                            reason: "delete start and count must be positive",
                        });
                    }
                    commands.push(Command::Delete {
                        start: first,
                        count: second,
                    });
                }
                'a' => {
                    let mut added = Vec::with_capacity(second);
                    for _ in 0..second {
                        match lines.next() {
                            Some(text) => added.push(text.to_string()),
                            None => {
                                return Err(DeltaError::TruncatedAdd {
                                    after: first,
                                    expected: second - added.len(),
                                })
                            }
                        }
                    }
                    commands.push(Command::Add {
                        after: first,
                        lines: added,
                    });
                }
                _ => {
                    return Err(DeltaError::Malformed {
                        line: line.to_string(),
                        reason: "unknown command letter",
                    })
                }
            }
        }
        trace!("parsed ed script with {} command(s)", commands.len());
        Ok(EdScript { commands })
    }

    /// Apply the script to `original`, producing the new line
    /// sequence.  Commands referencing lines already consumed or past
    /// the end of the input are hard errors.
    pub fn apply(&self, original: &[&str]) -> Result<Vec<String>, DeltaError> {
        let mut out = Vec::with_capacity(original.len());
        // Number of original lines already emitted or deleted.
        let mut consumed = 0usize;
        for command in &self.commands {
            if command.anchor() < consumed {
                return Err(DeltaError::OutOfOrder {
                    line: command.anchor() + 1,
                });
            }
            match command {
                Command::Delete { start, count } => {
                    let begin = start - 1;
                    let end = begin + count;
                    if end > original.len() {
                        return Err(DeltaError::DeleteOutOfBounds {
                            start: *start,
                            count: *count,
                            len: original.len(),
                        });
                    }
                    out.extend(original[consumed..begin].iter().map(|l| l.to_string()));
                    consumed = end;
                }
                Command::Add { after, lines } => {
                    if *after > original.len() {
                        return Err(DeltaError::AddOutOfBounds {
                            after: *after,
                            len: original.len(),
                        });
                    }
                    out.extend(original[consumed..*after].iter().map(|l| l.to_string()));
                    consumed = *after;
                    out.extend(lines.iter().cloned());
                }
            }
        }
        out.extend(original[consumed..].iter().map(|l| l.to_string()));
        Ok(out)
    }

    /// Total lines added and deleted by the script, for rlog-style
    /// `+n -m` reporting.
    pub fn line_counts(&self) -> (usize, usize) {
        let mut added = 0;
        let mut deleted = 0;
        for command in &self.commands {
            match command {
                Command::Delete { count, .. } => deleted += count,
                Command::Add { lines, .. } => added += lines.len(),
            }
        }
        (added, deleted)
    }
}

impl fmt::Display for EdScript {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for command in &self.commands {
            match command {
                Command::Delete { start, count } => writeln!(f, "d{} {}", start, count)?,
                Command::Add { after, lines } => {
                    writeln!(f, "a{} {}", after, lines.len())?;
                    for line in lines {
                        writeln!(f, "{}", line)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Split `" 3 2"`-style argument text into two decimal numbers.  The
/// command letter is not separated from the first number by a space.
fn split_counts(rest: &str) -> Option<(usize, usize)> {
    let mut parts = rest.splitn(2, ' ');
    let first = parts.next()?.parse().ok()?;
    let second = parts.next()?.trim_end_matches('\r').parse().ok()?;
    Some((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn parse_and_print_round() {
        let text = "d1 2\na3 2\nhello\nworld\n";
        let script = EdScript::parse(text).unwrap();
        assert_eq!(
            script.commands,
            vec![
                Command::Delete { start: 1, count: 2 },
                Command::Add {
                    after: 3,
                    lines: vec!["hello".to_string(), "world".to_string()],
                },
            ]
        );
        assert_eq!(script.to_string(), text);
    }

    #[test]
    fn parse_rejects_unknown_letter() {
        match EdScript::parse("c2 1\n") {
            Err(DeltaError::Malformed { line, .. }) => assert_eq!(line, "c2 1"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_missing_count() {
        assert!(matches!(
            EdScript::parse("d4\n"),
            Err(DeltaError::Malformed { .. })
        ));
    }

    #[test]
    fn parse_rejects_truncated_add() {
        assert!(matches!(
            EdScript::parse("a1 3\nonly\n"),
            Err(DeltaError::TruncatedAdd { after: 1, expected: 2 })
        ));
    }

    #[test]
    fn apply_replaces_a_line() {
        let script = EdScript::parse("d1 1\na1 1\nz\n").unwrap();
        let out = script.apply(&lines("a\nb")).unwrap();
        assert_eq!(out, vec!["z", "b"]);
    }

    #[test]
    fn apply_empty_script_is_identity() {
        let script = EdScript::default();
        let out = script.apply(&lines("a\nb\nc")).unwrap();
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn apply_rejects_delete_past_end() {
        let script = EdScript::parse("d5 1\n").unwrap();
        assert_eq!(
            script.apply(&lines("a\nb")),
            Err(DeltaError::DeleteOutOfBounds {
                start: 5,
                count: 1,
                len: 2,
            })
        );
    }

    #[test]
    fn apply_rejects_delete_overrunning_end() {
        let script = EdScript::parse("d2 3\n").unwrap();
        assert!(matches!(
            script.apply(&lines("a\nb\nc")),
            Err(DeltaError::DeleteOutOfBounds { .. })
        ));
    }

    #[test]
    fn apply_rejects_add_past_end() {
        let script = EdScript::parse("a9 1\nx\n").unwrap();
        assert!(matches!(
            script.apply(&lines("a\nb")),
            Err(DeltaError::AddOutOfBounds { after: 9, len: 2 })
        ));
    }

    #[test]
    fn apply_rejects_backwards_commands() {
        let script = EdScript::parse("d3 1\nd1 1\n").unwrap();
        assert!(matches!(
            script.apply(&lines("a\nb\nc\nd")),
            Err(DeltaError::OutOfOrder { line: 1 })
        ));
    }

    #[test]
    fn add_at_delete_point_keeps_order() {
        // Replace the whole two-line input.
        let script = EdScript::parse("a0 1\nnew\nd1 2\n").unwrap();
        let out = script.apply(&lines("old1\nold2")).unwrap();
        assert_eq!(out, vec!["new"]);
    }

    #[test]
    fn line_counts_sum_both_sides() {
        let script = EdScript::parse("d1 2\na3 1\nx\na5 2\ny\nz\n").unwrap();
        assert_eq!(script.line_counts(), (3, 2));
    }
}
