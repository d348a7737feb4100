//! Revision resolution: reconstructing file content by walking the
//! delta chain, plus the lock handling that rides along with a
//! checkout.
//!
//! The head revision's content block holds the full text; every other
//! block holds an ed script producing its revision's text from the
//! predecessor on the chain.  Resolution therefore always starts at
//! head and follows `next` pointers, applying each script in turn.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use eddiff::EdScript;
use log::{debug, trace};

use crate::errors::ResolutionError;
use crate::model::Archive;

/// What to do with the user's lock once content resolution succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    Leave,
    Set,
    Clear,
}

/// The result of a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub revision: String,
    pub content: String,
    /// Whether the lock table actually changed.
    pub lock_mutated: bool,
}

/// The result of a clean check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOutcome {
    pub revision: String,
    pub clean: bool,
    pub unlocked: bool,
}

impl Archive {
    /// Check a revision out.  `target` may be a revision number or a
    /// symbolic name; `None` means head.  Locks are only touched after
    /// the content resolved successfully.
    pub fn checkout(
        &mut self,
        user: &str,
        target: Option<&str>,
        action: LockAction,
    ) -> Result<CheckoutOutcome, ResolutionError> {
        if action != LockAction::Leave && user.is_empty() {
            return Err(ResolutionError::LockRequiresUser);
        }
        let requested = match target {
            Some(t) if !t.is_empty() => t,
            _ => self.head.as_str(),
        };
        if requested.is_empty() {
            return Err(ResolutionError::MissingHead);
        }
        let revision = self
            .resolve_symbol(requested)
            .unwrap_or(requested)
            .to_string();
        let content = self.resolve_content(&revision)?;
        let lock_mutated = match action {
            LockAction::Leave => false,
            LockAction::Set => self.set_lock(user, &revision),
            LockAction::Clear => self.clear_lock(user, &revision),
        };
        debug!(
            "checked out {} for {:?} (lock {:?}, mutated: {})",
            revision, user, action, lock_mutated
        );
        Ok(CheckoutOutcome {
            revision,
            content,
            lock_mutated,
        })
    }

    /// Reconstruct a revision's text without touching any lock.
    pub fn resolve_content(&self, revision: &str) -> Result<String, ResolutionError> {
        if self.head.is_empty() {
            return Err(ResolutionError::MissingHead);
        }
        let head_content = self
            .revision_content(&self.head)
            .ok_or_else(|| ResolutionError::ContentNotFound(self.head.clone()))?;
        let mut text = head_content.text.clone();
        if revision == self.head {
            return Ok(text);
        }
        let mut current = self.head.as_str();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(current);
        loop {
            let header = self
                .revision_header(current)
                .ok_or_else(|| ResolutionError::HeaderNotFound(current.to_string()))?;
            let next = header.next.as_str();
            if next.is_empty() {
                return Err(ResolutionError::NotReachable {
                    target: revision.to_string(),
                    head: self.head.clone(),
                });
            }
            if !visited.insert(next) {
                return Err(ResolutionError::LoopDetected(next.to_string()));
            }
            let delta = self
                .revision_content(next)
                .ok_or_else(|| ResolutionError::ContentNotFound(next.to_string()))?;
            text = apply_delta(&text, &delta.text).map_err(|source| ResolutionError::Delta {
                revision: next.to_string(),
                source,
            })?;
            trace!("applied delta for {} ({} byte(s) now)", next, text.len());
            if next == revision {
                return Ok(text);
            }
            current = next;
        }
    }

    /// Check out the revision that was current at `at`: the one with
    /// the most recent timestamp not after the instant.
    pub fn checkout_by_date(
        &mut self,
        user: &str,
        at: NaiveDateTime,
        action: LockAction,
    ) -> Result<CheckoutOutcome, ResolutionError> {
        let revision = self.revision_at(at)?;
        self.checkout(user, Some(&revision), action)
    }

    /// The revision on the head chain in effect at `at`.
    pub fn revision_at(&self, at: NaiveDateTime) -> Result<String, ResolutionError> {
        if self.head.is_empty() {
            return Err(ResolutionError::MissingHead);
        }
        let mut best: Option<(NaiveDateTime, &str)> = None;
        let mut current = self.head.as_str();
        let mut visited: HashSet<&str> = HashSet::new();
        while !current.is_empty() {
            if !visited.insert(current) {
                return Err(ResolutionError::LoopDetected(current.to_string()));
            }
            let header = self
                .revision_header(current)
                .ok_or_else(|| ResolutionError::HeaderNotFound(current.to_string()))?;
            let stamp = header
                .timestamp()
                .map_err(|_| ResolutionError::InvalidTimestamp {
                    revision: current.to_string(),
                })?;
            if stamp <= at && best.map_or(true, |(b, _)| stamp > b) {
                best = Some((stamp, current));
            }
            current = header.next.as_str();
        }
        best.map(|(_, revision)| revision.to_string())
            .ok_or(ResolutionError::NoRevisionAtDate)
    }

    /// Compare a working copy against a stored revision, optionally
    /// dropping the user's lock when they match.  `revision` defaults
    /// to the user's locked revision when unlocking, head otherwise.
    pub fn clean(
        &mut self,
        user: &str,
        working: &str,
        revision: Option<&str>,
        unlock: bool,
    ) -> Result<CleanOutcome, ResolutionError> {
        let revision = match revision {
            Some(r) if !r.is_empty() => r.to_string(),
            _ if unlock => self
                .lock_for_user(user)
                .map(|r| r.to_string())
                .ok_or_else(|| ResolutionError::NoLockForUser(user.to_string()))?,
            _ => {
                if self.head.is_empty() {
                    return Err(ResolutionError::MissingHead);
                }
                self.head.clone()
            }
        };
        let stored = self.resolve_content(&revision)?;
        let clean = working == stored;
        let unlocked = unlock && clean && self.clear_lock(user, &revision);
        debug!(
            "clean check against {}: clean {}, unlocked {}",
            revision, clean, unlocked
        );
        Ok(CleanOutcome {
            revision,
            clean,
            unlocked,
        })
    }

    /// Lines added and removed by a revision, as rlog reports them.
    /// Trunk revisions store reverse deltas, so their stored script's
    /// deletions count as additions and vice versa; branch revisions
    /// store forward deltas.  `None` when there is no delta to count
    /// (the initial revision).
    pub fn line_stats(&self, revision: &str) -> Result<Option<(usize, usize)>, ResolutionError> {
        let header = self
            .revision_header(revision)
            .ok_or_else(|| ResolutionError::HeaderNotFound(revision.to_string()))?;
        let (delta_revision, reverse) = if header.is_trunk() {
            if header.next.is_empty() {
                return Ok(None);
            }
            (header.next.as_str(), true)
        } else {
            (revision, false)
        };
        let content = match self.revision_content(delta_revision) {
            Some(content) => content,
            None => return Ok(None),
        };
        let script =
            EdScript::parse(&content.text).map_err(|source| ResolutionError::Delta {
                revision: delta_revision.to_string(),
                source,
            })?;
        let (added, deleted) = script.line_counts();
        Ok(Some(if reverse {
            (deleted, added)
        } else {
            (added, deleted)
        }))
    }
}

/// Apply one stored ed script to the text it chains from.  The
/// terminator comes from the result: zero lines yield the empty
/// string, and only a base that ends mid-line leaves the last line
/// unterminated.
fn apply_delta(base: &str, script: &str) -> Result<String, eddiff::DeltaError> {
    let script = EdScript::parse(script)?;
    let lines = script.apply(&split_lines(base))?;
    let mut text = lines.join("\n");
    if !lines.is_empty() && (base.is_empty() || base.ends_with('\n')) {
        text.push('\n');
    }
    Ok(text)
}

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lock, RevisionContent, RevisionHeader, Symbol};

    fn archive(head: &str, chain: &[(&str, &str, &str)], texts: &[(&str, &str)]) -> Archive {
        let mut archive = Archive::new();
        archive.head = head.to_string();
        for (revision, date, next) in chain {
            archive.headers.push(RevisionHeader {
                revision: revision.to_string(),
                date: date.to_string(),
                author: "tester".to_string(),
                state: "Exp".to_string(),
                next: next.to_string(),
                ..RevisionHeader::default()
            });
        }
        for (revision, text) in texts {
            archive.contents.push(RevisionContent {
                revision: revision.to_string(),
                text: text.to_string(),
                ..RevisionContent::default()
            });
        }
        archive
    }

    fn three_revision_archive() -> Archive {
        archive(
            "1.3",
            &[
                ("1.3", "2024.03.01.00.00.00", "1.2"),
                ("1.2", "2024.02.01.00.00.00", "1.1"),
                ("1.1", "2024.01.01.00.00.00", ""),
            ],
            &[
                ("1.3", "a\nb\nc\n"),
                ("1.2", "d3 1\n"),
                ("1.1", "d1 1\na1 1\nz\n"),
            ],
        )
    }

    #[test]
    fn head_checkout_is_the_stored_text() {
        let mut archive = three_revision_archive();
        let outcome = archive.checkout("", None, LockAction::Leave).unwrap();
        assert_eq!(outcome.revision, "1.3");
        assert_eq!(outcome.content, "a\nb\nc\n");
        assert!(!outcome.lock_mutated);
    }

    #[test]
    fn chain_walk_reconstructs_old_revisions() {
        let archive = three_revision_archive();
        assert_eq!(archive.resolve_content("1.2").unwrap(), "a\nb\n");
        assert_eq!(archive.resolve_content("1.1").unwrap(), "z\nb\n");
    }

    #[test]
    fn symbols_resolve_before_the_walk() {
        let mut archive = three_revision_archive();
        archive.symbols = Some(vec![Symbol {
            name: "release".to_string(),
            revision: "1.2".to_string(),
        }]);
        let outcome = archive
            .checkout("tester", Some("release"), LockAction::Set)
            .unwrap();
        assert_eq!(outcome.revision, "1.2");
        assert_eq!(outcome.content, "a\nb\n");
        assert!(outcome.lock_mutated);
        assert_eq!(archive.lock_for_user("tester"), Some("1.2"));
    }

    #[test]
    fn chain_passes_through_an_empty_revision() {
        // 1.2 deletes the whole file; 1.1 refills it.
        let archive = archive(
            "1.3",
            &[
                ("1.3", "2024.03.01.00.00.00", "1.2"),
                ("1.2", "2024.02.01.00.00.00", "1.1"),
                ("1.1", "2024.01.01.00.00.00", ""),
            ],
            &[("1.3", "a\n"), ("1.2", "d1 1\n"), ("1.1", "a0 1\nz\n")],
        );
        assert_eq!(archive.resolve_content("1.2").unwrap(), "");
        assert_eq!(archive.resolve_content("1.1").unwrap(), "z\n");
    }

    #[test]
    fn unreachable_revision_is_reported() {
        let archive = three_revision_archive();
        assert!(matches!(
            archive.resolve_content("2.1"),
            Err(ResolutionError::NotReachable { .. })
        ));
    }

    #[test]
    fn chain_loops_are_detected() {
        let archive = archive(
            "1.2",
            &[
                ("1.2", "2024.02.01.00.00.00", "1.1"),
                ("1.1", "2024.01.01.00.00.00", "1.2"),
            ],
            &[("1.2", "x\n"), ("1.1", "")],
        );
        assert!(matches!(
            archive.resolve_content("9.9"),
            Err(ResolutionError::LoopDetected(rev)) if rev == "1.2"
        ));
    }

    #[test]
    fn bad_delta_names_its_revision() {
        let archive = archive(
            "1.2",
            &[
                ("1.2", "2024.02.01.00.00.00", "1.1"),
                ("1.1", "2024.01.01.00.00.00", ""),
            ],
            &[("1.2", "a\nb\n"), ("1.1", "d5 1\n")],
        );
        match archive.resolve_content("1.1") {
            Err(ResolutionError::Delta { revision, .. }) => assert_eq!(revision, "1.1"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn locking_requires_a_user() {
        let mut archive = three_revision_archive();
        assert!(matches!(
            archive.checkout("", None, LockAction::Set),
            Err(ResolutionError::LockRequiresUser)
        ));
    }

    #[test]
    fn repeated_lock_checkout_reports_no_mutation() {
        let mut archive = three_revision_archive();
        let first = archive.checkout("tester", None, LockAction::Set).unwrap();
        assert!(first.lock_mutated);
        let second = archive.checkout("tester", None, LockAction::Set).unwrap();
        assert!(!second.lock_mutated);
    }

    #[test]
    fn clear_without_a_matching_lock_mutates_nothing() {
        let mut archive = three_revision_archive();
        archive.locks = Some(vec![Lock {
            user: "tester".to_string(),
            revision: "1.2".to_string(),
        }]);
        let outcome = archive.checkout("tester", None, LockAction::Clear).unwrap();
        // The lock is on 1.2, the checkout was of head 1.3.
        assert!(!outcome.lock_mutated);
        assert_eq!(archive.lock_for_user("tester"), Some("1.2"));
    }

    #[test]
    fn failed_resolution_leaves_locks_alone() {
        let mut archive = three_revision_archive();
        assert!(archive
            .checkout("tester", Some("3.1"), LockAction::Set)
            .is_err());
        assert_eq!(archive.lock_for_user("tester"), None);
    }

    #[test]
    fn date_checkout_picks_latest_at_or_before() {
        let mut archive = three_revision_archive();
        let at = |s: &str| crate::date::parse_timestamp(s).unwrap();
        assert!(matches!(
            archive.checkout_by_date("", at("2023.12.31.23.59.59"), LockAction::Leave),
            Err(ResolutionError::NoRevisionAtDate)
        ));
        let outcome = archive
            .checkout_by_date("", at("2024.02.15.00.00.00"), LockAction::Leave)
            .unwrap();
        assert_eq!(outcome.revision, "1.2");
        assert_eq!(outcome.content, "a\nb\n");
        let outcome = archive
            .checkout_by_date("", at("2025.01.01.00.00.00"), LockAction::Leave)
            .unwrap();
        assert_eq!(outcome.revision, "1.3");
    }

    #[test]
    fn date_checkout_prefers_timestamp_over_revision_number() {
        // 1.1 is newer than 1.3 by timestamp; the walk must pick by
        // time, not by position on the chain.
        let archive = archive(
            "1.3",
            &[
                ("1.3", "2020.01.01.00.00.00", "1.2"),
                ("1.2", "2022.01.01.00.00.00", "1.1"),
                ("1.1", "2021.01.01.00.00.00", ""),
            ],
            &[
                ("1.3", "HEAD\n"),
                ("1.2", "d1 1\na1 1\nMIDDLE\n"),
                ("1.1", "d1 1\na1 1\nOLD\n"),
            ],
        );
        let at = crate::date::parse_timestamp("2021.06.01.00.00.00").unwrap();
        assert_eq!(archive.revision_at(at).unwrap(), "1.1");
    }

    #[test]
    fn clean_compares_and_unlocks() {
        let mut archive = three_revision_archive();
        archive.set_lock("tester", "1.2");
        let outcome = archive.clean("tester", "a\nb\n", None, true).unwrap();
        assert_eq!(outcome.revision, "1.2");
        assert!(outcome.clean);
        assert!(outcome.unlocked);
        assert_eq!(archive.lock_for_user("tester"), None);
    }

    #[test]
    fn dirty_working_copy_keeps_the_lock() {
        let mut archive = three_revision_archive();
        archive.set_lock("tester", "1.2");
        let outcome = archive
            .clean("tester", "modified\n", None, true)
            .unwrap();
        assert!(!outcome.clean);
        assert!(!outcome.unlocked);
        assert_eq!(archive.lock_for_user("tester"), Some("1.2"));
    }

    #[test]
    fn clean_defaults_to_head_without_unlock() {
        let mut archive = three_revision_archive();
        let outcome = archive.clean("tester", "a\nb\nc\n", None, false).unwrap();
        assert_eq!(outcome.revision, "1.3");
        assert!(outcome.clean);
        assert!(!outcome.unlocked);
    }

    #[test]
    fn line_stats_reverse_on_trunk() {
        let archive = three_revision_archive();
        // 1.3's stored neighbour delta is 1.2's "d3 1": one deletion
        // in reverse direction means 1.3 added one line.
        assert_eq!(archive.line_stats("1.3").unwrap(), Some((1, 0)));
        // 1.2's neighbour is 1.1's "d1 1 / a1 1": a one-line swap.
        assert_eq!(archive.line_stats("1.2").unwrap(), Some((1, 1)));
        assert_eq!(archive.line_stats("1.1").unwrap(), None);
    }

    #[test]
    fn line_stats_forward_on_branches() {
        let mut archive = three_revision_archive();
        archive.headers.push(RevisionHeader {
            revision: "1.1.1.1".to_string(),
            date: "2024.04.01.00.00.00".to_string(),
            ..RevisionHeader::default()
        });
        archive.contents.push(RevisionContent {
            revision: "1.1.1.1".to_string(),
            text: "a2 2\nx\ny\n".to_string(),
            ..RevisionContent::default()
        });
        assert_eq!(archive.line_stats("1.1.1.1").unwrap(), Some((2, 0)));
    }
}
