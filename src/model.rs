//! The archive document model and its serializer.
//!
//! Parsing keeps enough formatting detail (separator widths, blank
//! line counts, inline versus multiline lists) that serializing an
//! unmodified archive reproduces the input byte for byte when the
//! input came from a conforming writer.  All of that detail lives in
//! the `*Layout` structs; the semantic fields stay clean.

use std::fmt;
use std::io::{self, Write};

use chrono::NaiveDateTime;

use crate::date;
use crate::errors::{ParseError, ResolutionError};

/// Characters with special meaning in the grammar; never part of an
/// identifier.
pub(crate) fn is_special(c: char) -> bool {
    matches!(c, '$' | ',' | '.' | ':' | ';' | '@')
}

/// Any visible graphic character except the special set.
pub(crate) fn is_id_char(c: char) -> bool {
    !c.is_whitespace() && !c.is_control() && !is_special(c)
}

/// Characters of a revision number.
pub(crate) fn is_num_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// Line ending used for the archive's own structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Newline {
    Lf,
    CrLf,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }
}

impl Default for Newline {
    fn default() -> Newline {
        Newline::Lf
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub revision: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub user: String,
    pub revision: String,
}

/// One value of a new phrase: either a bare word or an `@`-quoted
/// string.  The distinction is preserved so unknown phrases round-trip
/// exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhraseValue {
    Bare(String),
    Quoted(String),
}

impl PhraseValue {
    pub fn raw(&self) -> &str {
        match self {
            PhraseValue::Bare(s) | PhraseValue::Quoted(s) => s,
        }
    }

    /// Pick the representation the text demands: bare when every
    /// character is a word or num character, quoted otherwise.
    pub fn classify(raw: &str) -> PhraseValue {
        if !raw.is_empty() && raw.chars().all(|c| is_id_char(c) || c == '.') {
            PhraseValue::Bare(raw.to_string())
        } else {
            PhraseValue::Quoted(raw.to_string())
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            PhraseValue::Bare(s) => out.push_str(s),
            PhraseValue::Quoted(s) => push_quoted(out, s),
        }
    }
}

/// A new phrase the grammar does not know: `key value… ;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub key: String,
    pub values: Vec<PhraseValue>,
}

/// Formatting detail for the admin section and file shape.  All the
/// `*_sep_spaces` fields mean "N spaces" when positive and the
/// canonical tab when zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveLayout {
    pub newline: Newline,
    pub strict_own_line: bool,
    /// Some revision header carries a one- or two-digit year.
    pub year_truncated: bool,
    /// Extra newlines after the final content block; -1 means the
    /// file does not end with a newline at all.
    pub eof_newline_offset: i32,
    /// Blank lines between admin section and first revision header,
    /// relative to the canonical two.
    pub revision_start_offset: i32,
    /// Blank lines before `desc`, relative to the canonical two.
    pub desc_newline_offset: i32,
    /// Whitespace written between the last symbol and its `;`.
    pub symbol_terminator_prefix: String,
    pub head_sep_spaces: usize,
    pub branch_sep_spaces: usize,
    pub access_sep_spaces: usize,
    pub symbols_sep_spaces: usize,
    pub symbols_inline: bool,
    pub symbols_first_spaces: usize,
    pub symbols_between_spaces: usize,
    pub locks_sep_spaces: usize,
    pub integrity_sep_spaces: usize,
    pub comment_sep_spaces: usize,
    pub expand_sep_spaces: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderLayout {
    pub year_truncated: bool,
    pub date_sep_spaces: usize,
    pub date_author_spaces: usize,
    pub author_state_spaces: usize,
    pub branches_sep_spaces: usize,
    pub next_sep_spaces: usize,
    pub commitid_sep_spaces: usize,
    /// Blank lines before this header, relative to the canonical one.
    /// Unused for the first header, which `revision_start_offset`
    /// covers.
    pub preceding_newlines_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentLayout {
    /// Blank lines before the block, relative to the canonical two.
    pub preceding_newlines_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionHeader {
    pub revision: String,
    /// Lexical `YYYY.MM.DD.hh.mm.ss` timestamp, year possibly
    /// truncated.  Use [`RevisionHeader::timestamp`] for the parsed
    /// form.
    pub date: String,
    pub author: String,
    pub state: String,
    pub branches: Vec<String>,
    /// Next revision on the delta chain; empty at the end.
    pub next: String,
    pub commit_id: Option<String>,
    // CVS-NT new phrases with well-known keys.
    pub owner: Vec<PhraseValue>,
    pub group: Vec<PhraseValue>,
    pub permissions: Vec<PhraseValue>,
    pub hardlinks: Vec<PhraseValue>,
    pub deltatype: Vec<PhraseValue>,
    pub kopt: Vec<PhraseValue>,
    pub mergepoint: Vec<PhraseValue>,
    pub filename: Vec<PhraseValue>,
    pub username: Vec<PhraseValue>,
    /// Phrases with keys the grammar does not know, in input order.
    pub phrases: Vec<Phrase>,
    pub layout: HeaderLayout,
}

impl RevisionHeader {
    /// Trunk revisions have exactly two dot-separated components and
    /// store reverse deltas; anything longer is a branch revision
    /// with forward deltas.
    pub fn is_trunk(&self) -> bool {
        self.revision.split('.').count() == 2
    }

    pub fn timestamp(&self) -> Result<NaiveDateTime, ParseError> {
        date::parse_timestamp(&self.date)
    }

    fn render(&self, out: &mut String, nl: &str) {
        let l = &self.layout;
        out.push_str(&self.revision);
        out.push_str(nl);
        out.push_str("date");
        push_sep(out, l.date_sep_spaces);
        out.push_str(&self.date);
        out.push(';');
        push_sep(out, l.date_author_spaces);
        out.push_str("author ");
        out.push_str(&self.author);
        out.push(';');
        push_sep(out, l.author_state_spaces);
        out.push_str("state ");
        out.push_str(&self.state);
        out.push(';');
        out.push_str(nl);
        out.push_str("branches");
        if self.branches.is_empty() {
            push_spaces(out, l.branches_sep_spaces);
        } else {
            for (i, branch) in self.branches.iter().enumerate() {
                if i == 0 && l.branches_sep_spaces > 0 {
                    push_spaces(out, l.branches_sep_spaces);
                } else {
                    out.push_str(nl);
                    out.push('\t');
                }
                out.push_str(branch);
            }
        }
        out.push(';');
        out.push_str(nl);
        out.push_str("next");
        push_sep(out, l.next_sep_spaces);
        out.push_str(&self.next);
        out.push(';');
        out.push_str(nl);
        if let Some(commit_id) = &self.commit_id {
            out.push_str("commitid");
            push_sep(out, l.commitid_sep_spaces);
            out.push_str(commit_id);
            out.push(';');
            out.push_str(nl);
        }
        for (key, values) in self.known_phrases() {
            render_phrase(out, nl, key, values);
        }
        for phrase in &self.phrases {
            render_phrase(out, nl, &phrase.key, &phrase.values);
        }
    }

    fn known_phrases(&self) -> impl Iterator<Item = (&'static str, &Vec<PhraseValue>)> {
        vec![
            ("owner", &self.owner),
            ("group", &self.group),
            ("permissions", &self.permissions),
            ("hardlinks", &self.hardlinks),
            ("deltatype", &self.deltatype),
            ("kopt", &self.kopt),
            ("mergepoint", &self.mergepoint),
            ("filename", &self.filename),
            ("username", &self.username),
        ]
        .into_iter()
    }

    /// Route a well-known phrase key to its field, if it is one.
    pub(crate) fn known_phrase_mut(&mut self, key: &str) -> Option<&mut Vec<PhraseValue>> {
        Some(match key {
            "owner" => &mut self.owner,
            "group" => &mut self.group,
            "permissions" => &mut self.permissions,
            "hardlinks" => &mut self.hardlinks,
            "deltatype" => &mut self.deltatype,
            "kopt" => &mut self.kopt,
            "mergepoint" => &mut self.mergepoint,
            "filename" => &mut self.filename,
            "username" => &mut self.username,
            _ => return None,
        })
    }
}

fn render_phrase(out: &mut String, nl: &str, key: &str, values: &[PhraseValue]) {
    if values.is_empty() {
        return;
    }
    out.push_str(key);
    out.push('\t');
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        value.render(out);
    }
    out.push(';');
    out.push_str(nl);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionContent {
    pub revision: String,
    pub log: String,
    /// Full text for the head revision, an ed script for everything
    /// else.
    pub text: String,
    pub layout: ContentLayout,
}

impl RevisionContent {
    fn render(&self, out: &mut String, nl: &str) {
        push_newlines(out, nl, 2 + self.layout.preceding_newlines_offset);
        out.push_str(&self.revision);
        out.push_str(nl);
        out.push_str("log");
        out.push_str(nl);
        push_quoted(out, &self.log);
        out.push_str(nl);
        out.push_str("text");
        out.push_str(nl);
        push_quoted(out, &self.text);
        out.push_str(nl);
    }
}

/// A parsed `,v` archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub head: String,
    pub branch: Option<String>,
    /// `None` when the `access` keyword is absent entirely.
    pub access: Option<Vec<String>>,
    pub symbols: Option<Vec<Symbol>>,
    pub locks: Option<Vec<Lock>>,
    pub strict: bool,
    pub integrity: Option<String>,
    pub comment: Option<String>,
    pub expand: Option<String>,
    pub description: String,
    pub headers: Vec<RevisionHeader>,
    pub contents: Vec<RevisionContent>,
    pub layout: ArchiveLayout,
}

impl Default for Archive {
    fn default() -> Archive {
        Archive::new()
    }
}

impl Archive {
    pub fn new() -> Archive {
        Archive {
            head: String::new(),
            branch: None,
            access: None,
            symbols: Some(Vec::new()),
            locks: Some(Vec::new()),
            strict: true,
            integrity: None,
            comment: None,
            expand: None,
            description: String::new(),
            headers: Vec::new(),
            contents: Vec::new(),
            layout: ArchiveLayout::default(),
        }
    }

    pub fn revision_header(&self, revision: &str) -> Option<&RevisionHeader> {
        self.headers.iter().find(|h| h.revision == revision)
    }

    pub fn revision_header_mut(&mut self, revision: &str) -> Option<&mut RevisionHeader> {
        self.headers.iter_mut().find(|h| h.revision == revision)
    }

    pub fn revision_content(&self, revision: &str) -> Option<&RevisionContent> {
        self.contents.iter().find(|c| c.revision == revision)
    }

    pub fn revision_content_mut(&mut self, revision: &str) -> Option<&mut RevisionContent> {
        self.contents.iter_mut().find(|c| c.revision == revision)
    }

    /// The symbols table as a map, `None` when the keyword is absent.
    pub fn symbol_map(&self) -> Option<std::collections::HashMap<&str, &str>> {
        self.symbols.as_ref().map(|symbols| {
            symbols
                .iter()
                .map(|s| (s.name.as_str(), s.revision.as_str()))
                .collect()
        })
    }

    /// The locks table as a user-to-revision map.
    pub fn locks_map(&self) -> Option<std::collections::HashMap<&str, &str>> {
        self.locks.as_ref().map(|locks| {
            locks
                .iter()
                .map(|l| (l.user.as_str(), l.revision.as_str()))
                .collect()
        })
    }

    /// Look a symbolic name up in the symbols table.
    pub fn resolve_symbol(&self, name: &str) -> Option<&str> {
        self.symbols
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.revision.as_str())
    }

    pub fn log_message(&self, revision: &str) -> Result<&str, ResolutionError> {
        self.revision_content(revision)
            .map(|c| c.log.as_str())
            .ok_or_else(|| ResolutionError::ContentNotFound(revision.to_string()))
    }

    pub fn set_log_message(&mut self, revision: &str, message: &str) -> Result<(), ResolutionError> {
        match self.revision_content_mut(revision) {
            Some(content) => {
                content.log = message.to_string();
                Ok(())
            }
            None => Err(ResolutionError::ContentNotFound(revision.to_string())),
        }
    }

    /// Every revision's log message, in file order.
    pub fn log_messages(&self) -> impl Iterator<Item = (&str, &str)> {
        self.contents
            .iter()
            .map(|c| (c.revision.as_str(), c.log.as_str()))
    }

    pub fn state(&self, revision: &str) -> Result<&str, ResolutionError> {
        self.revision_header(revision)
            .map(|h| h.state.as_str())
            .ok_or_else(|| ResolutionError::HeaderNotFound(revision.to_string()))
    }

    pub fn set_state(&mut self, revision: &str, state: &str) -> Result<(), ResolutionError> {
        match self.revision_header_mut(revision) {
            Some(header) => {
                header.state = state.to_string();
                Ok(())
            }
            None => Err(ResolutionError::HeaderNotFound(revision.to_string())),
        }
    }

    /// Every revision's state, in file order.
    pub fn states(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|h| (h.revision.as_str(), h.state.as_str()))
    }

    /// Set or move the user's lock.  Returns false when the identical
    /// lock already exists.
    pub fn set_lock(&mut self, user: &str, revision: &str) -> bool {
        let locks = self.locks.get_or_insert_with(Vec::new);
        for lock in locks.iter_mut() {
            if lock.user == user {
                if lock.revision == revision {
                    return false;
                }
                lock.revision = revision.to_string();
                return true;
            }
        }
        locks.push(Lock {
            user: user.to_string(),
            revision: revision.to_string(),
        });
        true
    }

    /// Remove the user's lock on exactly this revision.  Returns true
    /// when a lock was removed.
    pub fn clear_lock(&mut self, user: &str, revision: &str) -> bool {
        match &mut self.locks {
            Some(locks) => {
                let before = locks.len();
                locks.retain(|l| !(l.user == user && l.revision == revision));
                locks.len() != before
            }
            None => false,
        }
    }

    pub fn lock_for_user(&self, user: &str) -> Option<&str> {
        self.locks
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .find(|l| l.user == user)
            .map(|l| l.revision.as_str())
    }

    /// Add users to the access list, keeping it duplicate-free.
    pub fn add_access<'a>(&mut self, users: impl IntoIterator<Item = &'a str>) {
        let list = self.access.get_or_insert_with(Vec::new);
        for user in users {
            if !list.iter().any(|u| u == user) {
                list.push(user.to_string());
            }
        }
    }

    pub fn remove_access<'a>(&mut self, users: impl IntoIterator<Item = &'a str>) {
        let doomed: Vec<&str> = users.into_iter().collect();
        if let Some(list) = &mut self.access {
            list.retain(|u| !doomed.contains(&u.as_str()));
        }
    }

    pub fn remove_all_access(&mut self) {
        self.access = Some(Vec::new());
    }

    /// Check the parse-time invariant that headers and content blocks
    /// pair up one to one, in the same order.
    pub fn validate(&self) -> Result<(), ParseError> {
        for (index, pair) in self
            .headers
            .iter()
            .map(Some)
            .chain(std::iter::repeat(None))
            .zip(self.contents.iter().map(Some).chain(std::iter::repeat(None)))
            .take(self.headers.len().max(self.contents.len()))
            .enumerate()
        {
            match pair {
                (Some(header), Some(content)) => {
                    if header.revision != content.revision {
                        return Err(ParseError::MisalignedRevision {
                            index,
                            expected: header.revision.clone(),
                            found: content.revision.clone(),
                        });
                    }
                }
                (Some(header), None) => {
                    return Err(ParseError::MissingContent {
                        revision: header.revision.clone(),
                    })
                }
                (None, Some(content)) => {
                    return Err(ParseError::MissingHeader {
                        revision: content.revision.clone(),
                    })
                }
                (None, None) => unreachable!(),
            }
        }
        Ok(())
    }

    /// Forget every recorded formatting quirk so the next serialize
    /// emits canonical layout.
    pub fn reset_formatting(&mut self) {
        let newline = self.layout.newline;
        self.layout = ArchiveLayout {
            newline,
            ..ArchiveLayout::default()
        };
        for header in &mut self.headers {
            header.layout = HeaderLayout::default();
        }
        for content in &mut self.contents {
            content.layout = ContentLayout::default();
        }
    }

    /// Rewrite truncated years as full years and clear the truncation
    /// flags.
    pub fn normalize_dates(&mut self) {
        for header in &mut self.headers {
            if let Some(full) = date::expand_truncated(&header.date) {
                header.date = full;
            }
            header.layout.year_truncated = false;
        }
        self.layout.year_truncated = false;
    }

    /// Convert the structural line ending, rewriting the old ending
    /// inside every stored text as well.
    pub fn switch_line_ending(&mut self, newline: Newline) {
        let old = self.layout.newline;
        if old == newline {
            return;
        }
        self.layout.newline = newline;
        let (from, to) = (old.as_str(), newline.as_str());
        let swap = |s: &mut String| {
            if s.contains(from) {
                *s = s.replace(from, to);
            }
        };
        swap(&mut self.description);
        if let Some(comment) = &mut self.comment {
            swap(comment);
        }
        if let Some(integrity) = &mut self.integrity {
            swap(integrity);
        }
        if let Some(expand) = &mut self.expand {
            swap(expand);
        }
        swap(&mut self.layout.symbol_terminator_prefix);
        let swap_values = |values: &mut Vec<PhraseValue>| {
            for value in values.iter_mut() {
                let raw = value.raw().replace(from, to);
                *value = match value {
                    PhraseValue::Quoted(_) => PhraseValue::Quoted(raw),
                    PhraseValue::Bare(_) => PhraseValue::classify(&raw),
                };
            }
        };
        for header in &mut self.headers {
            swap_values(&mut header.owner);
            swap_values(&mut header.group);
            swap_values(&mut header.permissions);
            swap_values(&mut header.hardlinks);
            swap_values(&mut header.deltatype);
            swap_values(&mut header.kopt);
            swap_values(&mut header.mergepoint);
            swap_values(&mut header.filename);
            swap_values(&mut header.username);
            for phrase in &mut header.phrases {
                swap_values(&mut phrase.values);
            }
        }
        for content in &mut self.contents {
            swap(&mut content.log);
            swap(&mut content.text);
        }
    }

    /// Serialize honouring every recorded layout detail.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.render(&mut out);
        out
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.to_text().as_bytes())
    }

    fn render(&self, out: &mut String) {
        let l = &self.layout;
        let nl = l.newline.as_str();
        out.push_str("head");
        push_sep(out, l.head_sep_spaces);
        out.push_str(&self.head);
        out.push(';');
        out.push_str(nl);
        if let Some(branch) = &self.branch {
            out.push_str("branch");
            push_sep(out, l.branch_sep_spaces);
            out.push_str(branch);
            out.push(';');
            out.push_str(nl);
        }
        if let Some(users) = &self.access {
            out.push_str("access");
            if users.is_empty() {
                push_spaces(out, l.access_sep_spaces);
            } else {
                for user in users {
                    out.push(' ');
                    out.push_str(user);
                }
            }
            out.push(';');
            out.push_str(nl);
        }
        if let Some(symbols) = &self.symbols {
            out.push_str("symbols");
            if symbols.is_empty() {
                push_spaces(out, l.symbols_sep_spaces);
            } else if l.symbols_inline {
                for (i, symbol) in symbols.iter().enumerate() {
                    let spaces = if i == 0 {
                        l.symbols_first_spaces
                    } else {
                        l.symbols_between_spaces
                    };
                    push_spaces(out, spaces.max(1));
                    out.push_str(&symbol.name);
                    out.push(':');
                    out.push_str(&symbol.revision);
                }
            } else {
                for symbol in symbols {
                    out.push_str(nl);
                    out.push('\t');
                    out.push_str(&symbol.name);
                    out.push(':');
                    out.push_str(&symbol.revision);
                }
            }
            out.push_str(&l.symbol_terminator_prefix);
            out.push(';');
            out.push_str(nl);
        }
        if let Some(locks) = &self.locks {
            out.push_str("locks");
            if locks.is_empty() {
                push_spaces(out, l.locks_sep_spaces);
            } else {
                for lock in locks {
                    out.push_str(nl);
                    out.push('\t');
                    out.push_str(&lock.user);
                    out.push(':');
                    out.push_str(&lock.revision);
                }
            }
            out.push(';');
            if self.strict && !l.strict_own_line {
                out.push_str(" strict;");
            }
            out.push_str(nl);
        }
        if self.strict && (l.strict_own_line || self.locks.is_none()) {
            out.push_str("strict;");
            out.push_str(nl);
        }
        if let Some(integrity) = &self.integrity {
            out.push_str("integrity");
            push_sep(out, l.integrity_sep_spaces);
            push_quoted(out, integrity);
            out.push(';');
            out.push_str(nl);
        }
        if let Some(comment) = &self.comment {
            out.push_str("comment");
            push_sep(out, l.comment_sep_spaces);
            push_quoted(out, comment);
            out.push(';');
            out.push_str(nl);
        }
        if let Some(expand) = &self.expand {
            out.push_str("expand");
            push_sep(out, l.expand_sep_spaces);
            push_quoted(out, expand);
            out.push(';');
            out.push_str(nl);
        }
        push_newlines(out, nl, 2 + l.revision_start_offset);
        for (i, header) in self.headers.iter().enumerate() {
            if i > 0 {
                push_newlines(out, nl, 1 + header.layout.preceding_newlines_offset);
            }
            header.render(out, nl);
        }
        if !self.headers.is_empty() {
            push_newlines(out, nl, 2 + l.desc_newline_offset);
        }
        out.push_str("desc");
        out.push_str(nl);
        push_quoted(out, &self.description);
        out.push_str(nl);
        for content in &self.contents {
            content.render(out, nl);
        }
        if l.eof_newline_offset >= 0 {
            push_newlines(out, nl, l.eof_newline_offset);
        } else if out.ends_with(nl) {
            out.truncate(out.len() - nl.len());
        }
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Separator between a keyword and its value: N spaces, or the
/// canonical tab when zero.
fn push_sep(out: &mut String, spaces: usize) {
    if spaces == 0 {
        out.push('\t');
    } else {
        for _ in 0..spaces {
            out.push(' ');
        }
    }
}

fn push_spaces(out: &mut String, spaces: usize) {
    for _ in 0..spaces {
        out.push(' ');
    }
}

fn push_newlines(out: &mut String, nl: &str, count: i32) {
    for _ in 0..count.max(0) {
        out.push_str(nl);
    }
}

/// `@`-quote a string, doubling every `@` inside it.
pub(crate) fn push_quoted(out: &mut String, text: &str) {
    out.push('@');
    let mut start = 0;
    while let Some(found) = text[start..].find('@') {
        let through = start + found + 1;
        out.push_str(&text[start..through]);
        out.push('@');
        start = through;
    }
    out.push_str(&text[start..]);
    out.push('@');
}
