//! The archive grammar parser.
//!
//! One forward pass over the text.  Keyword lines are dispatched by
//! scanning an identifier and matching on it, so the scanner never
//! has to back out of a half-matched literal.  Alongside the semantic
//! fields the parser records the formatting details the serializer
//! needs for a byte-exact round trip: separator widths, inline versus
//! multiline list shapes, and blank-line counts as offsets from the
//! canonical layout.

use log::{debug, trace};

use crate::date;
use crate::errors::{ParseError, ScanError};
use crate::model::{
    is_id_char, is_num_char, Archive, Lock, Newline, Phrase, PhraseValue, RevisionContent,
    RevisionHeader, Symbol,
};
use crate::scanner::Scanner;

/// Runs of five or more blank lines are rejected rather than folded
/// into an offset.
pub const MAX_BLANK_LINES: usize = 4;

const ADMIN_KEYWORDS: &[&str] = &[
    "branch",
    "access",
    "symbols",
    "locks",
    "strict",
    "integrity",
    "comment",
    "expand",
];

const NEWLINES: &[&str] = &["\r\n", "\n"];

/// Parse a complete `,v` archive.
pub fn parse(input: &[u8]) -> Result<Archive, ParseError> {
    let text = std::str::from_utf8(input).map_err(|e| ParseError::InvalidUtf8 {
        offset: e.valid_up_to(),
    })?;
    parse_str(text)
}

pub fn parse_str(text: &str) -> Result<Archive, ParseError> {
    Parser {
        s: Scanner::new(text),
    }
    .archive(text)
}

struct Parser<'a> {
    s: Scanner<'a>,
}

impl<'a> Parser<'a> {
    fn archive(&mut self, text: &str) -> Result<Archive, ParseError> {
        let mut archive = Archive::new();
        archive.symbols = None;
        archive.locks = None;
        archive.strict = false;
        archive.layout.newline = detect_newline(text);

        self.s.expect_literals(&["head"])?;
        let ws = self.inline_ws(1).map_err(ParseError::in_field("head"))?;
        archive.layout.head_sep_spaces = sep_spaces(ws);
        archive.head = self.num(0)?.to_string();
        self.s.expect_literals(&[";"])?;
        self.newline()?;
        trace!("head is {:?}", archive.head);

        // Admin fields run until the first blank line.
        let mut gap = loop {
            let run = self.blank_lines()?;
            if run > 0 || self.s.is_eof() {
                break run;
            }
            let pos = self.s.pos();
            let keyword = self.id()?;
            match keyword {
                "branch" => self
                    .admin_branch(&mut archive)
                    .map_err(ParseError::in_field("branch"))?,
                "access" => self
                    .admin_access(&mut archive)
                    .map_err(ParseError::in_field("access"))?,
                "symbols" => self
                    .admin_symbols(&mut archive)
                    .map_err(ParseError::in_field("symbols"))?,
                "locks" => self
                    .admin_locks(&mut archive)
                    .map_err(ParseError::in_field("locks"))?,
                "strict" => {
                    self.s.expect_literals(&[";"])?;
                    self.newline()?;
                    archive.strict = true;
                    archive.layout.strict_own_line = true;
                }
                "integrity" => self
                    .admin_integrity(&mut archive)
                    .map_err(ParseError::in_field("integrity"))?,
                "comment" => self
                    .admin_comment(&mut archive)
                    .map_err(ParseError::in_field("comment"))?,
                "expand" => self
                    .admin_expand(&mut archive)
                    .map_err(ParseError::in_field("expand"))?,
                other => {
                    return Err(ParseError::UnknownKeyword {
                        keyword: other.to_string(),
                        pos,
                        expected: ADMIN_KEYWORDS,
                    })
                }
            }
        };

        // Revision headers until the desc keyword.
        loop {
            if self.s.try_literals(&["desc"]).is_some() {
                self.newline().map_err(ParseError::in_field("desc"))?;
                let offset = gap as i32 - 2;
                if archive.headers.is_empty() {
                    archive.layout.revision_start_offset = offset;
                } else {
                    archive.layout.desc_newline_offset = offset;
                }
                break;
            }
            let first = archive.headers.is_empty();
            if first {
                archive.layout.revision_start_offset = gap as i32 - 2;
            }
            let mut header = self.revision_header()?;
            if !first {
                header.layout.preceding_newlines_offset = gap as i32 - 1;
            }
            trace!("parsed header for {:?}", header.revision);
            archive.headers.push(header);
            gap = self.blank_lines()?;
        }

        archive.description = self.quoted().map_err(ParseError::in_field("desc"))?;
        let mut line_ended = self.newline_or_eof()?;

        // Content blocks to end of file.
        loop {
            if !line_ended {
                archive.layout.eof_newline_offset = -1;
                break;
            }
            let run = self.blank_lines()?;
            if self.s.is_eof() {
                archive.layout.eof_newline_offset = run as i32;
                break;
            }
            let (content, ended) = self.revision_content(run)?;
            trace!("parsed content for {:?}", content.revision);
            line_ended = ended;
            archive.contents.push(content);
        }

        archive.layout.year_truncated = archive.headers.iter().any(|h| h.layout.year_truncated);
        archive.validate()?;
        debug!(
            "parsed archive: head {:?}, {} revision(s)",
            archive.head,
            archive.headers.len()
        );
        Ok(archive)
    }

    fn admin_branch(&mut self, archive: &mut Archive) -> Result<(), ParseError> {
        let ws = self.inline_ws(1)?;
        archive.layout.branch_sep_spaces = sep_spaces(ws);
        archive.branch = Some(self.num(0)?.to_string());
        self.s.expect_literals(&[";"])?;
        self.newline()
    }

    fn admin_access(&mut self, archive: &mut Archive) -> Result<(), ParseError> {
        let mut users = Vec::new();
        loop {
            let ws = self.any_ws()?;
            if self.s.try_literals(&[";"]).is_some() {
                if users.is_empty() {
                    archive.layout.access_sep_spaces = sep_spaces(ws);
                }
                break;
            }
            users.push(self.id()?.to_string());
        }
        archive.access = Some(users);
        self.newline()
    }

    fn admin_symbols(&mut self, archive: &mut Archive) -> Result<(), ParseError> {
        let mut symbols = Vec::new();
        let layout = &mut archive.layout;
        loop {
            let ws = self.any_ws()?;
            if self.s.try_literals(&[";"]).is_some() {
                if symbols.is_empty() {
                    layout.symbols_sep_spaces = sep_spaces(ws);
                } else if !ws.is_empty() {
                    layout.symbol_terminator_prefix = ws.to_string();
                }
                break;
            }
            if symbols.is_empty() {
                layout.symbols_inline = !ws.contains('\n');
                if layout.symbols_inline {
                    layout.symbols_first_spaces = sep_spaces(ws);
                }
            } else if layout.symbols_inline {
                layout.symbols_between_spaces = sep_spaces(ws);
            }
            let name = self.sym()?.to_string();
            self.s.expect_literals(&[":"])?;
            let revision = self.num(1)?.to_string();
            symbols.push(Symbol { name, revision });
        }
        archive.symbols = Some(symbols);
        self.newline()
    }

    fn admin_locks(&mut self, archive: &mut Archive) -> Result<(), ParseError> {
        let mut locks = Vec::new();
        loop {
            let ws = self.any_ws()?;
            if self.s.try_literals(&[";"]).is_some() {
                if locks.is_empty() {
                    archive.layout.locks_sep_spaces = sep_spaces(ws);
                }
                break;
            }
            let user = self.id()?.to_string();
            self.s.expect_literals(&[":"])?;
            let revision = self.num(1)?.to_string();
            locks.push(Lock { user, revision });
        }
        archive.locks = Some(locks);
        // strict may share the locks line.
        self.inline_ws(0)?;
        if self.s.try_literals(&["strict"]).is_some() {
            self.s.expect_literals(&[";"])?;
            archive.strict = true;
            archive.layout.strict_own_line = false;
        }
        self.newline()
    }

    fn admin_integrity(&mut self, archive: &mut Archive) -> Result<(), ParseError> {
        let ws = self.inline_ws(0)?;
        archive.layout.integrity_sep_spaces = sep_spaces(ws);
        let pos = self.s.pos();
        if !self.s.rest().starts_with('@') {
            return Err(ParseError::UnquotedIntegrity { pos });
        }
        archive.integrity = Some(self.quoted()?);
        self.s.expect_literals(&[";"])?;
        self.newline()
    }

    fn admin_comment(&mut self, archive: &mut Archive) -> Result<(), ParseError> {
        let ws = self.inline_ws(1)?;
        archive.layout.comment_sep_spaces = sep_spaces(ws);
        archive.comment = Some(self.quoted()?);
        self.s.expect_literals(&[";"])?;
        self.newline()
    }

    fn admin_expand(&mut self, archive: &mut Archive) -> Result<(), ParseError> {
        let ws = self.inline_ws(1)?;
        archive.layout.expand_sep_spaces = sep_spaces(ws);
        archive.expand = Some(if self.s.rest().starts_with('@') {
            self.quoted()?
        } else {
            self.id()?.to_string()
        });
        self.s.expect_literals(&[";"])?;
        self.newline()
    }

    fn revision_header(&mut self) -> Result<RevisionHeader, ParseError> {
        let revision = self.num(1)?.to_string();
        self.newline()?;
        let mut header = RevisionHeader {
            revision,
            ..RevisionHeader::default()
        };
        loop {
            if self.s.is_eof() || self.s.rest().starts_with('\n') || self.s.rest().starts_with("\r\n")
            {
                break;
            }
            let key = self.id()?;
            match key {
                "date" => self
                    .header_date(&mut header)
                    .map_err(ParseError::in_field("date"))?,
                "branches" => self
                    .header_branches(&mut header)
                    .map_err(ParseError::in_field("branches"))?,
                "next" => self
                    .header_next(&mut header)
                    .map_err(ParseError::in_field("next"))?,
                "commitid" => self
                    .header_commitid(&mut header)
                    .map_err(ParseError::in_field("commitid"))?,
                other => {
                    let values = self.phrase_values()?;
                    match header.known_phrase_mut(other) {
                        Some(slot) => *slot = values,
                        None => header.phrases.push(Phrase {
                            key: other.to_string(),
                            values,
                        }),
                    }
                }
            }
        }
        Ok(header)
    }

    fn header_date(&mut self, header: &mut RevisionHeader) -> Result<(), ParseError> {
        let ws = self.inline_ws(1)?;
        header.layout.date_sep_spaces = sep_spaces(ws);
        header.date = self.num(1)?.to_string();
        header.layout.year_truncated = date::is_truncated_year(&header.date);
        self.s.expect_literals(&[";"])?;
        let ws = self.inline_ws(1)?;
        header.layout.date_author_spaces = sep_spaces(ws);
        self.s.expect_literals(&["author"])?;
        self.inline_ws(1)?;
        header.author = self.s.scan_until_literals(&[";"])?.to_string();
        self.s.expect_literals(&[";"])?;
        let ws = self.inline_ws(1)?;
        header.layout.author_state_spaces = sep_spaces(ws);
        self.s.expect_literals(&["state"])?;
        self.inline_ws(1)?;
        header.state = self.s.scan_until_literals(&[";"])?.to_string();
        self.s.expect_literals(&[";"])?;
        self.newline()
    }

    fn header_branches(&mut self, header: &mut RevisionHeader) -> Result<(), ParseError> {
        loop {
            let ws = self.any_ws()?;
            if self.s.try_literals(&[";"]).is_some() {
                break;
            }
            if header.branches.is_empty() {
                header.layout.branches_sep_spaces = sep_spaces(ws);
            }
            header.branches.push(self.num(1)?.to_string());
        }
        self.newline()
    }

    fn header_next(&mut self, header: &mut RevisionHeader) -> Result<(), ParseError> {
        let ws = self.inline_ws(1)?;
        header.layout.next_sep_spaces = sep_spaces(ws);
        header.next = self.num(0)?.to_string();
        self.s.expect_literals(&[";"])?;
        self.newline()
    }

    fn header_commitid(&mut self, header: &mut RevisionHeader) -> Result<(), ParseError> {
        let ws = self.inline_ws(1)?;
        header.layout.commitid_sep_spaces = sep_spaces(ws);
        header.commit_id = Some(self.sym()?.to_string());
        self.s.expect_literals(&[";"])?;
        self.newline()
    }

    /// The value list of a new phrase: words, nums, `:`, or quoted
    /// strings, up to the closing `;`.
    fn phrase_values(&mut self) -> Result<Vec<PhraseValue>, ParseError> {
        let mut values = Vec::new();
        loop {
            self.any_ws()?;
            if self.s.try_literals(&[";"]).is_some() {
                break;
            }
            if self.s.rest().starts_with('@') {
                values.push(PhraseValue::Quoted(self.quoted()?));
            } else if self.s.try_literals(&[":"]).is_some() {
                values.push(PhraseValue::Bare(":".to_string()));
            } else {
                values.push(PhraseValue::Bare(self.id()?.to_string()));
            }
        }
        self.newline()?;
        Ok(values)
    }

    /// One log/text block.  Returns the content and whether the
    /// closing quote was followed by a newline (false only at the very
    /// end of a file with no trailing newline).
    fn revision_content(&mut self, preceding: usize) -> Result<(RevisionContent, bool), ParseError> {
        let mut content = RevisionContent::default();
        content.layout.preceding_newlines_offset = preceding as i32 - 2;
        content.revision = self.num(1)?.to_string();
        self.newline()?;
        self.s.expect_literals(&["log"])?;
        self.newline()?;
        content.log = self.quoted().map_err(ParseError::in_field("log"))?;
        self.newline()?;
        self.s.expect_literals(&["text"])?;
        self.newline()?;
        content.text = self.quoted().map_err(ParseError::in_field("text"))?;
        let ended = self.newline_or_eof()?;
        Ok((content, ended))
    }

    /// An `@`-quoted string with `@@` collapsed to `@`.
    fn quoted(&mut self) -> Result<String, ParseError> {
        self.s.expect_literals(&["@"])?;
        let mut body = String::new();
        loop {
            body.push_str(self.s.scan_until_literals(&["@"])?);
            if self.s.expect_literals(&["@@", "@"])? == "@@" {
                body.push('@');
            } else {
                return Ok(body);
            }
        }
    }

    fn newline(&mut self) -> Result<(), ParseError> {
        self.s.expect_literals(NEWLINES)?;
        Ok(())
    }

    /// Accept a newline, or end of input (returning false).
    fn newline_or_eof(&mut self) -> Result<bool, ParseError> {
        Ok(!self.s.expect_literals(&["\r\n", "\n", ""])?.is_empty())
    }

    /// Consume a run of blank lines, rejecting runs longer than
    /// [`MAX_BLANK_LINES`].
    fn blank_lines(&mut self) -> Result<usize, ParseError> {
        let pos = self.s.pos();
        let mut count = 0;
        while self.s.try_literals(NEWLINES).is_some() {
            count += 1;
        }
        if count > MAX_BLANK_LINES {
            return Err(ParseError::TooManyBlankLines {
                count,
                pos,
                limit: MAX_BLANK_LINES,
            });
        }
        Ok(count)
    }

    fn inline_ws(&mut self, min: usize) -> Result<&'a str, ParseError> {
        Ok(self
            .s
            .scan_while("whitespace", min, |c| c == ' ' || c == '\t')?)
    }

    /// Whitespace including line breaks, for list fields that may wrap.
    fn any_ws(&mut self) -> Result<&'a str, ParseError> {
        Ok(self.s.scan_while("whitespace", 0, |c| {
            c == ' ' || c == '\t' || c == '\r' || c == '\n'
        })?)
    }

    fn num(&mut self, min: usize) -> Result<&'a str, ParseError> {
        Ok(self.s.scan_while("num", min, is_num_char)?)
    }

    fn id(&mut self) -> Result<&'a str, ParseError> {
        Ok(self.s.scan_while("id", 1, |c| is_id_char(c) || c == '.')?)
    }

    /// Symbol names: identifier characters without dots.
    fn sym(&mut self) -> Result<&'a str, ParseError> {
        Ok(self.s.scan_while("sym", 1, is_id_char)?)
    }
}

fn detect_newline(text: &str) -> Newline {
    match text.find('\n') {
        Some(at) if at > 0 && text.as_bytes()[at - 1] == b'\r' => Newline::CrLf,
        _ => Newline::Lf,
    }
}

/// Width of a separator when it is representable as plain spaces;
/// zero stands for the canonical tab.
fn sep_spaces(ws: &str) -> usize {
    if !ws.is_empty() && ws.bytes().all(|b| b == b' ') {
        ws.len()
    } else {
        0
    }
}
