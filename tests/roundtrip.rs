//! Parse/serialize round trips over realistic archives.

use rcsfile::{parse_str, Newline};

/// A file as a conforming writer produces it: tab separators,
/// multiline symbols, inline strict, two blank lines before the first
/// revision header and before desc.
const CANONICAL: &str = "\
head\t1.3;
access;
symbols
\trelease-1:1.2
\tstart:1.1;
locks
\talice:1.3; strict;
comment\t@# @;


1.3
date\t2024.03.01.10.20.30;\tauthor alice;\tstate Exp;
branches;
next\t1.2;

1.2
date\t2024.02.01.10.20.30;\tauthor alice;\tstate Exp;
branches
\t1.2.1.1;
next\t1.1;

1.2.1.1
date\t2024.02.15.10.20.30;\tauthor bob;\tstate Exp;
branches;
next\t;

1.1
date\t2024.01.01.10.20.30;\tauthor bob;\tstate Exp;
branches;
next\t;


desc
@An example project file.
@


1.3
log
@third change@
text
@alpha
beta
gamma
@


1.2
log
@second change@
text
@d3 1
@


1.2.1.1
log
@branch fix@
text
@a2 1
beta-fix
@


1.1
log
@Initial revision@
text
@d1 1
a1 1
alpha-old
@
";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn canonical_archive_is_byte_stable() {
    init_logging();
    let archive = parse_str(CANONICAL).unwrap();
    assert_eq!(archive.to_text(), CANONICAL);
}

#[test]
fn crlf_archive_is_byte_stable() {
    init_logging();
    let text = CANONICAL.replace('\n', "\r\n");
    let archive = parse_str(&text).unwrap();
    assert_eq!(archive.layout.newline, Newline::CrLf);
    assert_eq!(archive.to_text(), text);
}

#[test]
fn space_separators_round_trip() {
    init_logging();
    let text = CANONICAL
        .replace("head\t1.3;", "head  1.3;")
        .replace("comment\t@# @;", "comment @# @;");
    let archive = parse_str(&text).unwrap();
    assert_eq!(archive.layout.head_sep_spaces, 2);
    assert_eq!(archive.layout.comment_sep_spaces, 1);
    assert_eq!(archive.to_text(), text);
}

#[test]
fn inline_symbols_round_trip() {
    init_logging();
    let text = CANONICAL.replace(
        "symbols\n\trelease-1:1.2\n\tstart:1.1;",
        "symbols release-1:1.2 start:1.1;",
    );
    let archive = parse_str(&text).unwrap();
    assert_eq!(archive.to_text(), text);
}

#[test]
fn strict_on_own_line_round_trips() {
    init_logging();
    let text = CANONICAL.replace("\talice:1.3; strict;", "\talice:1.3;\nstrict;");
    let archive = parse_str(&text).unwrap();
    assert_eq!(archive.to_text(), text);
}

#[test]
fn extra_blank_lines_round_trip() {
    init_logging();
    // Three blank lines before desc instead of the canonical two.
    let text = CANONICAL.replace("next\t;\n\n\ndesc", "next\t;\n\n\n\ndesc");
    let archive = parse_str(&text).unwrap();
    assert_eq!(archive.layout.desc_newline_offset, 1);
    assert_eq!(archive.to_text(), text);
}

#[test]
fn integrity_and_commitid_separators_round_trip() {
    init_logging();
    let text = CANONICAL
        .replace("comment\t@# @;", "integrity @abc123@;\ncomment\t@# @;")
        .replace("next\t1.2;\n", "next\t1.2;\ncommitid f00dface;\n");
    let archive = parse_str(&text).unwrap();
    assert_eq!(archive.layout.integrity_sep_spaces, 1);
    assert_eq!(archive.headers[0].layout.commitid_sep_spaces, 1);
    assert_eq!(archive.to_text(), text);
}

#[test]
fn extra_blank_line_between_headers_round_trips() {
    init_logging();
    let text = CANONICAL.replace("next\t1.2;\n\n1.2\n", "next\t1.2;\n\n\n1.2\n");
    let archive = parse_str(&text).unwrap();
    assert_eq!(archive.headers[1].layout.preceding_newlines_offset, 1);
    assert_eq!(archive.to_text(), text);
}

#[test]
fn missing_trailing_newline_round_trips() {
    init_logging();
    let text = CANONICAL.trim_end_matches('\n');
    let archive = parse_str(text).unwrap();
    assert_eq!(archive.layout.eof_newline_offset, -1);
    assert_eq!(archive.to_text(), text);
}

#[test]
fn cvsnt_phrases_round_trip() {
    init_logging();
    let text = CANONICAL.replace(
        "next\t1.2;\n",
        "next\t1.2;\ncommitid\tf00dfaceb00c;\nowner\t@alice@;\npermissions\t644;\nmergepoint\t1.1;\ncustomkey\tval1 @val 2@;\n",
    );
    let archive = parse_str(&text).unwrap();
    assert_eq!(archive.to_text(), text);
}

#[test]
fn truncated_years_survive_unchanged() {
    init_logging();
    let text = CANONICAL.replace(
        "date\t2024.01.01.10.20.30;",
        "date\t99.01.01.10.20.30;",
    );
    let archive = parse_str(&text).unwrap();
    assert!(archive.layout.year_truncated);
    assert_eq!(archive.to_text(), text);
}

#[test]
fn normalize_dates_expands_years() {
    init_logging();
    let text = CANONICAL.replace(
        "date\t2024.01.01.10.20.30;",
        "date\t99.01.01.10.20.30;",
    );
    let mut archive = parse_str(&text).unwrap();
    archive.normalize_dates();
    assert!(!archive.layout.year_truncated);
    assert_eq!(archive.to_text(), CANONICAL.replace(
        "date\t2024.01.01.10.20.30;",
        "date\t1999.01.01.10.20.30;",
    ));
}

#[test]
fn reset_formatting_emits_canonical_layout() {
    init_logging();
    let text = CANONICAL
        .replace("head\t1.3;", "head    1.3;")
        .replace("next\t;\n\n\ndesc", "next\t;\n\n\n\ndesc");
    let mut archive = parse_str(&text).unwrap();
    archive.reset_formatting();
    assert_eq!(archive.to_text(), CANONICAL);
}

#[test]
fn reparse_equals_original_structure() {
    init_logging();
    let archive = parse_str(CANONICAL).unwrap();
    let reparsed = parse_str(&archive.to_text()).unwrap();
    assert_eq!(archive, reparsed);
}

#[test]
fn switched_line_endings_round_trip_both_ways() {
    init_logging();
    let mut archive = parse_str(CANONICAL).unwrap();
    archive.switch_line_ending(Newline::CrLf);
    let crlf = archive.to_text();
    assert_eq!(crlf, CANONICAL.replace('\n', "\r\n"));
    archive.switch_line_ending(Newline::Lf);
    assert_eq!(archive.to_text(), CANONICAL);
}
