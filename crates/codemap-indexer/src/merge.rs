//! Splicing the generated section into an existing markdown document.
//!
//! The generated section starts at a marker heading and runs up to the next
//! heading of equal or higher rank. Everything else in the document belongs
//! to the user and is carried over untouched, apart from blank-line
//! normalization around the section and a one-time advisory notice under
//! the document title. Headings inside fenced code blocks are never
//! considered.

use crate::render::INDEX_HEADING;

/// Marker written by earlier releases. Recognized once and replaced with
/// [`INDEX_HEADING`] on the next regeneration.
pub const LEGACY_INDEX_HEADING: &str = "# Current Code Index";

/// Advisory line inserted below the document title.
pub const NOTICE: &str =
    "> **Note:** The `Code Index` section of this file is generated by codemap and rewritten whenever the project changes. Edit anything outside that section freely.";

/// Merge `rendered` into `existing`, replacing a previous generated section
/// in place or appending a new one. The result ends with a single newline,
/// and `merge(&merge(d, r), r) == merge(d, r)`.
pub fn merge(existing: &str, rendered: &str) -> String {
    let lines: Vec<&str> = existing.lines().collect();

    let (before, after) = match find_section(&lines) {
        Some((start, end)) => (&lines[..start], &lines[end..]),
        None => (&lines[..], &lines[lines.len()..]),
    };

    let mut before = trim_blank_lines(before).to_vec();
    let after = trim_blank_lines(after);

    if !existing.contains(NOTICE) {
        insert_notice(&mut before);
    }

    let mut out: Vec<&str> = Vec::new();
    if !before.is_empty() {
        out.extend(before.iter().copied());
        out.push("");
    }
    out.extend(rendered.trim_end().lines());
    if !after.is_empty() {
        out.push("");
        out.extend(after.iter().copied());
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

/// Whether `document` contains a generated section in either spelling.
pub fn has_generated_section(document: &str) -> bool {
    let lines: Vec<&str> = document.lines().collect();
    find_section(&lines).is_some()
}

/// A heading outside any code fence: (line index, rank, text).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Heading<'a> {
    line: usize,
    rank: usize,
    text: &'a str,
}

/// Headings found from line `from` onward, and whether the scan ended
/// inside an unclosed fence.
fn scan_headings<'a>(lines: &[&'a str], from: usize) -> (Vec<Heading<'a>>, bool) {
    let mut in_fence = false;
    let mut headings = Vec::new();

    for (i, line) in lines.iter().enumerate().skip(from) {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(rank) = heading_rank(line) {
            headings.push(Heading {
                line: i,
                rank,
                text: line.trim_end(),
            });
        }
    }

    (headings, in_fence)
}

/// Rank of an ATX heading (`#` = 1 through `######` = 6).
fn heading_rank(line: &str) -> Option<usize> {
    let rank = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&rank) {
        return None;
    }
    match line[rank..].chars().next() {
        None | Some(' ') | Some('\t') => Some(rank),
        _ => None,
    }
}

fn is_marker(heading: &Heading) -> bool {
    heading.text == INDEX_HEADING || heading.text == LEGACY_INDEX_HEADING
}

/// Line span `[start, end)` of the first generated section.
///
/// A fence left open in user content hides everything after it, including
/// a section appended below it. In that case the last marker line counts.
fn find_section(lines: &[&str]) -> Option<(usize, usize)> {
    let (headings, unclosed) = scan_headings(lines, 0);
    if let Some(marker) = headings.iter().find(|h| is_marker(h)) {
        return Some((marker.line, section_end(&headings, marker, lines.len())));
    }
    if !unclosed {
        return None;
    }

    let start = lines
        .iter()
        .rposition(|l| l.trim_end() == INDEX_HEADING || l.trim_end() == LEGACY_INDEX_HEADING)?;
    let (headings, _) = scan_headings(lines, start);
    let marker = headings.first().filter(|h| h.line == start)?;
    Some((start, section_end(&headings, marker, lines.len())))
}

fn section_end(headings: &[Heading], marker: &Heading, line_count: usize) -> usize {
    headings
        .iter()
        .filter(|h| h.line > marker.line)
        .find(|h| h.rank <= marker.rank)
        .map(|h| h.line)
        .unwrap_or(line_count)
}

fn trim_blank_lines<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(start);
    &lines[start..end.max(start)]
}

/// Put [`NOTICE`] under the first top-level title, if there is one.
fn insert_notice(lines: &mut Vec<&str>) {
    let Some(title) = scan_headings(lines, 0).0.into_iter().find(|h| h.rank == 1) else {
        return;
    };

    let rest_start = lines[title.line + 1..]
        .iter()
        .position(|l| !l.trim().is_empty())
        .map(|i| title.line + 1 + i);

    let mut notice = vec!["", NOTICE];
    match rest_start {
        Some(start) => {
            notice.push("");
            lines.splice(title.line + 1..start, notice);
        }
        None => {
            lines.truncate(title.line + 1);
            lines.extend(notice);
        }
    }
}
