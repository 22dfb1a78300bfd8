//! Minimal structural model of the generated HTML skeleton.
//!
//! The skeleton is a sequence of `<div>` sections, each `<h2>heading</h2>`
//! followed by a `<table><tbody>…</tbody></table>` whose rows are two-cell
//! (English, Spanish) pairs. Only the known sections' `<tbody>` contents are
//! modeled; everything else is preserved byte-for-byte on serialization, so
//! the model never disturbs the skeleton the front-end expects back.

use std::fmt::Write as _;
use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::vocab::sections::SectionKind;

lazy_static! {
    static ref TBODY_RE: Regex = Regex::new(r"(?is)<tbody[^>]*>(.*?)</tbody>").unwrap();
    static ref ROW_RE: Regex = Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").unwrap();
    static ref CELL_RE: Regex = Regex::new(r"(?is)<td[^>]*>(.*?)</td>").unwrap();

    /// One locator regex per known section: heading through the end of the
    /// enclosing section `</div>`.
    static ref SECTION_RES: Vec<(SectionKind, Regex)> = SectionKind::ALL
        .into_iter()
        .map(|kind| {
            let pattern = format!(
                r"(?is)<h2>\s*{}\s*</h2>(.*?)</div>",
                kind.heading_pattern()
            );
            (kind, Regex::new(&pattern).unwrap())
        })
        .collect();
}

/// One `<tr>` — each element of `cells` is the inner HTML of a `<td>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<String>,
}

impl TableRow {
    pub fn pair(english: impl Into<String>, spanish: impl Into<String>) -> Self {
        TableRow {
            cells: vec![english.into(), spanish.into()],
        }
    }
}

/// A located section: its kind, the absolute span of its `<tbody>` inner HTML
/// in the source document, and the parsed rows.
#[derive(Debug, Clone)]
pub struct SectionBlock {
    pub kind: SectionKind,
    tbody: Range<usize>,
    pub rows: Vec<TableRow>,
}

/// Parsed document. Sections the skeleton does not contain are simply absent.
#[derive(Debug, Clone)]
pub struct Document {
    html: String,
    sections: Vec<SectionBlock>,
}

impl Document {
    pub fn parse(html: &str) -> Document {
        let mut sections: Vec<SectionBlock> = SECTION_RES
            .iter()
            .filter_map(|(kind, re)| {
                let body = re.captures(html)?.get(1)?;
                let tbody = TBODY_RE.captures(&html[body.range()])?.get(1)?;
                let start = body.start() + tbody.start();
                let tbody_range = start..start + tbody.len();
                let rows = parse_rows(&html[tbody_range.clone()]);
                Some(SectionBlock {
                    kind: *kind,
                    tbody: tbody_range,
                    rows,
                })
            })
            .collect();
        sections.sort_by_key(|s| s.tbody.start);

        Document {
            html: html.to_string(),
            sections,
        }
    }

    pub fn section(&self, kind: SectionKind) -> Option<&SectionBlock> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn section_mut(&mut self, kind: SectionKind) -> Option<&mut SectionBlock> {
        self.sections.iter_mut().find(|s| s.kind == kind)
    }

    /// Rebuilds the document, splicing each modeled section's rows back into
    /// its `<tbody>` and leaving all surrounding markup untouched. Row markup
    /// is canonicalized, which is what makes repeated parse/serialize cycles
    /// stable.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.html.len());
        let mut cursor = 0usize;
        for block in &self.sections {
            out.push_str(&self.html[cursor..block.tbody.start]);
            out.push_str(&render_rows(&block.rows));
            cursor = block.tbody.end;
        }
        out.push_str(&self.html[cursor..]);
        out
    }
}

fn parse_rows(tbody_inner: &str) -> Vec<TableRow> {
    ROW_RE
        .captures_iter(tbody_inner)
        .map(|row| {
            let cells = CELL_RE
                .captures_iter(&row[1])
                .map(|cell| cell[1].trim().to_string())
                .collect();
            TableRow { cells }
        })
        .collect()
}

fn render_rows(rows: &[TableRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for row in rows {
        out.push_str("\n<tr>");
        for cell in &row.cells {
            let _ = write!(out, "<td>{cell}</td>");
        }
        out.push_str("</tr>");
    }
    out.push('\n');
    out
}

#[cfg(test)]
pub(crate) fn section_html(heading: &str, rows: &str) -> String {
    format!("<div class=\"section\"><h2>{heading}</h2><table><tbody>{rows}</tbody></table></div>")
}
