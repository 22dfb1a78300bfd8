//! Compliance verification — recounts the normalized document against the
//! quota plan and reports every deviation.

use std::fmt;

use crate::vocab::document::Document;
use crate::vocab::normalize::emphasis_spans;
use crate::vocab::quota::QuotaPlan;
use crate::vocab::sections::{SectionKind, SelectionMask};

/// One contract deviation, phrased so it can be handed to the repair prompt
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A main category's emphasized-term count differs from its quota.
    SpanCount {
        section: SectionKind,
        expected: u32,
        found: u32,
    },
    /// A phrases/questions row count falls outside its bounds.
    RowCount {
        section: SectionKind,
        min: u32,
        max: u32,
        found: u32,
    },
    /// A selected section is missing from the document entirely.
    MissingSection { section: SectionKind },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::SpanCount {
                section,
                expected,
                found,
            } => write!(
                f,
                "{}: expected exactly {expected} highlighted terms, found {found}",
                section.heading()
            ),
            Violation::RowCount {
                section,
                min,
                max,
                found,
            } => write!(
                f,
                "{}: expected between {min} and {max} rows, found {found}",
                section.heading()
            ),
            Violation::MissingSection { section } => {
                write!(f, "{}: section is missing", section.heading())
            }
        }
    }
}

impl Violation {
    /// A shortfall the deterministic row top-up can fix without another LLM
    /// round trip.
    pub fn is_row_shortfall(&self) -> bool {
        matches!(
            self,
            Violation::RowCount {
                section: SectionKind::Phrases | SectionKind::Questions,
                min,
                found,
                ..
            } if found < min
        )
    }
}

/// Recount of the document plus every violation found. Observed counts are
/// kept so callers can log the full picture, not just the failures.
#[derive(Debug, Clone, Default)]
pub struct ComplianceReport {
    /// Observed emphasized-term counts for the active main categories.
    pub counts: Vec<(SectionKind, u32)>,
    pub phrase_rows: u32,
    pub question_rows: u32,
    pub violations: Vec<Violation>,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }

    /// True when every violation is a phrases/questions row shortfall, so the
    /// repair can be entirely deterministic.
    pub fn only_row_shortfalls(&self) -> bool {
        !self.violations.is_empty() && self.violations.iter().all(Violation::is_row_shortfall)
    }

    /// One-line rendering for logs and repair prompts.
    pub fn describe_violations(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Verifies a normalized document against the plan. Only selected sections are
/// checked; an unselected section contributes nothing either way.
pub fn verify(html: &str, plan: &QuotaPlan, mask: &SelectionMask) -> ComplianceReport {
    let doc = Document::parse(html);
    let mut report = ComplianceReport::default();

    for kind in mask.active_main() {
        let expected = plan.quota(kind);
        let found = match doc.section(kind) {
            Some(block) => block
                .rows
                .iter()
                .filter(|row| row.cells.len() >= 2)
                .map(|row| emphasis_spans(&row.cells[1], "es") as u32)
                .sum(),
            None => {
                report.violations.push(Violation::MissingSection { section: kind });
                0
            }
        };
        report.counts.push((kind, found));
        if found != expected {
            report.violations.push(Violation::SpanCount {
                section: kind,
                expected,
                found,
            });
        }
    }

    for kind in [SectionKind::Phrases, SectionKind::Questions] {
        let Some(bounds) = plan.row_bounds(kind).filter(|_| mask.is_active(kind)) else {
            continue;
        };
        let found = match doc.section(kind) {
            Some(block) => block
                .rows
                .iter()
                .filter(|row| row.cells.len() >= 2)
                .count() as u32,
            None => {
                report.violations.push(Violation::MissingSection { section: kind });
                0
            }
        };
        match kind {
            SectionKind::Phrases => report.phrase_rows = found,
            _ => report.question_rows = found,
        }
        if found < bounds.min || found > bounds.max {
            report.violations.push(Violation::RowCount {
                section: kind,
                min: bounds.min,
                max: bounds.max,
                found,
            });
        }
    }

    report
}
