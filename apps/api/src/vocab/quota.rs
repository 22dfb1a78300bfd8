//! Quota allocation — turns a vocabulary range and a selection mask into the
//! exact per-section targets the contract will enforce.
//!
//! # Invariants
//! - `sum(quotas) == target_total`, exactly, for every range and mask.
//! - No quota is ever negative.
//! - Allocation is deterministic: identical inputs yield identical plans.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vocab::sections::{SectionKind, SelectionMask};

/// Row-count target divisor for phrases/questions. A tunable, not a
/// load-bearing semantic value; only the [ROW_MIN, ROW_MAX] band is contractual.
pub const ROW_TARGET_DIVISOR: f64 = 18.0;
pub const ROW_MIN: u32 = 8;
/// Hard ceiling on phrase/question rows, independent of vocabulary size.
pub const ROW_MAX: u32 = 10;

/// Percentage of the target total that may be reused across phrases+questions.
const REUSE_PCT: u32 = 20;

/// Closed integer interval requested by the user. `low <= high` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyRange {
    pub low: u32,
    pub high: u32,
}

impl VocabularyRange {
    /// Swaps inverted bounds so `low <= high`.
    pub fn new(a: u32, b: u32) -> Self {
        if a <= b {
            VocabularyRange { low: a, high: b }
        } else {
            VocabularyRange { low: b, high: a }
        }
    }

    /// Floor-rounded midpoint, always within `[low, high]`. The sum is taken
    /// in u64 so bounds near `u32::MAX` cannot overflow.
    pub fn midpoint(&self) -> u32 {
        (((self.low as u64 + self.high as u64) / 2) as u32).clamp(self.low, self.high)
    }
}

/// Inclusive row-count bounds for a phrases/questions section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowBounds {
    pub min: u32,
    pub max: u32,
}

/// Everything the contract builder and verifier need, derived once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaPlan {
    pub target_total: u32,
    /// Per-category quotas for active main categories only. Excluded
    /// categories do not appear at all.
    pub quotas: BTreeMap<SectionKind, u32>,
    /// Row bounds for Common Phrases, when that section is active.
    pub phrase_rows: Option<RowBounds>,
    /// Row bounds for Common Questions, when that section is active.
    pub question_rows: Option<RowBounds>,
    /// Ceiling on distinct vocabulary terms reused across phrases+questions.
    pub reuse_budget: u32,
}

impl QuotaPlan {
    pub fn quota(&self, kind: SectionKind) -> u32 {
        self.quotas.get(&kind).copied().unwrap_or(0)
    }

    pub fn row_bounds(&self, kind: SectionKind) -> Option<RowBounds> {
        match kind {
            SectionKind::Phrases => self.phrase_rows,
            SectionKind::Questions => self.question_rows,
            _ => None,
        }
    }
}

/// Computes the full quota plan for a range and selection mask.
///
/// Raw quotas are `round(target_total * weight)` per active category. With all
/// four categories active, the canonical 30/30/15/15 weights apply directly and
/// the ~10% residue is absorbed by the remainder correction; when the mask
/// drops a category, the remaining weights are renormalized to sum to 1.0.
/// The correction walks the fixed order nouns→verbs→adjectives→adverbs
/// (skipping inactive ones), incrementing while short and decrementing (never
/// below zero) while over, so the quota sum lands on `target_total` exactly.
pub fn allocate(range: VocabularyRange, mask: &SelectionMask) -> QuotaPlan {
    let active = mask.active_main();
    let target_total = if mask.has_main() { range.midpoint() } else { 0 };

    let weight_sum: f64 = active.iter().map(|k| k.weight()).sum();
    let renormalize = active.len() < SectionKind::MAIN.len() && weight_sum > 0.0;

    let mut quotas: BTreeMap<SectionKind, i64> = active
        .iter()
        .map(|&k| {
            let w = if renormalize {
                k.weight() / weight_sum
            } else {
                k.weight()
            };
            (k, (target_total as f64 * w).round() as i64)
        })
        .collect();

    let mut diff = target_total as i64 - quotas.values().sum::<i64>();
    if !active.is_empty() {
        let mut cycle = active.iter().cycle();
        while diff != 0 {
            let k = *cycle.next().unwrap();
            let q = quotas.get_mut(&k).unwrap();
            if diff > 0 {
                *q += 1;
                diff -= 1;
            } else if *q > 0 {
                *q -= 1;
                diff += 1;
            }
        }
    }

    let bounds = row_bounds_for(target_total);
    QuotaPlan {
        target_total,
        quotas: quotas.into_iter().map(|(k, q)| (k, q as u32)).collect(),
        phrase_rows: mask.is_active(SectionKind::Phrases).then_some(bounds),
        question_rows: mask.is_active(SectionKind::Questions).then_some(bounds),
        reuse_budget: reuse_budget(target_total),
    }
}

/// `min = clamp(round(total / 18), 8, 10)`, `max = 10`.
fn row_bounds_for(target_total: u32) -> RowBounds {
    let target = (target_total as f64 / ROW_TARGET_DIVISOR).round() as u32;
    RowBounds {
        min: target.clamp(ROW_MIN, ROW_MAX),
        max: ROW_MAX,
    }
}

/// `max(1, ceil(20% of total))`, computed in integers. Widened to u64 so the
/// intermediate product cannot overflow.
fn reuse_budget(target_total: u32) -> u32 {
    ((target_total as u64 * REUSE_PCT as u64 + 99) / 100).max(1) as u32
}
