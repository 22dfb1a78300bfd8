//! Contract builder — renders the quota plan into the strict counting
//! contract appended to the system message for vocabulary requests.
//!
//! The contract restates every number the verifier will later enforce, so the
//! model and the verifier always read from the same plan. Contract
//! instructions override anything the reference guidance says about counts.

use std::fmt::Write as _;

use crate::vocab::prompts::{self, BASE_SYSTEM, GUIDANCE_TEMPLATE};
use crate::vocab::quota::{QuotaPlan, VocabularyRange};
use crate::vocab::sections::{SectionKind, SelectionMask};

/// Full system message for a vocabulary request: base rules, the counting
/// contract, then the reference guidance.
pub fn build_system_message(
    range: VocabularyRange,
    topic: &str,
    mask: &SelectionMask,
    plan: &QuotaPlan,
) -> String {
    let mut msg = String::from(BASE_SYSTEM);
    msg.push_str(&render_contract(plan, mask));
    msg.push_str("\n\n# REFERENCE GUIDANCE FROM USER (structure only — still render into provided HTML):\n");
    msg.push_str(&prompts::fill(
        GUIDANCE_TEMPLATE,
        &[
            ("topic", topic),
            ("low", &range.low.to_string()),
            ("high", &range.high.to_string()),
        ],
    ));
    msg
}

fn render_contract(plan: &QuotaPlan, mask: &SelectionMask) -> String {
    let mut c = String::from(
        "\n\nSTRICT ONE-SHOT COUNTING CONTRACT (Vocabulary ONLY; do NOT change UI/format).\n\
         This contract OVERRIDES any conflicting count in the reference guidance below.\n",
    );

    let active = mask.active_main();
    if !active.is_empty() {
        let _ = writeln!(
            c,
            "• TARGET TOTAL (main sections only): EXACTLY {} Spanish vocabulary items counted by\n\
             \u{20}\u{20}the number of <span class=\"es\">…</span> target words across {}.",
            plan.target_total,
            heading_list(&active),
        );
        c.push_str("• PER-SECTION QUOTAS (enforce exactly):\n");
        for kind in &active {
            let _ = writeln!(c, "  – {}: {}", kind.heading(), plan.quota(*kind));
        }
    }

    let reuse_active: Vec<SectionKind> = [SectionKind::Phrases, SectionKind::Questions]
        .into_iter()
        .filter(|&k| mask.is_active(k))
        .collect();
    for kind in &reuse_active {
        let Some(bounds) = plan.row_bounds(*kind) else { continue };
        let _ = writeln!(
            c,
            "• {} — MANDATORY:\n\
             \u{20}\u{20}– Populate the section with table rows inside its existing <tbody>.\n\
             \u{20}\u{20}– Number of rows: between {} and {} inclusive (NEVER exceed {}).",
            kind.heading().to_uppercase(),
            bounds.min,
            bounds.max,
            bounds.max,
        );
    }
    if !reuse_active.is_empty() && !active.is_empty() {
        let _ = writeln!(
            c,
            "  – Reuse only vocabulary from the main sections (no new vocabulary). Distinct reused\n\
             \u{20}\u{20}\u{20}\u{20}words across these sections combined must be ≤ {} (≈20% of {}).\n\
             \u{20}\u{20}– Rows in these sections do NOT count toward the {} total.",
            plan.reuse_budget, plan.target_total, plan.target_total,
        );
    }

    c.push_str("• COLORING & LINGUISTICS:\n");
    if mask.is_active(SectionKind::Verbs) {
        c.push_str(
            "  – Verbs: English cell must color the \"to + verb/particle\" portion with <span class=\"en\">…</span>;\n\
             \u{20}\u{20}\u{20}\u{20}Spanish cell must color ONLY the infinitive with <span class=\"es\">…</span>. NEVER color \"voy/vas/va/vamos/vais/van a\".\n",
        );
    }
    if mask.is_active(SectionKind::Nouns) {
        c.push_str(
            "  – Nouns: Spanish cell uses article; IF a noun commonly has both genders, show masculine first\n\
             \u{20}\u{20}\u{20}\u{20}and append the feminine in parentheses, e.g., el médico (la médica), el cliente (la cliente).\n",
        );
    }
    if mask.is_active(SectionKind::Adjectives) {
        c.push_str("  – Adjectives: sentences with \"is/are + adjective\"; highlight ONLY the adjective.\n");
    }
    if mask.is_active(SectionKind::Adverbs) {
        c.push_str("  – Adverbs: sentences that reuse verbs; highlight ONLY the adverb.\n");
    }

    let populate: Vec<&str> = SectionKind::ALL
        .into_iter()
        .filter(|&k| mask.is_active(k))
        .map(|k| k.heading())
        .collect();
    let _ = writeln!(
        c,
        "• RENDERING BOUNDARIES — CRITICAL:\n\
         \u{20}\u{20}– You MUST use the HTML skeleton from the user's prompt AS-IS (no Markdown, no new sections).\n\
         \u{20}\u{20}– ONLY populate: {}. Leave every other section's <tbody> EMPTY.\n\
         \u{20}\u{20}– Insert ONLY <tr> row content into each existing <tbody>. Do NOT add extra tables or headers.",
        populate.join("; "),
    );

    c.push_str("• SELF-CHECK BEFORE SENDING:\n");
    if !active.is_empty() {
        let _ = writeln!(
            c,
            "  – Ensure exact per-section quotas and the grand total of {} in the main sections.",
            plan.target_total
        );
    }
    for kind in &reuse_active {
        if let Some(bounds) = plan.row_bounds(*kind) {
            let _ = writeln!(
                c,
                "  – Ensure {} exists and has {}–{} rows (≤{}).",
                kind.heading(),
                bounds.min,
                bounds.max,
                bounds.max
            );
        }
    }
    c.push_str("  – Ensure well-formed HTML that fits the provided skeleton.\n");
    c
}

fn heading_list(kinds: &[SectionKind]) -> String {
    kinds
        .iter()
        .map(|k| k.heading())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::quota::allocate;

    #[test]
    fn test_contract_restates_every_enforced_number() {
        let range = VocabularyRange::new(40, 60);
        let mask = SelectionMask::all();
        let plan = allocate(range, &mask);
        let msg = build_system_message(range, "Cooking", &mask, &plan);

        assert!(msg.starts_with(BASE_SYSTEM));
        assert!(msg.contains("EXACTLY 50 Spanish vocabulary items"));
        for kind in SectionKind::MAIN {
            let line = format!("– {}: {}", kind.heading(), plan.quota(kind));
            assert!(msg.contains(&line), "missing {line:?}");
        }
        assert!(msg.contains(&format!("≤ {}", plan.reuse_budget)));
        assert!(msg.contains("between 8 and 10 inclusive"));
        assert!(msg.contains("Topic: \"Cooking\""));
        assert!(msg.contains("40–60 distinct Spanish vocabulary words"));
    }

    #[test]
    fn test_excluded_sections_never_appear_as_targets() {
        let range = VocabularyRange::new(40, 60);
        let mask = SelectionMask::from_names(["nouns", "verbs", "phrases"]);
        let plan = allocate(range, &mask);
        let msg = build_system_message(range, "Travel", &mask, &plan);

        assert!(msg.contains("ONLY populate: Nouns; Verbs in Sentences; Common Phrases."));
        assert!(!msg.contains("– Adjectives:"));
        assert!(!msg.contains("COMMON QUESTIONS — MANDATORY"));
        assert!(msg.contains("– Nouns: 25"));
        assert!(msg.contains("– Verbs in Sentences: 25"));
    }

    #[test]
    fn test_no_main_categories_still_binds_row_sections() {
        let range = VocabularyRange::new(40, 60);
        let mask = SelectionMask::from_names(["phrases", "questions"]);
        let plan = allocate(range, &mask);
        let msg = build_system_message(range, "Weather", &mask, &plan);

        assert!(!msg.contains("TARGET TOTAL"));
        assert!(!msg.contains("PER-SECTION QUOTAS"));
        assert!(msg.contains("COMMON PHRASES — MANDATORY"));
        assert!(msg.contains("COMMON QUESTIONS — MANDATORY"));
    }

    #[test]
    fn test_contract_declares_override_of_guidance() {
        let range = VocabularyRange::new(10, 20);
        let mask = SelectionMask::all();
        let plan = allocate(range, &mask);
        let msg = build_system_message(range, "Topic", &mask, &plan);
        assert!(msg.contains("OVERRIDES any conflicting count"));
    }
}
