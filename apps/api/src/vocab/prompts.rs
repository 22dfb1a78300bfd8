// All LLM prompt constants for the vocabulary pipeline.
// Templates use `{placeholder}` markers replaced before sending.

/// Base system message sent with every request, vocabulary or not.
pub const BASE_SYSTEM: &str =
    "You are an expert FCS assistant. Return ONLY full raw HTML (a valid document). \
    Strictly follow the embedded contract inside the user's HTML prompt. \
    ABSOLUTE LENGTH COMPLIANCE: When ranges are provided (counts or sentences/words), \
    produce at least the minimum and not more than the maximum. Do not under-deliver. \
    If needed, compress prose while keeping counts intact. \
    Vocabulary generator rules (do not change UI/format): \
    • NOUNS: words/phrases only (no sentences) with subcategory header rows when required; \
    the Spanish noun is wrapped in <span class=\"es\">…</span> (red). \
    • VERBS: full sentences using He/She/It/They + is/are going to + [infinitive]; \
    highlight ONLY the verb (one <span class=\"en\">…</span> in the English cell, \
    one <span class=\"es\">…</span> in the Spanish cell). \
    • ADJECTIVES: full sentences with is/are + adjective; highlight ONLY the adjective \
    (one <span class=\"en\">…</span> and one <span class=\"es\">…</span>). \
    • ADVERBS: full sentences that reuse verbs, highlight ONLY the adverb \
    (one <span class=\"en\">…</span> and one <span class=\"es\">…</span>). \
    Common Phrases/Questions must follow the contract. \
    Do NOT add explanations or code fences.";

/// Reference guidance appended after the counting contract. Structure only;
/// rendering stays inside the caller's HTML skeleton. Replace `{topic}`,
/// `{low}` and `{high}` before sending.
pub const GUIDANCE_TEMPLATE: &str = r#"You are an expert assistant for the FCS program.
You must always follow every instruction below exactly.
Never ask follow-up questions, never stop early, and never skip or merge sections.
Topic: "{topic}"
Vocabulary range: {low}–{high} distinct Spanish vocabulary words.
1. Nouns
Two-column table, bold article + noun in both languages.
If more than 20 nouns, subdivide into logical categories such as People, Places, Equipment,
each introduced by a short subcategory header row.
Alphabetize English terms within each category. All nouns must be relevant to the topic.
2. Verbs in Sentences
Always use third-person sentences in English with "is/are going to + verb."
Reflexive verbs place the pronoun after the infinitive (example: va a descansarse).
Include sentences where nouns from Part 1 are objects, where they are subjects,
and where there is only a third-person subject (he, she, it, they).
Verbs must be relevant to the topic.
3. Adjectives
Sentences must pair nouns from Part 1 with "is/are + adjective."
Each major noun appears with at least two contrasting or related adjectives.
4. Adverbs
Sentences must reuse verbs from Part 2, each modified with an adverb that fits the topic.
5. Common Phrases
Phrases must be relevant to the topic.
6. Common Questions
Questions must be relevant to the topic. Do not include answers."#;

/// Repair request sent when the first candidate violates the contract.
/// Replace `{prompt}`, `{candidate}` and `{violations}` before sending.
pub const REPAIR_PROMPT_TEMPLATE: &str = r#"{prompt}

YOUR PREVIOUS OUTPUT (below) violated the counting contract:
{violations}

Fix ONLY these violations. Keep every compliant section's content unchanged,
keep the HTML skeleton exactly as-is, and return the full corrected HTML document.

PREVIOUS OUTPUT:
{candidate}"#;

/// One-shot `{placeholder}` substitution, single pass, no recursion.
pub fn fill(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in pairs {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_all_markers() {
        let out = fill(GUIDANCE_TEMPLATE, &[
            ("topic", "Cooking"),
            ("low", "40"),
            ("high", "60"),
        ]);
        assert!(out.contains("Topic: \"Cooking\""));
        assert!(out.contains("40–60 distinct Spanish vocabulary words"));
        assert!(!out.contains("{topic}"));
        assert!(!out.contains("{low}"));
    }

    #[test]
    fn test_repair_template_embeds_all_parts() {
        let out = fill(REPAIR_PROMPT_TEMPLATE, &[
            ("prompt", "ORIGINAL"),
            ("candidate", "<html>…</html>"),
            ("violations", "Nouns: expected exactly 15 highlighted terms, found 14"),
        ]);
        assert!(out.starts_with("ORIGINAL"));
        assert!(out.contains("found 14"));
        assert!(out.ends_with("<html>…</html>"));
    }

    #[test]
    fn test_base_system_forbids_fences() {
        assert!(BASE_SYSTEM.contains("code fences"));
    }
}
