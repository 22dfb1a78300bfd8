//! Request orchestration — one LLM call, verification, and at most one
//! repair round trip, with a deterministic fallback for row shortfalls.

use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::CompletionBackend;
use crate::vocab::contract;
use crate::vocab::document::{Document, TableRow};
use crate::vocab::normalize::{emphasis_terms, normalize, strip_code_fence};
use crate::vocab::prompts::{self, BASE_SYSTEM, REPAIR_PROMPT_TEMPLATE};
use crate::vocab::quota::{allocate, QuotaPlan};
use crate::vocab::range::{classify, parse_range, parse_selection_marker, parse_topic, RequestKind};
use crate::vocab::sections::{SectionKind, SelectionMask};
use crate::vocab::verify::verify;

/// Total model calls per request, the initial generation included. The second
/// call, when it happens, is the single repair round trip.
pub const MAX_ATTEMPTS: u32 = 2;

/// Runs a prompt through the full pipeline. Non-vocabulary prompts (and
/// vocabulary prompts with no readable range) are passed through with no
/// contract and no verification.
pub async fn run(
    llm: &dyn CompletionBackend,
    prompt: &str,
    sections: Option<&[String]>,
) -> Result<String, AppError> {
    let range = parse_range(prompt);
    let (RequestKind::Vocabulary, Some(range)) = (classify(prompt), range) else {
        let raw = llm.complete(BASE_SYSTEM, prompt).await?;
        return Ok(strip_code_fence(&raw).to_string());
    };

    let topic = parse_topic(prompt);
    let mask = sections
        .map(SelectionMask::from_names)
        .or_else(|| parse_selection_marker(prompt))
        .unwrap_or_default();
    let plan = allocate(range, &mask);
    let system = contract::build_system_message(range, &topic, &mask, &plan);
    info!(
        target_total = plan.target_total,
        topic = %topic,
        "vocabulary request accepted"
    );

    let mut user = prompt.to_string();
    let mut best = String::new();
    for attempt in 1..=MAX_ATTEMPTS {
        let candidate = llm.complete(&system, &user).await?;
        let normalized = normalize(&candidate, &mask);
        let report = verify(&normalized, &plan, &mask);

        if report.is_compliant() {
            info!(attempt, "study sheet compliant");
            return Ok(normalized);
        }
        if report.only_row_shortfalls() {
            // Filler rows are cheaper and more reliable than another model
            // call when the counts are otherwise exact.
            info!(attempt, "row shortfalls only, topping up deterministically");
            return Ok(top_up_rows(&normalized, &plan, &mask, &topic));
        }

        warn!(
            attempt,
            violations = %report.describe_violations(),
            "contract violations detected"
        );
        best = normalized;
        if attempt < MAX_ATTEMPTS {
            user = prompts::fill(
                REPAIR_PROMPT_TEMPLATE,
                &[
                    ("prompt", prompt),
                    ("violations", &report.describe_violations()),
                    ("candidate", &best),
                ],
            );
        }
    }

    // Out of attempts. Row shortfalls are still fixed deterministically; the
    // rest ships best-effort rather than failing the request.
    let repaired = top_up_rows(&best, &plan, &mask, &topic);
    let final_report = verify(&repaired, &plan, &mask);
    if !final_report.is_compliant() {
        warn!(
            violations = %final_report.describe_violations(),
            "returning best-effort document after {MAX_ATTEMPTS} attempts"
        );
    }
    Ok(repaired)
}

/// Appends filler rows to under-populated phrases/questions sections until
/// each reaches its minimum. Fillers reuse emphasized vocabulary from the
/// main sections (falling back to the topic when none exists) and carry no
/// emphasis spans of their own, so main-category counts are untouched.
fn top_up_rows(html: &str, plan: &QuotaPlan, mask: &SelectionMask, topic: &str) -> String {
    let mut doc = Document::parse(html);
    let pool = reuse_pool(&doc, mask);

    for kind in [SectionKind::Phrases, SectionKind::Questions] {
        let Some(bounds) = plan.row_bounds(kind).filter(|_| mask.is_active(kind)) else {
            continue;
        };
        let Some(block) = doc.section_mut(kind) else {
            continue;
        };
        let have = block.rows.iter().filter(|r| r.cells.len() >= 2).count() as u32;
        for i in have..bounds.min {
            let term = if pool.is_empty() {
                topic
            } else {
                &pool[i as usize % pool.len()]
            };
            block.rows.push(filler_row(kind, term));
        }
    }
    doc.serialize()
}

/// Distinct emphasized Spanish terms across the active main sections, in
/// document order.
fn reuse_pool(doc: &Document, mask: &SelectionMask) -> Vec<String> {
    let mut pool: Vec<String> = Vec::new();
    for kind in mask.active_main() {
        let Some(block) = doc.section(kind) else { continue };
        for row in &block.rows {
            if row.cells.len() < 2 {
                continue;
            }
            for term in emphasis_terms(&row.cells[1], "es") {
                if !term.is_empty() && !pool.contains(&term) {
                    pool.push(term);
                }
            }
        }
    }
    pool
}

fn filler_row(kind: SectionKind, term: &str) -> TableRow {
    match kind {
        SectionKind::Questions => TableRow::pair(
            format!("Can you use \"{term}\" in a sentence?"),
            format!("¿Puedes usar \"{term}\" en una oración?"),
        ),
        _ => TableRow::pair(
            format!("Let's practice \"{term}\"."),
            format!("Vamos a practicar \"{term}\"."),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::vocab::document::section_html;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Plays back a fixed list of responses and records every call.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedBackend {
        fn new<I: IntoIterator<Item = String>>(responses: I) -> Self {
            ScriptedBackend {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn seen(&self) -> Vec<(String, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(LlmError::EmptyContent)
        }
    }

    fn vocab_prompt() -> String {
        "== FCS VOCABULARY OUTPUT ==\n\
         <title>Vocabulary — Cooking</title>\n\
         INCLUDE SECTIONS: nouns, phrases\n\
         Vocabulary range: 1-1\n\
         <html><body>…skeleton…</body></html>"
            .to_string()
    }

    const NOUN_PAIRS: [(&str, &str); 4] =
        [("pot", "olla"), ("pan", "sartén"), ("oven", "cocina"), ("stove", "estufa")];

    fn noun_rows(n: usize) -> String {
        (0..n)
            .map(|i| {
                let (en, es) = NOUN_PAIRS[i % NOUN_PAIRS.len()];
                format!(
                    r#"<tr><td>the <span class="en">{en}</span></td><td>la <span class="es">{es}</span></td></tr>"#
                )
            })
            .collect()
    }

    fn phrase_rows(n: usize) -> String {
        (0..n)
            .map(|i| format!("<tr><td>Phrase {i}.</td><td>Frase {i}.</td></tr>"))
            .collect()
    }

    fn sheet(nouns: usize, phrases: usize) -> String {
        let mut html = String::from("<html><body>");
        html.push_str(&section_html("Nouns", &noun_rows(nouns)));
        html.push_str(&section_html("Common Phrases", &phrase_rows(phrases)));
        html.push_str("</body></html>");
        html
    }

    #[tokio::test]
    async fn test_compliant_first_candidate_uses_one_call() {
        let llm = ScriptedBackend::new([sheet(1, 8)]);
        let out = run(&llm, &vocab_prompt(), None).await.unwrap();
        assert_eq!(llm.calls(), 1);
        assert!(out.contains(r#"<span class="es">olla</span>"#));
    }

    #[tokio::test]
    async fn test_row_shortfall_is_topped_up_without_second_call() {
        let llm = ScriptedBackend::new([sheet(1, 6)]);
        let out = run(&llm, &vocab_prompt(), None).await.unwrap();
        assert_eq!(llm.calls(), 1);

        let doc = Document::parse(&out);
        let phrases = doc.section(SectionKind::Phrases).unwrap();
        assert_eq!(phrases.rows.len(), 8);
        // Fillers reuse emphasized vocabulary, without spans of their own.
        assert!(phrases.rows[6].cells[1].contains("olla"));
        assert!(!phrases.rows[6].cells[1].contains("<span"));
    }

    #[tokio::test]
    async fn test_span_violation_triggers_exactly_one_repair_call() {
        let llm = ScriptedBackend::new([sheet(0, 8), sheet(1, 8)]);
        let prompt = vocab_prompt();
        let out = run(&llm, &prompt, None).await.unwrap();
        assert_eq!(llm.calls(), 2);
        assert!(out.contains("olla"));

        let seen = llm.seen();
        // Both calls carry the same contract-bearing system message.
        assert_eq!(seen[0].0, seen[1].0);
        assert!(seen[0].0.contains("STRICT ONE-SHOT COUNTING CONTRACT"));
        // The repair prompt names the violation and embeds the candidate.
        assert!(seen[1].1.contains("violated the counting contract"));
        assert!(seen[1]
            .1
            .contains("Nouns: expected exactly 1 highlighted terms, found 0"));
        assert!(seen[1].1.starts_with(&prompt));
    }

    #[tokio::test]
    async fn test_best_effort_after_attempts_exhausted() {
        let llm = ScriptedBackend::new([sheet(3, 8), sheet(3, 8)]);
        let out = run(&llm, &vocab_prompt(), None).await.unwrap();
        assert_eq!(llm.calls(), 2);
        // Still three emphasized nouns: the document ships as-is.
        let doc = Document::parse(&out);
        assert_eq!(doc.section(SectionKind::Nouns).unwrap().rows.len(), 3);
    }

    #[tokio::test]
    async fn test_non_vocabulary_prompt_passes_through() {
        let llm = ScriptedBackend::new(["```html\n<p>two conversations</p>\n```".to_string()]);
        let out = run(&llm, "Generate two sample conversations.", None)
            .await
            .unwrap();
        assert_eq!(llm.calls(), 1);
        assert_eq!(out, "<p>two conversations</p>");
        let seen = llm.seen();
        assert_eq!(seen[0].0, BASE_SYSTEM);
        assert!(!seen[0].0.contains("COUNTING CONTRACT"));
    }

    #[tokio::test]
    async fn test_vocab_banner_without_range_passes_through() {
        let llm = ScriptedBackend::new(["<p>raw</p>".to_string()]);
        let out = run(&llm, "== FCS VOCABULARY OUTPUT == but no range here", None)
            .await
            .unwrap();
        assert_eq!(out, "<p>raw</p>");
        assert_eq!(llm.seen()[0].0, BASE_SYSTEM);
    }

    #[tokio::test]
    async fn test_request_sections_override_prompt_marker() {
        // Marker says nouns+phrases; the request narrows to nouns only, so a
        // sheet with no phrase rows is already compliant.
        let llm = ScriptedBackend::new([sheet(1, 0)]);
        let sections = vec!["nouns".to_string()];
        let out = run(&llm, &vocab_prompt(), Some(&sections)).await.unwrap();
        assert_eq!(llm.calls(), 1);
        assert!(!llm.seen()[0].0.contains("COMMON PHRASES — MANDATORY"));
        assert!(out.contains("olla"));
    }

    #[tokio::test]
    async fn test_llm_failure_propagates() {
        let llm = ScriptedBackend::new(Vec::<String>::new());
        let err = run(&llm, &vocab_prompt(), None).await.unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::EmptyContent)));
    }

    #[tokio::test]
    async fn test_top_up_falls_back_to_topic_when_pool_empty() {
        // No emphasized nouns at all: fillers quote the topic instead.
        let llm = ScriptedBackend::new([{
            let mut html = String::from("<html><body>");
            html.push_str(&section_html("Common Phrases", &phrase_rows(6)));
            html.push_str("</body></html>");
            html
        }]);
        // Mask without main categories: the reuse pool is legitimately empty
        // and the two filler rows must quote the topic instead.
        let sections = vec!["phrases".to_string()];
        let out = run(&llm, &vocab_prompt(), Some(&sections)).await.unwrap();
        assert_eq!(llm.calls(), 1);
        let doc = Document::parse(&out);
        let phrases = doc.section(SectionKind::Phrases).unwrap();
        assert_eq!(phrases.rows.len(), 8);
        assert!(phrases.rows[7].cells[0].contains("Cooking"));
    }
}
