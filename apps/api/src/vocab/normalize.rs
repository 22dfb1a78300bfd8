//! Response normalization — pattern-based structural repairs on the LLM's
//! returned HTML, applied per section on the parsed document tree.
//!
//! Every repair is idempotent and single-span-enforcing: a repaired cell ends
//! with at most one emphasis span outside parentheticals, and running the
//! normalizer twice yields the same bytes as running it once. The auxiliary
//! rule is absolute: the future periphrasis ("voy/vas/va/vamos/vais/van a",
//! "is/are going to") is never emphasized, only the lexical word is.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::vocab::document::Document;
use crate::vocab::sections::{SectionKind, SelectionMask};

lazy_static! {
    /// Outer fenced-code-block wrapper, language-tagged or not.
    static ref FENCE_RE: Regex =
        Regex::new(r"(?is)^\s*```(?:html|xml|markdown)?\s*(.*?)\s*```\s*$").unwrap();

    static ref ES_SPAN_RE: Regex = Regex::new(r#"(?is)<span\s+class="es">(.*?)</span>"#).unwrap();
    static ref EN_SPAN_RE: Regex = Regex::new(r#"(?is)<span\s+class="en">(.*?)</span>"#).unwrap();
    static ref SPAN_TAG_RE: Regex = Regex::new(r"(?i)</?span[^>]*>").unwrap();
    static ref PAREN_RE: Regex = Regex::new(r"\([^)]*\)").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref WORD_RE: Regex = Regex::new(r"(?i)[a-záéíóúüñ]+").unwrap();

    // ── Spanish verb periphrasis ────────────────────────────────────────────
    /// Span swallowing the auxiliary + "a" + infinitive (with optional
    /// surrounding text inside the span).
    static ref ES_AUX_INSIDE_RE: Regex = Regex::new(
        r#"(?i)<span\s+class="es">([^<]*?)\b(voy|vas|va|vamos|vais|van)\s+a\s+([a-záéíóúüñ/]+)([^<]*)</span>"#
    )
    .unwrap();
    /// Span on the auxiliary only, infinitive following outside.
    static ref ES_AUX_SPAN_THEN_VERB_RE: Regex = Regex::new(
        r#"(?i)<span\s+class="es">\s*(voy|vas|va|vamos|vais|van)\s*</span>\s*a\s+([a-záéíóúüñ/]+)"#
    )
    .unwrap();
    /// Span on "aux a", infinitive following outside.
    static ref ES_AUX_A_SPAN_THEN_VERB_RE: Regex = Regex::new(
        r#"(?i)<span\s+class="es">\s*(voy|vas|va|vamos|vais|van)\s+a\s*</span>\s*([a-záéíóúüñ/]+)"#
    )
    .unwrap();
    /// Span wrapping a bare auxiliary with no verb to move to: unwrap it.
    static ref ES_BARE_AUX_SPAN_RE: Regex = Regex::new(
        r#"(?i)<span\s+class="es">\s*((?:voy|vas|va|vamos|vais|van)(?:\s+a)?)\s*</span>"#
    )
    .unwrap();

    // ── English verb periphrasis ────────────────────────────────────────────
    static ref EN_MARKER_VERB_RE: Regex = Regex::new(
        r#"(?i)<span\s+class="en">\s*((?:is|are)\s+going)\s+to\s+([a-z-]+(?:\s+(?:up|down|in|on|off|out|over|back|away))?)\s*</span>"#
    )
    .unwrap();
    static ref EN_MARKER_ONLY_RE: Regex = Regex::new(
        r#"(?i)<span\s+class="en">\s*((?:is|are)\s+going\s+to|going\s+to)\s*</span>"#
    )
    .unwrap();
    static ref EN_TO_VERB_RE: Regex = Regex::new(
        r"\b([Tt]o)\s+([a-z-]+(?:\s+(?:up|down|in|on|off|out|over|back|away))?)"
    )
    .unwrap();

    // ── Copula splits for adjective cells ───────────────────────────────────
    static ref ES_COPULA_SPAN_RE: Regex = Regex::new(
        r#"(?i)<span\s+class="es">\s*(es|son|está|están)\s+([a-záéíóúüñ]+)\s*</span>"#
    )
    .unwrap();
    static ref EN_COPULA_SPAN_RE: Regex = Regex::new(
        r#"(?i)<span\s+class="en">\s*(is|are)\s+([a-z-]+)\s*</span>"#
    )
    .unwrap();

    // ── Nouns ───────────────────────────────────────────────────────────────
    static ref EN_ARTICLE_RE: Regex = Regex::new(r"\b([Tt]he)\s+([A-Za-z]+)").unwrap();
    static ref ES_ARTICLE_RE: Regex =
        Regex::new(r"(?i)\b(el|la|los|las|un|una)\s+([a-záéíóúüñ]+)").unwrap();
    /// A cell that is exactly "el <noun>" (already rewrapped), eligible for
    /// the parenthetical feminine form.
    static ref ES_EL_NOUN_RE: Regex =
        Regex::new(r#"(?i)^el\s+<span class="es">([a-záéíóúüñ]+)</span>$"#).unwrap();

    // ── Adverbs ─────────────────────────────────────────────────────────────
    static ref ES_MENTE_RE: Regex = Regex::new(r"(?i)\b[a-záéíóúüñ]+mente\b").unwrap();
    static ref EN_LY_RE: Regex = Regex::new(r"(?i)\b[a-z]{3,}ly\b").unwrap();
}

const ES_COMMON_ADVERBS: &[&str] = &[
    "bien", "mal", "muy", "siempre", "nunca", "despacio", "temprano", "tarde", "aquí", "hoy",
    "mañana", "juntos", "mucho", "poco", "rápido", "pronto",
];

const EN_COMMON_ADVERBS: &[&str] = &[
    "well", "fast", "hard", "often", "always", "never", "together", "early", "late", "soon",
    "today", "tomorrow",
];

/// Minimum length for the last-resort adverb fallback token, so short
/// grammatical particles are never highlighted.
const MIN_FALLBACK_TOKEN_LEN: usize = 4;

/// Strips a single outer fenced-code-block wrapper if present.
pub fn strip_code_fence(text: &str) -> &str {
    match FENCE_RE.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(text),
        None => text.trim(),
    }
}

/// Full normalization pass: fence strip, per-section highlight repairs, and
/// clearing of sections the request did not select.
pub fn normalize(raw: &str, mask: &SelectionMask) -> String {
    let mut doc = Document::parse(strip_code_fence(raw));
    for kind in SectionKind::ALL {
        let Some(block) = doc.section_mut(kind) else {
            continue;
        };
        if !mask.is_active(kind) {
            // Enforced here deterministically rather than trusting the model.
            block.rows.clear();
            continue;
        }
        for row in &mut block.rows {
            if row.cells.len() < 2 {
                continue; // subcategory header rows stay as-is
            }
            match kind {
                SectionKind::Nouns => {
                    row.cells[0] = repair_noun_en(&row.cells[0]);
                    row.cells[1] = repair_noun_es(&row.cells[1]);
                }
                SectionKind::Verbs => {
                    row.cells[0] = repair_verb_en(&row.cells[0]);
                    row.cells[1] = repair_verb_es(&row.cells[1]);
                }
                SectionKind::Adjectives => {
                    row.cells[0] = repair_adjective_en(&row.cells[0]);
                    row.cells[1] = repair_adjective_es(&row.cells[1]);
                }
                SectionKind::Adverbs => {
                    row.cells[0] = repair_adverb_en(&row.cells[0]);
                    row.cells[1] = repair_adverb_es(&row.cells[1]);
                }
                SectionKind::Phrases | SectionKind::Questions => {}
            }
        }
    }
    doc.serialize()
}

// ────────────────────────────────────────────────────────────────────────────
// Span accounting
// ────────────────────────────────────────────────────────────────────────────

fn span_re(class: &str) -> &'static Regex {
    if class == "es" {
        &ES_SPAN_RE
    } else {
        &EN_SPAN_RE
    }
}

fn paren_ranges(cell: &str) -> Vec<Range<usize>> {
    PAREN_RE.find_iter(cell).map(|m| m.range()).collect()
}

fn inside_any(ranges: &[Range<usize>], pos: usize) -> bool {
    ranges.iter().any(|r| r.start < pos && pos < r.end)
}

/// Number of emphasis spans of the given class outside parentheticals.
pub fn emphasis_spans(cell: &str, class: &str) -> usize {
    let parens = paren_ranges(cell);
    span_re(class)
        .find_iter(cell)
        .filter(|m| !inside_any(&parens, m.start()))
        .count()
}

/// Emphasized terms of the class outside parentheticals, in document order.
pub fn emphasis_terms(cell: &str, class: &str) -> Vec<String> {
    let parens = paren_ranges(cell);
    span_re(class)
        .captures_iter(cell)
        .filter(|caps| !inside_any(&parens, caps.get(0).unwrap().start()))
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

/// Keeps the first emphasis span of the class outside parentheticals and
/// unwraps every later one, leaving its inner text in place.
fn collapse_extra_spans(cell: &str, class: &str) -> String {
    let parens = paren_ranges(cell);
    let mut out = String::with_capacity(cell.len());
    let mut last = 0usize;
    let mut seen = false;
    for caps in span_re(class).captures_iter(cell) {
        let whole = caps.get(0).unwrap();
        out.push_str(&cell[last..whole.start()]);
        let in_paren = inside_any(&parens, whole.start());
        if in_paren || !seen {
            out.push_str(whole.as_str());
            if !in_paren {
                seen = true;
            }
        } else {
            out.push_str(caps.get(1).unwrap().as_str());
        }
        last = whole.end();
    }
    out.push_str(&cell[last..]);
    out
}

fn unwrap_spans(cell: &str, class: &str) -> String {
    span_re(class).replace_all(cell, "${1}").into_owned()
}

// ────────────────────────────────────────────────────────────────────────────
// Verbs
// ────────────────────────────────────────────────────────────────────────────

/// Moves any emphasis off the "aux + a" periphrasis and onto the infinitive;
/// a span wrapping only the auxiliary is removed entirely.
fn es_aux_exclusion(cell: &str) -> String {
    let s = ES_AUX_INSIDE_RE.replace_all(cell, "${1}${2} a <span class=\"es\">${3}</span>${4}");
    let s = ES_AUX_SPAN_THEN_VERB_RE.replace_all(&s, "${1} a <span class=\"es\">${2}</span>");
    let s = ES_AUX_A_SPAN_THEN_VERB_RE.replace_all(&s, "${1} a <span class=\"es\">${2}</span>");
    ES_BARE_AUX_SPAN_RE.replace_all(&s, "${1}").into_owned()
}

fn repair_verb_es(cell: &str) -> String {
    collapse_extra_spans(&es_aux_exclusion(cell), "es")
}

/// English cell: the periphrasis marker loses any emphasis; the lexical verb
/// (the "to <verb>" pattern, phrasal particle included) carries it.
fn repair_verb_en(cell: &str) -> String {
    let s = EN_MARKER_VERB_RE.replace_all(cell, "${1} to <span class=\"en\">${2}</span>");
    let s = EN_MARKER_ONLY_RE.replace_all(&s, "${1}");
    let mut s = s.into_owned();
    if emphasis_spans(&s, "en") == 0 {
        s = EN_TO_VERB_RE
            .replace(&s, "${1} <span class=\"en\">${2}</span>")
            .into_owned();
    }
    collapse_extra_spans(&s, "en")
}

// ────────────────────────────────────────────────────────────────────────────
// Adjectives
// ────────────────────────────────────────────────────────────────────────────

fn repair_adjective_es(cell: &str) -> String {
    let s = ES_COPULA_SPAN_RE.replace_all(cell, "${1} <span class=\"es\">${2}</span>");
    collapse_extra_spans(&s, "es")
}

fn repair_adjective_en(cell: &str) -> String {
    let s = EN_COPULA_SPAN_RE.replace_all(cell, "${1} <span class=\"en\">${2}</span>");
    collapse_extra_spans(&s, "en")
}

// ────────────────────────────────────────────────────────────────────────────
// Adverbs
// ────────────────────────────────────────────────────────────────────────────

fn repair_adverb_es(cell: &str) -> String {
    let mut s = es_aux_exclusion(cell);
    if emphasis_spans(&s, "es") == 0 {
        if let Some(range) = find_adverb_token(&s, &ES_MENTE_RE, ES_COMMON_ADVERBS) {
            s = wrap_token_at(&s, range, "es");
        }
    }
    collapse_extra_spans(&s, "es")
}

fn repair_adverb_en(cell: &str) -> String {
    let s = EN_MARKER_VERB_RE.replace_all(cell, "${1} to <span class=\"en\">${2}</span>");
    let mut s = EN_MARKER_ONLY_RE.replace_all(&s, "${1}").into_owned();
    if emphasis_spans(&s, "en") == 0 {
        if let Some(range) = find_adverb_token(&s, &EN_LY_RE, EN_COMMON_ADVERBS) {
            s = wrap_token_at(&s, range, "en");
        }
    }
    collapse_extra_spans(&s, "en")
}

/// Locates the token to emphasize in an adverb cell: suffix pattern first
/// (-mente / -ly), then a small list of common adverbs, then the last
/// sufficiently long alphabetic token as a fallback. Tokens inside markup or
/// parentheticals are never candidates.
fn find_adverb_token(
    cell: &str,
    suffix_re: &Regex,
    common: &[&str],
) -> Option<Range<usize>> {
    let tags: Vec<Range<usize>> = TAG_RE.find_iter(cell).map(|m| m.range()).collect();
    let parens = paren_ranges(cell);
    let usable = |start: usize| {
        !tags.iter().any(|r| r.start <= start && start < r.end) && !inside_any(&parens, start)
    };

    if let Some(m) = suffix_re.find_iter(cell).find(|m| usable(m.start())) {
        return Some(m.range());
    }
    for m in WORD_RE.find_iter(cell) {
        if usable(m.start()) && common.contains(&m.as_str().to_lowercase().as_str()) {
            return Some(m.range());
        }
    }
    WORD_RE
        .find_iter(cell)
        .filter(|m| usable(m.start()) && m.as_str().chars().count() >= MIN_FALLBACK_TOKEN_LEN)
        .last()
        .map(|m| m.range())
}

fn wrap_token_at(cell: &str, range: Range<usize>, class: &str) -> String {
    format!(
        "{}<span class=\"{class}\">{}</span>{}",
        &cell[..range.start],
        &cell[range.clone()],
        &cell[range.end..]
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Nouns
// ────────────────────────────────────────────────────────────────────────────

fn repair_noun_en(cell: &str) -> String {
    let s = if emphasis_spans(cell, "en") == 0 {
        EN_ARTICLE_RE
            .replace(cell, "${1} <span class=\"en\">${2}</span>")
            .into_owned()
    } else {
        cell.to_string()
    };
    collapse_extra_spans(&s, "en")
}

/// Target-language noun cell: parentheticals are never emphasized; the body
/// carries exactly one span, on the head noun following the article. A bare
/// "el <noun>" cell additionally gets the feminine form appended in
/// parentheses as plain text.
fn repair_noun_es(cell: &str) -> String {
    let s = strip_spans_in_parentheticals(cell);
    let s = unwrap_spans(&s, "es");
    let s = wrap_article_noun(&s);
    add_feminine(&s)
}

fn strip_spans_in_parentheticals(cell: &str) -> String {
    PAREN_RE
        .replace_all(cell, |caps: &regex::Captures| {
            SPAN_TAG_RE.replace_all(&caps[0], "").into_owned()
        })
        .into_owned()
}

fn wrap_article_noun(cell: &str) -> String {
    let parens = paren_ranges(cell);
    for caps in ES_ARTICLE_RE.captures_iter(cell) {
        let whole = caps.get(0).unwrap();
        if inside_any(&parens, whole.start()) {
            continue;
        }
        let noun = caps.get(2).unwrap();
        return format!(
            "{}<span class=\"es\">{}</span>{}",
            &cell[..noun.start()],
            noun.as_str(),
            &cell[noun.end()..]
        );
    }
    cell.to_string()
}

fn add_feminine(cell: &str) -> String {
    if cell.contains('(') {
        return cell.to_string();
    }
    let trimmed = cell.trim();
    match ES_EL_NOUN_RE.captures(trimmed) {
        Some(caps) => format!("{} (la {})", trimmed, derive_feminine(&caps[1])),
        None => cell.to_string(),
    }
}

/// Heuristic feminine form of a masculine Spanish noun. Acute accents are
/// stripped before the transform, matching how the forms are displayed.
pub fn derive_feminine(base: &str) -> String {
    let raw: String = base
        .trim()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            'Á' => 'A',
            'É' => 'E',
            'Í' => 'I',
            'Ó' => 'O',
            'Ú' => 'U',
            other => other,
        })
        .collect();
    if raw.is_empty() {
        return base.to_string();
    }
    let lower = raw.to_lowercase();

    if lower.ends_with("ista") || lower.ends_with('e') {
        return raw; // invariant forms (artista, cliente), still shown with "la …"
    }
    if lower.ends_with('o') {
        let mut fem = raw;
        fem.pop();
        fem.push('a');
        return fem;
    }
    if lower.ends_with("or") || lower.ends_with("on") || lower.ends_with("in") || lower.ends_with("an")
    {
        let mut fem = raw;
        fem.push('a');
        return fem;
    }
    raw
}
