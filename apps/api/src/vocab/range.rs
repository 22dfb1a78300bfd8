//! Prompt scanning — pulls the vocabulary range, topic, and section-selection
//! marker out of the free-form prompt document, and classifies which generator
//! front-end is calling.

use lazy_static::lazy_static;
use regex::Regex;

use crate::vocab::quota::VocabularyRange;
use crate::vocab::sections::SelectionMask;

lazy_static! {
    /// "Vocabulary range: 40–60" — accepts hyphen, the Unicode dash block
    /// U+2010..U+2015, and the minus sign U+2212 as separators.
    static ref RANGE_RE: Regex = Regex::new(
        r"(?i)Vocabulary\s+range:\s*(\d+)\s*[\-\x{2010}-\x{2015}\x{2212}]\s*(\d+)"
    )
    .unwrap();

    /// Topic embedded in the document title, e.g. `<title>Vocabulary — Cooking</title>`.
    static ref TOPIC_RE: Regex =
        Regex::new(r"(?is)<title>\s*Vocabulary\s*[\x{2014}\-]\s*(.*?)\s*</title>").unwrap();

    /// Explicit section opt-in line, e.g. `INCLUDE SECTIONS: nouns,verbs,phrases`.
    static ref SECTIONS_RE: Regex =
        Regex::new(r"(?im)^\s*INCLUDE\s+SECTIONS?:\s*([a-z, \t]+)\s*$").unwrap();

    /// Banner the vocabulary front-end embeds in its prompt skeleton. This is
    /// the single documented detection rule for request classification.
    static ref BANNER_RE: Regex = Regex::new(r"(?i)FCS\s+VOCABULARY\s+OUTPUT").unwrap();

    static ref WS_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Which generator front-end produced the incoming prompt.
///
/// Anything that is not the vocabulary generator (conversation drills, tests)
/// is passed to the LLM untouched: no contract, no verification, no repairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Vocabulary,
    Passthrough,
}

pub fn classify(prompt: &str) -> RequestKind {
    if BANNER_RE.is_match(prompt) {
        RequestKind::Vocabulary
    } else {
        RequestKind::Passthrough
    }
}

/// Largest accepted range bound. A study sheet never needs more; anything
/// above this is a typo or abuse and is capped rather than rejected.
pub const MAX_RANGE_BOUND: u32 = 1_000;

/// Extracts the vocabulary range. Inverted bounds are swapped; zero bounds are
/// lifted to 1 and oversized ones capped to [`MAX_RANGE_BOUND`], preserving
/// the `1 <= low <= high` invariant. Returns `None` when no range marker is
/// present — callers must treat that as "not a vocabulary-quota request" and
/// skip all contract logic.
pub fn parse_range(prompt: &str) -> Option<VocabularyRange> {
    let caps = RANGE_RE.captures(prompt)?;
    let lo: u32 = caps[1].parse().ok()?;
    let hi: u32 = caps[2].parse().ok()?;
    Some(VocabularyRange::new(
        lo.clamp(1, MAX_RANGE_BOUND),
        hi.clamp(1, MAX_RANGE_BOUND),
    ))
}

/// Extracts the topic from the title marker, collapsing internal whitespace.
/// Defaults to "Topic" when absent.
pub fn parse_topic(prompt: &str) -> String {
    match TOPIC_RE.captures(prompt) {
        Some(caps) => WS_RE.replace_all(caps[1].trim(), " ").into_owned(),
        None => "Topic".to_string(),
    }
}

/// Parses the explicit section-selection marker, if present.
pub fn parse_selection_marker(prompt: &str) -> Option<SelectionMask> {
    let caps = SECTIONS_RE.captures(prompt)?;
    Some(SelectionMask::from_names(caps[1].split(',')))
}
