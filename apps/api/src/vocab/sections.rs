//! Section model — the four vocabulary categories under quota control plus the
//! two reuse sections (Common Phrases, Common Questions) that draw from them.

use serde::{Deserialize, Serialize};

/// One section of the study sheet. The first four are the quota-controlled
/// main categories; phrases and questions reuse their vocabulary and are
/// bounded by row count instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Nouns,
    Verbs,
    Adjectives,
    Adverbs,
    Phrases,
    Questions,
}

impl SectionKind {
    /// Main categories in the fixed remainder-correction order.
    pub const MAIN: [SectionKind; 4] = [
        SectionKind::Nouns,
        SectionKind::Verbs,
        SectionKind::Adjectives,
        SectionKind::Adverbs,
    ];

    pub const ALL: [SectionKind; 6] = [
        SectionKind::Nouns,
        SectionKind::Verbs,
        SectionKind::Adjectives,
        SectionKind::Adverbs,
        SectionKind::Phrases,
        SectionKind::Questions,
    ];

    /// Canonical quota weight. The main weights sum to 0.90; the residue is
    /// absorbed by the allocator's remainder correction, not a fifth bucket.
    pub fn weight(self) -> f64 {
        match self {
            SectionKind::Nouns | SectionKind::Verbs => 0.30,
            SectionKind::Adjectives | SectionKind::Adverbs => 0.15,
            SectionKind::Phrases | SectionKind::Questions => 0.0,
        }
    }

    /// Section heading exactly as it appears in the HTML skeleton.
    pub fn heading(self) -> &'static str {
        match self {
            SectionKind::Nouns => "Nouns",
            SectionKind::Verbs => "Verbs in Sentences",
            SectionKind::Adjectives => "Adjectives",
            SectionKind::Adverbs => "Adverbs",
            SectionKind::Phrases => "Common Phrases",
            SectionKind::Questions => "Common Questions",
        }
    }

    /// Whitespace-tolerant regex fragment matching the heading.
    pub fn heading_pattern(self) -> &'static str {
        match self {
            SectionKind::Nouns => r"Nouns",
            SectionKind::Verbs => r"Verbs\s+in\s+Sentences",
            SectionKind::Adjectives => r"Adjectives",
            SectionKind::Adverbs => r"Adverbs",
            SectionKind::Phrases => r"Common\s+Phrases",
            SectionKind::Questions => r"Common\s+Questions",
        }
    }

    /// Lowercase name used in the selection marker and violation messages.
    pub fn label(self) -> &'static str {
        match self {
            SectionKind::Nouns => "nouns",
            SectionKind::Verbs => "verbs",
            SectionKind::Adjectives => "adjectives",
            SectionKind::Adverbs => "adverbs",
            SectionKind::Phrases => "phrases",
            SectionKind::Questions => "questions",
        }
    }

    pub fn from_label(name: &str) -> Option<SectionKind> {
        let name = name.trim().to_ascii_lowercase();
        SectionKind::ALL.into_iter().find(|k| k.label() == name)
    }

    fn idx(self) -> usize {
        self as usize
    }
}

/// Which sections a request has opted into. Defaults to everything; a marker
/// or request field naming only unrecognized sections also falls back to
/// everything rather than generating an empty document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionMask {
    active: [bool; 6],
}

impl SelectionMask {
    pub fn all() -> Self {
        SelectionMask { active: [true; 6] }
    }

    pub fn none() -> Self {
        SelectionMask {
            active: [false; 6],
        }
    }

    /// Builds a mask from section names (comma-split marker values or the
    /// request's `sections` array). Unrecognized names are ignored; if nothing
    /// recognizable remains, the mask defaults to all sections.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mask = SelectionMask::none();
        let mut any = false;
        for name in names {
            if let Some(kind) = SectionKind::from_label(name.as_ref()) {
                mask.active[kind.idx()] = true;
                any = true;
            }
        }
        if any {
            mask
        } else {
            SelectionMask::all()
        }
    }

    pub fn without(mut self, kind: SectionKind) -> Self {
        self.active[kind.idx()] = false;
        self
    }

    pub fn is_active(&self, kind: SectionKind) -> bool {
        self.active[kind.idx()]
    }

    /// Active main categories, in the fixed allocation order.
    pub fn active_main(&self) -> Vec<SectionKind> {
        SectionKind::MAIN
            .into_iter()
            .filter(|&k| self.is_active(k))
            .collect()
    }

    pub fn has_main(&self) -> bool {
        !self.active_main().is_empty()
    }
}

impl Default for SelectionMask {
    fn default() -> Self {
        SelectionMask::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mask_activates_everything() {
        let mask = SelectionMask::default();
        for kind in SectionKind::ALL {
            assert!(mask.is_active(kind), "{:?} should be active", kind);
        }
    }

    #[test]
    fn test_from_names_subset() {
        let mask = SelectionMask::from_names(["nouns", "verbs", "phrases"]);
        assert!(mask.is_active(SectionKind::Nouns));
        assert!(mask.is_active(SectionKind::Verbs));
        assert!(mask.is_active(SectionKind::Phrases));
        assert!(!mask.is_active(SectionKind::Adjectives));
        assert!(!mask.is_active(SectionKind::Adverbs));
        assert!(!mask.is_active(SectionKind::Questions));
    }

    #[test]
    fn test_from_names_is_case_and_whitespace_tolerant() {
        let mask = SelectionMask::from_names([" Nouns ", "ADVERBS"]);
        assert!(mask.is_active(SectionKind::Nouns));
        assert!(mask.is_active(SectionKind::Adverbs));
        assert!(!mask.is_active(SectionKind::Verbs));
    }

    #[test]
    fn test_unrecognized_names_fall_back_to_all() {
        let mask = SelectionMask::from_names(["widgets", "gadgets"]);
        assert_eq!(mask, SelectionMask::all());

        let empty: [&str; 0] = [];
        assert_eq!(SelectionMask::from_names(empty), SelectionMask::all());
    }

    #[test]
    fn test_active_main_preserves_allocation_order() {
        let mask = SelectionMask::from_names(["adverbs", "nouns"]);
        assert_eq!(
            mask.active_main(),
            vec![SectionKind::Nouns, SectionKind::Adverbs]
        );
    }

    #[test]
    fn test_has_main_tracks_main_categories_only() {
        assert!(SelectionMask::default().has_main());
        assert!(!SelectionMask::from_names(["phrases", "questions"]).has_main());
        assert!(SelectionMask::from_names(["adverbs", "questions"]).has_main());
    }

    #[test]
    fn test_main_weights_sum_to_ninety_percent() {
        let sum: f64 = SectionKind::MAIN.iter().map(|k| k.weight()).sum();
        assert!((sum - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_from_label_round_trips() {
        for kind in SectionKind::ALL {
            assert_eq!(SectionKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(SectionKind::from_label("nonsense"), None);
    }
}
