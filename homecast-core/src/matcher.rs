//! Fuzzy matching of free-text queries against the catalog.
//!
//! Voice transcription mangles titles ("criticle roll", "Haus"), so queries are
//! scored by Levenshtein distance divided by the catalog name's length. Raw edit
//! distance would unfairly penalize long titles; the length-normalized score
//! stays comparable across short and long names.

use std::sync::Arc;

use strsim::levenshtein;

use crate::catalog::{Catalog, Directive};

/// Default maximum score treated as a confident catalog hit.
pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.25;

/// Scores `query` against one catalog `name`.
///
/// Returns `0.0` for an exact (case-insensitive) match. Scores usually fall in
/// `[0, 1]` but exceed 1 when the query is much longer than the name.
pub fn match_score(query: &str, name: &str) -> f64 {
    let query = query.trim().to_lowercase();
    let name = name.trim().to_lowercase();
    let name_length = name.chars().count();

    if name_length == 0 {
        return if query.is_empty() { 0.0 } else { f64::INFINITY };
    }

    levenshtein(&query, &name) as f64 / name_length as f64
}

/// Best-scoring catalog name for a query.
#[derive(Debug, Clone)]
pub struct CatalogMatch {
    /// Catalog name (canonical or alias) that scored best
    pub name: String,
    /// Directive behind that name
    pub directive: Arc<Directive>,
    /// Length-normalized edit distance; lower is better
    pub score: f64,
}

/// Outcome of scoring a query against the catalog.
#[derive(Debug, Clone)]
pub enum MatchVerdict {
    /// Best match scored within the acceptance threshold
    Accepted(CatalogMatch),
    /// No name scored within the threshold; carries the closest for logging
    Rejected {
        /// Closest name, absent only for an empty catalog
        closest: Option<CatalogMatch>,
    },
}

/// Threshold-gated fuzzy matcher.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    accept_threshold: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPT_THRESHOLD)
    }
}

impl FuzzyMatcher {
    /// Creates a matcher accepting scores up to `accept_threshold`.
    ///
    /// Negative or non-finite thresholds are treated as `0.0` (exact matches only).
    pub fn new(accept_threshold: f64) -> Self {
        let accept_threshold = if accept_threshold.is_finite() {
            accept_threshold.max(0.0)
        } else {
            0.0
        };
        Self { accept_threshold }
    }

    /// Acceptance threshold in use.
    pub fn accept_threshold(&self) -> f64 {
        self.accept_threshold
    }

    /// Lowest-scoring name in the catalog, accepted or not.
    ///
    /// Ties go to the name that appears first in the catalog.
    pub fn best_match(&self, query: &str, catalog: &Catalog) -> Option<CatalogMatch> {
        let mut best: Option<CatalogMatch> = None;

        for entry in catalog.entries() {
            let score = match_score(query, &entry.name);
            if best.as_ref().is_none_or(|current| score < current.score) {
                best = Some(CatalogMatch {
                    name: entry.name.clone(),
                    directive: Arc::clone(&entry.directive),
                    score,
                });
            }
        }

        best
    }

    /// Scores `query` and decides whether the best match is confident enough.
    pub fn evaluate(&self, query: &str, catalog: &Catalog) -> MatchVerdict {
        match self.best_match(query, catalog) {
            Some(best) if best.score <= self.accept_threshold => MatchVerdict::Accepted(best),
            closest => MatchVerdict::Rejected { closest },
        }
    }

    /// Accepted match for `query`, if any.
    pub fn find(&self, query: &str, catalog: &Catalog) -> Option<CatalogMatch> {
        match self.evaluate(query, catalog) {
            MatchVerdict::Accepted(found) => Some(found),
            MatchVerdict::Rejected { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::catalog::CatalogEntry;

    fn catalog() -> Catalog {
        Catalog::build([
            CatalogEntry::new(["Critical Role"], "youtube", "PL123"),
            CatalogEntry::new(["House", "Haus"], "amazon", "B000W0H3DK"),
            CatalogEntry::new(["Lost"], "hulu", "466b3994"),
            CatalogEntry::new(["Good Place"], "hulu", "f11df77f"),
        ])
        .unwrap()
    }

    #[test]
    fn test_exact_match_scores_zero() {
        let found = FuzzyMatcher::default()
            .find("critical role", &catalog())
            .unwrap();
        assert_eq!(found.score, 0.0);
        assert_eq!(found.directive.content_id(), Some("PL123"));
    }

    #[test]
    fn test_transcription_typo_is_accepted() {
        let found = FuzzyMatcher::default()
            .find("criticle roll", &catalog())
            .unwrap();
        assert_eq!(found.name, "Critical Role");
        assert!((found.score - 3.0 / 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_alias_matches() {
        let found = FuzzyMatcher::default().find("haus", &catalog()).unwrap();
        assert_eq!(found.name, "Haus");
        assert_eq!(found.directive.canonical_name(), "House");
    }

    #[test]
    fn test_unrelated_query_is_rejected() {
        match FuzzyMatcher::default().evaluate("some totally unrelated show", &catalog()) {
            MatchVerdict::Rejected { closest } => {
                let closest = closest.unwrap();
                assert!(closest.score > DEFAULT_ACCEPT_THRESHOLD);
            }
            MatchVerdict::Accepted(found) => panic!("unexpected match {}", found.name),
        }
    }

    #[test]
    fn test_score_is_length_normalized() {
        // One edit against a long title is more forgivable than against a short one
        assert!(match_score("good plase", "Good Place") < match_score("lust", "Lost"));
        assert_eq!(match_score("lost", "Lost"), 0.0);
        assert_eq!(match_score("lust", "Lost"), 0.25);
    }

    #[test]
    fn test_score_can_exceed_one() {
        assert!(match_score("a much longer query than the name", "Lost") > 1.0);
    }

    #[test]
    fn test_ties_go_to_catalog_order() {
        let catalog = Catalog::build([
            CatalogEntry::new(["abcd"], "first", "1"),
            CatalogEntry::new(["abce"], "second", "2"),
        ])
        .unwrap();

        let found = FuzzyMatcher::new(1.0).find("abcx", &catalog).unwrap();
        assert_eq!(found.directive.backend(), "first");
    }

    #[test]
    fn test_empty_catalog_is_no_match() {
        let empty = Catalog::default();
        assert!(FuzzyMatcher::default().find("anything", &empty).is_none());
        assert!(matches!(
            FuzzyMatcher::default().evaluate("anything", &empty),
            MatchVerdict::Rejected { closest: None }
        ));
    }

    #[test]
    fn test_threshold_sanitized() {
        assert_eq!(FuzzyMatcher::new(-1.0).accept_threshold(), 0.0);
        assert_eq!(FuzzyMatcher::new(f64::NAN).accept_threshold(), 0.0);
        assert_eq!(FuzzyMatcher::new(0.2).accept_threshold(), 0.2);
    }

    #[test]
    fn test_strict_threshold_rejects_typo() {
        assert!(FuzzyMatcher::new(0.2).find("criticle roll", &catalog()).is_none());
    }

    proptest! {
        #[test]
        fn prop_exact_names_score_zero(name in "[A-Za-z][A-Za-z0-9 ]{0,30}") {
            prop_assert_eq!(match_score(&name, &name), 0.0);
        }

        #[test]
        fn prop_scores_are_non_negative(query in ".{0,30}", name in ".{1,30}") {
            prop_assert!(match_score(&query, &name) >= 0.0);
        }
    }
}
