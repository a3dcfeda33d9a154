//! Phonetic title index over scanned media.

use std::path::PathBuf;

use strsim::normalized_levenshtein;

use crate::phonetic::{key_similarity, title_key};
use crate::scanner::ScannedFile;

/// Minimum phonetic similarity for a title to count as a match.
pub const MIN_PHONETIC_SIMILARITY: f64 = 0.5;

#[derive(Debug, Clone)]
struct IndexedMedia {
    title: String,
    path: PathBuf,
    key: Vec<String>,
}

/// A title found in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    /// Indexed title
    pub title: String,
    /// File backing the title
    pub path: PathBuf,
    /// Phonetic similarity in `[0, 1]`
    pub similarity: f64,
}

/// Immutable phonetic index, built once per scan.
#[derive(Debug, Clone, Default)]
pub struct MediaIndex {
    items: Vec<IndexedMedia>,
    min_similarity: f64,
}

impl MediaIndex {
    /// Indexes scanned files.
    pub fn new(files: impl IntoIterator<Item = ScannedFile>) -> Self {
        let items = files
            .into_iter()
            .map(|file| IndexedMedia {
                key: title_key(&file.title),
                title: file.title,
                path: file.path,
            })
            .filter(|item| !item.key.is_empty())
            .collect();

        Self {
            items,
            min_similarity: MIN_PHONETIC_SIMILARITY,
        }
    }

    /// Overrides the minimum phonetic similarity.
    pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = min_similarity.clamp(0.0, 1.0);
        self
    }

    /// Number of indexed titles.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Best phonetic match for `query`.
    ///
    /// Titles sounding equally close are told apart by spelling similarity; a
    /// full tie goes to the title scanned first.
    pub fn find(&self, query: &str) -> Option<IndexMatch> {
        let query_key = title_key(query);
        if query_key.is_empty() {
            return None;
        }
        let query_lower = query.to_lowercase();

        let mut best: Option<(f64, f64, &IndexedMedia)> = None;
        for item in &self.items {
            let similarity = key_similarity(&query_key, &item.key);
            if similarity < self.min_similarity || similarity == 0.0 {
                continue;
            }

            let spelling = normalized_levenshtein(&query_lower, &item.title.to_lowercase());
            let better = best.is_none_or(|(best_similarity, best_spelling, _)| {
                similarity > best_similarity
                    || (similarity == best_similarity && spelling > best_spelling)
            });
            if better {
                best = Some((similarity, spelling, item));
            }
        }

        best.map(|(similarity, _, item)| IndexMatch {
            title: item.title.clone(),
            path: item.path.clone(),
            similarity,
        })
    }
}
