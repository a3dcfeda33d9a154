//! Alias catalog of known titles.
//!
//! The catalog is built once at startup from a code-defined list of entries and
//! never mutated. Every name of every entry is normalized into a stable id; two
//! entries sharing an id is a configuration mistake that is recorded (and
//! rejected by [`Catalog::build_strict`]) rather than silently masked.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::AdapterError;

mod share_url;

pub use share_url::{ShareUrl, parse_share_url};

/// Normalizes a title or alias into a catalog id.
///
/// Lower-cases, collapses every run of non-alphanumeric characters into a single
/// `-` and trims separators from both ends: `"Brooklyn Nine - Nine"` becomes
/// `"brooklyn-nine-nine"`.
pub fn normalize_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !id.is_empty() {
                id.push('-');
            }
            pending_separator = false;
            id.push(c);
        } else {
            pending_separator = true;
        }
    }

    id
}

/// Options forwarded verbatim to the adapter's `play`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    /// Resume where the viewer left off instead of starting fresh
    pub resume: bool,
    /// Content id to never resume into
    pub skip_marker: Option<String>,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            resume: true,
            skip_marker: None,
        }
    }
}

/// Dynamic content resolution for directives without a static content id.
///
/// Used for entries like "the next unwatched episode after a cutoff", where the
/// content id is only known at request time.
#[async_trait]
pub trait ContentLookup: Send + Sync + std::fmt::Debug {
    /// Resolves the content id to play for `directive`.
    ///
    /// # Errors
    /// - `AdapterError::LookupFailed` - Nothing suitable could be resolved
    /// - `AdapterError::Network` - The lookup's own backend calls failed
    async fn resolve(&self, directive: &Directive) -> Result<String, AdapterError>;
}

/// Where a directive's content id comes from.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// Fixed content id
    Static(String),
    /// Resolved per request
    Lookup(Arc<dyn ContentLookup>),
}

/// A catalog entry describing how to play a known title.
#[derive(Debug, Clone)]
pub struct Directive {
    names: Vec<String>,
    backend: String,
    source: ContentSource,
    options: PlaybackOptions,
}

impl Directive {
    /// Canonical (first) name.
    pub fn canonical_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_default()
    }

    /// Canonical name followed by every alias.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Registry name of the adapter that plays this directive.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Content source of the directive.
    pub fn source(&self) -> &ContentSource {
        &self.source
    }

    /// Static content id, if the directive has one.
    pub fn content_id(&self) -> Option<&str> {
        match &self.source {
            ContentSource::Static(id) => Some(id),
            ContentSource::Lookup(_) => None,
        }
    }

    /// Playback options for the directive.
    pub fn options(&self) -> &PlaybackOptions {
        &self.options
    }
}

/// Builder input for one catalog directive.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    directive: Directive,
}

impl CatalogEntry {
    /// Entry with a static content id.
    pub fn new<N, S>(names: N, backend: impl Into<String>, content_id: impl Into<String>) -> Self
    where
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_source(names, backend, ContentSource::Static(content_id.into()))
    }

    /// Entry whose content id is resolved per request.
    pub fn with_lookup<N, S>(
        names: N,
        backend: impl Into<String>,
        lookup: Arc<dyn ContentLookup>,
    ) -> Self
    where
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_source(names, backend, ContentSource::Lookup(lookup))
    }

    /// Entry described by a service share URL.
    ///
    /// The backend and content id are inferred from the URL; a `skip` query
    /// parameter becomes the entry's skip marker.
    ///
    /// # Errors
    /// - `CatalogError::InvalidUrl` - URL does not parse
    /// - `CatalogError::UnsupportedUrl` - URL belongs to no known service
    pub fn from_share_url<N, S>(names: N, url: &str) -> Result<Self, CatalogError>
    where
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parsed = parse_share_url(url)?;
        let mut entry = Self::new(names, parsed.backend, parsed.content_id);
        entry.directive.options.skip_marker = parsed.skip_marker;
        Ok(entry)
    }

    fn with_source<N, S>(names: N, backend: impl Into<String>, source: ContentSource) -> Self
    where
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            directive: Directive {
                names: names.into_iter().map(Into::into).collect(),
                backend: backend.into(),
                source,
                options: PlaybackOptions::default(),
            },
        }
    }

    /// Replaces the entry's playback options.
    pub fn with_options(mut self, options: PlaybackOptions) -> Self {
        self.directive.options = options;
        self
    }

    /// Never resume this entry; always start fresh.
    pub fn without_resume(mut self) -> Self {
        self.directive.options.resume = false;
        self
    }

    /// Never resume into `content_id`.
    pub fn skipping(mut self, content_id: impl Into<String>) -> Self {
        self.directive.options.skip_marker = Some(content_id.into());
        self
    }
}

/// Errors raised while building the catalog.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    /// Two entries normalize to the same id.
    #[error("Catalog id '{id}' is claimed by both '{first}' and '{second}'")]
    DuplicateName {
        /// The shared normalized id
        id: String,
        /// Name from the earlier entry
        first: String,
        /// Name from the later entry, which wins the lookup
        second: String,
    },

    /// An entry has no names, or a name normalizes to nothing.
    #[error("Catalog entry for backend '{backend}' has an empty name")]
    EmptyName {
        /// Backend of the offending entry
        backend: String,
    },

    /// A share URL failed to parse.
    #[error("Invalid share URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as written
        url: String,
        /// Parser message
        reason: String,
    },

    /// A share URL belongs to no service this catalog understands.
    #[error("Unsupported share URL '{url}'")]
    UnsupportedUrl {
        /// The URL as written
        url: String,
    },
}

/// One name in lookup order, pointing at its directive.
#[derive(Debug, Clone)]
pub struct NamedEntry {
    /// Normalized id
    pub id: String,
    /// Name as written in the catalog
    pub name: String,
    /// Directive the name resolves to
    pub directive: Arc<Directive>,
}

/// Static lookup table of titles.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<NamedEntry>,
    by_id: HashMap<String, usize>,
    collisions: Vec<CatalogError>,
}

impl Catalog {
    /// Builds a catalog, recording (not rejecting) id collisions.
    ///
    /// A later name overwrites an earlier one with the same id in place, so the
    /// surviving name keeps the earlier position in match order.
    ///
    /// # Errors
    /// - `CatalogError::EmptyName` - An entry has no usable name
    pub fn build(entries: impl IntoIterator<Item = CatalogEntry>) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();

        for entry in entries {
            let directive = Arc::new(entry.directive);
            if directive.names.is_empty() {
                return Err(CatalogError::EmptyName {
                    backend: directive.backend.clone(),
                });
            }

            for name in &directive.names {
                let id = normalize_id(name);
                if id.is_empty() {
                    return Err(CatalogError::EmptyName {
                        backend: directive.backend.clone(),
                    });
                }

                let named = NamedEntry {
                    id: id.clone(),
                    name: name.clone(),
                    directive: Arc::clone(&directive),
                };

                match catalog.by_id.get(&id) {
                    Some(&index) => {
                        let previous = std::mem::replace(&mut catalog.entries[index], named);
                        tracing::warn!(
                            id = %id,
                            first = %previous.name,
                            second = %name,
                            "Duplicate catalog id; later entry wins"
                        );
                        catalog.collisions.push(CatalogError::DuplicateName {
                            id,
                            first: previous.name,
                            second: name.clone(),
                        });
                    }
                    None => {
                        catalog.by_id.insert(id, catalog.entries.len());
                        catalog.entries.push(named);
                    }
                }
            }
        }

        Ok(catalog)
    }

    /// Builds a catalog, failing on the first id collision.
    ///
    /// # Errors
    /// - `CatalogError::DuplicateName` - Two names normalize to the same id
    /// - `CatalogError::EmptyName` - An entry has no usable name
    pub fn build_strict(
        entries: impl IntoIterator<Item = CatalogEntry>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::build(entries)?;
        if !catalog.collisions.is_empty() {
            return Err(catalog.collisions.swap_remove(0));
        }
        Ok(catalog)
    }

    /// Looks up a directive by id. The id is normalized first.
    pub fn lookup(&self, id: &str) -> Option<Arc<Directive>> {
        self.by_id
            .get(&normalize_id(id))
            .map(|&index| Arc::clone(&self.entries[index].directive))
    }

    /// Every name in match order.
    pub fn entries(&self) -> &[NamedEntry] {
        &self.entries
    }

    /// Distinct directives in catalog order.
    pub fn directives(&self) -> Vec<Arc<Directive>> {
        let mut seen: Vec<&Arc<Directive>> = Vec::new();
        for entry in &self.entries {
            if !seen.iter().any(|d| Arc::ptr_eq(d, &entry.directive)) {
                seen.push(&entry.directive);
            }
        }
        seen.into_iter().cloned().collect()
    }

    /// Id collisions detected while building.
    pub fn collisions(&self) -> &[CatalogError] {
        &self.collisions
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample_catalog() -> Catalog {
        Catalog::build([
            CatalogEntry::new(["Critical Role"], "youtube", "PL123"),
            CatalogEntry::new(["Workout", "A workout"], "youtube", "PLwork").without_resume(),
            CatalogEntry::new(["House", "Haus"], "amazon", "B000W0H3DK"),
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("Critical Role"), "critical-role");
        assert_eq!(normalize_id("Brooklyn Nine - Nine"), "brooklyn-nine-nine");
        assert_eq!(normalize_id("a bee ' s"), "a-bee-s");
        assert_eq!(normalize_id("  MyQ!  "), "myq");
        assert_eq!(normalize_id("Campaign 2"), "campaign-2");
    }

    #[test]
    fn test_lookup_by_any_alias() {
        let catalog = sample_catalog();

        let house = catalog.lookup("haus").unwrap();
        assert_eq!(house.canonical_name(), "House");
        assert_eq!(house.backend(), "amazon");

        let workout = catalog.lookup("A Workout").unwrap();
        assert_eq!(workout.content_id(), Some("PLwork"));
        assert!(!workout.options().resume);

        assert!(catalog.lookup("unknown-id").is_none());
    }

    #[test]
    fn test_aliases_share_one_directive() {
        let catalog = sample_catalog();
        let a = catalog.lookup("workout").unwrap();
        let b = catalog.lookup("a-workout").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.directives().len(), 3);
    }

    #[test]
    fn test_duplicate_id_is_recorded_and_later_wins() {
        let catalog = Catalog::build([
            CatalogEntry::new(["Lost"], "hulu", "first"),
            CatalogEntry::new(["LOST!"], "hbo", "second"),
        ])
        .unwrap();

        assert_eq!(catalog.lookup("lost").unwrap().content_id(), Some("second"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.collisions(),
            &[CatalogError::DuplicateName {
                id: "lost".to_string(),
                first: "Lost".to_string(),
                second: "LOST!".to_string(),
            }]
        );

        let copy = catalog.clone();
        assert_eq!(copy.collisions(), catalog.collisions());
        assert_eq!(copy.lookup("lost").unwrap().content_id(), Some("second"));
    }

    #[test]
    fn test_strict_build_rejects_duplicates() {
        let result = Catalog::build_strict([
            CatalogEntry::new(["Lost"], "hulu", "first"),
            CatalogEntry::new(["lost"], "hulu", "second"),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateName { .. })));

        assert!(Catalog::build_strict([CatalogEntry::new(["Lost"], "hulu", "x")]).is_ok());
    }

    #[test]
    fn test_empty_names_rejected() {
        let no_names: [&str; 0] = [];
        assert!(matches!(
            Catalog::build([CatalogEntry::new(no_names, "hulu", "x")]),
            Err(CatalogError::EmptyName { .. })
        ));
        assert!(matches!(
            Catalog::build([CatalogEntry::new(["?!"], "hulu", "x")]),
            Err(CatalogError::EmptyName { .. })
        ));
    }

    #[test]
    fn test_skipping_sets_marker() {
        let entry =
            CatalogEntry::new(["Critical Role"], "youtube", "PL123").skipping("hi5pEHs76TE");
        let catalog = Catalog::build([entry]).unwrap();
        let directive = catalog.lookup("critical role").unwrap();
        assert_eq!(
            directive.options().skip_marker.as_deref(),
            Some("hi5pEHs76TE")
        );
        assert!(directive.options().resume);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::build(Vec::<CatalogEntry>::new()).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.lookup("anything").is_none());
    }

    proptest! {
        #[test]
        fn prop_normalize_id_is_idempotent(name in ".{0,40}") {
            let once = normalize_id(&name);
            prop_assert_eq!(normalize_id(&once), once.clone());
        }

        #[test]
        fn prop_normalize_id_alphabet(name in ".{0,40}") {
            let id = normalize_id(&name);
            prop_assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!id.starts_with('-') && !id.ends_with('-'));
            prop_assert!(!id.contains("--"));
        }
    }
}
