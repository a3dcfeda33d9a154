//! Homecast Core - Playback dispatch engine
//!
//! Resolves free-text "play X" requests to one of several playback backends:
//! a static alias catalog scored by a fuzzy matcher, a concurrent fan-out search
//! across every registered streaming adapter, and finally a local media library.
//! Backends are external collaborators reached only through the
//! [`PlaybackAdapter`] and [`LocalLibrary`] traits.

pub mod adapter;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod library;
pub mod matcher;
pub mod registry;
pub mod search;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use adapter::{
    AdapterError, PlayRequest, PlayTarget, PlaybackAdapter, QueryErrorRecord, QueryErrorSink,
    RemoteCandidate,
};
pub use catalog::{
    Catalog, CatalogEntry, CatalogError, ContentLookup, ContentSource, Directive,
    PlaybackOptions, normalize_id,
};
pub use config::HomecastConfig;
pub use dispatch::{Dispatcher, DispatcherBuilder, PlaybackOutcome, ResolutionStage};
pub use errors::{ConfigError, DispatchError};
pub use library::{LaunchHandle, LibraryError, LibraryFactory, LocalLibrary, LocalMedia};
pub use matcher::{CatalogMatch, FuzzyMatcher, MatchVerdict};
pub use registry::{AdapterFactory, AdapterRegistry};
pub use search::{Ranking, RemoteSearch, SearchOutcome};

/// Convenience type alias for Results with DispatchError.
pub type Result<T> = std::result::Result<T, DispatchError>;
