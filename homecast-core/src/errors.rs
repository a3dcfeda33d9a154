//! Error types for playback dispatch.

use std::path::PathBuf;

use thiserror::Error;

use crate::adapter::{AdapterError, QueryErrorRecord};
use crate::catalog::CatalogError;
use crate::library::LibraryError;

/// Terminal outcome of a failed playback request.
///
/// Adapter query failures never appear here directly; they are collected as
/// [`QueryErrorRecord`]s during the fan-out and attached to [`DispatchError::NotFound`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `play_by_id` was given an id absent from the catalog.
    #[error("No such title: {id}")]
    UnknownId {
        /// The normalized id that was looked up
        id: String,
    },

    /// The selected candidate was handed to its adapter and the adapter refused it.
    #[error("Unable to play '{title}' on {adapter}: {source}")]
    PlaybackFailed {
        /// Title of the selected candidate
        title: String,
        /// Registry name of the adapter that failed
        adapter: String,
        /// Adapter failure
        #[source]
        source: AdapterError,
    },

    /// The local library found the title but could not launch it.
    #[error("Unable to play '{title}' from the local library: {source}")]
    LocalPlaybackFailed {
        /// Title of the local media item
        title: String,
        /// Library failure
        #[source]
        source: LibraryError,
    },

    /// Every stage failed to produce a playable candidate.
    #[error("Couldn't find anything for '{query}' ({} backend errors)", .diagnostics.len())]
    NotFound {
        /// The request as given by the caller
        query: String,
        /// Errors collected from every stage that reported one
        diagnostics: Vec<QueryErrorRecord>,
    },
}

impl DispatchError {
    /// Returns a short message suitable for speaking or displaying to the end user.
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::UnknownId { id } => format!("I don't know the title {id}"),
            DispatchError::PlaybackFailed { title, .. }
            | DispatchError::LocalPlaybackFailed { title, .. } => {
                format!("Unable to play {title}")
            }
            DispatchError::NotFound { query, .. } => format!("Couldn't find anything for {query}"),
        }
    }

    /// Checks if this error stems from the request itself rather than a backend.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DispatchError::UnknownId { .. } | DispatchError::NotFound { .. }
        )
    }

    /// Diagnostics attached to the error, empty for variants that carry none.
    pub fn diagnostics(&self) -> &[QueryErrorRecord] {
        match self {
            DispatchError::NotFound { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

/// Errors raised while assembling a dispatcher or loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A catalog directive targets an adapter that was never registered.
    #[error("Directive '{directive}' targets unregistered backend '{backend}'")]
    UnknownBackend {
        /// Canonical name of the offending directive
        directive: String,
        /// Backend name the directive asked for
        backend: String,
    },

    /// Two adapters were registered under the same name.
    #[error("Backend '{name}' registered twice")]
    DuplicateBackend {
        /// The repeated registry name
        name: String,
    },

    /// The catalog itself is invalid.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// A configuration value is out of range or malformed.
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue {
        /// Configuration key
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected shape.
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was parsed
        path: PathBuf,
        /// Underlying parse failure
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_counts_diagnostics() {
        let error = DispatchError::NotFound {
            query: "lost".to_string(),
            diagnostics: vec![
                QueryErrorRecord::new(
                    "hulu",
                    AdapterError::Network {
                        reason: "timeout".to_string(),
                    },
                ),
                QueryErrorRecord::new(
                    "hbo",
                    AdapterError::Unavailable {
                        reason: "no token".to_string(),
                    },
                ),
            ],
        };

        assert_eq!(
            error.to_string(),
            "Couldn't find anything for 'lost' (2 backend errors)"
        );
        assert_eq!(error.diagnostics().len(), 2);
        assert!(error.is_user_error());
    }

    #[test]
    fn test_user_messages() {
        let unknown = DispatchError::UnknownId {
            id: "nope".to_string(),
        };
        assert_eq!(unknown.user_message(), "I don't know the title nope");
        assert!(unknown.diagnostics().is_empty());

        let failed = DispatchError::PlaybackFailed {
            title: "Lost".to_string(),
            adapter: "hulu".to_string(),
            source: AdapterError::Rejected {
                reason: "device busy".to_string(),
            },
        };
        assert_eq!(failed.user_message(), "Unable to play Lost");
        assert!(!failed.is_user_error());
    }
}
