//! Local media library contract.
//!
//! The last-resort fallback: a locally scanned media set matched phonetically.
//! Index construction and the phonetic algorithm belong to the implementation;
//! the dispatcher only asks for a match and, on a hit, asks it to play.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A local media item that matched a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalMedia {
    /// Title as indexed
    pub title: String,
    /// Implementation-specific locator (usually a file path)
    pub locator: String,
    /// Match quality in `[0, 1]`, higher is better
    pub score: f64,
}

/// Handle to a launched local playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchHandle {
    /// Title that was launched
    pub title: String,
    /// Process id of the player, when playback runs in a child process
    pub pid: Option<u32>,
    /// When playback was launched
    pub started_at: DateTime<Utc>,
}

/// Errors from the local media library.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Scanning or reading the library failed.
    #[error("Library I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The library could not be constructed.
    #[error("Library unavailable: {reason}")]
    Unavailable {
        /// The reason the library is unavailable
        reason: String,
    },

    /// The player could not be started.
    #[error("Failed to launch '{title}': {reason}")]
    LaunchFailed {
        /// Title being launched
        title: String,
        /// Launcher failure
        reason: String,
    },
}

/// Trait for the local media library.
#[async_trait]
pub trait LocalLibrary: Send + Sync + std::fmt::Debug {
    /// Find the best local match for `title`.
    ///
    /// # Errors
    /// - `LibraryError::Io` - Index could not be read
    async fn find_media(&self, title: &str) -> Result<Option<LocalMedia>, LibraryError>;

    /// Start playback of a previously found item.
    ///
    /// # Errors
    /// - `LibraryError::LaunchFailed` - The player could not be started
    async fn play(&self, media: &LocalMedia) -> Result<LaunchHandle, LibraryError>;
}

/// Lazily builds the shared local library handle.
///
/// Building usually means scanning disk, so it happens once per process on first
/// use (or on warm-up) and the result is shared by every request.
#[async_trait]
pub trait LibraryFactory: Send + Sync {
    /// Construct the library.
    ///
    /// # Errors
    /// - `LibraryError::Io` - Media directories could not be scanned
    /// - `LibraryError::Unavailable` - Library could not be built for another reason
    async fn build(&self) -> Result<Arc<dyn LocalLibrary>, LibraryError>;
}

/// Factory handing out an already constructed library.
#[derive(Debug, Clone)]
pub struct ReadyLibrary(pub Arc<dyn LocalLibrary>);

#[async_trait]
impl LibraryFactory for ReadyLibrary {
    async fn build(&self) -> Result<Arc<dyn LocalLibrary>, LibraryError> {
        Ok(Arc::clone(&self.0))
    }
}
