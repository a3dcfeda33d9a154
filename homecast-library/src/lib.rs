//! Homecast Library - Local media fallback
//!
//! Scans configured folders for video files, indexes their titles by sound
//! rather than spelling, and launches an external player for the best match.
//! Plugs into the dispatcher through [`homecast_core::LocalLibrary`].

pub mod index;
pub mod launcher;
pub mod phonetic;
pub mod scanner;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use homecast_core::config::LibraryConfig;
use homecast_core::{LaunchHandle, LibraryError, LibraryFactory, LocalLibrary, LocalMedia};
use tracing::{debug, info};

pub use index::{IndexMatch, MediaIndex};
pub use launcher::{CommandLauncher, PlayerLauncher};
pub use scanner::{ScannedFile, clean_title, scan_folders};

/// Scanned, phonetically indexed media library.
#[derive(Debug)]
pub struct MediaLibrary {
    index: MediaIndex,
    launcher: Arc<dyn PlayerLauncher>,
}

impl MediaLibrary {
    /// Creates a library over an existing index.
    pub fn new(index: MediaIndex, launcher: Arc<dyn PlayerLauncher>) -> Self {
        Self { index, launcher }
    }

    /// Scans the configured folders and indexes what it finds.
    pub async fn scan(config: &LibraryConfig, launcher: Arc<dyn PlayerLauncher>) -> Self {
        let files = scan_folders(&config.media_dirs, &config.video_extensions).await;
        let bytes: u64 = files.iter().map(|file| file.size).sum();
        let index = MediaIndex::new(files);
        info!(
            titles = index.len(),
            bytes,
            folders = config.media_dirs.len(),
            "Local media library indexed"
        );
        Self::new(index, launcher)
    }
}

#[async_trait]
impl LocalLibrary for MediaLibrary {
    async fn find_media(&self, title: &str) -> Result<Option<LocalMedia>, LibraryError> {
        let found = self.index.find(title).map(|found| LocalMedia {
            title: found.title,
            locator: found.path.to_string_lossy().into_owned(),
            score: found.similarity,
        });
        debug!(query = %title, found = ?found.as_ref().map(|m| &m.title), "Local library lookup");
        Ok(found)
    }

    async fn play(&self, media: &LocalMedia) -> Result<LaunchHandle, LibraryError> {
        let pid = self
            .launcher
            .launch(&media.title, &PathBuf::from(&media.locator))
            .await?;

        Ok(LaunchHandle {
            title: media.title.clone(),
            pid,
            started_at: Utc::now(),
        })
    }
}

/// Builds a [`MediaLibrary`] on first use by scanning the configured folders.
#[derive(Debug, Clone)]
pub struct MediaLibraryFactory {
    config: LibraryConfig,
    launcher: Arc<dyn PlayerLauncher>,
}

impl MediaLibraryFactory {
    /// Factory launching the configured player command.
    pub fn new(config: LibraryConfig) -> Self {
        let launcher: Arc<dyn PlayerLauncher> = Arc::new(CommandLauncher::new(
            config.player_command.clone(),
            config.player_args.clone(),
        ));
        Self { config, launcher }
    }

    /// Uses a different launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn PlayerLauncher>) -> Self {
        self.launcher = launcher;
        self
    }
}

#[async_trait]
impl LibraryFactory for MediaLibraryFactory {
    async fn build(&self) -> Result<Arc<dyn LocalLibrary>, LibraryError> {
        if self.config.media_dirs.is_empty() {
            return Err(LibraryError::Unavailable {
                reason: "no media folders configured".to_string(),
            });
        }

        let library = MediaLibrary::scan(&self.config, Arc::clone(&self.launcher)).await;
        Ok(Arc::new(library))
    }
}
