//! Centralized configuration for Homecast.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase. Defaults can be overridden from the
//! environment or from a JSON file in which every field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::matcher::DEFAULT_ACCEPT_THRESHOLD;
use crate::search::Ranking;

/// Central configuration for all Homecast components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomecastConfig {
    pub matching: MatchingConfig,
    pub search: SearchConfig,
    pub library: LibraryConfig,
    pub device: DeviceConfig,
}

/// Catalog matching configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Highest fuzzy score still treated as a confident catalog hit
    pub accept_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
        }
    }
}

/// How remote candidates are ranked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingPolicy {
    /// First candidate to arrive wins
    #[default]
    FirstYielded,
    /// Wait for all adapters and pick the most relevant candidate
    Relevance,
}

impl RankingPolicy {
    /// Ranking implementing this policy.
    pub fn ranking(self) -> Ranking {
        match self {
            RankingPolicy::FirstYielded => Ranking::FirstYielded,
            RankingPolicy::Relevance => Ranking::by_relevance(),
        }
    }
}

/// Remote fan-out search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidate selection policy
    pub ranking: RankingPolicy,
    /// Stop waiting for adapters after this many milliseconds (None = wait for all)
    pub deadline_ms: Option<u64>,
    /// Keep draining abandoned adapters so their late errors are logged
    pub drain_late_errors: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ranking: RankingPolicy::FirstYielded,
            deadline_ms: None,
            drain_late_errors: true,
        }
    }
}

impl SearchConfig {
    /// Search deadline as a duration.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Local media library configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Folders scanned recursively for video files
    pub media_dirs: Vec<PathBuf>,
    /// File extensions treated as video, lower case without the dot
    pub video_extensions: Vec<String>,
    /// Player executable launched for local playback
    pub player_command: String,
    /// Arguments passed before the media path
    pub player_args: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            media_dirs: Vec::new(),
            video_extensions: ["mp4", "mkv", "avi", "mov", "m4v", "webm", "wmv"]
                .into_iter()
                .map(String::from)
                .collect(),
            player_command: "vlc".to_string(),
            player_args: vec!["--fullscreen".to_string()],
        }
    }
}

/// Cast target configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Friendly name of the cast device adapters play to
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Family Room TV".to_string(),
        }
    }
}

impl HomecastConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and leave the default in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(threshold) = std::env::var("HOMECAST_ACCEPT_THRESHOLD")
            && let Ok(value) = threshold.parse::<f64>()
            && value.is_finite()
            && value >= 0.0
        {
            config.matching.accept_threshold = value;
        }

        if let Ok(dirs) = std::env::var("HOMECAST_MEDIA_DIR") {
            config.library.media_dirs = std::env::split_paths(&dirs)
                .filter(|path| !path.as_os_str().is_empty())
                .collect();
        }

        if let Ok(name) = std::env::var("HOMECAST_DEVICE_NAME")
            && !name.trim().is_empty()
        {
            config.device.name = name;
        }

        if let Ok(command) = std::env::var("HOMECAST_PLAYER_COMMAND")
            && !command.trim().is_empty()
        {
            config.library.player_command = command;
        }

        config
    }

    /// Loads configuration from a JSON file; missing fields keep their defaults.
    ///
    /// # Errors
    /// - `ConfigError::Read` - File could not be read
    /// - `ConfigError::Parse` - File is not valid configuration JSON
    /// - `ConfigError::InvalidValue` - A value failed validation
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` - The first offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.matching.accept_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "matching.accept_threshold".to_string(),
                reason: format!("must be a finite number >= 0, got {threshold}"),
            });
        }

        if self.search.deadline_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "search.deadline_ms".to_string(),
                reason: "must be positive when set".to_string(),
            });
        }

        if self.library.player_command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "library.player_command".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.device.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "device.name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            search: SearchConfig {
                deadline_ms: Some(2_000),
                ..SearchConfig::default()
            },
            library: LibraryConfig {
                player_command: "true".to_string(),
                player_args: Vec::new(),
                ..LibraryConfig::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = HomecastConfig::default();

        assert_eq!(config.matching.accept_threshold, DEFAULT_ACCEPT_THRESHOLD);
        assert_eq!(config.search.ranking, RankingPolicy::FirstYielded);
        assert_eq!(config.search.deadline(), None);
        assert!(config.search.drain_late_errors);
        assert!(config.library.media_dirs.is_empty());
        assert!(config.library.video_extensions.contains(&"mkv".to_string()));
        assert_eq!(config.device.name, "Family Room TV");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_preset() {
        let config = HomecastConfig::for_testing();
        assert_eq!(config.search.deadline(), Some(Duration::from_secs(2)));
        assert_eq!(config.library.player_command, "true");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "matching": {{ "accept_threshold": 0.3 }}, "search": {{ "ranking": "relevance" }} }}"#
        )
        .unwrap();

        let config = HomecastConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.matching.accept_threshold, 0.3);
        assert_eq!(config.search.ranking, RankingPolicy::Relevance);
        assert!(config.search.drain_late_errors);
        assert_eq!(config.device.name, "Family Room TV");
    }

    #[test]
    fn test_json_validation_rejects_negative_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "matching": {{ "accept_threshold": -1.0 }} }}"#).unwrap();

        let result = HomecastConfig::from_json_file(file.path());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_json_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            HomecastConfig::from_json_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        assert!(matches!(
            HomecastConfig::from_json_file(Path::new("/nonexistent/homecast.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        // SAFETY: this is the only test in the crate touching these variables
        unsafe {
            std::env::set_var("HOMECAST_ACCEPT_THRESHOLD", "0.4");
            std::env::set_var("HOMECAST_DEVICE_NAME", "Bedroom TV");
            std::env::set_var("HOMECAST_PLAYER_COMMAND", "mpv");
        }

        let config = HomecastConfig::from_env();
        assert_eq!(config.matching.accept_threshold, 0.4);
        assert_eq!(config.device.name, "Bedroom TV");
        assert_eq!(config.library.player_command, "mpv");

        unsafe {
            std::env::set_var("HOMECAST_ACCEPT_THRESHOLD", "not-a-number");
        }
        let config = HomecastConfig::from_env();
        assert_eq!(config.matching.accept_threshold, DEFAULT_ACCEPT_THRESHOLD);

        unsafe {
            std::env::remove_var("HOMECAST_ACCEPT_THRESHOLD");
            std::env::remove_var("HOMECAST_DEVICE_NAME");
            std::env::remove_var("HOMECAST_PLAYER_COMMAND");
        }
    }
}
