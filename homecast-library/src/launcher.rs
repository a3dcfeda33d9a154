//! External player launching.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use homecast_core::LibraryError;
use tracing::{debug, warn};

/// Starts playback of a local file.
#[async_trait]
pub trait PlayerLauncher: Send + Sync + std::fmt::Debug {
    /// Launch playback of `path`, returning the player's process id if there is one.
    ///
    /// # Errors
    /// - `LibraryError::LaunchFailed` - The player could not be started
    async fn launch(&self, title: &str, path: &Path) -> Result<Option<u32>, LibraryError>;
}

/// Launches an external player executable per file.
///
/// The child is not awaited by the caller; a background task reaps it and logs
/// a non-zero exit.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    command: String,
    args: Vec<String>,
}

impl CommandLauncher {
    /// Creates a launcher running `command args... <path>`.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl PlayerLauncher for CommandLauncher {
    async fn launch(&self, title: &str, path: &Path) -> Result<Option<u32>, LibraryError> {
        let mut child = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LibraryError::LaunchFailed {
                title: title.to_string(),
                reason: format!("{}: {e}", self.command),
            })?;

        let pid = child.id();
        debug!(command = %self.command, path = %path.display(), ?pid, "Player launched");

        let command = self.command.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    warn!(command = %command, %status, "Player exited with an error");
                }
                Ok(_) => debug!(command = %command, "Player exited"),
                Err(e) => warn!(command = %command, error = %e, "Failed to wait for player"),
            }
        });

        Ok(pid)
    }
}
