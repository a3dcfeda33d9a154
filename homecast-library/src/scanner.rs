//! Recursive media folder scanning.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::{debug, warn};

/// A video file found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    /// Full path to the file
    pub path: PathBuf,
    /// Title extracted from the file name
    pub title: String,
    /// File size in bytes
    pub size: u64,
}

/// Scans folders for video files with one of `extensions`.
///
/// Folders that do not exist or cannot be read are logged and skipped, so one
/// unplugged drive does not hide the rest of the library.
pub async fn scan_folders(dirs: &[PathBuf], extensions: &[String]) -> Vec<ScannedFile> {
    let extensions: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
    let mut files = Vec::new();

    for dir in dirs {
        match scan_directory_recursive(dir, &extensions, &mut files).await {
            Ok(count) => debug!(dir = %dir.display(), count, "Scanned media folder"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to scan media folder"),
        }
    }

    files
}

type ScanFuture<'a> = Pin<Box<dyn Future<Output = Result<usize, std::io::Error>> + Send + 'a>>;

fn scan_directory_recursive<'a>(
    dir: &'a Path,
    extensions: &'a [String],
    files: &'a mut Vec<ScannedFile>,
) -> ScanFuture<'a> {
    Box::pin(async move {
        let mut count = 0;
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                if is_skipped_dir(&path) {
                    continue;
                }

                match scan_directory_recursive(&path, extensions, files).await {
                    Ok(subcount) => count += subcount,
                    Err(e) => warn!(dir = %path.display(), error = %e, "Failed to scan subfolder"),
                }
            } else if file_type.is_file()
                && has_video_extension(&path, extensions)
                && let Ok(metadata) = entry.metadata().await
            {
                let title = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(clean_title)
                    .unwrap_or_default();
                if title.is_empty() {
                    continue;
                }

                files.push(ScannedFile {
                    path,
                    title,
                    size: metadata.len(),
                });
                count += 1;
            }
        }

        Ok(count)
    })
}

fn is_skipped_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            name.starts_with('.')
                || matches!(
                    name,
                    "$RECYCLE.BIN" | "System Volume Information" | "lost+found" | "@eaDir"
                )
        })
}

fn has_video_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext))
}

/// Extracts a human title from a file stem.
///
/// Drops bracketed tags, release years and everything from the first quality
/// marker on, then turns separators into single spaces.
pub fn clean_title(stem: &str) -> String {
    let mut title = stem.to_string();

    if let Ok(re) = regex::Regex::new(r"[\[\(].*?[\]\)]") {
        title = re.replace_all(&title, "").to_string();
    }

    if let Ok(re) = regex::Regex::new(
        r"(?i)[ ._-](2160p|1080p|720p|480p|bluray|brrip|webrip|web-dl|dvdrip|hdtv|x264|x265|h264|h265)\b",
    ) && let Some(found) = re.find(&title)
    {
        title.truncate(found.start());
    }

    if let Ok(re) = regex::Regex::new(r"\b(19|20)\d{2}\b") {
        title = re.replace_all(&title, "").to_string();
    }

    title
        .replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string()
}
