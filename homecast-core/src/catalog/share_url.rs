//! Share URL parsing for catalog entries.
//!
//! Catalog entries are most naturally written as the URL a service shows in its
//! "share" dialog. This module recognizes the supported services and extracts the
//! backend name and content id from such URLs.

use url::Url;

use super::CatalogError;

/// Backend name, content id and skip marker extracted from a share URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareUrl {
    /// Registry name of the backend serving the URL
    pub backend: &'static str,
    /// Content id within that backend
    pub content_id: String,
    /// Content id to never resume into, from the `skip` query parameter
    pub skip_marker: Option<String>,
}

/// Parses a service share URL.
///
/// YouTube playlists yield the playlist id, suffixed with `:<index>` when the URL
/// starts part-way into the list (`list=WL&index=3` becomes `WL:3`).
///
/// # Errors
/// - `CatalogError::InvalidUrl` - URL does not parse
/// - `CatalogError::UnsupportedUrl` - URL belongs to no known service or lacks a content id
pub fn parse_share_url(raw: &str) -> Result<ShareUrl, CatalogError> {
    let url = Url::parse(raw).map_err(|e| CatalogError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    let unsupported = || CatalogError::UnsupportedUrl {
        url: raw.to_string(),
    };

    let host = url.host_str().ok_or_else(unsupported)?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };

    let (backend, content_id) = match (host, segments.as_slice()) {
        ("youtube.com" | "m.youtube.com", ["playlist"]) => {
            let list = query("list").ok_or_else(unsupported)?;
            let content_id = match query("index") {
                Some(index) => format!("{list}:{index}"),
                None => list,
            };
            ("youtube", content_id)
        }
        ("youtube.com" | "m.youtube.com", ["watch"]) => {
            ("youtube", query("v").ok_or_else(unsupported)?)
        }
        ("youtu.be", [video]) => ("youtube", (*video).to_string()),
        ("hulu.com", ["series", id]) => ("hulu", (*id).to_string()),
        ("play.hbogo.com" | "play.max.com", ["series", id]) => ("hbo", (*id).to_string()),
        ("amazon.com", ["gp", "video", "detail", id, ..]) => ("amazon", (*id).to_string()),
        _ => return Err(unsupported()),
    };

    Ok(ShareUrl {
        backend,
        content_id,
        skip_marker: query("skip"),
    })
}
