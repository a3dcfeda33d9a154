//! Built-in title catalog and demo adapters.

use std::sync::Arc;

use async_trait::async_trait;
use homecast_core::adapter::DemoAdapter;
use homecast_core::{
    AdapterError, Catalog, CatalogEntry, CatalogError, ConfigError, ContentLookup, Directive,
    Dispatcher, HomecastConfig,
};
use homecast_library::MediaLibraryFactory;

/// Playlist holding every episode of Campaign Two.
const CAMPAIGN_TWO_PLAYLIST: &str = "PL1tiwbzkOjQxD0jjAE7PsWoaCrs0EkBH2";

/// Resolves the episode to continue a playlist from, using the last watched
/// video recorded in `HOMECAST_LAST_WATCHED`.
#[derive(Debug)]
struct ContinuePlaylist {
    playlist_id: &'static str,
}

#[async_trait]
impl ContentLookup for ContinuePlaylist {
    async fn resolve(&self, directive: &Directive) -> Result<String, AdapterError> {
        match std::env::var("HOMECAST_LAST_WATCHED") {
            Ok(video) if !video.trim().is_empty() => {
                Ok(format!("{}:{}", self.playlist_id, video.trim()))
            }
            _ => Err(AdapterError::LookupFailed {
                reason: format!(
                    "no watch history for '{}'",
                    directive.canonical_name()
                ),
            }),
        }
    }
}

/// The catalog of titles known by name.
///
/// # Errors
/// - `CatalogError::InvalidUrl` / `CatalogError::UnsupportedUrl` - A share URL is malformed
pub fn default_catalog() -> Result<Catalog, CatalogError> {
    let entries = vec![
        // Never resume into the one-shot that gets watched separately
        CatalogEntry::from_share_url(
            ["Critical Role"],
            "https://www.youtube.com/playlist?list=PL1tiwbzkOjQz7D0l_eLJGAISVtcL7oRu_&skip=hi5pEHs76TE",
        )?,
        CatalogEntry::with_lookup(
            ["Campaign Two", "Campaign 2"],
            "youtube",
            Arc::new(ContinuePlaylist {
                playlist_id: CAMPAIGN_TWO_PLAYLIST,
            }),
        ),
        CatalogEntry::from_share_url(
            ["Workout", "A workout"],
            "https://www.youtube.com/playlist?list=PLw6X_oq5Z8kmISsoG_HYn_WxcOKJDLO9V",
        )?
        .without_resume(),
        CatalogEntry::from_share_url(
            ["my campaign", "my queue", "MyQ"],
            "https://www.youtube.com/playlist?list=WL&index=0",
        )?,
        // The first three are long-running series kept for tracking
        CatalogEntry::from_share_url(
            ["my watch later", "my watch later playlist"],
            "https://www.youtube.com/playlist?list=WL&index=3",
        )?,
        CatalogEntry::from_share_url(
            ["Game of Thrones"],
            "https://play.hbogo.com/series/urn:hbo:series:GVU2cggagzYNJjhsJATwo",
        )?,
        // Voice recognition hears "Haus"
        CatalogEntry::from_share_url(
            ["House", "Haus"],
            "https://www.amazon.com/gp/video/detail/B000W0H3DK",
        )?,
        CatalogEntry::from_share_url(
            ["Eureka"],
            "https://www.amazon.com/gp/video/detail/B000U6BT40",
        )?,
        // How "Abby's" comes out of speech recognition
        CatalogEntry::from_share_url(
            ["a bee ' s"],
            "https://www.hulu.com/series/abbys-e41c66f8-cc43-4eff-855e-94b2fc81ea86",
        )?,
        CatalogEntry::from_share_url(
            ["Blindspot"],
            "https://www.hulu.com/series/626ff449-811f-44ad-94cd-2d48c2063619",
        )?,
        CatalogEntry::from_share_url(
            ["Brooklyn Nine - Nine"],
            "https://www.hulu.com/series/daf48b7a-6cd7-4ef6-b639-a4811ec95232",
        )?,
        CatalogEntry::from_share_url(
            ["Good Place"],
            "https://www.hulu.com/series/f11df77f-115e-4eba-8efa-264f0ff322d0",
        )?,
        CatalogEntry::from_share_url(
            ["Lost"],
            "https://www.hulu.com/series/466b3994-b574-44f1-88bc-63707507a6cb",
        )?,
        CatalogEntry::from_share_url(
            ["Manifest"],
            "https://www.hulu.com/series/a1e5ed46-2704-431e-94b0-9aea1560c712",
        )?,
        CatalogEntry::from_share_url(
            ["Rookie"],
            "https://www.hulu.com/series/1138ee62-b9d9-4561-8094-3f7cda4bbd22",
        )?,
    ];

    Catalog::build_strict(entries)
}

fn demo_adapters(device: &str) -> Vec<(&'static str, DemoAdapter)> {
    vec![
        (
            "youtube",
            DemoAdapter::new(
                "youtube",
                ["Dimension 20", "Critical Role Highlights", "Exandria Unlimited"],
            ),
        ),
        (
            "hulu",
            DemoAdapter::new("hulu", ["The Bear", "Only Murders in the Building", "Futurama"]),
        ),
        (
            "hbo",
            DemoAdapter::new("hbo", ["House of the Dragon", "The Last of Us", "Succession"]),
        ),
        (
            "amazon",
            DemoAdapter::new("amazon", ["The Boys", "Reacher", "The Expanse"]),
        ),
    ]
    .into_iter()
    .map(|(name, adapter)| (name, adapter.on_device(device)))
    .collect()
}

/// Assembles the dispatcher from configuration.
///
/// # Errors
/// - `ConfigError` - Catalog is invalid or targets an unknown backend
pub fn build_dispatcher(config: &HomecastConfig) -> Result<Dispatcher, ConfigError> {
    let mut builder = Dispatcher::builder(default_catalog()?).config(config);

    for (name, adapter) in demo_adapters(&config.device.name) {
        builder = builder.adapter(name, Arc::new(adapter));
    }

    if !config.library.media_dirs.is_empty() {
        let factory = MediaLibraryFactory::new(config.library.clone());
        builder = builder.library_factory(Arc::new(factory));
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_consistent() {
        let catalog = default_catalog().unwrap();

        assert!(catalog.collisions().is_empty());
        let critical_role = catalog.lookup("critical-role").unwrap();
        assert_eq!(critical_role.backend(), "youtube");
        assert_eq!(
            critical_role.options().skip_marker.as_deref(),
            Some("hi5pEHs76TE")
        );
        assert!(!catalog.lookup("a workout").unwrap().options().resume);
        assert_eq!(catalog.lookup("haus").unwrap().backend(), "amazon");
    }

    #[test]
    fn test_dispatcher_builds_with_defaults() {
        let dispatcher = build_dispatcher(&HomecastConfig::default()).unwrap();
        assert_eq!(dispatcher.registry().len(), 4);
    }
}
