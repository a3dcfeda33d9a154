//! Dispatch coordinator.
//!
//! Resolves a request in strict priority order: the alias catalog first, then a
//! fan-out search across every registered adapter, then the local library. The
//! first stage producing a candidate issues the `play` call; if none does, the
//! request fails with [`DispatchError::NotFound`] carrying every adapter error
//! collected along the way.
//!
//! A [`Dispatcher`] is built once at startup and shared by concurrent requests;
//! every request runs in its own `dispatch` span tagged with a fresh request id.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::Result;
use crate::adapter::{
    AdapterError, PlayRequest, PlayTarget, PlaybackAdapter, QueryErrorRecord, RemoteCandidate,
};
use crate::catalog::{Catalog, ContentSource, Directive};
use crate::config::HomecastConfig;
use crate::errors::{ConfigError, DispatchError};
use crate::library::{LaunchHandle, LibraryFactory, LocalLibrary, ReadyLibrary};
use crate::matcher::{FuzzyMatcher, MatchVerdict};
use crate::registry::{AdapterFactory, AdapterRegistry};
use crate::search::{Ranking, RemoteSearch, SearchOutcome};

/// Name used for local-library diagnostics and outcomes.
pub const LOCAL_LIBRARY: &str = "local-library";

/// Stage that produced the played candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum ResolutionStage {
    /// Catalog hit, directly by id or through the fuzzy matcher
    Catalog {
        /// Catalog name that matched
        name: String,
        /// Match score; 0 for exact and id lookups
        score: f64,
    },
    /// Candidate from the remote fan-out search
    RemoteSearch,
    /// Item from the local media library
    LocalLibrary,
}

/// A committed playback.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackOutcome {
    /// Correlation id of the request
    pub request_id: Uuid,
    /// Stage that resolved the request
    pub stage: ResolutionStage,
    /// Title that was played
    pub title: String,
    /// Adapter name, or `local-library`
    pub backend: String,
    /// Request handed to the adapter; absent for local playback
    pub request: Option<PlayRequest>,
    /// Launch handle for local playback
    pub launch: Option<LaunchHandle>,
}

struct LibrarySlot {
    factory: Arc<dyn LibraryFactory>,
    handle: OnceCell<Arc<dyn LocalLibrary>>,
}

impl LibrarySlot {
    async fn get(
        &self,
    ) -> std::result::Result<Arc<dyn LocalLibrary>, crate::library::LibraryError> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                debug!("Building local library");
                self.factory.build().await
            })
            .await?;
        Ok(Arc::clone(handle))
    }
}

/// Resolves and plays requests against a catalog, adapters and a local library.
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    matcher: FuzzyMatcher,
    registry: Arc<AdapterRegistry>,
    search: RemoteSearch,
    library: Option<LibrarySlot>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("catalog_names", &self.catalog.len())
            .field("matcher", &self.matcher)
            .field("registry", &self.registry)
            .field("has_library", &self.library.is_some())
            .finish()
    }
}

impl Dispatcher {
    /// Starts building a dispatcher over `catalog`.
    pub fn builder(catalog: Catalog) -> DispatcherBuilder {
        DispatcherBuilder::new(catalog)
    }

    /// The catalog requests are matched against.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The adapter registry.
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// The fuzzy matcher in use.
    pub fn matcher(&self) -> &FuzzyMatcher {
        &self.matcher
    }

    /// Plays whatever best matches free text, falling back stage by stage.
    ///
    /// # Errors
    /// - `DispatchError::PlaybackFailed` - The selected adapter refused to play
    /// - `DispatchError::LocalPlaybackFailed` - The local player could not start
    /// - `DispatchError::NotFound` - No stage produced a candidate
    pub async fn play_by_free_text(&self, query: &str) -> Result<PlaybackOutcome> {
        let request_id = Uuid::new_v4();
        let span = info_span!("dispatch", request_id = %request_id, query = %query);
        self.resolve_free_text(request_id, query).instrument(span).await
    }

    /// Plays the catalog directive with id `id`.
    ///
    /// The id is normalized before lookup. No adapter is touched when it is unknown.
    ///
    /// # Errors
    /// - `DispatchError::UnknownId` - No catalog name normalizes to `id`
    /// - `DispatchError::PlaybackFailed` - The directive's adapter refused to play
    /// - `DispatchError::NotFound` - The directive's content lookup failed
    pub async fn play_by_id(&self, id: &str) -> Result<PlaybackOutcome> {
        let request_id = Uuid::new_v4();
        let span = info_span!("dispatch", request_id = %request_id, id = %id);

        async {
            let normalized = crate::catalog::normalize_id(id);
            let Some(directive) = self.catalog.lookup(&normalized) else {
                debug!(id = %normalized, "Unknown catalog id");
                return Err(DispatchError::UnknownId { id: normalized });
            };

            let stage = ResolutionStage::Catalog {
                name: directive.canonical_name().to_string(),
                score: 0.0,
            };
            self.play_directive(request_id, id, &directive, stage).await
        }
        .instrument(span)
        .await
    }

    /// Runs only the remote fan-out search, without playing anything.
    pub async fn search_remote(&self, title: &str) -> SearchOutcome {
        let span = info_span!("search", request_id = %Uuid::new_v4(), query = %title);
        self.search.search_all(title).instrument(span).await
    }

    /// Constructs the local library and every registered adapter up front.
    ///
    /// Construction failures are logged and left for the first request to retry.
    pub async fn warm_up(&self) {
        if let Some(library) = &self.library
            && let Err(e) = library.get().await
        {
            warn!(error = %e, "Local library warm-up failed");
        }

        let names: Vec<String> = self.registry.names().map(str::to_string).collect();
        for name in names {
            if let Err(e) = self.registry.get(&name).await {
                warn!(adapter = %name, error = %e, "Adapter warm-up failed");
            }
        }

        info!(adapters = self.registry.len(), "Dispatcher warmed up");
    }

    async fn resolve_free_text(&self, request_id: Uuid, query: &str) -> Result<PlaybackOutcome> {
        match self.matcher.evaluate(query, &self.catalog) {
            MatchVerdict::Accepted(found) => {
                debug!(name = %found.name, score = found.score, "Catalog match accepted");
                let stage = ResolutionStage::Catalog {
                    name: found.name.clone(),
                    score: found.score,
                };
                return self
                    .play_directive(request_id, query, &found.directive, stage)
                    .await;
            }
            MatchVerdict::Rejected { closest } => match closest {
                Some(closest) => debug!(
                    closest = %closest.name,
                    score = closest.score,
                    threshold = self.matcher.accept_threshold(),
                    "No confident catalog match"
                ),
                None => debug!("Catalog is empty"),
            },
        }

        let searched = self.search.search_all(query).await;
        let mut diagnostics = searched.errors;
        for record in &diagnostics {
            warn!(adapter = %record.adapter_name, error = %record.error, "Adapter search failed");
        }

        if let Some(candidate) = searched.best {
            return self.play_remote(request_id, candidate).await;
        }
        debug!("Remote search found nothing");

        if let Some(outcome) = self.play_local(request_id, query, &mut diagnostics).await? {
            return Ok(outcome);
        }

        info!(diagnostics = diagnostics.len(), "Nothing found");
        Err(DispatchError::NotFound {
            query: query.to_string(),
            diagnostics,
        })
    }

    async fn play_directive(
        &self,
        request_id: Uuid,
        query: &str,
        directive: &Directive,
        stage: ResolutionStage,
    ) -> Result<PlaybackOutcome> {
        let backend = directive.backend();

        let content_id = match directive.source() {
            ContentSource::Static(id) => id.clone(),
            ContentSource::Lookup(lookup) => match lookup.resolve(directive).await {
                Ok(id) => id,
                Err(error) => {
                    warn!(backend = %backend, error = %error, "Content lookup failed");
                    return Err(DispatchError::NotFound {
                        query: query.to_string(),
                        diagnostics: vec![QueryErrorRecord::new(backend, error)],
                    });
                }
            },
        };

        let request = PlayRequest {
            title: directive.canonical_name().to_string(),
            target: PlayTarget::Content(content_id),
            options: directive.options().clone(),
        };

        self.play_on(request_id, backend, stage, request).await
    }

    async fn play_remote(
        &self,
        request_id: Uuid,
        candidate: RemoteCandidate,
    ) -> Result<PlaybackOutcome> {
        let request = PlayRequest {
            title: candidate.title,
            target: PlayTarget::Remote(candidate.handle),
            options: Default::default(),
        };

        self.play_on(
            request_id,
            &candidate.adapter_name,
            ResolutionStage::RemoteSearch,
            request,
        )
        .await
    }

    async fn play_on(
        &self,
        request_id: Uuid,
        backend: &str,
        stage: ResolutionStage,
        request: PlayRequest,
    ) -> Result<PlaybackOutcome> {
        let failed = |source: AdapterError| DispatchError::PlaybackFailed {
            title: request.title.clone(),
            adapter: backend.to_string(),
            source,
        };

        let adapter: Arc<dyn PlaybackAdapter> = self.registry.get(backend).await.map_err(failed)?;
        adapter.play(request.clone()).await.map_err(failed)?;

        info!(
            backend = %backend,
            title = %request.title,
            resume = request.options.resume,
            stage = ?stage,
            "Playback started"
        );

        Ok(PlaybackOutcome {
            request_id,
            stage,
            title: request.title.clone(),
            backend: backend.to_string(),
            request: Some(request),
            launch: None,
        })
    }

    async fn play_local(
        &self,
        request_id: Uuid,
        query: &str,
        diagnostics: &mut Vec<QueryErrorRecord>,
    ) -> Result<Option<PlaybackOutcome>> {
        let Some(slot) = &self.library else {
            return Ok(None);
        };

        let library = match slot.get().await {
            Ok(library) => library,
            Err(e) => {
                warn!(error = %e, "Local library unavailable");
                diagnostics.push(library_diagnostic(e.to_string()));
                return Ok(None);
            }
        };

        let media = match library.find_media(query).await {
            Ok(Some(media)) => media,
            Ok(None) => {
                debug!("Local library found nothing");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "Local library search failed");
                diagnostics.push(library_diagnostic(e.to_string()));
                return Ok(None);
            }
        };

        debug!(title = %media.title, score = media.score, "Local library match");
        let launch = library
            .play(&media)
            .await
            .map_err(|source| DispatchError::LocalPlaybackFailed {
                title: media.title.clone(),
                source,
            })?;

        info!(title = %media.title, pid = ?launch.pid, "Local playback started");

        Ok(Some(PlaybackOutcome {
            request_id,
            stage: ResolutionStage::LocalLibrary,
            title: media.title,
            backend: LOCAL_LIBRARY.to_string(),
            request: None,
            launch: Some(launch),
        }))
    }
}

fn library_diagnostic(reason: String) -> QueryErrorRecord {
    QueryErrorRecord {
        adapter_name: LOCAL_LIBRARY.to_string(),
        error: AdapterError::Unavailable { reason },
        reported_at: Utc::now(),
    }
}

/// Assembles a [`Dispatcher`], validating that every directive's backend exists.
pub struct DispatcherBuilder {
    catalog: Catalog,
    registry: AdapterRegistry,
    library: Option<Arc<dyn LibraryFactory>>,
    accept_threshold: Option<f64>,
    ranking: Ranking,
    deadline: Option<Duration>,
    drain_late_errors: bool,
    deferred: Option<ConfigError>,
}

impl DispatcherBuilder {
    /// Starts a builder with no adapters and default matching.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            registry: AdapterRegistry::new(),
            library: None,
            accept_threshold: None,
            ranking: Ranking::default(),
            deadline: None,
            drain_late_errors: true,
            deferred: None,
        }
    }

    /// Applies matching and search settings from `config`.
    pub fn config(mut self, config: &HomecastConfig) -> Self {
        self.accept_threshold = Some(config.matching.accept_threshold);
        self.ranking = config.search.ranking.ranking();
        self.deadline = config.search.deadline();
        self.drain_late_errors = config.search.drain_late_errors;
        self
    }

    /// Replaces the adapter registry.
    pub fn registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers a ready adapter under `name`.
    pub fn adapter(self, name: impl Into<String>, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.adapter_factory(name, Arc::new(crate::registry::ReadyAdapter(adapter)))
    }

    /// Registers a lazily built adapter under `name`.
    pub fn adapter_factory(
        mut self,
        name: impl Into<String>,
        factory: Arc<dyn AdapterFactory>,
    ) -> Self {
        if let Err(e) = self.registry.register(name, factory) {
            self.deferred.get_or_insert(e);
        }
        self
    }

    /// Uses a ready local library as the last fallback.
    pub fn library(self, library: Arc<dyn LocalLibrary>) -> Self {
        self.library_factory(Arc::new(ReadyLibrary(library)))
    }

    /// Uses a lazily built local library as the last fallback.
    pub fn library_factory(mut self, factory: Arc<dyn LibraryFactory>) -> Self {
        self.library = Some(factory);
        self
    }

    /// Maximum fuzzy score accepted as a catalog hit.
    pub fn accept_threshold(mut self, threshold: f64) -> Self {
        self.accept_threshold = Some(threshold);
        self
    }

    /// Ranking for remote candidates.
    pub fn ranking(mut self, ranking: Ranking) -> Self {
        self.ranking = ranking;
        self
    }

    /// Deadline for the remote search.
    pub fn search_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Builds the dispatcher.
    ///
    /// # Errors
    /// - `ConfigError::DuplicateBackend` - An adapter name was registered twice
    /// - `ConfigError::UnknownBackend` - A directive targets an unregistered adapter
    pub fn build(self) -> std::result::Result<Dispatcher, ConfigError> {
        if let Some(e) = self.deferred {
            return Err(e);
        }

        for directive in self.catalog.directives() {
            if !self.registry.contains(directive.backend()) {
                return Err(ConfigError::UnknownBackend {
                    directive: directive.canonical_name().to_string(),
                    backend: directive.backend().to_string(),
                });
            }
        }

        let matcher = self
            .accept_threshold
            .map(FuzzyMatcher::new)
            .unwrap_or_default();
        let registry = Arc::new(self.registry);
        let search = RemoteSearch::new(Arc::clone(&registry))
            .with_ranking(self.ranking)
            .with_deadline(self.deadline)
            .with_late_error_drain(self.drain_late_errors);

        debug!(
            catalog_names = self.catalog.len(),
            adapters = registry.len(),
            threshold = matcher.accept_threshold(),
            "Dispatcher built"
        );

        Ok(Dispatcher {
            catalog: Arc::new(self.catalog),
            matcher,
            registry,
            search,
            library: self.library.map(|factory| LibrarySlot {
                factory,
                handle: OnceCell::new(),
            }),
        })
    }
}
