//! Controllable test doubles for adapters and the local library.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{AdapterError, PlayRequest, PlaybackAdapter, QueryErrorSink, RemoteCandidate};
use crate::library::{LaunchHandle, LibraryError, LocalLibrary, LocalMedia};
use crate::registry::AdapterFactory;

// Widens the race window for concurrent first-use tests
const MOCK_BUILD_DELAY_MS: u64 = 20;

/// One observed call on a test double.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    /// `query_by_title` was called
    Query {
        /// Adapter label
        adapter: String,
        /// Title searched for
        title: String,
    },
    /// `play` was called
    Play {
        /// Adapter label
        adapter: String,
        /// Request received
        request: PlayRequest,
    },
    /// The local library was searched
    LibraryFind {
        /// Title searched for
        title: String,
    },
    /// The local library was asked to play
    LibraryPlay {
        /// Title played
        title: String,
    },
}

/// Shared, ordered record of calls across several doubles.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<AdapterCall>>>);

impl CallLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a call.
    pub fn record(&self, call: AdapterCall) {
        self.0.lock().push(call);
    }

    /// Snapshot of every call so far.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.0.lock().clone()
    }

    /// Number of `query_by_title` calls.
    pub fn query_count(&self) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|call| matches!(call, AdapterCall::Query { .. }))
            .count()
    }

    /// Every `play` call as `(adapter, request)`.
    pub fn plays(&self) -> Vec<(String, PlayRequest)> {
        self.0
            .lock()
            .iter()
            .filter_map(|call| match call {
                AdapterCall::Play { adapter, request } => Some((adapter.clone(), request.clone())),
                _ => None,
            })
            .collect()
    }

    /// Total number of calls.
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether nothing was called.
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Adapter double yielding scripted candidates and recording every call.
#[derive(Debug, Clone)]
pub struct RecordingAdapter {
    name: String,
    candidates: Vec<RemoteCandidate>,
    query_error: Option<AdapterError>,
    play_error: Option<AdapterError>,
    gate: Option<Arc<Notify>>,
    log: CallLog,
}

impl Default for RecordingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingAdapter {
    /// Creates an adapter that finds nothing and plays everything.
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Creates an adapter reporting itself as `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: Vec::new(),
            query_error: None,
            play_error: None,
            gate: None,
            log: CallLog::new(),
        }
    }

    /// Records calls into a shared log.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Yields one candidate per title, in order.
    pub fn yielding<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for title in titles {
            let title = title.into();
            let handle = serde_json::json!({ "source": self.name, "title": title });
            self.candidates.push(RemoteCandidate::new(title, handle));
        }
        self
    }

    /// Yields the given candidates as-is.
    pub fn yielding_candidates(mut self, candidates: Vec<RemoteCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Reports `error` through the sink instead of yielding.
    pub fn failing_query(mut self, error: AdapterError) -> Self {
        self.query_error = Some(error);
        self
    }

    /// Fails every `play` with `error`.
    pub fn failing_play(mut self, error: AdapterError) -> Self {
        self.play_error = Some(error);
        self
    }

    /// Holds the search until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl PlaybackAdapter for RecordingAdapter {
    fn query_by_title(
        &self,
        title: &str,
        errors: QueryErrorSink,
    ) -> BoxStream<'static, RemoteCandidate> {
        self.log.record(AdapterCall::Query {
            adapter: self.name.clone(),
            title: title.to_string(),
        });

        let name = self.name.clone();
        let candidates = self.candidates.clone();
        let query_error = self.query_error.clone();
        let gate = self.gate.clone();

        stream::once(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match query_error {
                Some(error) => {
                    errors.report(&name, error);
                    Vec::new()
                }
                None => candidates,
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }

    async fn play(&self, request: PlayRequest) -> Result<(), AdapterError> {
        self.log.record(AdapterCall::Play {
            adapter: self.name.clone(),
            request,
        });

        match &self.play_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Factory counting how many times it builds.
#[derive(Debug)]
pub struct CountingFactory {
    adapter: Arc<RecordingAdapter>,
    /// Number of `build` calls so far
    pub builds: AtomicUsize,
    fail_first: usize,
}

impl CountingFactory {
    /// Factory that always succeeds.
    pub fn new(adapter: RecordingAdapter) -> Self {
        Self::failing_first(adapter, 0)
    }

    /// Factory whose first `failures` builds fail.
    pub fn failing_first(adapter: RecordingAdapter, failures: usize) -> Self {
        Self {
            adapter: Arc::new(adapter),
            builds: AtomicUsize::new(0),
            fail_first: failures,
        }
    }
}

#[async_trait]
impl AdapterFactory for CountingFactory {
    async fn build(&self) -> Result<Arc<dyn PlaybackAdapter>, AdapterError> {
        let attempt = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(MOCK_BUILD_DELAY_MS)).await;

        if attempt <= self.fail_first {
            return Err(AdapterError::Unavailable {
                reason: format!("mock build attempt {attempt} failed"),
            });
        }

        let adapter: Arc<dyn PlaybackAdapter> = self.adapter.clone();
        Ok(adapter)
    }
}

/// Local library double.
#[derive(Debug, Clone, Default)]
pub struct StubLibrary {
    media: Option<LocalMedia>,
    find_error: Option<String>,
    play_error: Option<String>,
    log: CallLog,
}

impl StubLibrary {
    /// Library that finds nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Library that finds `title` for every query.
    pub fn containing(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            media: Some(LocalMedia {
                locator: format!("/media/{title}.mkv"),
                title,
                score: 1.0,
            }),
            ..Self::default()
        }
    }

    /// Records calls into a shared log.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Fails every search.
    pub fn failing_find(mut self, reason: impl Into<String>) -> Self {
        self.find_error = Some(reason.into());
        self
    }

    /// Fails every launch.
    pub fn failing_play(mut self, reason: impl Into<String>) -> Self {
        self.play_error = Some(reason.into());
        self
    }
}

#[async_trait]
impl LocalLibrary for StubLibrary {
    async fn find_media(&self, title: &str) -> Result<Option<LocalMedia>, LibraryError> {
        self.log.record(AdapterCall::LibraryFind {
            title: title.to_string(),
        });

        match &self.find_error {
            Some(reason) => Err(LibraryError::Unavailable {
                reason: reason.clone(),
            }),
            None => Ok(self.media.clone()),
        }
    }

    async fn play(&self, media: &LocalMedia) -> Result<LaunchHandle, LibraryError> {
        self.log.record(AdapterCall::LibraryPlay {
            title: media.title.clone(),
        });

        match &self.play_error {
            Some(reason) => Err(LibraryError::LaunchFailed {
                title: media.title.clone(),
                reason: reason.clone(),
            }),
            None => Ok(LaunchHandle {
                title: media.title.clone(),
                pid: None,
                started_at: chrono::Utc::now(),
            }),
        }
    }
}
