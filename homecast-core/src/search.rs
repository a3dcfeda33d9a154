//! Concurrent search fallback across every registered adapter.
//!
//! When the catalog has no confident match, the title is sent to every adapter
//! at once. Each adapter runs in its own task and streams candidates back over a
//! channel; errors go through a shared [`QueryErrorSink`] so one backend's
//! outage never aborts the others.
//!
//! Under the default [`Ranking::FirstYielded`] policy the first candidate to
//! arrive wins and the search returns immediately. Adapters still running are
//! abandoned, not cancelled: their tasks keep going and a drain task logs
//! anything they report late.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, warn};

use crate::adapter::{AdapterError, QueryErrorRecord, QueryErrorSink, RemoteCandidate};
use crate::registry::AdapterRegistry;

/// Scores a candidate; higher is better.
pub type ScoreFn = Arc<dyn Fn(&RemoteCandidate) -> f64 + Send + Sync>;

/// How the winning candidate is chosen among everything adapters yield.
#[derive(Clone, Default)]
pub enum Ranking {
    /// First candidate to arrive wins; the search stops waiting immediately
    #[default]
    FirstYielded,
    /// Wait for every adapter, then pick the highest score (earliest on ties)
    HighestScore(ScoreFn),
}

impl Ranking {
    /// Ranks by the adapters' own relevance estimates, treating missing ones as 0.
    pub fn by_relevance() -> Self {
        Self::HighestScore(Arc::new(|candidate| candidate.relevance.unwrap_or(0.0)))
    }

    fn is_eager(&self) -> bool {
        matches!(self, Self::FirstYielded)
    }

    fn select(&self, candidates: Vec<RemoteCandidate>) -> Option<RemoteCandidate> {
        match self {
            Self::FirstYielded => candidates.into_iter().next(),
            Self::HighestScore(score) => {
                let mut best: Option<(f64, RemoteCandidate)> = None;
                for candidate in candidates {
                    let value = score(&candidate);
                    let value = if value.is_nan() { f64::NEG_INFINITY } else { value };
                    if best.as_ref().is_none_or(|(current, _)| value > *current) {
                        best = Some((value, candidate));
                    }
                }
                best.map(|(_, candidate)| candidate)
            }
        }
    }
}

impl fmt::Debug for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstYielded => write!(f, "FirstYielded"),
            Self::HighestScore(_) => write!(f, "HighestScore(..)"),
        }
    }
}

/// Result of one fan-out search.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Selected candidate, if any adapter yielded one
    pub best: Option<RemoteCandidate>,
    /// Every adapter error reported before the search returned
    pub errors: Vec<QueryErrorRecord>,
    /// Number of candidates received before the search returned
    pub candidates_seen: usize,
}

enum SearchEvent {
    Candidate(RemoteCandidate),
    Finished(String),
}

/// Fan-out search over an adapter registry.
#[derive(Debug, Clone)]
pub struct RemoteSearch {
    registry: Arc<AdapterRegistry>,
    ranking: Ranking,
    deadline: Option<Duration>,
    drain_late_errors: bool,
}

impl RemoteSearch {
    /// Creates a search over `registry` with the default first-yielded ranking.
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            ranking: Ranking::default(),
            deadline: None,
            drain_late_errors: true,
        }
    }

    /// Uses `ranking` to choose among candidates.
    pub fn with_ranking(mut self, ranking: Ranking) -> Self {
        self.ranking = ranking;
        self
    }

    /// Stops waiting for adapters after `deadline`; adapters still running are
    /// recorded as timed out.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Whether abandoned adapters are drained so their late errors get logged.
    pub fn with_late_error_drain(mut self, enabled: bool) -> Self {
        self.drain_late_errors = enabled;
        self
    }

    /// Queries every registered adapter for `title` concurrently.
    ///
    /// Never fails: adapter failures (including failed construction) are
    /// returned in [`SearchOutcome::errors`].
    pub async fn search_all(&self, title: &str) -> SearchOutcome {
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let (sink, mut error_rx) = QueryErrorSink::channel();
        let mut pending: HashSet<String> = HashSet::new();

        for name in self.registry.names() {
            pending.insert(name.to_string());
            tokio::spawn(
                query_adapter(
                    Arc::clone(&self.registry),
                    name.to_string(),
                    title.to_string(),
                    sink.clone(),
                    event_tx.clone(),
                )
                .in_current_span(),
            );
        }
        drop(event_tx);
        drop(sink);

        debug!(adapters = pending.len(), ranking = ?self.ranking, "Remote search started");

        let mut outcome = SearchOutcome::default();
        let mut candidates = Vec::new();
        let collect = async {
            while !pending.is_empty() {
                let Some(event) = events.recv().await else {
                    break;
                };
                match event {
                    SearchEvent::Candidate(candidate) => {
                        debug!(
                            adapter = %candidate.adapter_name,
                            title = %candidate.title,
                            "Candidate received"
                        );
                        outcome.candidates_seen += 1;
                        candidates.push(candidate);
                        if self.ranking.is_eager() {
                            break;
                        }
                    }
                    SearchEvent::Finished(name) => {
                        pending.remove(&name);
                    }
                }
            }
        };

        let timed_out = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, collect).await.is_err(),
            None => {
                collect.await;
                false
            }
        };

        while let Ok(record) = error_rx.try_recv() {
            outcome.errors.push(record);
        }

        if timed_out {
            let after = self.deadline.unwrap_or_default();
            let mut stragglers: Vec<&String> = pending.iter().collect();
            stragglers.sort();
            for name in stragglers {
                warn!(adapter = %name, ?after, "Adapter did not finish before the search deadline");
                outcome
                    .errors
                    .push(QueryErrorRecord::new(name.as_str(), AdapterError::TimedOut { after }));
            }
        }

        if !pending.is_empty() && self.drain_late_errors {
            debug!(still_running = pending.len(), "Abandoning unfinished adapters");
            tokio::spawn(drain_stragglers(events, error_rx).in_current_span());
        }

        outcome.best = self.ranking.select(candidates);
        outcome
    }
}

async fn query_adapter(
    registry: Arc<AdapterRegistry>,
    name: String,
    title: String,
    sink: QueryErrorSink,
    events: mpsc::UnboundedSender<SearchEvent>,
) {
    let sink = sink.for_adapter(&name);
    match registry.get(&name).await {
        Ok(adapter) => {
            let mut stream = adapter.query_by_title(&title, sink.clone());
            while let Some(mut candidate) = stream.next().await {
                candidate.adapter_name = name.clone();
                if events.send(SearchEvent::Candidate(candidate)).is_err() {
                    break;
                }
            }
        }
        Err(error) => sink.report(&name, error),
    }

    // Receiver may already be gone once a winner was committed
    let _ = events.send(SearchEvent::Finished(name));
}

async fn drain_stragglers(
    mut events: mpsc::UnboundedReceiver<SearchEvent>,
    mut errors: mpsc::UnboundedReceiver<QueryErrorRecord>,
) {
    let mut events_open = true;
    let mut errors_open = true;

    while events_open || errors_open {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(SearchEvent::Candidate(candidate)) => debug!(
                    adapter = %candidate.adapter_name,
                    title = %candidate.title,
                    "Ignoring late candidate"
                ),
                Some(SearchEvent::Finished(name)) => {
                    debug!(adapter = %name, "Late adapter finished")
                }
                None => events_open = false,
            },
            record = errors.recv(), if errors_open => match record {
                Some(record) => warn!(
                    adapter = %record.adapter_name,
                    error = %record.error,
                    "Late adapter error"
                ),
                None => errors_open = false,
            },
        }
    }
}
