//! Backend adapter contract shared by every streaming service.
//!
//! Each service (a casting app, a streaming catalog) is reached through one
//! [`PlaybackAdapter`]. The dispatcher never special-cases a backend; catalog
//! directives and search hits alike end up as a [`PlayRequest`] handed to `play`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::catalog::PlaybackOptions;

pub mod demo;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use demo::DemoAdapter;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::{AdapterCall, CallLog, CountingFactory, RecordingAdapter, StubLibrary};

/// Trait for playback backends.
///
/// Implementations wrap one streaming service or casting app. Searching must
/// never fail loudly: one backend's outage must not abort its siblings, so query
/// failures are reported through the [`QueryErrorSink`] and the adapter simply
/// yields no candidates.
#[async_trait]
pub trait PlaybackAdapter: Send + Sync + std::fmt::Debug {
    /// Search this backend for titles matching `title`.
    ///
    /// The returned stream may yield candidates before the backend has finished
    /// searching. Candidates should be yielded best-first.
    fn query_by_title(&self, title: &str, errors: QueryErrorSink)
    -> BoxStream<'static, RemoteCandidate>;

    /// Start playback of the requested content.
    ///
    /// # Errors
    /// - `AdapterError::Unavailable` - Backend or device could not be reached
    /// - `AdapterError::Rejected` - Backend refused the content
    /// - `AdapterError::Network` - Transport failure while starting playback
    async fn play(&self, request: PlayRequest) -> Result<(), AdapterError>;
}

/// Errors reported by playback adapters.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdapterError {
    /// Backend could not be constructed or reached.
    #[error("Backend unavailable: {reason}")]
    Unavailable {
        /// The reason the backend is unavailable
        reason: String,
    },

    /// Network communication failed.
    #[error("Network error: {reason}")]
    Network {
        /// The reason for the network error
        reason: String,
    },

    /// Backend refused the request.
    #[error("Request rejected: {reason}")]
    Rejected {
        /// The reason the backend gave
        reason: String,
    },

    /// A directive's dynamic content lookup failed.
    #[error("Content lookup failed: {reason}")]
    LookupFailed {
        /// The reason for the lookup failure
        reason: String,
    },

    /// Backend did not finish searching before the search deadline.
    #[error("Search timed out after {after:?}")]
    TimedOut {
        /// The deadline that elapsed
        after: Duration,
    },

    /// Unexpected backend response.
    #[error("Unexpected response: {reason}")]
    Protocol {
        /// Description of the unexpected response
        reason: String,
    },
}

/// A search hit from one backend. Lives for a single request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteCandidate {
    /// Human title as the backend reports it
    pub title: String,
    /// Registry name of the adapter that yielded this candidate
    pub adapter_name: String,
    /// Backend-specific reference handed back to `play` untouched
    pub handle: serde_json::Value,
    /// Backend's own relevance estimate, if it has one
    pub relevance: Option<f64>,
}

impl RemoteCandidate {
    /// Creates a candidate; the adapter name is stamped by the search fan-out.
    pub fn new(title: impl Into<String>, handle: serde_json::Value) -> Self {
        Self {
            title: title.into(),
            adapter_name: String::new(),
            handle,
            relevance: None,
        }
    }

    /// Attaches the backend's relevance estimate.
    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance);
        self
    }
}

/// What to start on the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PlayTarget {
    /// A content id from the catalog (static or produced by a lookup)
    Content(String),
    /// An opaque handle yielded by this backend's own search
    Remote(serde_json::Value),
}

/// A committed playback request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayRequest {
    /// Title being played, for logging and on-screen display
    pub title: String,
    /// Content to start
    pub target: PlayTarget,
    /// Playback options forwarded verbatim from the directive
    pub options: PlaybackOptions,
}

impl PlayRequest {
    /// Content id of the request, if it targets catalog content.
    pub fn content_id(&self) -> Option<&str> {
        match &self.target {
            PlayTarget::Content(id) => Some(id),
            PlayTarget::Remote(_) => None,
        }
    }
}

/// One adapter failure collected during a search.
#[derive(Debug, Clone, Serialize)]
pub struct QueryErrorRecord {
    /// Registry name of the failing adapter
    pub adapter_name: String,
    /// What went wrong
    #[serde(serialize_with = "serialize_display")]
    pub error: AdapterError,
    /// When the failure was reported
    pub reported_at: DateTime<Utc>,
}

impl QueryErrorRecord {
    /// Creates a record stamped with the current time.
    pub fn new(adapter_name: impl Into<String>, error: AdapterError) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            error,
            reported_at: Utc::now(),
        }
    }
}

fn serialize_display<S: serde::Serializer>(
    error: &AdapterError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Callback through which adapters report search failures.
///
/// Cloning is cheap; every clone feeds the same collector. A sink bound with
/// [`QueryErrorSink::for_adapter`] files every report under the bound name,
/// whatever name the adapter passes.
#[derive(Debug, Clone)]
pub struct QueryErrorSink {
    sender: mpsc::UnboundedSender<QueryErrorRecord>,
    registered_as: Option<Arc<str>>,
}

impl QueryErrorSink {
    /// Creates a sink together with the receiver that collects its records.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<QueryErrorRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let sink = Self {
            sender,
            registered_as: None,
        };
        (sink, receiver)
    }

    /// Clone of this sink that records every report under `name`.
    pub fn for_adapter(&self, name: &str) -> Self {
        Self {
            sender: self.sender.clone(),
            registered_as: Some(Arc::from(name)),
        }
    }

    /// Reports a failure for `adapter_name`.
    ///
    /// Reports arriving after the collector is gone are logged and dropped.
    pub fn report(&self, adapter_name: &str, error: AdapterError) {
        let adapter_name = self.registered_as.as_deref().unwrap_or(adapter_name);
        if let Err(rejected) = self
            .sender
            .send(QueryErrorRecord::new(adapter_name, error))
        {
            let record = rejected.0;
            tracing::warn!(
                adapter = %record.adapter_name,
                error = %record.error,
                "Adapter error reported after search completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_collects_reports_from_clones() {
        let (sink, mut receiver) = QueryErrorSink::channel();
        let other = sink.clone();

        sink.report(
            "hulu",
            AdapterError::Network {
                reason: "reset".to_string(),
            },
        );
        other.report(
            "hbo",
            AdapterError::Unavailable {
                reason: "no token".to_string(),
            },
        );

        let first = receiver.try_recv().unwrap();
        let second = receiver.try_recv().unwrap();
        assert_eq!(first.adapter_name, "hulu");
        assert_eq!(second.adapter_name, "hbo");
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_bound_sink_overrides_reported_name() {
        let (sink, mut receiver) = QueryErrorSink::channel();
        let bound = sink.for_adapter("hbo");

        bound.report(
            "hbo-max-client",
            AdapterError::Network {
                reason: "reset".to_string(),
            },
        );
        sink.report(
            "hulu",
            AdapterError::Network {
                reason: "reset".to_string(),
            },
        );

        assert_eq!(receiver.try_recv().unwrap().adapter_name, "hbo");
        assert_eq!(receiver.try_recv().unwrap().adapter_name, "hulu");
    }

    #[test]
    fn test_sink_report_after_receiver_dropped_does_not_panic() {
        let (sink, receiver) = QueryErrorSink::channel();
        drop(receiver);

        sink.report(
            "youtube",
            AdapterError::Protocol {
                reason: "late".to_string(),
            },
        );
    }

    #[test]
    fn test_play_request_content_id() {
        let request = PlayRequest {
            title: "Critical Role".to_string(),
            target: PlayTarget::Content("PL123".to_string()),
            options: PlaybackOptions::default(),
        };
        assert_eq!(request.content_id(), Some("PL123"));

        let remote = PlayRequest {
            target: PlayTarget::Remote(serde_json::json!({"id": 7})),
            ..request
        };
        assert_eq!(remote.content_id(), None);
    }

    #[test]
    fn test_query_error_record_serializes_error_text() {
        let record = QueryErrorRecord::new(
            "amazon",
            AdapterError::Rejected {
                reason: "region".to_string(),
            },
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["adapter_name"], "amazon");
        assert_eq!(json["error"], "Request rejected: region");
    }
}
