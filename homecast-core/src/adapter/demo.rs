//! Demo adapter for development without real streaming services.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use strsim::normalized_levenshtein;
use tracing::info;

use super::{
    AdapterError, PlayRequest, PlayTarget, PlaybackAdapter, QueryErrorSink, RemoteCandidate,
};

/// Demo adapter for development and testing.
///
/// Knows a fixed list of titles, "searches" them with fuzzy matching and logs
/// instead of casting. Lets the full dispatch workflow run offline.
#[derive(Debug, Clone)]
pub struct DemoAdapter {
    service: String,
    titles: Vec<String>,
    similarity_threshold: f64,
    latency: Duration,
    offline: bool,
    device: Option<String>,
}

impl DemoAdapter {
    /// Creates a demo adapter for `service` knowing `titles`.
    pub fn new<I, S>(service: impl Into<String>, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service: service.into(),
            titles: titles.into_iter().map(Into::into).collect(),
            similarity_threshold: 0.6, // Accept matches with 60% similarity
            latency: Duration::ZERO,
            offline: false,
            device: None,
        }
    }

    /// Minimum similarity (0.0-1.0) for a title to be yielded.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Simulated search latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Names the cast device playback is reported on.
    pub fn on_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Simulates an unreachable service: searches report an error, plays fail.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    fn rank_titles(&self, query: &str) -> Vec<RemoteCandidate> {
        let query = query.to_lowercase();
        let mut scored: Vec<(f64, &String)> = self
            .titles
            .iter()
            .map(|title| (normalized_levenshtein(&query, &title.to_lowercase()), title))
            .filter(|(score, _)| *score >= self.similarity_threshold)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .map(|(score, title)| {
                let handle = serde_json::json!({ "service": self.service, "title": title });
                RemoteCandidate::new(title.clone(), handle).with_relevance(score)
            })
            .collect()
    }
}

#[async_trait]
impl PlaybackAdapter for DemoAdapter {
    fn query_by_title(
        &self,
        title: &str,
        errors: QueryErrorSink,
    ) -> BoxStream<'static, RemoteCandidate> {
        let service = self.service.clone();
        let latency = self.latency;
        let offline = self.offline;
        let candidates = self.rank_titles(title);

        stream::once(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if offline {
                errors.report(
                    &service,
                    AdapterError::Unavailable {
                        reason: format!("{service} is offline"),
                    },
                );
                return Vec::new();
            }
            candidates
        })
        .flat_map(stream::iter)
        .boxed()
    }

    async fn play(&self, request: PlayRequest) -> Result<(), AdapterError> {
        if self.offline {
            return Err(AdapterError::Unavailable {
                reason: format!("{} is offline", self.service),
            });
        }

        let device = self.device.as_deref().unwrap_or("default device");
        match &request.target {
            PlayTarget::Content(content_id) => info!(
                service = %self.service,
                device = %device,
                title = %request.title,
                content_id = %content_id,
                resume = request.options.resume,
                skip = ?request.options.skip_marker,
                "Demo playback started"
            ),
            PlayTarget::Remote(handle) => info!(
                service = %self.service,
                device = %device,
                title = %request.title,
                handle = %handle,
                "Demo playback started"
            ),
        }

        Ok(())
    }
}
