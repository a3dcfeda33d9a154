//! Integration tests for the dispatch coordinator.
//!
//! These drive the public `Dispatcher` API end to end with recording adapters
//! and a stub library, checking resolution order, option forwarding and error
//! aggregation.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use homecast_core::adapter::{AdapterCall, CallLog, CountingFactory, RecordingAdapter, StubLibrary};
use homecast_core::{
    AdapterError, Catalog, CatalogEntry, DispatchError, Dispatcher, PlayTarget, ResolutionStage,
};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

/// Test fixture wiring a catalog, two recording adapters and a stub library
/// into one shared call log.
struct DispatchFixture {
    log: CallLog,
    youtube: RecordingAdapter,
    hulu: RecordingAdapter,
    library: StubLibrary,
}

impl DispatchFixture {
    fn new() -> Self {
        let log = CallLog::new();
        Self {
            youtube: RecordingAdapter::named("youtube").with_log(log.clone()),
            hulu: RecordingAdapter::named("hulu").with_log(log.clone()),
            library: StubLibrary::empty().with_log(log.clone()),
            log,
        }
    }

    fn catalog() -> Catalog {
        Catalog::build(vec![
            CatalogEntry::new(["Critical Role"], "youtube", "PL123"),
            CatalogEntry::new(["Lost", "Lost Series"], "hulu", "lost-series").without_resume(),
            CatalogEntry::new(["Manifest"], "hulu", "manifest-series"),
        ])
        .unwrap()
    }

    fn dispatcher(self) -> (Dispatcher, CallLog) {
        let dispatcher = Dispatcher::builder(Self::catalog())
            .adapter("youtube", Arc::new(self.youtube))
            .adapter("hulu", Arc::new(self.hulu))
            .library(Arc::new(self.library))
            .build()
            .unwrap();
        (dispatcher, self.log)
    }
}

#[tokio::test]
async fn test_exact_name_plays_from_catalog_without_queries() {
    let (dispatcher, log) = DispatchFixture::new().dispatcher();

    let outcome = assert_ok!(dispatcher.play_by_free_text("Critical Role").await);

    assert_eq!(
        outcome.stage,
        ResolutionStage::Catalog {
            name: "Critical Role".to_string(),
            score: 0.0
        }
    );
    assert_eq!(log.query_count(), 0);
}

#[tokio::test]
async fn test_critical_role_scenarios() {
    let mut fixture = DispatchFixture::new();
    fixture.youtube = fixture.youtube.yielding(["Some Totally Unrelated Show"]);
    let (dispatcher, log) = fixture.dispatcher();

    for query in ["critical role", "criticle roll"] {
        let outcome = assert_ok!(dispatcher.play_by_free_text(query).await);
        assert_eq!(outcome.backend, "youtube");

        let request = outcome.request.unwrap();
        assert_eq!(request.target, PlayTarget::Content("PL123".to_string()));
        assert!(request.options.resume);
    }
    assert_eq!(log.query_count(), 0);

    let outcome = assert_ok!(dispatcher.play_by_free_text("some totally unrelated show").await);
    assert_eq!(outcome.stage, ResolutionStage::RemoteSearch);
    assert_eq!(log.query_count(), 2);
}

#[tokio::test]
async fn test_remote_search_runs_before_local_library() {
    let mut fixture = DispatchFixture::new();
    fixture.library = StubLibrary::containing("Home Movies").with_log(fixture.log.clone());
    let (dispatcher, log) = fixture.dispatcher();

    let outcome = assert_ok!(dispatcher.play_by_free_text("home movies").await);
    assert_eq!(outcome.stage, ResolutionStage::LocalLibrary);
    assert!(outcome.launch.is_some());

    let calls = log.calls();
    let first_find = calls
        .iter()
        .position(|call| matches!(call, AdapterCall::LibraryFind { .. }))
        .unwrap();
    let last_query = calls
        .iter()
        .rposition(|call| matches!(call, AdapterCall::Query { .. }))
        .unwrap();

    assert_eq!(log.query_count(), 2);
    assert!(last_query < first_find);
}

#[tokio::test]
async fn test_remote_hit_skips_local_library() {
    let mut fixture = DispatchFixture::new();
    fixture.hulu = fixture.hulu.yielding(["The Rookie"]);
    fixture.library = StubLibrary::containing("The Rookie").with_log(fixture.log.clone());
    let (dispatcher, log) = fixture.dispatcher();

    let outcome = assert_ok!(dispatcher.play_by_free_text("the rookie").await);

    assert_eq!(outcome.stage, ResolutionStage::RemoteSearch);
    assert_eq!(outcome.backend, "hulu");
    assert!(
        !log.calls()
            .iter()
            .any(|call| matches!(call, AdapterCall::LibraryFind { .. }))
    );

    let plays = log.plays();
    assert_eq!(plays.len(), 1);
    assert!(matches!(plays[0].1.target, PlayTarget::Remote(_)));
}

#[tokio::test]
async fn test_play_by_id_forwards_resume_false_every_time() {
    let (dispatcher, log) = DispatchFixture::new().dispatcher();

    assert_ok!(dispatcher.play_by_id("lost").await);
    assert_ok!(dispatcher.play_by_id("Lost Series").await);

    let plays = log.plays();
    assert_eq!(plays.len(), 2);
    for (adapter, request) in plays {
        assert_eq!(adapter, "hulu");
        assert!(!request.options.resume);
    }
}

#[tokio::test]
async fn test_resume_false_survives_fuzzy_path() {
    let (dispatcher, log) = DispatchFixture::new().dispatcher();

    let outcome = assert_ok!(dispatcher.play_by_free_text("lost seriez").await);

    assert!(matches!(outcome.stage, ResolutionStage::Catalog { score, .. } if score > 0.0));
    assert!(!log.plays()[0].1.options.resume);
}

#[tokio::test]
async fn test_first_yielded_candidate_wins_and_order_flips() {
    for (gated, expected) in [("youtube", "hulu"), ("hulu", "youtube")] {
        let gate = Arc::new(Notify::new());
        let mut fixture = DispatchFixture::new();
        fixture.youtube = fixture.youtube.yielding(["Westworld"]);
        fixture.hulu = fixture.hulu.yielding(["Westworld"]);
        if gated == "youtube" {
            fixture.youtube = fixture.youtube.gated(gate.clone());
        } else {
            fixture.hulu = fixture.hulu.gated(gate.clone());
        }
        let (dispatcher, log) = fixture.dispatcher();

        let outcome = assert_ok!(dispatcher.play_by_free_text("westworld").await);

        assert_eq!(outcome.backend, expected);
        assert_eq!(log.plays()[0].0, expected);
        gate.notify_one();
    }
}

#[tokio::test]
async fn test_all_adapters_failing_yields_not_found_with_diagnostics() {
    let mut fixture = DispatchFixture::new();
    fixture.youtube = fixture.youtube.failing_query(AdapterError::Network {
        reason: "connection reset".to_string(),
    });
    fixture.hulu = fixture.hulu.failing_query(AdapterError::Unavailable {
        reason: "not signed in".to_string(),
    });
    let (dispatcher, _log) = fixture.dispatcher();

    let error = assert_err!(dispatcher.play_by_free_text("nothing like this").await);

    let DispatchError::NotFound { query, diagnostics } = &error else {
        panic!("expected NotFound, got {error:?}");
    };
    assert_eq!(query, "nothing like this");
    assert_eq!(diagnostics.len(), 2);

    let mut adapters: Vec<&str> = diagnostics.iter().map(|d| d.adapter_name.as_str()).collect();
    adapters.sort();
    assert_eq!(adapters, vec!["hulu", "youtube"]);
    assert!(error.is_user_error());
}

#[tokio::test]
async fn test_unknown_id_makes_no_adapter_calls() {
    let (dispatcher, log) = DispatchFixture::new().dispatcher();

    let error = assert_err!(dispatcher.play_by_id("unknown-id").await);

    assert!(matches!(error, DispatchError::UnknownId { .. }));
    assert!(log.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_adapter_build() {
    let log = CallLog::new();
    let factory = Arc::new(CountingFactory::new(
        RecordingAdapter::named("youtube").with_log(log.clone()),
    ));
    let dispatcher = Arc::new(
        Dispatcher::builder(
            Catalog::build(vec![CatalogEntry::new(["Critical Role"], "youtube", "PL123")]).unwrap(),
        )
        .adapter_factory("youtube", factory.clone())
        .build()
        .unwrap(),
    );

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let dispatcher = Arc::clone(&dispatcher);
        tasks.push(tokio::spawn(async move {
            dispatcher.play_by_free_text("critical role").await
        }));
    }
    for task in tasks {
        assert_ok!(task.await.unwrap());
    }

    assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    assert_eq!(log.plays().len(), 8);
}

#[tokio::test]
async fn test_remote_play_failure_does_not_fall_back_to_library() {
    let mut fixture = DispatchFixture::new();
    fixture.hulu = fixture
        .hulu
        .yielding(["The Expanse"])
        .failing_play(AdapterError::Rejected {
            reason: "device busy".to_string(),
        });
    fixture.library = StubLibrary::containing("The Expanse").with_log(fixture.log.clone());
    let (dispatcher, log) = fixture.dispatcher();

    let error = assert_err!(dispatcher.play_by_free_text("the expanse").await);

    assert!(matches!(
        error,
        DispatchError::PlaybackFailed { ref adapter, .. } if adapter == "hulu"
    ));
    assert_eq!(log.plays().len(), 1);
    assert!(
        !log.calls()
            .iter()
            .any(|call| matches!(call, AdapterCall::LibraryFind { .. }))
    );
}

#[tokio::test]
async fn test_not_found_diagnostics_use_registry_names() {
    let log = CallLog::new();
    let dispatcher = Dispatcher::builder(Catalog::default())
        .adapter(
            "hbo",
            Arc::new(
                RecordingAdapter::named("hbo-max-client")
                    .with_log(log.clone())
                    .failing_query(AdapterError::Network {
                        reason: "connection reset".to_string(),
                    }),
            ),
        )
        .build()
        .unwrap();

    let error = assert_err!(dispatcher.play_by_free_text("westworld").await);

    let names: Vec<&str> = error
        .diagnostics()
        .iter()
        .map(|record| record.adapter_name.as_str())
        .collect();
    assert_eq!(names, ["hbo"]);
    assert_eq!(dispatcher.registry().names().collect::<Vec<_>>(), ["hbo"]);
}
