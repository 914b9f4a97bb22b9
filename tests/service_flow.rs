//! End-to-end flows through the `BoardService` facade.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use liveboard::cache::{CacheKey, CacheStore, MemoryStore};
use liveboard::model::{BoardView, ProviderKind, ServiceRef};
use liveboard::prefetch::PrefetchSettings;
use liveboard::provider::{
    AsyncHttpClient, HttpError, Providers, RailSettings, TflSettings,
};
use liveboard::service::BoardService;

const BOARD_JSON: &str = r#"{
    "locationName": "Leatherhead",
    "crs": "LHD",
    "trainServices": [
        {
            "std": "18:35",
            "etd": "On time",
            "origin": [{"locationName": "Dorking"}],
            "destination": [{"locationName": "London Waterloo"}],
            "platform": "2",
            "serviceID": "svc-1"
        },
        {
            "sta": "18:40",
            "eta": "On time",
            "origin": [{"locationName": "London Waterloo"}],
            "destination": [{"locationName": "Leatherhead"}],
            "serviceID": "svc-2"
        }
    ]
}"#;

const DETAIL_JSON: &str = r#"{
    "locationName": "Leatherhead",
    "crs": "LHD",
    "operator": "South Western Railway",
    "platform": "2",
    "origin": [{"locationName": "Dorking"}],
    "destination": [{"locationName": "London Waterloo"}],
    "subsequentCallingPoints": [
        {"callingPoint": [{"locationName": "London Waterloo", "crs": "WAT"}]}
    ]
}"#;

const STATUS_JSON: &str = r#"[
    {
        "id": "jubilee",
        "name": "Jubilee",
        "lineStatuses": [
            {"statusSeverity": 10, "statusSeverityDescription": "Good Service"}
        ]
    }
]"#;

/// Substring-routed mock upstream.
#[derive(Clone)]
struct MockHttp {
    routes: Arc<Mutex<Vec<(String, String)>>>,
    calls: Arc<AtomicUsize>,
}

impl MockHttp {
    fn new() -> Self {
        Self {
            routes: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn respond(self, pattern: &str, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((pattern.to_string(), body.to_string()));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AsyncHttpClient for MockHttp {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let routes = self.routes.lock().unwrap();
        for (pattern, body) in routes.iter() {
            if url.contains(pattern.as_str()) {
                return Ok(body.as_bytes().to_vec());
            }
        }
        Err(HttpError::Status { status: 404 })
    }

    async fn get_with_headers(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, HttpError> {
        self.get(url).await
    }
}

/// Route log output through the test harness; `RUST_LOG` controls verbosity.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn board_service(
    http: MockHttp,
    board_ttl: Duration,
    prefetch: PrefetchSettings,
) -> BoardService<MockHttp> {
    init_tracing();
    let providers = Arc::new(Providers::new(
        http,
        RailSettings::default(),
        TflSettings::default(),
    ));
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    BoardService::new(providers, store, board_ttl, Duration::from_secs(300), prefetch)
}

async fn wait_for_prefetch<H: AsyncHttpClient + 'static>(
    service: &BoardService<H>,
    terminal: u64,
) {
    for _ in 0..400 {
        if service.prefetch_stats().terminal() >= terminal {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("prefetch did not settle: {:?}", service.prefetch_stats());
}

#[tokio::test]
async fn test_miss_hit_expiry_cycle() {
    let http = MockHttp::new().respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON);
    let service = board_service(
        http.clone(),
        Duration::from_millis(60),
        PrefetchSettings::disabled(),
    );

    // First call misses and fetches live.
    let first = service
        .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
        .await
        .unwrap();
    assert_eq!(http.calls(), 1);

    // Second call within the TTL is a hit with the identical payload.
    let second = service
        .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(http.calls(), 1);

    // Past the TTL the entry must not be served again.
    tokio::time::sleep(Duration::from_millis(80)).await;
    service
        .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
        .await
        .unwrap();
    assert_eq!(http.calls(), 2);

    let stats = service.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
}

#[tokio::test]
async fn test_board_miss_warms_service_details() {
    let http = MockHttp::new()
        .respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON)
        .respond("/GetServiceDetails/", DETAIL_JSON);
    let service = board_service(
        http.clone(),
        Duration::from_secs(60),
        PrefetchSettings::default(),
    );

    let board = service
        .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
        .await
        .unwrap();
    // The departures board carries one departing service link.
    assert_eq!(board.linked_services().len(), 1);

    wait_for_prefetch(&service, 1).await;
    assert_eq!(service.prefetch_stats().succeeded, 1);

    // The warmed detail is now a cache hit; no further upstream call.
    let calls_before = http.calls();
    let detail = service
        .get_service_detail(&ServiceRef::Rail {
            crs: "LHD".into(),
            service_id: "svc-1".into(),
        })
        .await
        .unwrap();
    assert_eq!(detail.destination_name.as_deref(), Some("London Waterloo"));
    assert_eq!(http.calls(), calls_before);

    service.shutdown().await;
}

#[tokio::test]
async fn test_cache_hit_triggers_no_prefetch() {
    let http = MockHttp::new()
        .respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON)
        .respond("/GetServiceDetails/", DETAIL_JSON);
    let service = board_service(
        http.clone(),
        Duration::from_secs(60),
        PrefetchSettings::default(),
    );

    service
        .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
        .await
        .unwrap();
    wait_for_prefetch(&service, 1).await;
    let scheduled_after_miss = service.prefetch_stats().scheduled;

    // Hits never reach the coordinator, even with a cold detail cache.
    service
        .invalidate(&CacheKey::service_detail(&ServiceRef::Rail {
            crs: "LHD".into(),
            service_id: "svc-1".into(),
        }))
        .unwrap();
    service
        .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
        .await
        .unwrap();
    assert_eq!(service.prefetch_stats().scheduled, scheduled_after_miss);

    service.shutdown().await;
}

#[tokio::test]
async fn test_unsupported_view_makes_no_outbound_call() {
    let http = MockHttp::new();
    let service = board_service(
        http.clone(),
        Duration::from_secs(60),
        PrefetchSettings::default(),
    );

    let err = service
        .get_board(ProviderKind::Tfl, "940GZZLUWSM", BoardView::Passing)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        liveboard::provider::ProviderError::UnsupportedView { .. }
    ));
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn test_line_status_cached_under_board_ttl() {
    let http = MockHttp::new().respond("/Line/Mode/", STATUS_JSON);
    let service = board_service(
        http.clone(),
        Duration::from_secs(60),
        PrefetchSettings::disabled(),
    );

    let statuses = service.get_line_status(ProviderKind::Tfl, None).await.unwrap();
    assert_eq!(statuses[0].line_name, "Jubilee");
    service.get_line_status(ProviderKind::Tfl, None).await.unwrap();
    assert_eq!(http.calls(), 1);
}

#[tokio::test]
async fn test_manual_invalidation_forces_refetch() {
    let http = MockHttp::new().respond("/GetArrivalDepartureBoard/LHD", BOARD_JSON);
    let service = board_service(
        http.clone(),
        Duration::from_secs(60),
        PrefetchSettings::disabled(),
    );

    service
        .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
        .await
        .unwrap();
    service
        .invalidate(&CacheKey::board(
            ProviderKind::NationalRail,
            "LHD",
            BoardView::Departures,
        ))
        .unwrap();
    service
        .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
        .await
        .unwrap();
    assert_eq!(http.calls(), 2);

    service.clear_cache().unwrap();
    service
        .get_board(ProviderKind::NationalRail, "LHD", BoardView::Departures)
        .await
        .unwrap();
    assert_eq!(http.calls(), 3);
}
