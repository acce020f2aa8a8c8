//! End-to-end tests for the authenticated request pipeline: token handling,
//! single-flight refresh, replay, the status taxonomy, and retry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fluxgate_client::{ApiClient, ApiError, Notifier, SessionStore, Signal};
use fluxgate_common::{RetryConfig, Vault};
use fluxgate_domain::TokenPair;

// ============================================================================
// Test setup
// ============================================================================

/// Notifier that records every surfaced signal and session end.
#[derive(Default)]
struct RecordingNotifier {
    surfaced: Mutex<Vec<(Signal, String)>>,
    sessions_ended: AtomicUsize,
}

impl RecordingNotifier {
    fn surfaced(&self) -> Vec<(Signal, String)> {
        self.surfaced.lock().clone()
    }

    fn sessions_ended(&self) -> usize {
        self.sessions_ended.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn surface(&self, signal: Signal, message: &str) {
        self.surfaced.lock().push((signal, message.to_string()));
    }

    fn session_ended(&self) {
        self.sessions_ended.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    _dir: TempDir,
    dir_path: std::path::PathBuf,
    session: Arc<SessionStore>,
    notifier: Arc<RecordingNotifier>,
    client: ApiClient,
}

/// Client against `server`, optionally pre-signed-in as T1/R1.
fn harness(server: &MockServer, signed_in: bool) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let dir = TempDir::new().unwrap();
    let dir_path = dir.path().to_path_buf();
    let session = Arc::new(SessionStore::new(Vault::open(dir.path())));
    if signed_in {
        session.store(TokenPair::new("T1", Some("R1".to_string())));
    }

    let notifier = Arc::new(RecordingNotifier::default());
    let client = ApiClient::builder(Arc::clone(&session))
        .base_url(server.uri())
        .timeout(Duration::from_secs(5))
        .notifier(notifier.clone() as Arc<dyn Notifier>)
        .build()
        .unwrap();

    Harness { _dir: dir, dir_path, session, notifier, client }
}

fn token_body(access: &str, refresh: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "access_token": access,
        "expires_in": 900,
        "token_type": "Bearer",
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    body
}

// ============================================================================
// Login / logout
// ============================================================================

#[tokio::test]
async fn login_stores_tokens_and_persists_them() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({ "username": "admin", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T1", Some("R1"))))
        .mount(&server)
        .await;

    let h = harness(&server, false);
    assert!(!h.session.is_authenticated());

    let pair = h.client.login("admin", "hunter2").await.unwrap();
    assert_eq!(pair.access_token, "T1");
    assert_eq!(h.session.access_token(), Some("T1".to_string()));
    assert_eq!(h.session.refresh_token(), Some("R1".to_string()));

    // A restarted console resumes the session from the vault.
    let resumed = SessionStore::new(Vault::open(&h.dir_path));
    assert_eq!(resumed.access_token(), Some("T1".to_string()));
    assert_eq!(resumed.refresh_token(), Some("R1".to_string()));
}

#[tokio::test]
async fn login_rejects_bad_credentials_without_refreshing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid credentials" })),
        )
        .mount(&server)
        .await;
    // No refresh mock mounted: a refresh attempt would 404 and fail the test
    // through the error variant below.

    let h = harness(&server, false);
    let result = h.client.login("admin", "wrong").await;

    match result {
        Err(ApiError::Unauthorized(message)) => assert_eq!(message, "invalid credentials"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
    assert_eq!(h.notifier.surfaced().len(), 1);
    assert_eq!(h.notifier.surfaced()[0].0, Signal::Unauthorized);
    assert!(!h.session.is_authenticated());
}

#[tokio::test]
async fn logout_clears_memory_and_vault() {
    let server = MockServer::start().await;
    let h = harness(&server, true);

    h.client.logout();

    assert!(!h.session.is_authenticated());
    let resumed = SessionStore::new(Vault::open(&h.dir_path));
    assert!(!resumed.is_authenticated());
}

// ============================================================================
// Request decoration
// ============================================================================

#[tokio::test]
async fn requests_carry_bearer_token_and_correlation_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/apps"))
        .and(header("Authorization", "Bearer T1"))
        .and(header_exists("X-Request-ID"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "apps": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let apps = h.client.list_apps().await.unwrap();
    assert!(apps.is_empty());
}

#[tokio::test]
async fn delete_returns_unit_on_204() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/apps/billing"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let h = harness(&server, true);
    tokio_test::assert_ok!(h.client.delete_app("billing").await);
}

// ============================================================================
// Refresh and replay
// ============================================================================

#[tokio::test]
async fn stale_token_is_refreshed_and_the_request_replayed_once() {
    let server = MockServer::start().await;

    // The stale token is rejected...
    Mock::given(method("GET"))
        .and(path("/api/v1/clusters"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "token expired" })))
        .expect(1)
        .mount(&server)
        .await;
    // ...the refresh rotates both tokens...
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .and(body_json(json!({ "refresh_token": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T2", Some("R2"))))
        .expect(1)
        .mount(&server)
        .await;
    // ...and the replay succeeds with the new one.
    Mock::given(method("GET"))
        .and(path("/api/v1/clusters"))
        .and(header("Authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "clusters": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let clusters = h.client.list_clusters().await.unwrap();

    assert!(clusters.is_empty());
    assert_eq!(h.session.access_token(), Some("T2".to_string()));
    assert_eq!(h.session.refresh_token(), Some("R2".to_string()));
    // The intercepted 401 was not terminal: nothing was surfaced.
    assert!(h.notifier.surfaced().is_empty());
    assert_eq!(h.notifier.sessions_ended(), 0);
}

#[tokio::test]
async fn refresh_keeps_old_refresh_token_when_not_rotated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/emergency"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T2", None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/emergency"))
        .and(header("Authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "active": false,
            "reason": "",
            "duration": 0,
        })))
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let status = h.client.emergency_status().await.unwrap();

    assert!(!status.active);
    assert_eq!(h.session.access_token(), Some("T2".to_string()));
    assert_eq!(h.session.refresh_token(), Some("R1".to_string()));
}

#[tokio::test]
async fn concurrent_401s_share_a_single_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/apps"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    // Slow refresh so all three callers are queued behind it.
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("T2", Some("R2")))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/apps"))
        .and(header("Authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "apps": [] })))
        .expect(3)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let (a, b, c) =
        tokio::join!(h.client.list_apps(), h.client.list_apps(), h.client.list_apps());

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(h.session.access_token(), Some("T2".to_string()));
    assert_eq!(h.notifier.sessions_ended(), 0);
    // expect(1) on the refresh mock verifies the single flight on drop.
}

#[tokio::test]
async fn second_401_after_replay_is_terminal() {
    let server = MockServer::start().await;

    // The server rejects every token, fresh or not.
    Mock::given(method("GET"))
        .and(path("/api/v1/emergency"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "nope" })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T2", Some("R2"))))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let result = h.client.emergency_status().await;

    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    // Exactly one terminal surfacing; no endless refresh loop.
    assert_eq!(h.notifier.surfaced().len(), 1);
    assert_eq!(h.notifier.surfaced()[0].0, Signal::Unauthorized);
}

#[tokio::test]
async fn failed_refresh_ends_the_session_exactly_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/apps"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": "invalid refresh token" }))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let (a, b) = tokio::join!(h.client.list_apps(), h.client.list_apps());

    // Both queued callers reject with the same refresh failure.
    assert!(matches!(a, Err(ApiError::RefreshFailed(_))));
    assert!(matches!(b, Err(ApiError::RefreshFailed(_))));

    // Credentials are gone, from memory and from disk.
    assert!(!h.session.is_authenticated());
    let resumed = SessionStore::new(Vault::open(&h.dir_path));
    assert!(!resumed.is_authenticated());

    // The session ends once, not once per caller.
    assert_eq!(h.notifier.sessions_ended(), 1);
    assert_eq!(h.notifier.surfaced().len(), 1);
}

// ============================================================================
// Status taxonomy
// ============================================================================

#[tokio::test]
async fn statuses_map_to_the_error_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/emergency"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "read only" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/apps/ghost"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "application not found" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/connections"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metrics"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
        .mount(&server)
        .await;

    let h = harness(&server, true);

    assert!(matches!(h.client.emergency_status().await, Err(ApiError::Forbidden(_))));
    match h.client.get_app("ghost").await {
        Err(ApiError::NotFound(message)) => assert_eq!(message, "application not found"),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(matches!(h.client.connection_stats().await, Err(ApiError::RateLimited(_))));
    assert!(matches!(
        h.client.system_metrics().await,
        Err(ApiError::Server { status: 500, .. })
    ));

    let signals: Vec<Signal> = h.notifier.surfaced().iter().map(|(s, _)| *s).collect();
    assert_eq!(
        signals,
        vec![Signal::Forbidden, Signal::NotFound, Signal::RateLimited, Signal::ServerError]
    );
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    // A dedicated listener keeps this server out of wiremock's shared pool,
    // so dropping it actually closes the socket.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let server = MockServer::builder().listener(listener).start().await;
    let h = harness(&server, true);
    // Shut the server down so the connection is refused.
    drop(server);

    let result = h.client.list_apps().await;
    assert!(matches!(result, Err(ApiError::Network(_))));
    assert_eq!(h.notifier.surfaced()[0].0, Signal::NetworkUnreachable);
}

// ============================================================================
// Retry wrapper
// ============================================================================

#[tokio::test]
async fn retry_recovers_from_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metrics"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requests_total": 10,
            "rejected_total": 1,
            "l3_hits": 2,
            "cache_hit_ratio": 0.9,
            "emergency_active": false,
            "degradation_level": "normal",
            "reconcile_corrections": 0,
        })))
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let config = RetryConfig::new(3, Duration::from_millis(1));
    let metrics: fluxgate_domain::SystemMetrics =
        h.client.get_with_retry("/metrics", config).await.unwrap();

    assert_eq!(metrics.requests_total, 10);
}

#[tokio::test]
async fn retry_does_not_reattempt_deterministic_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/apps/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not found" })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let config = RetryConfig::new(3, Duration::from_millis(1));
    let result: Result<fluxgate_domain::AppConfig, _> =
        h.client.get_with_retry("/apps/ghost", config).await;

    assert!(matches!(result, Err(ApiError::NotFound(_))));
    // expect(1) verifies there was no second attempt.
}

#[tokio::test]
async fn retry_exhaustion_returns_the_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metrics"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "error": "overloaded" })))
        .expect(3)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let config = RetryConfig::new(3, Duration::from_millis(1));
    let result: Result<fluxgate_domain::SystemMetrics, _> =
        h.client.get_with_retry("/metrics", config).await;

    // The caller sees the real failure, not a retry wrapper.
    match result {
        Err(ApiError::Server { status: 503, message }) => assert_eq!(message, "overloaded"),
        other => panic!("expected the underlying 503, got {other:?}"),
    }
}
