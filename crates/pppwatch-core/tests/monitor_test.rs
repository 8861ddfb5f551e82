#![allow(clippy::unwrap_used)]
// End-to-end tests for `Monitor`: the real RouterOS connector against a
// wiremock router, backed by the in-memory repository.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pppwatch_core::{
    Counters, CoreError, EngineConfig, GeoPoint, IsolationAction, MemoryRepository, Monitor, NewRouter,
    NewSubscriber, ReconcileBatch, Repository, Router, RouterId, RouterOsConnector,
    SubscriberRecord, TelegramNotifier, UsageRecord,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct Fixture {
    server: MockServer,
    repo: Arc<MemoryRepository>,
    monitor: Monitor,
    router: Router,
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        live_fetch_timeout: Duration::from_millis(500),
        device_timeout: Duration::from_secs(5),
        ..EngineConfig::default()
    }
}

fn new_router(server: &MockServer, quarantine: Option<&str>) -> NewRouter {
    let addr = server.address();
    NewRouter {
        name: "Tower A".into(),
        host: addr.ip().to_string(),
        port: Some(addr.port()),
        username: "admin".into(),
        password: SecretString::from("s3cret".to_string()),
        use_tls: false,
        active: None,
        quarantine_profile: quarantine.map(Into::into),
        telegram_bot_token: None,
        telegram_chat_id: None,
    }
}

async fn setup() -> Fixture {
    let server = MockServer::start().await;
    let repo = Arc::new(MemoryRepository::new());
    let config = engine_config();
    let monitor = Monitor::builder(repo.clone(), Arc::new(RouterOsConnector::new(&config)))
        .config(config)
        .build();
    let router = monitor
        .add_router(new_router(&server, Some("ISOLIR")))
        .await
        .unwrap();
    Fixture {
        server,
        repo,
        monitor,
        router,
    }
}

fn secret(id: &str, name: &str, profile: &str) -> Value {
    json!({".id": id, "name": name, "service": "pppoe", "profile": profile, "disabled": "false"})
}

fn active(id: &str, name: &str) -> Value {
    json!({".id": id, "name": name, "service": "pppoe", "address": "10.10.0.2", "uptime": "1h2m"})
}

fn tunnel(name: &str, rx: u64, tx: u64) -> Value {
    json!({
        ".id": format!("*I{name}"),
        "name": format!("<pppoe-{name}>"),
        "type": "pppoe-in",
        "rx-byte": rx.to_string(),
        "tx-byte": tx.to_string(),
        "running": "true"
    })
}

/// Replace the router's whole state.
async fn device_state(server: &MockServer, secrets: Value, active: Value, interfaces: Value) {
    server.reset().await;
    mount_get(server, "/rest/system/identity", json!({"name": "core-rtr-01"})).await;
    mount_get(server, "/rest/ppp/secret", secrets).await;
    mount_get(server, "/rest/ppp/active", active).await;
    mount_get(server, "/rest/interface", interfaces).await;
}

async fn mount_get(server: &MockServer, at: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn stored(repo: &MemoryRepository, router: RouterId, name: &str) -> (Counters, Counters) {
    let row = repo.get_subscriber(router, name).await.unwrap().unwrap();
    (row.accumulated, row.current)
}

// ── Sync ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sync_persists_and_serves_from_cache() {
    let f = setup().await;
    device_state(
        &f.server,
        json!([secret("*1", "alice", "10M"), secret("*2", "bob", "10M")]),
        json!([active("*A1", "alice")]),
        json!([tunnel("alice", 1_000, 4_000)]),
    )
    .await;

    let outcome = f.monitor.sync_router(&f.router).await.unwrap();
    assert_eq!(outcome.identity, "core-rtr-01");
    assert_eq!(outcome.logins, vec!["alice".to_string()]);
    assert_eq!(outcome.subscribers, 2);

    // Interface rx is the subscriber's upload.
    assert_eq!(
        stored(&f.repo, f.router.id, "alice").await,
        (Counters::ZERO, Counters::new(1_000, 4_000))
    );
    let synced = f.repo.get_router(f.router.id).await.unwrap().unwrap();
    assert!(synced.last_sync.is_some());

    // Served from cache: the router is not asked again.
    f.server.reset().await;
    let list = f.monitor.list_subscribers(f.router.id).await.unwrap();
    let names: Vec<&str> = list.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);
    assert!(list[0].is_online);
    assert_eq!(list[0].address.as_deref(), Some("10.10.0.2"));
    assert!(f.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_counter_reset_and_logout_fold_into_accumulated() {
    let f = setup().await;
    let secrets = json!([secret("*1", "alice", "10M")]);

    device_state(&f.server, secrets.clone(), json!([active("*A1", "alice")]), json!([tunnel("alice", 5_000, 5_000)])).await;
    f.monitor.sync_router(&f.router).await.unwrap();

    // Reconnect: counters restart lower.
    device_state(&f.server, secrets.clone(), json!([active("*A2", "alice")]), json!([tunnel("alice", 200, 300)])).await;
    f.monitor.sync_router(&f.router).await.unwrap();
    assert_eq!(
        stored(&f.repo, f.router.id, "alice").await,
        (Counters::new(5_000, 5_000), Counters::new(200, 300))
    );

    // Offline twice: folded once.
    device_state(&f.server, secrets.clone(), json!([]), json!([])).await;
    let outcome = f.monitor.sync_router(&f.router).await.unwrap();
    assert_eq!(outcome.logouts, vec!["alice".to_string()]);
    f.monitor.sync_router(&f.router).await.unwrap();

    assert_eq!(
        stored(&f.repo, f.router.id, "alice").await,
        (Counters::new(5_200, 5_300), Counters::ZERO)
    );
    assert_eq!(f.repo.history().await.len(), 1);

    let usage = f.monitor.usage_summary(f.router.id, "alice").await.unwrap();
    assert_eq!(usage.total, Counters::new(5_200, 5_300));
    assert!(!usage.is_online);
}

#[tokio::test]
async fn test_deleted_secret_disappears_and_session_is_dropped() {
    let f = setup().await;
    device_state(
        &f.server,
        json!([secret("*1", "alice", "10M"), secret("*2", "bob", "10M")]),
        json!([active("*A2", "bob")]),
        json!([tunnel("bob", 10, 10)]),
    )
    .await;
    f.monitor.sync_router(&f.router).await.unwrap();

    device_state(
        &f.server,
        json!([secret("*1", "alice", "10M")]),
        json!([active("*A2", "bob")]),
        json!([tunnel("bob", 20, 20)]),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/ppp/active/*A2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&f.server)
        .await;

    let outcome = f.monitor.sync_router(&f.router).await.unwrap();

    assert_eq!(outcome.deleted, vec!["bob".to_string()]);
    assert!(f.repo.get_subscriber(f.router.id, "bob").await.unwrap().is_none());
    let list = f.monitor.list_subscribers(f.router.id).await.unwrap();
    assert!(list.iter().all(|s| s.name != "bob"));
    // Usage history outlives the row.
    assert_eq!(f.repo.history().await.len(), 1);
}

#[tokio::test]
async fn test_unreachable_router_does_not_abort_cycle() {
    let f = setup().await;
    device_state(&f.server, json!([secret("*1", "alice", "10M")]), json!([]), json!([])).await;

    let mut dead = new_router(&f.server, None);
    dead.name = "Tower B".into();
    dead.host = "127.0.0.1".into();
    dead.port = Some(1);
    f.monitor.add_router(dead).await.unwrap();

    let summary = f.monitor.run_cycle().await;

    assert_eq!(summary.routers, 2);
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_inactive_router_is_skipped() {
    let f = setup().await;
    f.monitor
        .update_router(
            f.router.id,
            pppwatch_core::RouterUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let summary = f.monitor.run_cycle().await;

    assert_eq!(summary.routers, 0);
    assert!(f.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_now_adopts_router_identity() {
    let f = setup().await;
    device_state(&f.server, json!([]), json!([]), json!([])).await;

    f.monitor.sync_now(f.router.id).await.unwrap();

    let router = f.monitor.router(f.router.id).await.unwrap();
    assert_eq!(router.name, "core-rtr-01");
    assert!(router.last_sync.is_some());
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cache_miss_goes_live_without_persisting() {
    let f = setup().await;
    device_state(
        &f.server,
        json!([secret("*1", "alice", "10M")]),
        json!([active("*A1", "alice")]),
        json!([tunnel("alice", 7, 8)]),
    )
    .await;

    let list = f.monitor.list_subscribers(f.router.id).await.unwrap();

    assert_eq!(list.len(), 1);
    assert_eq!(list[0].current, Counters::new(7, 8));
    assert!(f.repo.get_subscriber(f.router.id, "alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_slow_router_yields_empty_list() {
    let f = setup().await;
    Mock::given(method("GET"))
        .and(path("/rest/system/identity"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "slow"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&f.server)
        .await;

    let list = f.monitor.list_subscribers(f.router.id).await.unwrap();

    assert!(list.is_empty());
}

#[tokio::test]
async fn test_unknown_router_is_not_found() {
    let f = setup().await;

    let err = f.monitor.list_subscribers(RouterId::new()).await.unwrap_err();

    assert!(matches!(err, CoreError::RouterNotFound { .. }));
}

#[tokio::test]
async fn test_connection_probe_reports_failure() {
    let f = setup().await;
    let ok = f.monitor.test_connection(f.router.id).await;
    // Nothing mounted yet: wiremock answers 404.
    assert!(!ok.unwrap().connected);

    device_state(&f.server, json!([]), json!([]), json!([])).await;
    let probe = f.monitor.test_connection(f.router.id).await.unwrap();
    assert!(probe.connected);
    assert_eq!(probe.identity.as_deref(), Some("core-rtr-01"));
}

#[tokio::test]
async fn test_profiles_degrade_to_empty() {
    let f = setup().await;
    device_state(&f.server, json!([]), json!([]), json!([])).await;
    Mock::given(method("GET"))
        .and(path("/rest/ppp/profile"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": 500, "message": "Internal Server Error"
        })))
        .mount(&f.server)
        .await;

    assert!(f.monitor.list_profiles(f.router.id).await.unwrap().is_empty());
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_isolation_round_trip_against_router() {
    let f = setup().await;
    device_state(
        &f.server,
        json!([secret("*1", "alice", "default")]),
        json!([active("*A1", "alice")]),
        json!([]),
    )
    .await;
    f.monitor.sync_router(&f.router).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/ppp/secret"))
        .and(query_param("name", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([secret("*1", "alice", "default")])))
        .with_priority(1)
        .up_to_n_times(2)
        .mount(&f.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/ppp/secret/*1"))
        .and(body_json(json!({"profile": "ISOLIR"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&f.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/ppp/active"))
        .and(query_param("name", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([active("*A1", "alice")])))
        .with_priority(1)
        .expect(1..)
        .mount(&f.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/ppp/active/*A1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&f.server)
        .await;

    let out = f.monitor.toggle_isolation(f.router.id, "alice", None).await.unwrap();
    assert_eq!(out.action, IsolationAction::Isolated);
    assert_eq!(out.sessions_removed, 1);
    assert!(f.monitor.cache().get(f.router.id).is_none());

    // The device now reports the quarantine profile.
    Mock::given(method("GET"))
        .and(path("/rest/ppp/secret"))
        .and(query_param("name", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([secret("*1", "alice", "ISOLIR")])))
        .with_priority(1)
        .mount(&f.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/ppp/secret/*1"))
        .and(body_json(json!({"profile": "default"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&f.server)
        .await;

    let out = f.monitor.toggle_isolation(f.router.id, "alice", None).await.unwrap();
    assert_eq!(out.action, IsolationAction::Restored);
    assert_eq!(out.profile, "default");

    let row = f.repo.get_subscriber(f.router.id, "alice").await.unwrap().unwrap();
    assert_eq!(row.original_profile, None);
}

#[tokio::test]
async fn test_isolation_without_quarantine_profile_never_calls_router() {
    let f = setup().await;
    let router = f
        .monitor
        .add_router(new_router(&f.server, None))
        .await
        .unwrap();

    let err = f
        .monitor
        .toggle_isolation(router.id, "alice", None)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::NoQuarantineProfile { ref router } if router == "Tower A"));
    assert!(f.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_isolation_during_sync_leaves_cache_empty() {
    let f = setup().await;
    f.server.reset().await;
    mount_get(&f.server, "/rest/system/identity", json!({"name": "core-rtr-01"})).await;
    mount_get(&f.server, "/rest/ppp/secret", json!([secret("*1", "alice", "default")])).await;
    mount_get(&f.server, "/rest/ppp/active", json!([])).await;
    // Hold the sync inside its device read while the isolation lands.
    Mock::given(method("GET"))
        .and(path("/rest/interface"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&f.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/ppp/secret"))
        .and(query_param("name", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([secret("*1", "alice", "default")])))
        .with_priority(1)
        .mount(&f.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/ppp/secret/*1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&f.server)
        .await;

    let monitor = f.monitor.clone();
    let router = f.router.clone();
    let sync = tokio::spawn(async move { monitor.sync_router(&router).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let out = f.monitor.toggle_isolation(f.router.id, "alice", None).await.unwrap();
    assert_eq!(out.action, IsolationAction::Isolated);

    // The sync read `default` before the change; its list must not be served.
    sync.await.unwrap().unwrap();
    assert!(f.monitor.cache().get(f.router.id).is_none());
}

#[tokio::test]
async fn test_set_comment_writes_device_then_store() {
    let f = setup().await;
    device_state(&f.server, json!([secret("*1", "alice", "10M")]), json!([]), json!([])).await;
    f.monitor.sync_router(&f.router).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/ppp/secret"))
        .and(query_param("name", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([secret("*1", "alice", "10M")])))
        .with_priority(1)
        .mount(&f.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/ppp/secret/*1"))
        .and(body_json(json!({"comment": "Jl. Melati 4"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&f.server)
        .await;

    f.monitor
        .set_comment(f.router.id, "alice", "  Jl. Melati 4 ")
        .await
        .unwrap();

    let row = f.repo.get_subscriber(f.router.id, "alice").await.unwrap().unwrap();
    assert_eq!(row.comment.as_deref(), Some("Jl. Melati 4"));
    assert!(f.monitor.cache().get(f.router.id).is_none());
}

#[tokio::test]
async fn test_set_location_is_local_only() {
    let f = setup().await;
    device_state(&f.server, json!([secret("*1", "alice", "10M")]), json!([]), json!([])).await;
    f.monitor.sync_router(&f.router).await.unwrap();
    let requests_before = f.server.received_requests().await.unwrap().len();

    let point = GeoPoint::new(-6.2, 106.8).unwrap();
    f.monitor
        .set_location(f.router.id, "alice", Some(point))
        .await
        .unwrap();

    let row = f.repo.get_subscriber(f.router.id, "alice").await.unwrap().unwrap();
    assert_eq!(row.location, Some(point));
    assert!(f.monitor.cache().get(f.router.id).is_none());
    assert_eq!(
        f.server.received_requests().await.unwrap().len(),
        requests_before
    );

    f.monitor.set_location(f.router.id, "alice", None).await.unwrap();
    let row = f.repo.get_subscriber(f.router.id, "alice").await.unwrap().unwrap();
    assert_eq!(row.location, None);

    assert!(matches!(
        f.monitor.set_location(f.router.id, "ghost", None).await,
        Err(CoreError::SubscriberNotFound { .. })
    ));
}

#[tokio::test]
async fn test_create_subscriber_puts_secret_and_syncs() {
    let f = setup().await;
    device_state(&f.server, json!([secret("*9", "dave", "10M")]), json!([]), json!([])).await;
    Mock::given(method("PUT"))
        .and(path("/rest/ppp/secret"))
        .and(body_json(json!({
            "name": "dave",
            "password": "hunter2",
            "service": "pppoe",
            "profile": "10M"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({".id": "*9"})))
        .expect(1)
        .mount(&f.server)
        .await;

    f.monitor
        .create_subscriber(
            f.router.id,
            &NewSubscriber {
                name: "dave".into(),
                password: SecretString::from("hunter2".to_string()),
                profile: "10M".into(),
                service: None,
                comment: None,
            },
        )
        .await
        .unwrap();

    assert!(f.repo.get_subscriber(f.router.id, "dave").await.unwrap().is_some());
}

#[tokio::test]
async fn test_remove_router_drops_cache() {
    let f = setup().await;
    device_state(&f.server, json!([]), json!([]), json!([])).await;
    f.monitor.sync_router(&f.router).await.unwrap();
    assert!(f.monitor.cache().get(f.router.id).is_some());

    f.monitor.remove_router(f.router.id).await.unwrap();

    assert!(f.monitor.cache().get(f.router.id).is_none());
    assert!(matches!(
        f.monitor.remove_router(f.router.id).await,
        Err(CoreError::RouterNotFound { .. })
    ));
}

// ── Notifications ───────────────────────────────────────────────────

/// In-memory store whose `last_sync` stamp always fails.
struct StampFailingRepository(MemoryRepository);

#[async_trait]
impl Repository for StampFailingRepository {
    async fn list_routers(&self) -> Result<Vec<Router>, CoreError> {
        self.0.list_routers().await
    }

    async fn get_router(&self, id: RouterId) -> Result<Option<Router>, CoreError> {
        self.0.get_router(id).await
    }

    async fn insert_router(&self, router: &Router) -> Result<(), CoreError> {
        self.0.insert_router(router).await
    }

    async fn update_router(&self, router: &Router) -> Result<bool, CoreError> {
        self.0.update_router(router).await
    }

    async fn delete_router(&self, id: RouterId) -> Result<bool, CoreError> {
        self.0.delete_router(id).await
    }

    async fn mark_synced(&self, _id: RouterId, _at: DateTime<Utc>) -> Result<(), CoreError> {
        Err(CoreError::Storage {
            message: "database is locked".into(),
        })
    }

    async fn load_subscribers(&self, router: RouterId) -> Result<Vec<SubscriberRecord>, CoreError> {
        self.0.load_subscribers(router).await
    }

    async fn get_subscriber(
        &self,
        router: RouterId,
        name: &str,
    ) -> Result<Option<SubscriberRecord>, CoreError> {
        self.0.get_subscriber(router, name).await
    }

    async fn apply_batch(&self, router: RouterId, batch: &ReconcileBatch) -> Result<(), CoreError> {
        self.0.apply_batch(router, batch).await
    }

    async fn set_original_profile(
        &self,
        router: RouterId,
        name: &str,
        profile: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.0.set_original_profile(router, name, profile, now).await
    }

    async fn set_comment(
        &self,
        router: RouterId,
        name: &str,
        comment: Option<&str>,
    ) -> Result<bool, CoreError> {
        self.0.set_comment(router, name, comment).await
    }

    async fn set_location(
        &self,
        router: RouterId,
        name: &str,
        location: Option<GeoPoint>,
    ) -> Result<bool, CoreError> {
        self.0.set_location(router, name, location).await
    }

    async fn recent_usage(
        &self,
        router: RouterId,
        name: &str,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, CoreError> {
        self.0.recent_usage(router, name, limit).await
    }
}

async fn telegram_server() -> MockServer {
    let telegram = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&telegram)
        .await;
    telegram
}

fn reporting_monitor(repo: Arc<dyn Repository>, telegram: &MockServer) -> Monitor {
    let config = engine_config();
    let notifier = TelegramNotifier::with_client(
        reqwest::Client::new(),
        Url::parse(&telegram.uri()).unwrap(),
    );
    Monitor::builder(repo, Arc::new(RouterOsConnector::new(&config)))
        .config(config)
        .notifier(Arc::new(notifier))
        .build()
}

fn reporting_router(server: &MockServer) -> NewRouter {
    let mut new = new_router(server, None);
    new.telegram_bot_token = Some(SecretString::from("123:abc".to_string()));
    new.telegram_chat_id = Some("-100200".into());
    new
}

#[tokio::test]
async fn test_login_report_is_sent_to_telegram() {
    let telegram = telegram_server().await;
    let server = MockServer::start().await;
    let monitor = reporting_monitor(Arc::new(MemoryRepository::new()), &telegram);
    let router = monitor.add_router(reporting_router(&server)).await.unwrap();

    device_state(&server, json!([secret("*1", "alice", "10M")]), json!([active("*A1", "alice")]), json!([])).await;
    monitor.sync_router(&router).await.unwrap();

    // Delivery is detached from the cycle; shutdown drains it.
    monitor.shutdown().await;
    let delivered = telegram.received_requests().await.unwrap();
    assert_eq!(delivered.len(), 1);
    let body: Value = serde_json::from_slice(&delivered[0].body).unwrap();
    assert_eq!(body["chat_id"], "-100200");
    assert_eq!(body["parse_mode"], "HTML");
    assert!(body["text"].as_str().unwrap().contains("1. alice"));
}

#[tokio::test]
async fn test_report_survives_failed_sync_stamp() {
    let telegram = telegram_server().await;
    let server = MockServer::start().await;
    let repo = Arc::new(StampFailingRepository(MemoryRepository::new()));
    let monitor = reporting_monitor(repo.clone(), &telegram);
    let router = monitor.add_router(reporting_router(&server)).await.unwrap();

    device_state(&server, json!([secret("*1", "alice", "10M")]), json!([active("*A1", "alice")]), json!([])).await;
    let outcome = monitor.sync_router(&router).await.unwrap();
    assert_eq!(outcome.logins, vec!["alice".to_string()]);

    monitor.shutdown().await;
    let delivered = telegram.received_requests().await.unwrap();
    assert_eq!(delivered.len(), 1);
    assert!(repo.get_subscriber(router.id, "alice").await.unwrap().is_some());
    assert_eq!(repo.get_router(router.id).await.unwrap().unwrap().last_sync, None);
}
