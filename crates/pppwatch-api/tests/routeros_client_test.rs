#![allow(clippy::unwrap_used)]
// Integration tests for `RouterOsClient` using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pppwatch_api::{Error, NewPppSecret, RouterOsClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RouterOsClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = RouterOsClient::with_client(
        reqwest::Client::new(),
        base_url,
        "admin".into(),
        SecretString::from("s3cret".to_string()),
    );
    (server, client)
}

// "admin:s3cret"
const BASIC_AUTH: &str = "Basic YWRtaW46czNjcmV0";

// ── Handshake ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_probe_returns_identity() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/system/identity"))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "core-rtr-01"})))
        .expect(1)
        .mount(&server)
        .await;

    let identity = client.probe().await.unwrap();
    assert_eq!(identity.name, "core-rtr-01");
}

#[tokio::test]
async fn test_probe_rejected_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/system/identity"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": 401,
            "message": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let result = client.probe().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_unreachable_router_is_transport_error() {
    let client = RouterOsClient::with_client(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:1").unwrap(),
        "admin".into(),
        SecretString::from(String::new()),
    );

    let err = client.probe().await.unwrap_err();
    assert!(err.is_unreachable(), "expected unreachable, got: {err:?}");
}

// ── Listings ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_secrets() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/ppp/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {".id": "*1", "name": "alice", "service": "pppoe", "profile": "10M",
             "comment": "Jl. Mawar 3", "disabled": "false"},
            {".id": "*2", "name": "bob", "service": "pppoe", "disabled": "true"}
        ])))
        .mount(&server)
        .await;

    let secrets = client.list_secrets().await.unwrap();

    assert_eq!(secrets.len(), 2);
    assert_eq!(secrets[0].name, "alice");
    assert_eq!(secrets[0].profile, "10M");
    assert_eq!(secrets[0].comment.as_deref(), Some("Jl. Mawar 3"));
    assert_eq!(secrets[1].profile, "default");
    assert!(secrets[1].disabled);
}

#[tokio::test]
async fn test_list_active_and_interfaces() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/ppp/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {".id": "*80000001", "name": "alice", "service": "pppoe",
             "caller-id": "AA:BB:CC:00:11:22", "address": "10.10.0.2", "uptime": "3h12m"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/interface"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {".id": "*1", "name": "ether1", "type": "ether", "rx-byte": "1", "tx-byte": "2"},
            {".id": "*9", "name": "<pppoe-alice>", "type": "pppoe-in",
             "rx-byte": "5000", "tx-byte": "90000", "running": "true"}
        ])))
        .mount(&server)
        .await;

    let active = client.list_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "*80000001");
    assert_eq!(active[0].address.as_deref(), Some("10.10.0.2"));

    let interfaces = client.list_interfaces().await.unwrap();
    assert_eq!(interfaces.len(), 2);
    assert_eq!(interfaces[1].rx_byte, 5000);
    assert_eq!(interfaces[1].tx_byte, 90_000);
}

#[tokio::test]
async fn test_find_active_filters_by_name() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/ppp/active"))
        .and(query_param("name", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {".id": "*80000001", "name": "alice", "service": "pppoe"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let active = client.find_active("alice").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "*80000001");
    assert_eq!(active[0].name, "alice");
}

#[tokio::test]
async fn test_list_profiles() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/ppp/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {".id": "*0", "name": "default"},
            {".id": "*5", "name": "ISOLIR", "rate-limit": "128k/128k"}
        ])))
        .mount(&server)
        .await;

    let profiles = client.list_profiles().await.unwrap();
    let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["default", "ISOLIR"]);
    assert_eq!(profiles[1].rate_limit.as_deref(), Some("128k/128k"));
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_secret_field_patches_by_id() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/ppp/secret"))
        .and(query_param("name", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {".id": "*1", "name": "alice", "profile": "10M"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/ppp/secret/*1"))
        .and(body_json(json!({"profile": "ISOLIR"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            ".id": "*1", "name": "alice", "profile": "ISOLIR"
        })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_secret_field("alice", "profile", "ISOLIR")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_secret_field_unknown_name() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/ppp/secret"))
        .and(query_param("name", "ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = client
        .set_secret_field("ghost", "comment", "x")
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err:?}");
}

#[tokio::test]
async fn test_remove_active_tolerates_missing_session() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/ppp/active/*80000001"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": 404,
            "message": "Not Found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.remove_active("*80000001").await.unwrap();
}

#[tokio::test]
async fn test_add_secret_reports_routeros_error() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/rest/ppp/secret"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": 400,
            "message": "Bad Request",
            "detail": "failure: secret with the same name already exists"
        })))
        .mount(&server)
        .await;

    let result = client
        .add_secret(&NewPppSecret {
            name: "alice".into(),
            password: "pw".into(),
            service: "pppoe".into(),
            profile: "default".into(),
            comment: None,
        })
        .await;

    match result {
        Err(Error::RouterOs {
            status, detail, ..
        }) => {
            assert_eq!(status, 400);
            assert!(detail.unwrap().contains("already exists"));
        }
        other => panic!("expected RouterOs error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_listing_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/ppp/active"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = client.list_active().await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}
