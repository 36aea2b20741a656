//! Readiness sync, persistence of subscriptions, and the live ingress.

use nexus_gong::config::ExtensionConfig;
use nexus_gong::ops::{self, SharedState};
use nexus_gong::state::{AppState, SyncStatus};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(data_dir: &std::path::Path, base_url: &str) -> ExtensionConfig {
    ExtensionConfig::from_params(&json!({
        "data_dir": data_dir,
        "config": {
            "access_key": "key",
            "access_key_secret": "secret",
            "api_base_url": base_url
        }
    }))
    .expect("config")
}

async fn mock_gong(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "users": [] })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn rejected_credentials_leave_ingress_down() {
    let dir = tempfile::tempdir().unwrap();
    let gong = mock_gong(401).await;

    let mut st = AppState::open(config(dir.path(), &gong.uri())).await.unwrap();
    assert_eq!(st.sync().await, &SyncStatus::Failed("Auth failed".into()));
    assert!(st.port.is_none());
    assert!(st.client().is_err());
}

#[tokio::test]
async fn subscriptions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "http://127.0.0.1:9");

    let state: SharedState = Arc::new(RwLock::new(AppState::open(cfg.clone()).await.unwrap()));
    ops::execute(
        "subscribe",
        &json!({ "event_type": "call-analyzed", "block_id": "blockA", "workspace_id": "W1" }),
        &state,
    )
    .await
    .unwrap();
    drop(state);

    let state: SharedState = Arc::new(RwLock::new(AppState::open(cfg).await.unwrap()));
    let listed = ops::execute("list_subscriptions", &json!({}), &state)
        .await
        .unwrap();
    assert_eq!(
        listed["subscriptions"]["call-analyzed"],
        json!([{ "blockId": "blockA", "workspaceId": "W1" }])
    );
    assert_eq!(listed["subscriptions"]["call-created"], json!([]));
}

#[tokio::test]
async fn ready_extension_routes_live_webhooks_to_outbox() {
    let dir = tempfile::tempdir().unwrap();
    let gong = mock_gong(200).await;

    let state: SharedState = Arc::new(RwLock::new(
        AppState::open(config(dir.path(), &gong.uri())).await.unwrap(),
    ));
    let info = ops::execute("sync", &json!({}), &state).await.unwrap();
    assert_eq!(info["status"], "ready");
    let url = info["webhook_url"].as_str().expect("webhook url").to_string();

    ops::execute(
        "subscribe",
        &json!({ "event_type": "call-transcript-ready", "block_id": "blockT" }),
        &state,
    )
    .await
    .unwrap();

    let resp = reqwest::Client::new()
        .post(&url)
        .json(&json!({
            "eventType": "call-transcript-ready",
            "eventId": "e7",
            "eventTime": "2025-06-01T12:00:00Z",
            "call": { "id": "c7" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let delivered = state.write().await.take_outbox();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].subscriber_ids, vec!["blockT".to_string()]);
    assert_eq!(delivered[0].event_id.as_deref(), Some("e7"));

    let info = ops::execute("get_server_info", &json!({}), &state).await.unwrap();
    assert_eq!(info["active_event_types"], json!(["call-transcript-ready"]));
}
