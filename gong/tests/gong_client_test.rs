//! Gong API client against a mock server.

use nexus_gong::config::GongConfig;
use nexus_gong::gong_client::{CallSearch, GongClient};
use nexus_gong::Error;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("key:secret")
const BASIC_AUTH: &str = "Basic a2V5OnNlY3JldA==";

fn client(server: &MockServer) -> GongClient {
    GongClient::new(&GongConfig {
        access_key: Some("key".into()),
        access_key_secret: Some("secret".into()),
        api_base_url: format!("{}/", server.uri()),
    })
    .expect("client")
}

#[tokio::test]
async fn search_calls_passes_filters_and_cursor_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/calls"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_json(json!({
            "filter": { "workspaceIds": ["W1"] },
            "cursor": "page-2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calls": [{ "id": "c1" }],
            "records": { "cursor": "page-3", "totalRecords": 41 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = client(&server)
        .search_calls(&CallSearch {
            workspace_id: Some("W1".into()),
            cursor: Some("page-2".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(
        out,
        json!({ "calls": [{ "id": "c1" }], "cursor": "page-3", "totalRecords": 41 })
    );
}

#[tokio::test]
async fn last_page_has_no_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/calls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": {} })))
        .mount(&server)
        .await;

    let out = client(&server).search_calls(&CallSearch::default()).await.unwrap();
    assert_eq!(out, json!({ "calls": [] }));
}

#[tokio::test]
async fn call_details_picks_known_sections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/calls/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "call": { "id": "c1" },
            "parties": [{ "name": "Ada" }],
            "requestId": "ignored"
        })))
        .mount(&server)
        .await;

    let out = client(&server).get_call_details("c1").await.unwrap();
    assert_eq!(out["call"]["id"], "c1");
    assert_eq!(out["parties"][0]["name"], "Ada");
    assert!(out["content"].is_null());
    assert!(out.get("requestId").is_none());
}

#[tokio::test]
async fn transcript_returns_first_match() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/calls/transcript"))
        .and(body_json(json!({ "filter": { "callIds": ["c1"] } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "callTranscripts": [{ "callId": "c1" }]
        })))
        .mount(&server)
        .await;

    let out = client(&server).get_call_transcript("c1").await.unwrap();
    assert_eq!(out, json!({ "callId": "c1", "transcript": [] }));
}

#[tokio::test]
async fn missing_transcript_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/calls/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "callTranscripts": [] })))
        .mount(&server)
        .await;

    let err = client(&server).get_call_transcript("c9").await.unwrap_err();
    assert_eq!(err.to_string(), "No transcript found for call c9");
}

#[tokio::test]
async fn user_lookup_queries_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .and(query_param("ids", "u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "id": "u1", "emailAddress": "ada@example.com" }]
        })))
        .mount(&server)
        .await;

    let out = client(&server).get_user_details("u1").await.unwrap();
    assert_eq!(out["user"]["emailAddress"], "ada@example.com");
}

#[tokio::test]
async fn upstream_errors_carry_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let err = client(&server).validate_credentials().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Gong API error (GET v2/users): 401 Unauthorized - bad credentials"
    );
    match err {
        Error::Upstream {
            method,
            endpoint,
            status,
            status_text,
            body,
        } => {
            assert_eq!(method, "GET");
            assert_eq!(endpoint, "v2/users");
            assert_eq!(status, 401);
            assert_eq!(status_text, "Unauthorized");
            assert_eq!(body, "bad credentials");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_success_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    client(&server).validate_credentials().await.unwrap();
}
