//! Operations exposed to the host through `execute`.

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::EventCategory;
use crate::error::{Error, Result};
use crate::gong_client::CallSearch;
use crate::state::AppState;
use crate::subscriber;
use crate::types::HostMessage;

pub type SharedState = Arc<RwLock<AppState>>;

fn required_str<'a>(input: &'a Value, field: &str) -> Result<&'a str> {
    input
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("missing required field: {field}")))
}

fn optional_str<'a>(input: &'a Value, field: &str) -> Option<&'a str> {
    input.get(field).and_then(|v| v.as_str())
}

fn category(input: &Value) -> Result<EventCategory> {
    required_str(input, "event_type")?.parse()
}

pub async fn execute(operation: &str, input: &Value, state: &SharedState) -> Result<Value> {
    match operation {
        "get_server_info" => op_get_server_info(state).await,
        "sync" => op_sync(state).await,
        "list_event_types" => op_list_event_types(),
        "subscribe" => op_subscribe(input, state).await,
        "unsubscribe" => op_unsubscribe(input, state).await,
        "list_subscriptions" => op_list_subscriptions(input, state).await,
        "receive_message" => op_receive_message(input),
        "search_calls" => op_search_calls(input, state).await,
        "get_call_details" => op_get_call_details(input, state).await,
        "get_call_transcript" => op_get_call_transcript(input, state).await,
        "get_user_details" => op_get_user_details(input, state).await,
        _ => Err(Error::InvalidInput(format!("Unknown operation: {operation}"))),
    }
}

pub fn status_json(st: &AppState) -> Value {
    json!({
        "ready": st.status == crate::state::SyncStatus::Ready,
        "status": st.status.as_str(),
        "description": st.status.description(),
        "port": st.port,
        "webhook_url": st.webhook_url(),
    })
}

async fn op_get_server_info(state: &SharedState) -> Result<Value> {
    let st = state.read().await;
    let active: Vec<&str> = st
        .router
        .active_categories()
        .await?
        .into_iter()
        .map(EventCategory::as_str)
        .collect();
    let mut info = status_json(&st);
    info["api_base_url"] = json!(st.config.config.base_url());
    info["active_event_types"] = json!(active);
    Ok(info)
}

async fn op_sync(state: &SharedState) -> Result<Value> {
    let mut st = state.write().await;
    st.sync().await;
    Ok(status_json(&st))
}

fn op_list_event_types() -> Result<Value> {
    let items: Vec<Value> = EventCategory::ALL
        .into_iter()
        .map(|c| c.entry().to_json())
        .collect();
    Ok(json!({ "event_types": items }))
}

/// Block activation: register `block_id` for `event_type`.
async fn op_subscribe(input: &Value, state: &SharedState) -> Result<Value> {
    let category = category(input)?;
    let block_id = required_str(input, "block_id")?;
    let workspace_id = optional_str(input, "workspace_id");

    let registry = state.read().await.registry.clone();
    let registered = registry.register(category, block_id, workspace_id).await?;
    Ok(json!({ "registered": registered, "status": "ready" }))
}

/// Block drain: remove `block_id` from `event_type`.
async fn op_unsubscribe(input: &Value, state: &SharedState) -> Result<Value> {
    let category = category(input)?;
    let block_id = required_str(input, "block_id")?;

    let registry = state.read().await.registry.clone();
    let removed = registry.unregister(category, block_id).await?;
    Ok(json!({ "removed": removed, "status": "drained" }))
}

async fn op_list_subscriptions(input: &Value, state: &SharedState) -> Result<Value> {
    let categories = match optional_str(input, "event_type") {
        Some(t) => vec![t.parse::<EventCategory>()?],
        None => EventCategory::ALL.to_vec(),
    };

    let registry = state.read().await.registry.clone();
    let mut out = serde_json::Map::new();
    for c in categories {
        let list = registry.subscribers(c).await?;
        out.insert(c.as_str().to_string(), serde_json::to_value(list)?);
    }
    Ok(json!({ "subscriptions": out }))
}

/// Inbound-message handler of a subscription block.
fn op_receive_message(input: &Value) -> Result<Value> {
    let category = category(input)?;
    let message: HostMessage = input
        .get("message")
        .cloned()
        .ok_or_else(|| Error::InvalidInput("missing required field: message".into()))
        .and_then(|m| {
            serde_json::from_value(m)
                .map_err(|e| Error::InvalidInput(format!("invalid message: {e}")))
        })?;

    match subscriber::receive(category, &message) {
        Some(emission) => Ok(json!({ "emit": true, "event": emission })),
        None => Ok(json!({ "emit": false })),
    }
}

async fn op_search_calls(input: &Value, state: &SharedState) -> Result<Value> {
    let search: CallSearch = serde_json::from_value(input.clone())
        .map_err(|e| Error::InvalidInput(format!("invalid search filters: {e}")))?;
    let st = state.read().await;
    st.client()?.search_calls(&search).await
}

async fn op_get_call_details(input: &Value, state: &SharedState) -> Result<Value> {
    let call_id = required_str(input, "call_id")?;
    let st = state.read().await;
    st.client()?.get_call_details(call_id).await
}

async fn op_get_call_transcript(input: &Value, state: &SharedState) -> Result<Value> {
    let call_id = required_str(input, "call_id")?;
    let st = state.read().await;
    st.client()?.get_call_transcript(call_id).await
}

async fn op_get_user_details(input: &Value, state: &SharedState) -> Result<Value> {
    let user_id = required_str(input, "user_id")?;
    let st = state.read().await;
    st.client()?.get_user_details(user_id).await
}
