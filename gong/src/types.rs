use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::EventCategory;

/// Message type tag for webhook payloads forwarded to subscriber blocks.
pub const WEBHOOK_MESSAGE_TYPE: &str = "gong_webhook";

/// Call object carried by Gong webhook deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GongCall {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// Fields Gong sends that this adapter does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Typed view of a webhook delivery as Gong posts it. Only `eventType` is
/// required; everything else is read leniently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GongWebhookPayload {
    /// Kept as a string so categories unknown to this build still decode.
    #[serde(default)]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Exactly as sent, offset included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<GongCall>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GongWebhookPayload {
    /// Whether a raw body is flagged as a vendor test delivery. Looks at
    /// nothing else, so malformed test pings are still recognised.
    pub fn is_test_body(body: &Value) -> bool {
        body.get("isTest").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn category(&self) -> Option<EventCategory> {
        EventCategory::parse(&self.event_type)
    }

    /// Workspace the event belongs to. Empty strings count as absent.
    pub fn workspace_id(&self) -> Option<&str> {
        self.call
            .as_ref()
            .and_then(|c| c.workspace_id.as_deref())
            .filter(|w| !w.is_empty())
    }
}

/// One webhook occurrence being routed, plus the handle used to answer
/// whoever delivered it. `body` is the JSON as received.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub body: Value,
    pub request_id: String,
}

impl InboundEvent {
    pub fn event_type(&self) -> Option<&str> {
        self.body.get("eventType").and_then(Value::as_str)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.body.get("eventId").and_then(Value::as_str)
    }
}

/// A registered consumer of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    #[serde(rename = "blockId")]
    pub subscriber_id: String,
    #[serde(
        rename = "workspaceId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub workspace_id: Option<String>,
}

impl SubscriberRecord {
    pub fn new(subscriber_id: impl Into<String>, workspace_id: Option<&str>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            workspace_id: workspace_id.filter(|w| !w.is_empty()).map(str::to_string),
        }
    }

    /// Fail-open workspace filter: only rejects when both sides carry a
    /// workspace and they differ.
    pub fn accepts(&self, event_workspace: Option<&str>) -> bool {
        match (self.workspace_id.as_deref(), event_workspace) {
            (Some(wanted), Some(actual)) if !wanted.is_empty() => wanted == actual,
            _ => true,
        }
    }
}

/// A delivery batch addressed to every subscriber matched by one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundDelivery {
    pub subscriber_ids: Vec<String>,
    pub category: EventCategory,
    pub event_id: Option<String>,
    /// The webhook body exactly as Gong delivered it.
    pub payload: Value,
}

impl OutboundDelivery {
    /// Message body each subscriber block receives.
    pub fn message(&self) -> Value {
        serde_json::json!({
            "type": WEBHOOK_MESSAGE_TYPE,
            "payload": self.payload,
        })
    }
}

/// Message as a subscriber block receives it from the host.
#[derive(Debug, Clone, Deserialize)]
pub struct HostMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<Value>,
}
