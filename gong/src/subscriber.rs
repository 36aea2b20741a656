//! Subscriber-block side of the fan-out: turning a forwarded webhook
//! message into the event a subscription block emits.

use serde::Serialize;

use crate::catalog::EventCategory;
use crate::types::{GongCall, GongWebhookPayload, HostMessage, WEBHOOK_MESSAGE_TYPE};

/// What a subscription block emits for a matching webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberEmission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
    pub call: Option<GongCall>,
}

/// Returns the emission for a block subscribed to `category`, or `None`
/// when the message is not a webhook or belongs to another category.
pub fn receive(category: EventCategory, message: &HostMessage) -> Option<SubscriberEmission> {
    if message.kind != WEBHOOK_MESSAGE_TYPE {
        return None;
    }
    let payload: GongWebhookPayload =
        serde_json::from_value(message.payload.clone()?).ok()?;
    if payload.category() != Some(category) {
        return None;
    }
    Some(SubscriberEmission {
        event_id: payload.event_id,
        event_time: payload.event_time,
        call: payload.call,
    })
}
