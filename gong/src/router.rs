//! Fan-out of inbound Gong webhooks to subscribed blocks.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::catalog::EventCategory;
use crate::error::Result;
use crate::store::SubscriptionStore;
use crate::transport::{Acknowledgement, DeliveryTransport, DispatchAccepted};
use crate::types::{GongWebhookPayload, InboundEvent, OutboundDelivery};

pub const MSG_TEST_EVENT: &str = "Test webhook received";
pub const MSG_UNRECOGNIZED: &str = "Event type not recognized";
pub const MSG_NO_SUBSCRIBERS: &str = "No subscriptions for this event type";
pub const MSG_PROCESSED: &str = "Webhook processed";
pub const MSG_INTERNAL_ERROR: &str = "Internal error processing webhook";

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    TestEvent,
    Unrecognized { event_type: String },
    NoSubscribers,
    Dispatched { subscriber_ids: Vec<String>, accepted: DispatchAccepted },
    Failed { error: String },
}

impl DeliveryOutcome {
    fn acknowledgement(&self) -> Acknowledgement {
        match self {
            DeliveryOutcome::TestEvent => Acknowledgement::ok(MSG_TEST_EVENT),
            DeliveryOutcome::Unrecognized { .. } => Acknowledgement::ok(MSG_UNRECOGNIZED),
            DeliveryOutcome::NoSubscribers => Acknowledgement::ok(MSG_NO_SUBSCRIBERS),
            DeliveryOutcome::Dispatched { .. } => Acknowledgement::ok(MSG_PROCESSED),
            DeliveryOutcome::Failed { .. } => Acknowledgement::server_error(MSG_INTERNAL_ERROR),
        }
    }
}

#[derive(Clone)]
pub struct WebhookRouter {
    store: SubscriptionStore,
    transport: Arc<dyn DeliveryTransport>,
}

impl WebhookRouter {
    pub fn new(store: SubscriptionStore, transport: Arc<dyn DeliveryTransport>) -> Self {
        Self { store, transport }
    }

    /// Route one event and acknowledge its originator exactly once.
    #[instrument(
        name = "route_webhook",
        skip(self, event),
        fields(
            event_type = ?event.event_type(),
            event_id = ?event.event_id(),
            request_id = %event.request_id,
        )
    )]
    pub async fn route(&self, event: InboundEvent) -> DeliveryOutcome {
        let request_id = event.request_id.clone();
        let outcome = match self.fan_out(event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "webhook routing failed");
                DeliveryOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        if let Err(e) = self
            .transport
            .acknowledge(&request_id, outcome.acknowledgement())
            .await
        {
            error!(error = %e, "failed to acknowledge webhook originator");
        }
        outcome
    }

    async fn fan_out(&self, event: InboundEvent) -> Result<DeliveryOutcome> {
        if GongWebhookPayload::is_test_body(&event.body) {
            debug!("test webhook, not dispatching");
            return Ok(DeliveryOutcome::TestEvent);
        }

        let payload = GongWebhookPayload::deserialize(&event.body)?;

        let Some(category) = payload.category() else {
            info!("ignoring unrecognized event type");
            return Ok(DeliveryOutcome::Unrecognized {
                event_type: payload.event_type,
            });
        };

        let subscribers = self.store.get(category).await?.unwrap_or_default();
        let workspace = payload.workspace_id();
        let subscriber_ids: Vec<String> = subscribers
            .into_iter()
            .filter(|record| record.accepts(workspace))
            .map(|record| record.subscriber_id)
            .collect();

        if subscriber_ids.is_empty() {
            debug!(%category, "no matching subscribers");
            return Ok(DeliveryOutcome::NoSubscribers);
        }

        let delivery = OutboundDelivery {
            subscriber_ids: subscriber_ids.clone(),
            category,
            event_id: payload.event_id,
            payload: event.body,
        };
        let accepted = self.transport.dispatch(delivery).await?;
        info!(
            %category,
            recipients = accepted.recipients,
            "dispatched webhook to subscribers"
        );
        Ok(DeliveryOutcome::Dispatched {
            subscriber_ids,
            accepted,
        })
    }

    /// Categories that currently have at least one subscriber.
    pub async fn active_categories(&self) -> Result<Vec<EventCategory>> {
        let mut active = Vec::new();
        for category in EventCategory::ALL {
            if self.store.get(category).await?.is_some_and(|l| !l.is_empty()) {
                active.push(category);
            }
        }
        Ok(active)
    }
}
