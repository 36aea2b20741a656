//! How the router talks to the outside world: handing delivery batches to
//! the host, and answering whoever posted the webhook.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::OutboundDelivery;

/// Answer sent back to the originator of an inbound delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    pub status: u16,
    pub body: Value,
}

impl Acknowledgement {
    pub fn ok(message: &str) -> Self {
        Self {
            status: 200,
            body: json!({ "message": message }),
        }
    }

    pub fn server_error(error: &str) -> Self {
        Self {
            status: 500,
            body: json!({ "error": error }),
        }
    }
}

/// Receipt for a dispatch the transport has taken responsibility for.
/// Says nothing about whether any subscriber has processed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchAccepted {
    pub recipients: usize,
}

#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Hand one batch to the transport for at-least-once delivery to every
    /// named subscriber.
    async fn dispatch(&self, delivery: OutboundDelivery) -> Result<DispatchAccepted>;

    /// Answer the originator. Exactly once per inbound event.
    async fn acknowledge(&self, request_id: &str, ack: Acknowledgement) -> Result<()>;
}

/// Transport backed by the host connection: batches go into an outbox the
/// stdio loop drains as `event.publish` calls, and acknowledgements resolve
/// the waiting HTTP handler.
pub struct HostTransport {
    outbox: mpsc::UnboundedSender<OutboundDelivery>,
    pending: Mutex<HashMap<String, oneshot::Sender<Acknowledgement>>>,
}

impl HostTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundDelivery>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let transport = Self {
            outbox,
            pending: Mutex::new(HashMap::new()),
        };
        (transport, rx)
    }

    /// Allocate a request id for a new inbound delivery and a receiver that
    /// resolves once it is acknowledged.
    pub async fn open_request(&self) -> (String, oneshot::Receiver<Acknowledgement>) {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);
        (request_id, rx)
    }

    /// Drop a request that will never be routed.
    pub async fn close_request(&self, request_id: &str) {
        self.pending.lock().await.remove(request_id);
    }

    pub async fn pending_requests(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Closes its request when dropped, so an originator that disconnects
/// before the acknowledgement does not leave a pending entry behind.
/// Dropping after the acknowledgement is a no-op.
pub struct RequestGuard {
    transport: Arc<HostTransport>,
    request_id: String,
}

impl RequestGuard {
    pub fn new(transport: Arc<HostTransport>, request_id: String) -> Self {
        Self {
            transport,
            request_id,
        }
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let transport = self.transport.clone();
        let request_id = std::mem::take(&mut self.request_id);
        if let Ok(mut pending) = transport.pending.try_lock() {
            pending.remove(&request_id);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { transport.close_request(&request_id).await });
            }
            Err(_) => warn!(%request_id, "no runtime to close pending request"),
        }
    }
}

#[async_trait]
impl DeliveryTransport for HostTransport {
    async fn dispatch(&self, delivery: OutboundDelivery) -> Result<DispatchAccepted> {
        let recipients = delivery.subscriber_ids.len();
        self.outbox
            .send(delivery)
            .map_err(|_| Error::Transport("host outbox is closed".into()))?;
        Ok(DispatchAccepted { recipients })
    }

    async fn acknowledge(&self, request_id: &str, ack: Acknowledgement) -> Result<()> {
        let tx = self
            .pending
            .lock()
            .await
            .remove(request_id)
            .ok_or_else(|| Error::AlreadyAcknowledged(request_id.to_string()))?;
        if tx.send(ack).is_err() {
            debug!(request_id, "originator went away before acknowledgement");
        }
        Ok(())
    }
}
