use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::ExtensionConfig;
use crate::error::{Error, Result};
use crate::gong_client::GongClient;
use crate::http_server::{self, ServerState, WEBHOOK_PATH};
use crate::registry::SubscriptionRegistry;
use crate::router::WebhookRouter;
use crate::store::{JsonKvStore, KvStore, SubscriptionStore};
use crate::transport::HostTransport;
use crate::types::OutboundDelivery;

/// Readiness of the installation.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Pending,
    Ready,
    Failed(String),
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Ready => "ready",
            SyncStatus::Failed(_) => "failed",
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            SyncStatus::Failed(d) => Some(d),
            _ => None,
        }
    }
}

/// Runtime state, held behind `Arc<RwLock<AppState>>`.
pub struct AppState {
    pub config: ExtensionConfig,
    pub status: SyncStatus,
    pub registry: Arc<SubscriptionRegistry>,
    pub router: WebhookRouter,
    pub transport: Arc<HostTransport>,
    pub client: Option<GongClient>,
    pub port: Option<u16>,
    /// Accepted deliveries not yet published to the host.
    pub outbox: mpsc::UnboundedReceiver<OutboundDelivery>,
}

impl AppState {
    pub fn new(config: ExtensionConfig, kv: Arc<dyn KvStore>) -> Self {
        let store = SubscriptionStore::new(kv);
        let (transport, outbox) = HostTransport::new();
        let transport = Arc::new(transport);
        Self {
            config,
            status: SyncStatus::Pending,
            registry: Arc::new(SubscriptionRegistry::new(store.clone())),
            router: WebhookRouter::new(store, transport.clone()),
            transport,
            client: None,
            port: None,
            outbox,
        }
    }

    pub async fn open(config: ExtensionConfig) -> Result<Self> {
        let kv = JsonKvStore::open(config.data_dir.clone()).await?;
        Ok(Self::new(config, Arc::new(kv)))
    }

    pub fn webhook_url(&self) -> Option<String> {
        self.port
            .map(|port| format!("http://{}:{port}{WEBHOOK_PATH}", self.config.bind_addr.ip()))
    }

    /// Validate credentials against Gong and, once they check out, start
    /// the webhook ingress. Nothing is routed until this succeeds.
    pub async fn sync(&mut self) -> &SyncStatus {
        self.status = match self.try_sync().await {
            Ok(()) => SyncStatus::Ready,
            Err(Error::Config(desc)) => {
                warn!(%desc, "Gong configuration incomplete");
                SyncStatus::Failed(desc)
            }
            Err(e @ (Error::Upstream { .. } | Error::Http(_))) => {
                error!(error = %e, "Gong authentication failed");
                SyncStatus::Failed("Auth failed".into())
            }
            Err(e) => {
                error!(error = %e, "Gong extension failed to start");
                SyncStatus::Failed(e.to_string())
            }
        };
        &self.status
    }

    async fn try_sync(&mut self) -> Result<()> {
        let client = GongClient::new(&self.config.config)?;
        client.validate_credentials().await?;
        self.client = Some(client);

        if self.port.is_none() {
            let port = http_server::start(
                self.config.bind_addr,
                ServerState {
                    router: self.router.clone(),
                    transport: self.transport.clone(),
                },
            )
            .await?;
            self.port = Some(port);
        }
        info!(port = ?self.port, "Gong extension ready");
        Ok(())
    }

    pub fn client(&self) -> Result<&GongClient> {
        self.client.as_ref().ok_or_else(|| {
            Error::Config("Gong credentials not configured or not yet validated".into())
        })
    }

    /// Everything dispatched since the last drain.
    pub fn take_outbox(&mut self) -> Vec<OutboundDelivery> {
        let mut out = Vec::new();
        while let Ok(d) = self.outbox.try_recv() {
            out.push(d);
        }
        out
    }
}
