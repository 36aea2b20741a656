//! Gong extension for the Nexus host: call, transcript and user lookups
//! plus fan-out of Gong webhooks to subscribed blocks.

pub mod catalog;
pub mod config;
pub mod error;
pub mod gong_client;
pub mod http_server;
pub mod ops;
pub mod registry;
pub mod router;
pub mod state;
pub mod store;
pub mod subscriber;
pub mod transport;
pub mod types;

pub use catalog::EventCategory;
pub use error::{Error, Result};
pub use registry::SubscriptionRegistry;
pub use router::{DeliveryOutcome, WebhookRouter};
pub use store::{JsonKvStore, KvStore, SubscriptionStore};
pub use transport::{Acknowledgement, DeliveryTransport, DispatchAccepted, HostTransport};
