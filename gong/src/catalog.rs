//! The closed set of Gong webhook event categories.
//!
//! Each category maps to the subscription block that re-emits it and to the
//! shape of the payload that block emits. Adding a category means adding a
//! variant here; every `match` over [`EventCategory`] then has to handle it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    CallCreated,
    CallTranscriptReady,
    CallAnalyzed,
}

/// Static description of one category.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub category: EventCategory,
    pub block_name: &'static str,
    pub output_name: &'static str,
    pub description: &'static str,
}

impl EventCategory {
    pub const COUNT: usize = 3;

    pub const ALL: [EventCategory; Self::COUNT] = [
        EventCategory::CallCreated,
        EventCategory::CallTranscriptReady,
        EventCategory::CallAnalyzed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::CallCreated => "call-created",
            EventCategory::CallTranscriptReady => "call-transcript-ready",
            EventCategory::CallAnalyzed => "call-analyzed",
        }
    }

    /// Lookup that tolerates categories Gong added after this build.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Dense index, used to key per-category state.
    pub fn index(self) -> usize {
        match self {
            EventCategory::CallCreated => 0,
            EventCategory::CallTranscriptReady => 1,
            EventCategory::CallAnalyzed => 2,
        }
    }

    pub fn entry(self) -> CatalogEntry {
        let (block_name, output_name, description) = match self {
            EventCategory::CallCreated => (
                "New Call Subscription",
                "New Call",
                "Emitted when a new call is recorded in Gong.",
            ),
            EventCategory::CallTranscriptReady => (
                "Transcript Ready Subscription",
                "Transcript Ready",
                "Emitted when a call transcript is ready for retrieval.",
            ),
            EventCategory::CallAnalyzed => (
                "Call Analyzed Subscription",
                "Call Analyzed",
                "Emitted when a call has been fully analyzed by Gong.",
            ),
        };
        CatalogEntry {
            category: self,
            block_name,
            output_name,
            description,
        }
    }
}

impl CatalogEntry {
    /// JSON schema of what the subscriber block emits for this category.
    pub fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "eventId": {
                    "type": "string",
                    "description": "Unique identifier of the webhook event"
                },
                "eventTime": {
                    "type": "string",
                    "description": "ISO 8601 timestamp of when the event occurred"
                },
                "call": call_schema(),
            },
            "required": ["eventId", "eventTime", "call"],
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "event_type": self.category.as_str(),
            "block_name": self.block_name,
            "output_name": self.output_name,
            "description": self.description,
            "output_schema": self.output_schema(),
        })
    }
}

fn call_schema() -> Value {
    json!({
        "type": "object",
        "description": "Gong call object with metadata and participants",
        "properties": {
            "id": { "type": "string", "description": "Unique identifier of a Gong call" },
            "url": { "type": "string", "description": "URL to view the call in Gong" },
            "title": { "type": "string" },
            "scheduled": { "type": "string" },
            "started": { "type": "string" },
            "duration": { "type": "number", "description": "Duration of the call in seconds" },
            "primaryUserId": { "type": "string" },
            "direction": {
                "type": "string",
                "enum": ["inbound", "outbound", "conference", "unknown"]
            },
            "system": { "type": "string" },
            "scope": { "type": "string", "enum": ["internal", "external", "unknown"] },
            "media": { "type": "string" },
            "language": { "type": "string" },
            "workspaceId": {
                "type": "string",
                "description": "Unique identifier of a Gong workspace"
            }
        },
        "required": ["id"],
    })
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("unknown event type: {s}")))
    }
}
