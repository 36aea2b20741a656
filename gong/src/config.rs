use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api.gong.io";

/// Gong credentials and endpoint, as entered when installing the extension.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GongConfig {
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub access_key_secret: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.into()
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

impl GongConfig {
    /// Access key and secret, or a configuration error if either is blank.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let key = self.access_key.as_deref().filter(|s| !s.is_empty());
        let secret = self.access_key_secret.as_deref().filter(|s| !s.is_empty());
        match (key, secret) {
            (Some(k), Some(s)) => Ok((k, s)),
            _ => Err(Error::Config("Missing credentials".into())),
        }
    }

    pub fn base_url(&self) -> &str {
        let url = self.api_base_url.trim_end_matches('/');
        if url.is_empty() {
            DEFAULT_API_BASE_URL
        } else {
            url
        }
    }
}

/// Parameters of the host's `initialize` call.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub config: GongConfig,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bind_addr: default_bind_addr(),
            config: GongConfig {
                api_base_url: default_api_base_url(),
                ..Default::default()
            },
        }
    }
}

impl ExtensionConfig {
    pub fn from_params(params: &serde_json::Value) -> Result<Self> {
        if params.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(params.clone())
            .map_err(|e| Error::InvalidInput(format!("invalid initialize params: {e}")))
    }
}
