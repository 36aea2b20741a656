//! Basic-auth JSON client for the Gong REST API.

use reqwest::{header, Method};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::GongConfig;
use crate::error::{Error, Result};

pub struct GongClient {
    http: reqwest::Client,
    base_url: String,
    access_key: String,
    access_key_secret: String,
}

/// Filters for `search_calls`. All optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallSearch {
    #[serde(default)]
    pub from_date_time: Option<String>,
    #[serde(default)]
    pub to_date_time: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl CallSearch {
    fn request_body(&self) -> Value {
        let mut filter = Map::new();
        if let Some(from) = non_empty(&self.from_date_time) {
            filter.insert("fromDateTime".into(), json!(from));
        }
        if let Some(to) = non_empty(&self.to_date_time) {
            filter.insert("toDateTime".into(), json!(to));
        }
        if let Some(ws) = non_empty(&self.workspace_id) {
            filter.insert("workspaceIds".into(), json!([ws]));
        }
        let mut body = json!({ "filter": filter });
        if let Some(cursor) = non_empty(&self.cursor) {
            body["cursor"] = json!(cursor);
        }
        body
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

impl GongClient {
    pub fn new(config: &GongConfig) -> Result<Self> {
        let (key, secret) = config.credentials()?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: config.base_url().to_string(),
            access_key: key.to_string(),
            access_key_secret: secret.to_string(),
        })
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%method, endpoint, "calling Gong API");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .basic_auth(&self.access_key, Some(&self.access_key_secret))
            .header(header::CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                method: method.to_string(),
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body: text,
            });
        }

        let is_json = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        if !is_json {
            return Ok(Value::Null);
        }
        Ok(resp.json().await?)
    }

    /// Credential check used by the readiness sync.
    pub async fn validate_credentials(&self) -> Result<()> {
        self.request(Method::GET, "v2/users", &[], None).await?;
        Ok(())
    }

    pub async fn search_calls(&self, search: &CallSearch) -> Result<Value> {
        let resp = self
            .request(Method::POST, "v2/calls", &[], Some(&search.request_body()))
            .await?;
        let mut out = json!({
            "calls": resp.get("calls").cloned().unwrap_or_else(|| json!([])),
        });
        if let Some(cursor) = resp.pointer("/records/cursor").filter(|v| !v.is_null()) {
            out["cursor"] = cursor.clone();
        }
        if let Some(total) = resp.pointer("/records/totalRecords").filter(|v| !v.is_null()) {
            out["totalRecords"] = total.clone();
        }
        Ok(out)
    }

    pub async fn get_call_details(&self, call_id: &str) -> Result<Value> {
        let resp = self
            .request(Method::GET, &format!("v2/calls/{call_id}"), &[], None)
            .await?;
        let field = |name: &str| resp.get(name).cloned().unwrap_or(Value::Null);
        Ok(json!({
            "call": field("call"),
            "context": field("context"),
            "content": field("content"),
            "parties": field("parties"),
            "structure": field("structure"),
        }))
    }

    pub async fn get_call_transcript(&self, call_id: &str) -> Result<Value> {
        let body = json!({ "filter": { "callIds": [call_id] } });
        let resp = self
            .request(Method::POST, "v2/calls/transcript", &[], Some(&body))
            .await?;
        let transcript = resp
            .pointer("/callTranscripts/0")
            .ok_or_else(|| Error::NotFound(format!("No transcript found for call {call_id}")))?;
        Ok(json!({
            "callId": transcript.get("callId").cloned().unwrap_or(Value::Null),
            "transcript": transcript.get("transcript").cloned().unwrap_or_else(|| json!([])),
        }))
    }

    pub async fn get_user_details(&self, user_id: &str) -> Result<Value> {
        let resp = self
            .request(Method::GET, "v2/users", &[("ids", user_id)], None)
            .await?;
        let user = resp
            .pointer("/users/0")
            .ok_or_else(|| Error::NotFound(format!("No user found with ID {user_id}")))?;
        Ok(json!({ "user": user }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_body_only_carries_set_filters() {
        let search = CallSearch {
            from_date_time: Some("2025-01-01T00:00:00Z".into()),
            workspace_id: Some("W1".into()),
            cursor: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            search.request_body(),
            json!({
                "filter": {
                    "fromDateTime": "2025-01-01T00:00:00Z",
                    "workspaceIds": ["W1"]
                }
            })
        );
    }

    #[test]
    fn client_requires_credentials() {
        let err = GongClient::new(&GongConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
