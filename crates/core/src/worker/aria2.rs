//! Aria2c JSON-RPC bulk-status client.
//!
//! Aria2 splits its transfer list across `tellActive`, `tellWaiting`
//! and `tellStopped`; one `tell_all` aggregates the three so the runner
//! can refresh every aria2 worker with a single round of requests
//! instead of one `tellStatus` per transfer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::Aria2Config;

use super::types::{BulkStatusClient, WorkerError};

/// Page size for the `tellWaiting`/`tellStopped` offset queries. Aria2
/// has no "all" selector for these, so one large page stands in.
const TELL_PAGE_SIZE: u64 = 1000;

/// One transfer as aria2 reports it. Numeric fields come over the wire
/// as decimal strings, so they stay `String` here with typed accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aria2Status {
    pub gid: String,
    /// `active`, `waiting`, `paused`, `error`, `complete` or `removed`.
    pub status: String,
    #[serde(default)]
    pub total_length: String,
    #[serde(default)]
    pub completed_length: String,
    #[serde(default)]
    pub download_speed: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Aria2Status {
    pub fn total_bytes(&self) -> u64 {
        self.total_length.parse().unwrap_or(0)
    }

    pub fn completed_bytes(&self) -> u64 {
        self.completed_length.parse().unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.status == "complete"
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// Aria2c JSON-RPC client.
pub struct Aria2Client {
    client: Client,
    config: Aria2Config,
}

impl Aria2Client {
    /// Create a new aria2 client.
    pub fn new(config: Aria2Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// RPC endpoint without a duplicated slash.
    fn endpoint(&self) -> String {
        format!("{}/jsonrpc", self.config.url.trim_end_matches('/'))
    }

    /// Issue one JSON-RPC call, prepending the secret token when set.
    async fn call(&self, method: &str, mut params: Vec<Value>) -> Result<Value, WorkerError> {
        if let Some(secret) = &self.config.secret {
            params.insert(0, json!(format!("token:{}", secret)));
        }

        let body = json!({
            "jsonrpc": "2.0",
            "id": "debrix",
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WorkerError::Timeout
                } else if e.is_connect() {
                    WorkerError::ConnectionFailed(e.to_string())
                } else {
                    WorkerError::Rpc(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::Rpc(format!("HTTP {}", status)));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| WorkerError::Rpc(e.to_string()))?;

        if let Some(error) = envelope.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error");
            return Err(WorkerError::Rpc(message.to_string()));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| WorkerError::Rpc("response carried no result".to_string()))
    }

    fn parse_statuses(result: Value) -> Result<Vec<Aria2Status>, WorkerError> {
        serde_json::from_value(result).map_err(|e| WorkerError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl BulkStatusClient for Aria2Client {
    async fn tell_all(&self) -> Result<Vec<Aria2Status>, WorkerError> {
        let mut statuses =
            Self::parse_statuses(self.call("aria2.tellActive", vec![]).await?)?;

        let waiting = self
            .call("aria2.tellWaiting", vec![json!(0), json!(TELL_PAGE_SIZE)])
            .await?;
        statuses.extend(Self::parse_statuses(waiting)?);

        let stopped = self
            .call("aria2.tellStopped", vec![json!(0), json!(TELL_PAGE_SIZE)])
            .await?;
        statuses.extend(Self::parse_statuses(stopped)?);

        Ok(statuses)
    }
}
