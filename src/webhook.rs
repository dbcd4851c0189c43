use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::error::SubmissionError;
use crate::mapping::SubmissionRecord;
use crate::models::{ClientData, ClientStats};

#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    config: WebhookConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub request_id: Uuid,
    pub data: Value,
}

impl WebhookClient {
    pub fn new(config: WebhookConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn has_live_stats(&self) -> bool {
        self.config.live_stats_url.is_some()
    }

    /// Forwards the record as-is to the workflow endpoint.
    pub async fn submit(
        &self,
        url: &str,
        record: &SubmissionRecord,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let request_id = Uuid::new_v4();
        tracing::info!(
            %request_id,
            url,
            subaccount = record.get("ghl_subaccount_id").unwrap_or_default(),
            "submitting client config"
        );

        let response = self
            .http
            .post(url)
            .header("X-Request-Id", request_id.to_string())
            .json(record)
            .send()
            .await
            .map_err(|err| SubmissionError::new("could not reach the workflow webhook", Some(err.to_string())))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::info!(%request_id, status = status.as_u16(), "webhook responded");

        let data = interpret_submission(status, &body)?;
        Ok(SubmissionReceipt { request_id, data })
    }

    pub async fn fetch_clients(&self) -> anyhow::Result<Vec<ClientData>> {
        let url = self
            .config
            .clients_list_url
            .as_deref()
            .context("no clients-list webhook configured")?;

        let response = self
            .http
            .get(url)
            .header("Cache-Control", "no-store")
            .send()
            .await
            .with_context(|| format!("failed to fetch clients from {url}"))?
            .error_for_status()?;
        let body: Value = response.json().await.context("clients list is not JSON")?;
        parse_clients_list(body)
    }

    pub async fn fetch_live_stats(&self, subaccount_id: &str) -> anyhow::Result<ClientStats> {
        let url = self
            .config
            .live_stats_url
            .as_deref()
            .context("no live-stats webhook configured")?;

        let stats = self
            .http
            .get(url)
            .query(&[("ghl_subaccount_id", subaccount_id)])
            .send()
            .await
            .with_context(|| format!("failed to fetch stats for {subaccount_id}"))?
            .error_for_status()?
            .json::<ClientStats>()
            .await
            .with_context(|| format!("invalid stats payload for {subaccount_id}"))?;
        Ok(stats)
    }
}

/// Maps a relay response to its outcome. A success with a non-JSON body yields an empty object.
pub fn interpret_submission(status: StatusCode, body: &str) -> Result<Value, SubmissionError> {
    if !status.is_success() {
        let reason = status.canonical_reason().unwrap_or("");
        let detail = (!body.trim().is_empty()).then(|| body.to_string());
        return Err(SubmissionError::new(
            format!("webhook returned {} {}", status.as_u16(), reason).trim_end().to_string(),
            detail,
        ));
    }
    Ok(serde_json::from_str(body).unwrap_or_else(|_| Value::Object(Default::default())))
}

/// Accepts a bare array, an object wrapping one under `clients`/`data`/`items`,
/// or a single client object.
pub fn parse_clients_list(body: Value) -> anyhow::Result<Vec<ClientData>> {
    let list = match body {
        Value::Array(items) => items,
        Value::Object(map) => {
            let wrapped = ["clients", "data", "items"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_array()).cloned());
            match wrapped {
                Some(items) if !items.is_empty() => items,
                _ if map.contains_key("client_name") => vec![Value::Object(map)],
                Some(items) => items,
                None => Vec::new(),
            }
        }
        _ => Vec::new(),
    };

    let mut clients = Vec::with_capacity(list.len());
    for (index, entry) in list.into_iter().enumerate() {
        match serde_json::from_value::<ClientData>(entry) {
            Ok(client) => clients.push(client),
            Err(err) => tracing::warn!(index, error = %err, "skipping malformed client entry"),
        }
    }
    Ok(clients)
}
