use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::TrackingEvent;

#[async_trait]
pub trait StatsBackend: Send + Sync {
    async fn record(&self, event: &TrackingEvent) -> Result<()>;
}

/// Writes each event as a structured log line on the `stats` target.
pub struct LogBackend;

#[async_trait]
impl StatsBackend for LogBackend {
    async fn record(&self, event: &TrackingEvent) -> Result<()> {
        info!(target: "stats", label = %event.label, at = %event.at.to_rfc3339(), "event");
        Ok(())
    }
}

/// POSTs each event as JSON to a collector endpoint.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl StatsBackend for HttpBackend {
    async fn record(&self, event: &TrackingEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .context("Failed to send stats event")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Stats endpoint returned {}", status);
        }
        Ok(())
    }
}
