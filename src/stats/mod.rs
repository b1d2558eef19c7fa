pub mod backends;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{StatsBackendKind, StatsConfig};
use crate::stats::backends::{HttpBackend, LogBackend, StatsBackend};

/// A usage event; write-only.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingEvent {
    pub label: String,
    pub at: DateTime<Utc>,
}

impl TrackingEvent {
    pub fn now(label: &str) -> Self {
        Self {
            label: label.to_string(),
            at: Utc::now(),
        }
    }
}

/// Fire-and-forget usage sink. Must never block and never fail observably.
pub trait TrackingSink: Send + Sync {
    fn track(&self, label: &str);
}

/// Used when stats are disabled.
pub struct NoopTracker;

impl TrackingSink for NoopTracker {
    fn track(&self, _label: &str) {}
}

/// Queues events for a background task that forwards them to a backend.
pub struct ChannelTracker {
    tx: mpsc::Sender<TrackingEvent>,
}

impl ChannelTracker {
    /// Spawn the draining task. The task ends once every tracker clone is dropped.
    pub fn spawn(backend: Arc<dyn StatsBackend>, queue_size: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<TrackingEvent>(queue_size.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = backend.record(&event).await {
                    debug!("Dropping stats event '{}': {:#}", event.label, e);
                }
            }
        });

        (Self { tx }, handle)
    }
}

impl TrackingSink for ChannelTracker {
    fn track(&self, label: &str) {
        // Full or closed queue: the event is lost.
        let _ = self.tx.try_send(TrackingEvent::now(label));
    }
}

/// Build the sink described by `[stats]`.
pub fn from_config(config: &StatsConfig) -> Arc<dyn TrackingSink> {
    if !config.enabled {
        return Arc::new(NoopTracker);
    }

    let backend: Arc<dyn StatsBackend> = match (&config.backend, &config.endpoint) {
        (StatsBackendKind::Http, Some(endpoint)) => Arc::new(HttpBackend::new(endpoint.clone())),
        _ => Arc::new(LogBackend),
    };

    let (tracker, _handle) = ChannelTracker::spawn(backend, config.queue_size);
    Arc::new(tracker)
}
