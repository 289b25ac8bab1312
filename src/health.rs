//! Backend health polling.
//!
//! Polls `/api/stats` on a fixed interval and publishes the result on the
//! event bus. Never touches the snapshot.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;

use crate::events::{DashboardEvent, EventBus};
use crate::gateway::FetchGateway;

pub const STATS_ENDPOINT: &str = "/api/stats";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default = "offline")]
    pub status: String,
    #[serde(default = "unavailable")]
    pub engine_health: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Display text; the backend reports this as e.g. "1.4 Billion+".
    #[serde(default, deserialize_with = "crate::types::de_opt_string")]
    pub total_records: Option<String>,
    #[serde(default)]
    pub active_blocks: u64,
}

fn offline() -> String {
    "Offline".to_string()
}

fn unavailable() -> String {
    "Unavailable".to_string()
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: offline(),
            engine_health: unavailable(),
            last_updated: None,
            total_records: None,
            active_blocks: 0,
        }
    }
}

impl HealthStatus {
    pub fn is_online(&self) -> bool {
        !self.status.eq_ignore_ascii_case("offline")
    }

    /// Field-by-field parse of a stats payload. An unexpected shape in one
    /// field falls back to that field's default only.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| match value.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let active_blocks = match value.get("active_blocks") {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        };
        Self {
            status: text("status").unwrap_or_else(offline),
            engine_health: text("engine_health").unwrap_or_else(unavailable),
            last_updated: text("last_updated"),
            total_records: text("total_records"),
            active_blocks,
        }
    }
}

/// Fetch the stats endpoint, degrading to the offline status.
pub async fn fetch_health(gateway: &FetchGateway) -> HealthStatus {
    let value = match gateway.fetch_endpoint(STATS_ENDPOINT).await {
        Ok(v) => v,
        Err(e) => {
            log::debug!("Health poller: stats unavailable: {}", e);
            return HealthStatus::default();
        }
    };
    if !value.is_object() {
        log::warn!("Health poller: stats payload is not an object");
        return HealthStatus::default();
    }
    HealthStatus::from_value(&value)
}

/// Poll until `shutdown` is notified. The first poll runs immediately.
pub async fn run_health_poller(
    gateway: Arc<FetchGateway>,
    bus: Arc<EventBus>,
    interval: Duration,
    shutdown: Arc<Notify>,
) {
    log::info!("Health poller: started ({}s interval)", interval.as_secs());
    let mut last_online: Option<bool> = None;

    loop {
        let status = fetch_health(&gateway).await;
        let online = status.is_online();
        if last_online != Some(online) {
            if online {
                log::info!("Health poller: backend online ({})", status.engine_health);
            } else {
                log::warn!("Health poller: backend offline");
            }
            last_online = Some(online);
        }
        bus.publish(DashboardEvent::HealthUpdated { status });

        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = shutdown.notified() => {
                log::info!("Health poller: shutting down");
                return;
            },
        }
    }
}
