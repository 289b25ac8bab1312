//! View-model aggregation and the snapshot store.
//!
//! `Aggregator` fetches every snapshot resource concurrently and
//! `Snapshot::from_payloads` parses them once into typed values.
//! `SnapshotStore` owns the current snapshot behind an `Arc` and swaps it
//! whole, so readers never observe a partially updated view.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;

use crate::anomalies::{rank_anomalies, RankedAnomalies};
use crate::error::DashboardError;
use crate::gateway::{FetchGateway, Resource};
use crate::risk::SOCIAL_RISK_ENDPOINT;
use crate::types::{
    parse_peer_benchmarks, parse_recommendations, AnomalyReport, Forecast, LifecycleInsights,
    PeerBenchmark, Recommendation, Watchlist,
};

// =============================================================================
// Snapshot
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Reload ticket this snapshot was built for. 0 = nothing loaded yet.
    pub sequence: u64,
    pub loaded_at: Option<DateTime<Utc>>,
    pub state_data: Vec<Value>,
    pub state_features: Vec<Value>,
    pub lifecycle: LifecycleInsights,
    pub forecast: Forecast,
    pub anomalies: AnomalyReport,
    /// Full deduped, severity-ordered anomaly set.
    pub ranked: RankedAnomalies,
    pub recommendations: Vec<Recommendation>,
    pub watchlist: Watchlist,
    pub peer_benchmarks: Vec<PeerBenchmark>,
    /// Per-state social-risk indices (`integrated_risk_score` and friends).
    pub social_risk: Vec<Value>,
}

/// Raw payloads keyed by resource. Missing entries read as the resource's
/// empty default.
#[derive(Debug, Default)]
pub struct Payloads {
    resources: HashMap<Resource, Value>,
    social_risk: Vec<Value>,
}

impl Payloads {
    pub fn insert(&mut self, resource: Resource, value: Value) {
        self.resources.insert(resource, value);
    }

    pub fn get(&self, resource: Resource) -> Value {
        self.resources
            .get(&resource)
            .cloned()
            .unwrap_or_else(|| resource.empty_default())
    }

    pub fn set_social_risk(&mut self, rows: Vec<Value>) {
        self.social_risk = rows;
    }

    pub fn social_risk(&self) -> &[Value] {
        &self.social_risk
    }

    /// Number of resources present; social risk is not counted.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn array_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

impl Snapshot {
    pub fn from_payloads(sequence: u64, payloads: &Payloads) -> Self {
        let anomalies = AnomalyReport::from_value(&payloads.get(Resource::Anomalies));
        let ranked = rank_anomalies(&anomalies);

        Self {
            sequence,
            loaded_at: Some(Utc::now()),
            state_data: array_of(payloads.get(Resource::StateData)),
            state_features: array_of(payloads.get(Resource::StateFeatures)),
            lifecycle: LifecycleInsights::from_value(&payloads.get(Resource::LifecycleInsights)),
            forecast: Forecast::from_value(&payloads.get(Resource::Forecasts)),
            anomalies,
            ranked,
            recommendations: parse_recommendations(&payloads.get(Resource::Recommendations)),
            watchlist: Watchlist::from_value(&payloads.get(Resource::Watchlist)),
            peer_benchmarks: parse_peer_benchmarks(&payloads.get(Resource::PeerBenchmarks)),
            social_risk: payloads.social_risk().to_vec(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.sequence > 0
    }
}

// =============================================================================
// Aggregator
// =============================================================================

pub struct Aggregator {
    gateway: Arc<FetchGateway>,
}

/// Social-risk rows from the backend endpoint. There is no static copy, so
/// any failure reads as no rows.
async fn fetch_social_risk(gateway: Arc<FetchGateway>) -> Vec<Value> {
    match gateway.fetch_endpoint(SOCIAL_RISK_ENDPOINT).await {
        Ok(Value::Array(rows)) => rows,
        Ok(_) => {
            log::warn!("Aggregator: social risk payload is not an array");
            Vec::new()
        }
        Err(e) => {
            log::info!("Aggregator: social risk unavailable: {}", e);
            Vec::new()
        }
    }
}

impl Aggregator {
    pub fn new(gateway: Arc<FetchGateway>) -> Self {
        Self { gateway }
    }

    /// Fetch every resource concurrently. Each fetch degrades on its own,
    /// so one failure never blocks the rest.
    pub async fn load_all(&self) -> Payloads {
        let social = tokio::spawn(fetch_social_risk(Arc::clone(&self.gateway)));
        let mut set = JoinSet::new();
        for resource in Resource::SNAPSHOT {
            let gateway = Arc::clone(&self.gateway);
            set.spawn(async move { (resource, gateway.fetch_resource(resource).await) });
        }

        let mut payloads = Payloads::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((resource, value)) => payloads.insert(resource, value),
                // The resource is left out and reads as its default.
                Err(e) => log::error!("Aggregator: fetch task failed: {}", e),
            }
        }
        log::info!(
            "Aggregator: loaded {}/{} resources",
            payloads.len(),
            Resource::SNAPSHOT.len()
        );
        payloads.set_social_risk(Self::join_social(social).await);
        payloads
    }

    async fn join_social(handle: tokio::task::JoinHandle<Vec<Value>>) -> Vec<Value> {
        handle.await.unwrap_or_else(|e| {
            log::error!("Aggregator: social risk task failed: {}", e);
            Vec::new()
        })
    }

    /// Strict variant for the first load. All fetches run to completion,
    /// then the first failure in resource order is returned. Social risk
    /// is optional and degrades even here.
    pub async fn load_initial(&self) -> Result<Payloads, DashboardError> {
        let social = tokio::spawn(fetch_social_risk(Arc::clone(&self.gateway)));
        let mut set = JoinSet::new();
        for resource in Resource::SNAPSHOT {
            let gateway = Arc::clone(&self.gateway);
            set.spawn(async move { (resource, gateway.fetch_resource_strict(resource).await) });
        }

        let mut results: HashMap<Resource, Result<Value, DashboardError>> = HashMap::new();
        while let Some(joined) = set.join_next().await {
            let (resource, result) =
                joined.map_err(|e| DashboardError::Network(format!("fetch task failed: {}", e)))?;
            results.insert(resource, result);
        }

        let mut payloads = Payloads::default();
        for resource in Resource::SNAPSHOT {
            match results.remove(&resource) {
                Some(Ok(value)) => payloads.insert(resource, value),
                Some(Err(e)) => {
                    log::warn!("Aggregator: initial load failed on {}: {}", resource, e);
                    return Err(e);
                }
                None => {
                    return Err(DashboardError::Network(format!(
                        "no result for {}",
                        resource
                    )))
                }
            }
        }
        payloads.set_social_risk(Self::join_social(social).await);
        Ok(payloads)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Issued when a reload starts; a snapshot built for an older ticket than
/// the last committed one is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReloadTicket(u64);

impl ReloadTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    next_ticket: AtomicU64,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn begin_reload(&self) -> ReloadTicket {
        ReloadTicket(self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read())
    }

    /// Install `snapshot` unless a newer one is already committed.
    pub fn commit(&self, snapshot: Snapshot) -> bool {
        let mut current = self.current.write();
        if snapshot.sequence <= current.sequence {
            log::info!(
                "Snapshot store: discarding stale reload #{} (current #{})",
                snapshot.sequence,
                current.sequence
            );
            return false;
        }
        *current = Arc::new(snapshot);
        true
    }

    /// Copy-on-write swap of the watchlist slice only.
    pub fn replace_watchlist(&self, watchlist: Watchlist) -> Arc<Snapshot> {
        let mut current = self.current.write();
        let mut next = Snapshot::clone(&**current);
        next.watchlist = watchlist;
        *current = Arc::new(next);
        Arc::clone(&*current)
    }
}
