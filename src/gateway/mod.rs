//! Fetch gateway for named dashboard resources.
//!
//! Each resource is tried at the primary path (`{primary}/api/data/{file}`)
//! and then once at the fallback static base (`{fallback}/data/{file}`).
//! `fetch_resource` absorbs a double failure into the resource's empty
//! default; `fetch_resource_strict` hands it back to the caller.

pub mod resource;
pub mod transport;

use std::sync::Arc;

use serde_json::Value;

pub use resource::Resource;
pub use transport::{HttpTransport, ResourceTransport, TransportResponse};

use crate::config::DashboardConfig;
use crate::error::DashboardError;

pub struct FetchGateway {
    transport: Arc<dyn ResourceTransport>,
    primary_base: String,
    fallback_base: String,
}

impl FetchGateway {
    pub fn new(transport: Arc<dyn ResourceTransport>, primary_base: &str, fallback_base: &str) -> Self {
        Self {
            transport,
            primary_base: primary_base.trim_end_matches('/').to_string(),
            fallback_base: fallback_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(
        config: &DashboardConfig,
        transport: Arc<dyn ResourceTransport>,
    ) -> Self {
        Self::new(transport, &config.primary_base_url, &config.fallback_base_url)
    }

    pub fn transport(&self) -> Arc<dyn ResourceTransport> {
        Arc::clone(&self.transport)
    }

    /// Absolute URL for a backend endpoint such as `/api/admin/block`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.primary_base, path.trim_start_matches('/'))
    }

    fn primary_url(&self, resource: Resource) -> String {
        format!("{}/api/data/{}", self.primary_base, resource.file_name())
    }

    fn fallback_url(&self, resource: Resource) -> String {
        format!("{}/data/{}", self.fallback_base, resource.file_name())
    }

    /// Fetch one resource, degrading to its empty default on failure.
    pub async fn fetch_resource(&self, resource: Resource) -> Value {
        match self.fetch_resource_strict(resource).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Gateway: {} unavailable, using empty default: {}", resource, e);
                resource.empty_default()
            }
        }
    }

    /// Fetch one resource, returning the fallback's error if both paths fail.
    pub async fn fetch_resource_strict(&self, resource: Resource) -> Result<Value, DashboardError> {
        let primary = self.primary_url(resource);
        match self.fetch_json(&primary).await {
            Ok(value) => return Ok(value),
            Err(e) => log::debug!("Gateway: primary {} failed: {}", primary, e),
        }

        let fallback = self.fallback_url(resource);
        let value = self.fetch_json(&fallback).await.map_err(|e| {
            log::debug!("Gateway: fallback {} failed: {}", fallback, e);
            e
        })?;
        log::info!("Gateway: served {} from fallback", resource);
        Ok(value)
    }

    /// GET an arbitrary endpoint and parse it as JSON, without fallback.
    pub async fn fetch_endpoint(&self, path: &str) -> Result<Value, DashboardError> {
        self.fetch_json(&self.endpoint(path)).await
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, DashboardError> {
        let resp = self.transport.get(url).await?.error_for_status()?;
        resp.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTransport;
    use serde_json::json;

    fn gateway(fake: &Arc<FakeTransport>) -> FetchGateway {
        FetchGateway::new(fake.clone(), "http://primary/", "http://static")
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json("http://primary/api/data/state_data.json", json!([{"state": "Bihar"}]));

        let value = gateway(&fake).fetch_resource(Resource::StateData).await;

        assert_eq!(value[0]["state"], "Bihar");
        assert_eq!(fake.get_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_used_after_server_error() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_status("http://primary/api/data/forecasts.json", 500);
        fake.respond_json("http://static/data/forecasts.json", json!({"simple": {"forecast_values": [1.0]}}));

        let value = gateway(&fake).fetch_resource(Resource::Forecasts).await;

        assert!(value.get("simple").is_some());
        assert_eq!(
            fake.requested_urls(),
            vec![
                "http://primary/api/data/forecasts.json".to_string(),
                "http://static/data/forecasts.json".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_double_failure_returns_empty_default() {
        let fake = Arc::new(FakeTransport::new());
        fake.fail_network("http://primary/api/data/recommendations.json");
        // fallback URL unregistered -> 404

        let value = gateway(&fake).fetch_resource(Resource::Recommendations).await;

        assert_eq!(value, json!({ "recommendations": [] }));
    }

    #[tokio::test]
    async fn test_strict_propagates_fallback_error() {
        let fake = Arc::new(FakeTransport::new());

        let err = gateway(&fake)
            .fetch_resource_strict(Resource::Anomalies)
            .await
            .unwrap_err();

        assert!(matches!(err, DashboardError::Server { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_malformed_primary_falls_back() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_raw("http://primary/api/data/watchlist_active.json", 200, b"not json");
        fake.respond_json("http://static/data/watchlist_active.json", json!({"CTR-1": {}}));

        let value = gateway(&fake).fetch_resource(Resource::Watchlist).await;
        assert!(value.get("CTR-1").is_some());
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let fake = Arc::new(FakeTransport::new());
        let gw = gateway(&fake);
        assert_eq!(gw.endpoint("/api/admin/block"), "http://primary/api/admin/block");
        assert_eq!(gw.endpoint("api/stats"), "http://primary/api/stats");
    }
}
