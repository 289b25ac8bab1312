//! In-memory transport for unit tests. Unregistered URLs answer 404.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::DashboardError;
use crate::gateway::{Resource, ResourceTransport, TransportResponse};
use crate::risk::SOCIAL_RISK_ENDPOINT;

#[derive(Clone)]
enum Route {
    Respond { status: u16, body: Vec<u8> },
    NetworkError,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Route>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_json(&self, url: &str, value: Value) {
        self.respond_raw(url, 200, value.to_string().as_bytes());
    }

    pub fn respond_status(&self, url: &str, status: u16) {
        self.respond_raw(url, status, br#"{"error":"stub"}"#);
    }

    pub fn respond_raw(&self, url: &str, status: u16, body: &[u8]) {
        self.routes.lock().insert(
            url.to_string(),
            Route::Respond {
                status,
                body: body.to_vec(),
            },
        );
    }

    pub fn fail_network(&self, url: &str) {
        self.routes.lock().insert(url.to_string(), Route::NetworkError);
    }

    pub fn delay(&self, url: &str, delay: Duration) {
        self.delays.lock().insert(url.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.url.clone()).collect()
    }

    pub fn get_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.method == "GET").count()
    }

    pub fn post_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.method == "POST").count()
    }

    pub fn count_for(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.url == url).count()
    }

    async fn answer(
        &self,
        method: &'static str,
        url: &str,
        body: Option<Value>,
    ) -> Result<TransportResponse, DashboardError> {
        self.calls.lock().push(RecordedCall {
            method,
            url: url.to_string(),
            body,
        });

        let delay = self.delays.lock().get(url).copied();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let route = self.routes.lock().get(url).cloned();
        match route {
            Some(Route::Respond { status, body }) => Ok(TransportResponse { status, body }),
            Some(Route::NetworkError) => {
                Err(DashboardError::Network(format!("connection refused: {}", url)))
            }
            None => Ok(TransportResponse {
                status: 404,
                body: br#"{"error":"not found"}"#.to_vec(),
            }),
        }
    }
}

#[async_trait]
impl ResourceTransport for FakeTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, DashboardError> {
        self.answer("GET", url, None).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse, DashboardError> {
        self.answer("POST", url, Some(body.clone())).await
    }
}

pub const PRIMARY: &str = "http://primary";
pub const FALLBACK: &str = "http://static";

pub fn primary_url(resource: Resource) -> String {
    format!("{}/api/data/{}", PRIMARY, resource.file_name())
}

/// Small but realistic payload for each snapshot resource.
pub fn sample_payload(resource: Resource) -> Value {
    match resource {
        Resource::StateData => json!([
            { "state": "Bihar", "total_enrolment": 120000, "total_demo_updates": 40000, "total_bio_updates": 25000, "total_updates": 65000 },
            { "state": "Kerala", "total_enrolment": 80000, "total_demo_updates": 30000, "total_bio_updates": 28000, "total_updates": 58000 },
            { "state": "Goa", "total_enrolment": 9000, "total_demo_updates": 3000, "total_bio_updates": 1000, "total_updates": 4000 }
        ]),
        Resource::StateFeatures => json!([{ "state": "Bihar", "growth_volatility": 0.4 }]),
        Resource::LifecycleInsights => json!({ "demographic_intensity": { "5": 0.2, "18": 0.9 } }),
        Resource::Forecasts => json!({
            "arima": { "forecast_values": [10.0, 12.0], "lower_bound": [8.0, 9.0], "upper_bound": [12.0, 15.0], "periods_ahead": 2 }
        }),
        Resource::Anomalies => json!({
            "ml_confirmed_anomalies": [
                { "state": "Bihar", "date": "2024-01-01", "anomaly_type": "Spike", "severity": "Critical", "confidence_score": 94.0, "center_id": "CTR-1" }
            ],
            "seasonal_anomalies": [
                { "region": "Kerala", "date": "2024-01-02", "anomaly_type": "Seasonal Deviation", "severity": "Medium" },
                { "state": "Bihar", "date": "2024-01-01", "anomaly_type": "Spike", "severity": "High" }
            ],
            "center_anomalies": [
                { "region": "Goa", "date": "2024-01-03", "anomaly_type": "High Bio-Failure Rate", "severity": "High", "center_id": "CTR-99" }
            ],
            "state_anomalies": [
                { "state": "Goa", "anomaly_type": "Low Biometric Updates", "severity": "High", "metric": "biometric_update_ratio", "value": 0.12 }
            ],
            "summary": { "total_anomalies": 4, "critical_count": 1, "high_count": 2 }
        }),
        Resource::Recommendations => json!({ "recommendations": [
            { "id": "R1", "priority": "High", "title": "Deploy mobile units", "state": "Bihar", "impact_score": 80 },
            { "id": "R2", "priority": "Critical", "title": "Audit CTR-99", "impact_score": 60 }
        ]}),
        Resource::Watchlist => json!({
            "CTR-7": { "timestamp": "2024-05-01 10:00:00", "action": "BLOCK", "reason": "Replay", "ml_confidence": 90.0, "persistence": "Permanent" }
        }),
        Resource::PeerBenchmarks => json!([
            { "state": "Kerala", "peer_group": 3, "performance_gap": -4.2, "peers": ["Tamil Nadu"] }
        ]),
        Resource::Translations(_) => json!({}),
    }
}

/// Social-risk endpoint rows: one per state, scores already numeric.
pub fn sample_social_risk() -> Value {
    json!([
        { "state": "Bihar", "district": "Patna", "integrated_risk_score": 72.5, "biometric_update_ratio": 0.12, "rural_population_percentage": 88.7 },
        { "state": "Kerala", "district": "Wayanad", "integrated_risk_score": 44.0, "biometric_update_ratio": 0.4, "rural_population_percentage": 52.3 },
        { "state": "Goa", "district": "North Goa", "integrated_risk_score": 12.0, "biometric_update_ratio": 0.31, "rural_population_percentage": 37.8 }
    ])
}

/// Register every snapshot resource at its primary URL, plus the
/// social-risk endpoint.
pub fn serve_snapshot(fake: &FakeTransport) {
    for resource in Resource::SNAPSHOT {
        fake.respond_json(&primary_url(resource), sample_payload(resource));
    }
    fake.respond_json(&format!("{}{}", PRIMARY, SOCIAL_RISK_ENDPOINT), sample_social_risk());
}
