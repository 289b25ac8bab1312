//! HTTP transport for dashboard resources and admin endpoints.
//!
//! The gateway and action executor talk to the backend only through
//! `ResourceTransport`, so tests can swap in an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DashboardError;

/// Raw response: status plus body bytes. Non-2xx is not an error at this
/// layer; callers decide how to treat it.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, DashboardError> {
        serde_json::from_slice(&self.body).map_err(DashboardError::from)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Converts a non-2xx response into `DashboardError::Server`.
    pub fn error_for_status(self) -> Result<Self, DashboardError> {
        if self.is_success() {
            Ok(self)
        } else {
            let status = self.status;
            Err(DashboardError::Server {
                status,
                body: self.text(),
            })
        }
    }
}

#[async_trait]
pub trait ResourceTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, DashboardError>;

    async fn post_json(&self, url: &str, body: &Value)
        -> Result<TransportResponse, DashboardError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(api_key: Option<&str>, timeout: Duration) -> Result<Self, DashboardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.map(|k| k.to_string()),
        })
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key.clone()),
            None => req,
        }
    }

    async fn into_response(resp: reqwest::Response) -> Result<TransportResponse, DashboardError> {
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl ResourceTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, DashboardError> {
        let resp = self
            .with_key(self.client.get(url))
            .send()
            .await
            .map_err(|e| DashboardError::Network(format!("GET {} failed: {}", url, e)))?;
        Self::into_response(resp).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse, DashboardError> {
        let resp = self
            .with_key(self.client.post(url))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| DashboardError::Network(format!("POST {} failed: {}", url, e)))?;
        Self::into_response(resp).await
    }
}
