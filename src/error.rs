//! Error types for the dashboard core
//!
//! Errors are classified by how the dashboard reacts to them:
//! - Degradable: network failures and non-2xx responses (absorbed per resource)
//! - Local: validation failures, raised before any network call
//! - Scoped: a drill-down record missing from the snapshot

use thiserror::Error;

/// Error types for fetches, actions and lookups
#[derive(Debug, Error)]
pub enum DashboardError {
    // Degradable errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned {status}: {body}")]
    Server { status: u16, body: String },

    // Local errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Scoped errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to parse payload: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DashboardError {
    /// Returns true if re-triggering the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::Network(_) => true,
            DashboardError::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if the error is the user's input, not the backend
    pub fn is_validation(&self) -> bool {
        matches!(self, DashboardError::Validation(_))
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DashboardError::Network(_) => "Check the network connection and try again.",
            DashboardError::Server { status, .. } if *status == 401 => {
                "The API key was rejected. Check apiKey in ~/.alris/config.json"
            }
            DashboardError::Server { .. } => "The analytics server reported an error. Try again.",
            DashboardError::Validation(_) => "Fill in the required fields and resubmit.",
            DashboardError::NotFound(_) => "The record is not in the current data. Refresh and retry.",
            DashboardError::Parse(_) => "The data file format is invalid. Regenerate the artifacts.",
            DashboardError::Io(_) => "Check file permissions and disk space.",
            DashboardError::Config(_) => "Check your configuration in ~/.alris/config.json",
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return DashboardError::Server {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        if err.is_decode() {
            return DashboardError::Parse(err.to_string());
        }
        DashboardError::Network(err.to_string())
    }
}

/// Serializable error representation for the UI layer
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Network,
    Server,
    Validation,
    NotFound,
    Internal,
}

impl From<&DashboardError> for ErrorPayload {
    fn from(err: &DashboardError) -> Self {
        let error_type = match err {
            DashboardError::Network(_) => ErrorType::Network,
            DashboardError::Server { .. } => ErrorType::Server,
            DashboardError::Validation(_) => ErrorType::Validation,
            DashboardError::NotFound(_) => ErrorType::NotFound,
            _ => ErrorType::Internal,
        };

        ErrorPayload {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
