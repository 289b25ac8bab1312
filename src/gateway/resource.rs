//! Named dashboard resources and their documented empty defaults.

use serde_json::{json, Value};

use crate::i18n::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    StateData,
    StateFeatures,
    LifecycleInsights,
    Forecasts,
    Anomalies,
    Recommendations,
    Watchlist,
    PeerBenchmarks,
    Translations(Locale),
}

impl Resource {
    /// Resources that make up a full snapshot, in load order.
    pub const SNAPSHOT: [Resource; 8] = [
        Resource::StateData,
        Resource::StateFeatures,
        Resource::LifecycleInsights,
        Resource::Forecasts,
        Resource::Anomalies,
        Resource::Recommendations,
        Resource::Watchlist,
        Resource::PeerBenchmarks,
    ];

    pub fn file_name(&self) -> String {
        match self {
            Resource::StateData => "state_data.json".to_string(),
            Resource::StateFeatures => "state_features.json".to_string(),
            Resource::LifecycleInsights => "lifecycle_insights.json".to_string(),
            Resource::Forecasts => "forecasts.json".to_string(),
            Resource::Anomalies => "anomalies.json".to_string(),
            Resource::Recommendations => "recommendations.json".to_string(),
            Resource::Watchlist => "watchlist_active.json".to_string(),
            Resource::PeerBenchmarks => "peer_benchmarks.json".to_string(),
            Resource::Translations(locale) => format!("translations/{}.json", locale.code()),
        }
    }

    /// Shape-appropriate value used when both primary and fallback fail.
    pub fn empty_default(&self) -> Value {
        match self {
            Resource::StateData | Resource::StateFeatures | Resource::PeerBenchmarks => json!([]),
            Resource::LifecycleInsights
            | Resource::Forecasts
            | Resource::Watchlist
            | Resource::Translations(_) => json!({}),
            Resource::Anomalies => json!({ "summary": { "total_anomalies": 0 } }),
            Resource::Recommendations => json!({ "recommendations": [] }),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_name())
    }
}
