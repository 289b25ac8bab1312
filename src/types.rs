//! Typed payloads parsed once at the ingestion boundary.
//!
//! Upstream artifacts are produced by a separate ETL and vary in small
//! ways (numbers serialized as strings, optional keys, extra keys). Parsing
//! here is lenient: a malformed record is skipped with a warning, never
//! allowed to fail the snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Lenient field helpers
// =============================================================================

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    })
}

pub(crate) fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn de_string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(de_opt_string(d)?.unwrap_or_default())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Parse each element of `value[key]`, skipping (and logging) bad entries.
fn parse_array<T, F>(value: &Value, key: Option<&str>, mut f: F) -> Vec<T>
where
    F: FnMut(usize, &Value) -> Option<T>,
{
    let arr = match key {
        Some(k) => value.get(k),
        None => Some(value),
    };
    match arr.and_then(|a| a.as_array()) {
        Some(items) => items.iter().enumerate().filter_map(|(i, v)| f(i, v)).collect(),
        None => Vec::new(),
    }
}

// =============================================================================
// Anomalies
// =============================================================================

/// Ordinal severity. Anything unrecognized parses to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Severity {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Unknown,
        }
    }

    /// Sort rank: Critical=3, High=2, Medium=1, everything else 0.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 3,
            Severity::High => 2,
            Severity::Medium => 1,
            Severity::Low | Severity::Unknown => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Unknown => "Unknown",
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(v.as_str().map(Severity::parse).unwrap_or_default())
    }
}

/// Which upstream list a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    MlConfirmed,
    Seasonal,
    Security,
    Center,
    PeerLag,
    State,
}

impl SourceCategory {
    pub fn report_key(&self) -> &'static str {
        match self {
            SourceCategory::MlConfirmed => "ml_confirmed_anomalies",
            SourceCategory::Seasonal => "seasonal_anomalies",
            SourceCategory::Security => "retry_anomalies",
            SourceCategory::Center => "center_anomalies",
            SourceCategory::PeerLag => "peer_lag_anomalies",
            SourceCategory::State => "state_anomalies",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAnomaly {
    #[serde(default, deserialize_with = "de_opt_string")]
    state: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    region: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    center_id: Option<String>,
    #[serde(default, deserialize_with = "de_string_or_empty")]
    anomaly_type: String,
    #[serde(default)]
    severity: Severity,
    #[serde(default, deserialize_with = "de_opt_f64")]
    confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_string")]
    date: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    temporal_persistence: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    metric: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default, deserialize_with = "de_opt_string")]
    explanation: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    governance_note: Option<String>,
}

/// One anomaly, tagged with its source list and position in that list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRecord {
    pub state: Option<String>,
    pub region: Option<String>,
    pub center_id: Option<String>,
    pub anomaly_type: String,
    pub severity: Severity,
    pub confidence_score: Option<f64>,
    pub date: Option<String>,
    pub temporal_persistence: Option<String>,
    pub metric: Option<String>,
    pub value: Value,
    pub explanation: Option<String>,
    pub source: SourceCategory,
    pub source_index: usize,
}

impl AnomalyRecord {
    pub fn from_value(value: &Value, source: SourceCategory, index: usize) -> Option<Self> {
        let raw: RawAnomaly = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!(
                    "Skipping malformed {} record #{}: {}",
                    source.report_key(),
                    index,
                    e
                );
                return None;
            }
        };
        Some(Self {
            state: non_empty(raw.state),
            region: non_empty(raw.region),
            center_id: non_empty(raw.center_id),
            anomaly_type: raw.anomaly_type,
            severity: raw.severity,
            confidence_score: raw.confidence_score,
            date: non_empty(raw.date),
            temporal_persistence: raw.temporal_persistence,
            metric: raw.metric,
            value: raw.value,
            explanation: raw.explanation.or(raw.governance_note),
            source,
            source_index: index,
        })
    }

    /// `state` if present, else `region`.
    pub fn region_label(&self) -> Option<&str> {
        self.state.as_deref().or(self.region.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    #[serde(default)]
    pub total_anomalies: u64,
    #[serde(default)]
    pub critical_count: u64,
    #[serde(default)]
    pub high_count: u64,
    #[serde(default)]
    pub medium_count: u64,
}

/// `anomalies.json`, with each sub-list typed and tagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub ml_confirmed: Vec<AnomalyRecord>,
    pub seasonal: Vec<AnomalyRecord>,
    pub security: Vec<AnomalyRecord>,
    pub center: Vec<AnomalyRecord>,
    pub peer_lag: Vec<AnomalyRecord>,
    pub state: Vec<AnomalyRecord>,
    pub summary: AnomalySummary,
    pub generated_at: Option<String>,
}

impl AnomalyReport {
    pub fn from_value(value: &Value) -> Self {
        let list = |source: SourceCategory| {
            parse_array(value, Some(source.report_key()), |i, v| {
                AnomalyRecord::from_value(v, source, i)
            })
        };
        let summary = value
            .get("summary")
            .and_then(|s| serde_json::from_value(s.clone()).ok())
            .unwrap_or_default();

        Self {
            ml_confirmed: list(SourceCategory::MlConfirmed),
            seasonal: list(SourceCategory::Seasonal),
            security: list(SourceCategory::Security),
            center: list(SourceCategory::Center),
            peer_lag: list(SourceCategory::PeerLag),
            state: list(SourceCategory::State),
            summary,
            generated_at: value
                .get("generated_at")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        }
    }

    /// The five lists merged by the dedup engine, in merge order.
    pub fn dedup_sources(&self) -> [&[AnomalyRecord]; 5] {
        [
            &self.ml_confirmed,
            &self.seasonal,
            &self.security,
            &self.center,
            &self.peer_lag,
        ]
    }
}

// =============================================================================
// Forecasts
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub periods_ahead: u32,
    #[serde(default)]
    pub forecast_values: Vec<f64>,
    #[serde(default)]
    pub lower_bound: Vec<f64>,
    #[serde(default)]
    pub upper_bound: Vec<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub model_confidence: Option<f64>,
    #[serde(default)]
    pub method: Option<String>,
}

/// Forecast payload, resolved once from the `arima` / `simple` keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "model", content = "series", rename_all = "lowercase")]
pub enum Forecast {
    Arima(ForecastSeries),
    Simple(ForecastSeries),
    #[default]
    Unavailable,
}

impl Forecast {
    pub fn from_value(value: &Value) -> Self {
        let parse = |key: &str| -> Option<ForecastSeries> {
            let v = value.get(key)?;
            match serde_json::from_value(v.clone()) {
                Ok(series) => Some(series),
                Err(e) => {
                    log::warn!("Ignoring malformed {} forecast: {}", key, e);
                    None
                }
            }
        };

        if let Some(series) = parse("arima") {
            Forecast::Arima(series)
        } else if let Some(series) = parse("simple") {
            Forecast::Simple(series)
        } else {
            Forecast::Unavailable
        }
    }

    pub fn series(&self) -> Option<&ForecastSeries> {
        match self {
            Forecast::Arima(s) | Forecast::Simple(s) => Some(s),
            Forecast::Unavailable => None,
        }
    }

    pub fn model_label(&self) -> &'static str {
        match self {
            Forecast::Arima(_) => "ARIMA(1,1,1)",
            Forecast::Simple(_) => "Moving average with trend",
            Forecast::Unavailable => "No forecast",
        }
    }

    pub fn has_bounds(&self) -> bool {
        self.series()
            .map(|s| !s.lower_bound.is_empty() && s.lower_bound.len() == s.upper_bound.len())
            .unwrap_or(false)
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LifecycleInsights {
    /// Age (as the upstream key) to intensity.
    pub demographic_intensity: BTreeMap<String, f64>,
    pub raw: Value,
}

impl LifecycleInsights {
    pub fn from_value(value: &Value) -> Self {
        let demographic_intensity = value
            .get("demographic_intensity")
            .and_then(|v| v.as_object())
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            demographic_intensity,
            raw: value.clone(),
        }
    }

    /// Intensity points ordered by numeric age where the key is numeric.
    pub fn intensity_curve(&self) -> Vec<(String, f64)> {
        let mut points: Vec<(String, f64)> = self
            .demographic_intensity
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        points.sort_by(|a, b| {
            match (a.0.parse::<f64>(), b.0.parse::<f64>()) {
                (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                _ => a.0.cmp(&b.0),
            }
        });
        points
    }
}

// =============================================================================
// Recommendations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort order: Critical first.
    pub fn order(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(match v.as_str().map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "critical" => Priority::Critical,
            Some(s) if s == "high" => Priority::High,
            Some(s) if s == "low" => Priority::Low,
            _ => Priority::Medium,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default, deserialize_with = "de_string_or_empty")]
    pub id: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "de_string_or_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "de_string_or_empty")]
    pub finding: String,
    #[serde(default, deserialize_with = "de_string_or_empty")]
    pub recommendation: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub impact_score: Option<f64>,
}

pub fn parse_recommendations(value: &Value) -> Vec<Recommendation> {
    let mut recs: Vec<Recommendation> = parse_array(value, Some("recommendations"), |i, v| {
        serde_json::from_value(v.clone())
            .map_err(|e| log::warn!("Skipping malformed recommendation #{}: {}", i, e))
            .ok()
    });
    recs.sort_by(|a, b| {
        a.priority.order().cmp(&b.priority.order()).then_with(|| {
            let (x, y) = (a.impact_score.unwrap_or(0.0), b.impact_score.unwrap_or(0.0));
            y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    recs
}

// =============================================================================
// Watchlist
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub ml_confidence: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub persistence: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub admin_id: Option<String>,
}

/// Server-authoritative blocked entities, keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Watchlist {
    pub entries: BTreeMap<String, WatchlistEntry>,
}

impl Watchlist {
    pub fn from_value(value: &Value) -> Self {
        let entries = value
            .as_object()
            .map(|m| {
                m.iter()
                    .filter_map(|(id, v)| {
                        serde_json::from_value::<WatchlistEntry>(v.clone())
                            .map_err(|e| log::warn!("Skipping watchlist entry {}: {}", id, e))
                            .ok()
                            .map(|entry| (id.clone(), entry))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.entries.contains_key(entity_id)
    }
}

// =============================================================================
// Peer benchmarks
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerBenchmark {
    #[serde(default, deserialize_with = "de_string_or_empty")]
    pub state: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub peer_group: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub performance_gap: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub comparative_insight: Option<String>,
    #[serde(default)]
    pub peers: Vec<String>,
}

pub fn parse_peer_benchmarks(value: &Value) -> Vec<PeerBenchmark> {
    parse_array(value, None, |i, v| {
        serde_json::from_value::<PeerBenchmark>(v.clone())
            .map_err(|e| log::warn!("Skipping malformed peer benchmark #{}: {}", i, e))
            .ok()
            .filter(|b| !b.state.is_empty())
    })
}

/// Case-insensitive lookup of one state's benchmark.
pub fn find_peer_benchmark<'a>(benchmarks: &'a [PeerBenchmark], state: &str) -> Option<&'a PeerBenchmark> {
    benchmarks
        .iter()
        .find(|b| b.state.eq_ignore_ascii_case(state.trim()))
}
