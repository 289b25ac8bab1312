//! Risk scoring and bucketing.
//!
//! Two independent mappings live here:
//! - severity → weight, summed per zone for the heatmap
//! - continuous 0–100 score → display bucket, via one shared threshold table
//!
//! Every widget that colors a risk score goes through `bucket_for_score`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::types::{AnomalyRecord, Severity};

// =============================================================================
// Severity weights
// =============================================================================

pub fn severity_weight(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 10,
        Severity::High => 5,
        _ => 2,
    }
}

// =============================================================================
// Score buckets
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RiskBucket {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskBucket {
    pub fn label(&self) -> &'static str {
        match self {
            RiskBucket::Critical => "Critical",
            RiskBucket::High => "High",
            RiskBucket::Medium => "Medium",
            RiskBucket::Low => "Low",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RiskBucket::Critical => "#dc3545",
            RiskBucket::High => "#fd7e14",
            RiskBucket::Medium => "#ffc107",
            RiskBucket::Low => "#138808",
        }
    }
}

/// Lower bounds (exclusive), highest first. Scores at or below the last
/// bound fall through to `Low`.
pub const RISK_THRESHOLDS: [(f64, RiskBucket); 3] = [
    (60.0, RiskBucket::Critical),
    (40.0, RiskBucket::High),
    (20.0, RiskBucket::Medium),
];

/// Non-finite scores are treated as `Low`.
pub fn bucket_for_score(score: f64) -> RiskBucket {
    if !score.is_finite() {
        return RiskBucket::Low;
    }
    RISK_THRESHOLDS
        .iter()
        .find(|(bound, _)| score > *bound)
        .map(|(_, bucket)| *bucket)
        .unwrap_or(RiskBucket::Low)
}

// =============================================================================
// Zones
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Zone {
    North,
    South,
    East,
    West,
    Central,
    #[serde(rename = "North-East")]
    NorthEast,
}

/// Zone used for labels missing from the lookup table.
pub const DEFAULT_ZONE: Zone = Zone::Central;

impl Zone {
    pub const ALL: [Zone; 6] = [
        Zone::North,
        Zone::South,
        Zone::East,
        Zone::West,
        Zone::Central,
        Zone::NorthEast,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Zone::North => "North",
            Zone::South => "South",
            Zone::East => "East",
            Zone::West => "West",
            Zone::Central => "Central",
            Zone::NorthEast => "North-East",
        }
    }
}

/// Raw label (lowercased) → zone. Covers zone names, common aliases and
/// every state/UT.
const ZONE_TABLE: &[(&str, Zone)] = &[
    ("north", Zone::North),
    ("northern", Zone::North),
    ("south", Zone::South),
    ("southern", Zone::South),
    ("east", Zone::East),
    ("eastern", Zone::East),
    ("west", Zone::West),
    ("western", Zone::West),
    ("central", Zone::Central),
    ("north-east", Zone::NorthEast),
    ("northeast", Zone::NorthEast),
    ("north east", Zone::NorthEast),
    ("ne", Zone::NorthEast),
    // North
    ("jammu & kashmir", Zone::North),
    ("jammu and kashmir", Zone::North),
    ("himachal pradesh", Zone::North),
    ("punjab", Zone::North),
    ("uttarakhand", Zone::North),
    ("haryana", Zone::North),
    ("delhi", Zone::North),
    ("rajasthan", Zone::North),
    ("chandigarh", Zone::North),
    ("ladakh", Zone::North),
    // East
    ("bihar", Zone::East),
    ("west bengal", Zone::East),
    ("odisha", Zone::East),
    ("jharkhand", Zone::East),
    // West
    ("gujarat", Zone::West),
    ("maharashtra", Zone::West),
    ("goa", Zone::West),
    ("dadra and nagar haveli and daman and diu", Zone::West),
    // South
    ("andhra pradesh", Zone::South),
    ("karnataka", Zone::South),
    ("kerala", Zone::South),
    ("tamil nadu", Zone::South),
    ("telangana", Zone::South),
    ("lakshadweep", Zone::South),
    ("puducherry", Zone::South),
    ("andaman & nicobar islands", Zone::South),
    ("andaman and nicobar islands", Zone::South),
    // Central
    ("madhya pradesh", Zone::Central),
    ("chhattisgarh", Zone::Central),
    ("uttar pradesh", Zone::Central),
    ("up", Zone::Central),
    // North-East
    ("arunachal pradesh", Zone::NorthEast),
    ("assam", Zone::NorthEast),
    ("manipur", Zone::NorthEast),
    ("meghalaya", Zone::NorthEast),
    ("mizoram", Zone::NorthEast),
    ("nagaland", Zone::NorthEast),
    ("sikkim", Zone::NorthEast),
    ("tripura", Zone::NorthEast),
];

pub fn zone_for_region(raw: &str) -> Zone {
    let key = raw.trim().to_lowercase();
    ZONE_TABLE
        .iter()
        .find(|(label, _)| *label == key)
        .map(|(_, zone)| *zone)
        .unwrap_or(DEFAULT_ZONE)
}

// =============================================================================
// Aggregation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRisk {
    pub zone: Zone,
    pub weighted_score: u32,
    pub anomaly_count: usize,
}

impl ZoneRisk {
    /// Heatmap bucket: the shared table applied to the score capped at 100.
    pub fn bucket(&self) -> RiskBucket {
        bucket_for_score(f64::from(self.weighted_score.min(100)))
    }
}

/// Weighted severity sum per zone. Every canonical zone is present, even
/// with zero anomalies, so the heatmap grid is stable.
pub fn aggregate_by_zone<'a, I>(records: I) -> BTreeMap<Zone, ZoneRisk>
where
    I: IntoIterator<Item = &'a AnomalyRecord>,
{
    let mut zones: BTreeMap<Zone, ZoneRisk> = Zone::ALL
        .iter()
        .map(|z| {
            (
                *z,
                ZoneRisk {
                    zone: *z,
                    weighted_score: 0,
                    anomaly_count: 0,
                },
            )
        })
        .collect();

    for record in records {
        let zone = record
            .region_label()
            .map(zone_for_region)
            .unwrap_or(DEFAULT_ZONE);
        if let Some(entry) = zones.get_mut(&zone) {
            entry.weighted_score += severity_weight(record.severity);
            entry.anomaly_count += 1;
        }
    }
    zones
}

/// Weighted severity sum per raw region label.
pub fn aggregate_by_region<'a, I>(records: I) -> BTreeMap<String, u32>
where
    I: IntoIterator<Item = &'a AnomalyRecord>,
{
    let mut out = BTreeMap::new();
    for record in records {
        if let Some(region) = record.region_label() {
            *out.entry(region.to_string()).or_insert(0) += severity_weight(record.severity);
        }
    }
    out
}

// =============================================================================
// State risk rows
// =============================================================================

/// Backend endpoint serving per-state social-risk indices.
pub const SOCIAL_RISK_ENDPOINT: &str = "/api/social/risk";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRisk {
    pub state: String,
    pub zone: Zone,
    pub score: f64,
    pub bucket: RiskBucket,
}

fn score_field(record: &Value) -> Option<f64> {
    ["integrated_risk_score", "risk_score"].iter().find_map(|k| {
        record.get(*k).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    })
}

/// Scored state rows from social-risk records, highest score first, one
/// row per state (first wins). Records without a score are skipped.
pub fn state_risk_rows(records: &[Value]) -> Vec<StateRisk> {
    let mut seen = std::collections::HashSet::new();
    let mut rows: Vec<StateRisk> = records
        .iter()
        .filter_map(|record| {
            let state = record.get("state")?.as_str()?.trim();
            if state.is_empty() {
                return None;
            }
            let score = score_field(record)?;
            if !seen.insert(state.to_string()) {
                return None;
            }
            Some(StateRisk {
                state: state.to_string(),
                zone: zone_for_region(state),
                score,
                bucket: bucket_for_score(score),
            })
        })
        .collect();
    rows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    rows
}
