//! Anomaly dedup and severity ranking.
//!
//! Merges the five anomaly lists of a report into one sequence, drops
//! repeats of the same (region, date, type) identity keeping the first one
//! seen, and orders the survivors by severity rank with a stable sort.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::{AnomalyRecord, AnomalyReport, Severity, SourceCategory};

/// Identity used for dedup.
///
/// Records with neither `state` nor `region` get a per-record key so they
/// can never collapse into one another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Identity {
        region: String,
        date: String,
        anomaly_type: String,
    },
    Unlocated {
        source: SourceCategory,
        index: usize,
    },
}

impl DedupKey {
    pub fn for_record(record: &AnomalyRecord) -> Self {
        match record.region_label() {
            Some(region) => DedupKey::Identity {
                region: region.to_string(),
                date: record.date.clone().unwrap_or_default(),
                anomaly_type: record.anomaly_type.clone(),
            },
            None => DedupKey::Unlocated {
                source: record.source,
                index: record.source_index,
            },
        }
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupKey::Identity {
                region,
                date,
                anomaly_type,
            } => write!(f, "{}-{}-{}", region, date, anomaly_type),
            DedupKey::Unlocated { source, index } => {
                write!(f, "{}#{}", source.report_key(), index)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

impl SeverityCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a AnomalyRecord>) -> Self {
        let mut counts = Self::default();
        for r in records {
            match r.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.unknown
    }
}

/// Full deduped, severity-ordered anomaly set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankedAnomalies {
    pub records: Vec<AnomalyRecord>,
    /// Records dropped as duplicates of an earlier key.
    pub duplicates_dropped: usize,
}

impl RankedAnomalies {
    /// First `n` records for display. The full set stays available.
    pub fn top(&self, n: usize) -> &[AnomalyRecord] {
        &self.records[..n.min(self.records.len())]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts::tally(&self.records)
    }
}

/// Keep the first record per key, preserving input order.
pub fn dedup_first_seen<I>(records: I) -> (Vec<AnomalyRecord>, usize)
where
    I: IntoIterator<Item = AnomalyRecord>,
{
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    for record in records {
        if seen.insert(DedupKey::for_record(&record)) {
            kept.push(record);
        } else {
            dropped += 1;
        }
    }
    (kept, dropped)
}

/// Stable sort, highest severity rank first.
pub fn sort_by_severity(records: &mut [AnomalyRecord]) {
    records.sort_by_key(|r| std::cmp::Reverse(r.severity.rank()));
}

pub fn rank_anomalies(report: &AnomalyReport) -> RankedAnomalies {
    let merged = report
        .dedup_sources()
        .into_iter()
        .flat_map(|list| list.iter().cloned());

    let (mut records, duplicates_dropped) = dedup_first_seen(merged);
    sort_by_severity(&mut records);

    if duplicates_dropped > 0 {
        log::debug!(
            "Anomaly ranking: kept {} records, dropped {} duplicates",
            records.len(),
            duplicates_dropped
        );
    }

    RankedAnomalies {
        records,
        duplicates_dropped,
    }
}
