//! Render dispatcher: snapshot + scope → widget updates.
//!
//! Painting is behind `RenderSurface`. The dispatcher owns the chart
//! registry: every chart target holds at most one live instance, and the
//! previous instance is destroyed before a new one is created. Tables are
//! cleared before rows are inserted.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::anomalies::SeverityCounts;
use crate::error::DashboardError;
use crate::gateway::{FetchGateway, Resource};
use crate::investigation::{investigate, Investigation};
use crate::risk::{
    aggregate_by_region, aggregate_by_zone, bucket_for_score, state_risk_rows, RiskBucket,
};
use crate::scope::Scope;
use crate::snapshot::Snapshot;
use crate::types::{find_peer_benchmark, parse_peer_benchmarks, Forecast, PeerBenchmark, Severity};

pub type ChartHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WidgetTarget {
    SeverityChart,
    ForecastChart,
    LifecycleChart,
    ZoneHeatmap,
    RegionRiskTable,
    TopAnomaliesTable,
    StateRiskTable,
    RecommendationsList,
    WatchlistTable,
    AnomalyDetailPanel,
    PeerComparisonPanel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Doughnut,
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub values: Vec<f64>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub key: String,
    pub cells: Vec<String>,
    /// Badge color for the row, if any.
    pub tone: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PanelContent {
    AnomalyDetail { investigation: Investigation },
    PeerComparison { benchmark: PeerBenchmark },
    Message { text: String },
}

/// Whatever actually draws widgets.
pub trait RenderSurface {
    fn create_chart(&mut self, target: WidgetTarget, spec: &ChartSpec) -> ChartHandle;
    fn destroy_chart(&mut self, handle: ChartHandle);
    fn clear_table(&mut self, target: WidgetTarget);
    fn insert_rows(&mut self, target: WidgetTarget, rows: &[TableRow]);
    fn show_panel(&mut self, target: WidgetTarget, content: &PanelContent);
}

/// Rows written per table target by one `render_all`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderReport {
    pub rows: BTreeMap<WidgetTarget, usize>,
    pub charts: usize,
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => RiskBucket::Critical.color(),
        Severity::High => RiskBucket::High.color(),
        Severity::Medium => RiskBucket::Medium.color(),
        Severity::Low | Severity::Unknown => RiskBucket::Low.color(),
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|n| format!("{:.1}", n)).unwrap_or_else(|| "-".to_string())
}

pub struct RenderDispatcher<S: RenderSurface> {
    surface: S,
    charts: HashMap<WidgetTarget, ChartHandle>,
    top_anomalies: usize,
}

impl<S: RenderSurface> RenderDispatcher<S> {
    pub fn new(surface: S, top_anomalies: usize) -> Self {
        Self {
            surface,
            charts: HashMap::new(),
            top_anomalies,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn live_chart(&self, target: WidgetTarget) -> Option<ChartHandle> {
        self.charts.get(&target).copied()
    }

    fn draw_chart(&mut self, target: WidgetTarget, spec: ChartSpec) {
        if let Some(previous) = self.charts.remove(&target) {
            self.surface.destroy_chart(previous);
        }
        let handle = self.surface.create_chart(target, &spec);
        self.charts.insert(target, handle);
    }

    fn fill_table(&mut self, target: WidgetTarget, rows: Vec<TableRow>, report: &mut RenderReport) {
        self.surface.clear_table(target);
        self.surface.insert_rows(target, &rows);
        report.rows.insert(target, rows.len());
    }

    /// Redraw every widget from `snapshot`, scoped by `scope`.
    pub fn render_all(&mut self, snapshot: &Snapshot, scope: &Scope) -> RenderReport {
        let mut report = RenderReport::default();

        let scoped: Vec<_> = snapshot
            .ranked
            .records
            .iter()
            .filter(|r| scope.matches_state(r.region_label()))
            .collect();

        // Severity distribution
        let counts = SeverityCounts::tally(scoped.iter().copied());
        let severities = [Severity::Critical, Severity::High, Severity::Medium, Severity::Low];
        self.draw_chart(
            WidgetTarget::SeverityChart,
            ChartSpec {
                kind: ChartKind::Doughnut,
                title: "Anomaly severity".to_string(),
                labels: severities.iter().map(|s| s.as_str().to_string()).collect(),
                datasets: vec![Dataset {
                    label: "Anomalies".to_string(),
                    values: vec![
                        counts.critical as f64,
                        counts.high as f64,
                        counts.medium as f64,
                        (counts.low + counts.unknown) as f64,
                    ],
                    colors: severities.iter().map(|s| severity_color(*s).to_string()).collect(),
                }],
            },
        );

        self.draw_chart(WidgetTarget::ForecastChart, forecast_chart(&snapshot.forecast));

        let curve = snapshot.lifecycle.intensity_curve();
        self.draw_chart(
            WidgetTarget::LifecycleChart,
            ChartSpec {
                kind: ChartKind::Line,
                title: "Demographic intensity by age".to_string(),
                labels: curve.iter().map(|(age, _)| age.clone()).collect(),
                datasets: vec![Dataset {
                    label: "Intensity".to_string(),
                    values: curve.iter().map(|(_, v)| *v).collect(),
                    colors: Vec::new(),
                }],
            },
        );
        report.charts = self.charts.len();

        // Zone heatmap
        let zone_rows = aggregate_by_zone(scoped.iter().copied())
            .into_values()
            .map(|z| {
                let bucket = z.bucket();
                TableRow {
                    key: z.zone.label().to_string(),
                    cells: vec![
                        z.zone.label().to_string(),
                        z.weighted_score.to_string(),
                        z.anomaly_count.to_string(),
                        bucket.label().to_string(),
                    ],
                    tone: Some(bucket.color()),
                }
            })
            .collect();
        self.fill_table(WidgetTarget::ZoneHeatmap, zone_rows, &mut report);

        let mut by_region: Vec<(String, u32)> =
            aggregate_by_region(scoped.iter().copied()).into_iter().collect();
        by_region.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let region_rows = by_region
            .into_iter()
            .map(|(region, score)| {
                let bucket = bucket_for_score(f64::from(score.min(100)));
                TableRow {
                    key: region.clone(),
                    cells: vec![region, score.to_string(), bucket.label().to_string()],
                    tone: Some(bucket.color()),
                }
            })
            .collect();
        self.fill_table(WidgetTarget::RegionRiskTable, region_rows, &mut report);

        // Top anomalies
        let top_rows = scoped
            .iter()
            .take(self.top_anomalies)
            .map(|r| TableRow {
                key: crate::anomalies::DedupKey::for_record(r).to_string(),
                cells: vec![
                    r.region_label().unwrap_or("-").to_string(),
                    r.anomaly_type.clone(),
                    r.severity.as_str().to_string(),
                    fmt_opt(r.confidence_score),
                    r.date.clone().unwrap_or_else(|| "-".to_string()),
                    r.center_id.clone().unwrap_or_default(),
                ],
                tone: Some(severity_color(r.severity)),
            })
            .collect();
        self.fill_table(WidgetTarget::TopAnomaliesTable, top_rows, &mut report);

        let state_rows = state_risk_rows(&snapshot.social_risk)
            .into_iter()
            .filter(|row| scope.matches_state(Some(&row.state)))
            .map(|row| TableRow {
                key: row.state.clone(),
                cells: vec![
                    row.state,
                    row.zone.label().to_string(),
                    format!("{:.1}", row.score),
                    row.bucket.label().to_string(),
                ],
                tone: Some(row.bucket.color()),
            })
            .collect();
        self.fill_table(WidgetTarget::StateRiskTable, state_rows, &mut report);

        let rec_rows = snapshot
            .recommendations
            .iter()
            .map(|r| TableRow {
                key: r.id.clone(),
                cells: vec![
                    r.priority.as_str().to_string(),
                    r.title.clone(),
                    r.recommendation.clone(),
                    fmt_opt(r.impact_score),
                ],
                tone: None,
            })
            .collect();
        self.fill_table(WidgetTarget::RecommendationsList, rec_rows, &mut report);

        let watch_rows = watchlist_rows(snapshot);
        self.fill_table(WidgetTarget::WatchlistTable, watch_rows, &mut report);

        log::debug!(
            "Render: snapshot #{} drawn ({} charts, {} scoped anomalies)",
            snapshot.sequence,
            report.charts,
            scoped.len()
        );
        report
    }

    /// Redraw only the watchlist table, after an admin action.
    pub fn render_watchlist(&mut self, snapshot: &Snapshot) -> usize {
        let rows = watchlist_rows(snapshot);
        let n = rows.len();
        self.surface.clear_table(WidgetTarget::WatchlistTable);
        self.surface.insert_rows(WidgetTarget::WatchlistTable, &rows);
        n
    }

    /// Populate the detail panel from the loaded snapshot. A miss shows an
    /// inline message in that panel and nowhere else.
    pub fn show_anomaly_detail(
        &mut self,
        snapshot: &Snapshot,
        query: &str,
    ) -> Result<Investigation, DashboardError> {
        match investigate(&snapshot.anomalies, query) {
            Ok(investigation) => {
                self.surface.show_panel(
                    WidgetTarget::AnomalyDetailPanel,
                    &PanelContent::AnomalyDetail {
                        investigation: investigation.clone(),
                    },
                );
                Ok(investigation)
            }
            Err(e) => {
                log::info!("Render: investigation for {} failed: {}", query, e);
                self.surface.show_panel(
                    WidgetTarget::AnomalyDetailPanel,
                    &PanelContent::Message {
                        text: format!("Investigation failed: {}", e),
                    },
                );
                Err(e)
            }
        }
    }

    /// Fetch peer benchmarks on demand and show the selected state's entry.
    pub async fn show_peer_comparison(
        &mut self,
        gateway: &FetchGateway,
        state: &str,
    ) -> Option<PeerBenchmark> {
        let benchmarks = parse_peer_benchmarks(&gateway.fetch_resource(Resource::PeerBenchmarks).await);
        let found = find_peer_benchmark(&benchmarks, state).cloned();
        let content = match &found {
            Some(benchmark) => PanelContent::PeerComparison {
                benchmark: benchmark.clone(),
            },
            None => PanelContent::Message {
                text: format!("No peer benchmark available for {}", state.trim()),
            },
        };
        self.surface.show_panel(WidgetTarget::PeerComparisonPanel, &content);
        found
    }

    /// Destroy every live chart.
    pub fn teardown(&mut self) {
        for (_, handle) in self.charts.drain() {
            self.surface.destroy_chart(handle);
        }
    }
}

fn forecast_chart(forecast: &Forecast) -> ChartSpec {
    let mut spec = ChartSpec {
        kind: ChartKind::Line,
        title: forecast.model_label().to_string(),
        labels: Vec::new(),
        datasets: Vec::new(),
    };
    let Some(series) = forecast.series() else {
        return spec;
    };

    spec.labels = (1..=series.forecast_values.len())
        .map(|i| format!("T+{}", i))
        .collect();
    spec.datasets.push(Dataset {
        label: "Forecast".to_string(),
        values: series.forecast_values.clone(),
        colors: vec![RiskBucket::High.color().to_string()],
    });
    if forecast.has_bounds() {
        spec.datasets.push(Dataset {
            label: "Lower bound".to_string(),
            values: series.lower_bound.clone(),
            colors: Vec::new(),
        });
        spec.datasets.push(Dataset {
            label: "Upper bound".to_string(),
            values: series.upper_bound.clone(),
            colors: Vec::new(),
        });
    }
    spec
}

fn watchlist_rows(snapshot: &Snapshot) -> Vec<TableRow> {
    snapshot
        .watchlist
        .entries
        .iter()
        .map(|(id, entry)| TableRow {
            key: id.clone(),
            cells: vec![
                id.clone(),
                entry.action.clone().unwrap_or_else(|| "BLOCK".to_string()),
                entry.reason.clone().unwrap_or_default(),
                fmt_opt(entry.ml_confidence),
                entry.persistence.clone().unwrap_or_default(),
                entry.timestamp.clone().unwrap_or_default(),
            ],
            tone: Some(RiskBucket::Critical.color()),
        })
        .collect()
}
