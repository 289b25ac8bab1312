//! alris-sync: headless load of the dashboard snapshot.
//!
//! Reads ~/.alris/config.json, performs the strict initial load and logs a
//! summary of what the dashboard would show.

use alris_lib::config::load_config;
use alris_lib::health::fetch_health;
use alris_lib::risk::{aggregate_by_region, aggregate_by_zone, state_risk_rows};
use alris_lib::Dashboard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    alris_lib::init_logging();

    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load ALRIS config: {e}"))?;
    let top = config.top_anomalies;
    let dashboard = Dashboard::from_config(config)?;

    let health = fetch_health(dashboard.gateway()).await;
    log::info!(
        "Backend: {} (engine {}, {} active blocks)",
        health.status,
        health.engine_health,
        health.active_blocks
    );

    let snapshot = dashboard
        .initial_load()
        .await
        .map_err(|e| anyhow::anyhow!("{e}. {}", e.recovery_suggestion()))?;

    let counts = snapshot.ranked.severity_counts();
    log::info!(
        "Anomalies: {} unique ({} duplicates dropped) | critical {} high {} medium {} low {}",
        snapshot.ranked.len(),
        snapshot.ranked.duplicates_dropped,
        counts.critical,
        counts.high,
        counts.medium,
        counts.low + counts.unknown
    );
    for record in snapshot.ranked.top(top) {
        log::info!(
            "  [{}] {} {} ({})",
            record.severity.as_str(),
            record.region_label().unwrap_or("-"),
            record.anomaly_type,
            record.date.as_deref().unwrap_or("-")
        );
    }

    for zone in aggregate_by_zone(&snapshot.ranked.records).values() {
        log::info!(
            "Zone {}: score {} over {} anomalies -> {}",
            zone.zone.label(),
            zone.weighted_score,
            zone.anomaly_count,
            zone.bucket().label()
        );
    }
    if let Some((region, weight)) = aggregate_by_region(&snapshot.ranked.records)
        .into_iter()
        .max_by_key(|(_, weight)| *weight)
    {
        log::info!("Heaviest region: {} (weighted severity {})", region, weight);
    }
    match state_risk_rows(&snapshot.social_risk).first() {
        Some(worst) => log::info!(
            "Highest state risk: {} ({:.1}, {})",
            worst.state,
            worst.score,
            worst.bucket.label()
        ),
        None => log::info!("Highest state risk: no social-risk data"),
    }
    log::info!(
        "Forecast: {} | {} recommendations | {} watchlisted entities",
        snapshot.forecast.model_label(),
        snapshot.recommendations.len(),
        snapshot.watchlist.len()
    );

    match dashboard.preferences() {
        Ok(prefs) => {
            let translations = dashboard.translations(&prefs).await;
            log::info!(
                "Locale: {} ({})",
                translations.locale().code(),
                translations.t("dashboard.title")
            );
        }
        Err(e) => log::warn!("Locale preference unavailable: {}", e),
    }

    Ok(())
}
