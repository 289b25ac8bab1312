//! View-model core for the ALRIS analytics dashboard.
//!
//! Fetches pre-computed analytics artifacts, merges them into one typed
//! `Snapshot`, dedups and ranks anomalies, buckets risk scores and drives
//! widget updates through an injectable `RenderSurface`.

pub mod actions;
pub mod anomalies;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod gateway;
pub mod health;
pub mod i18n;
pub mod investigation;
pub mod render;
pub mod risk;
pub mod scope;
pub mod snapshot;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use dashboard::Dashboard;
pub use error::DashboardError;

/// Initialise `env_logger` once. `RUST_LOG` overrides the default `info`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
