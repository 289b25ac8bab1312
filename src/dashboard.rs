//! Explicit dashboard context.
//!
//! Owns the gateway, snapshot store, scope controller, event bus and
//! action executor. Embedders hold one `Dashboard` and pass it where
//! needed; there is no process-wide state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::actions::ActionExecutor;
use crate::config::DashboardConfig;
use crate::error::{DashboardError, ErrorPayload};
use crate::events::{DashboardEvent, EventBus};
use crate::gateway::{FetchGateway, HttpTransport, ResourceTransport};
use crate::health::run_health_poller;
use crate::i18n::{PreferenceStore, Translations};
use crate::investigation::{investigate, Investigation};
use crate::render::{RenderDispatcher, RenderReport, RenderSurface};
use crate::scope::ScopeController;
use crate::snapshot::{Aggregator, Snapshot, SnapshotStore};

pub struct Dashboard {
    config: DashboardConfig,
    gateway: Arc<FetchGateway>,
    aggregator: Aggregator,
    store: Arc<SnapshotStore>,
    scope: ScopeController,
    bus: Arc<EventBus>,
    actions: ActionExecutor,
}

impl Dashboard {
    pub fn new(config: DashboardConfig, transport: Arc<dyn ResourceTransport>) -> Self {
        let gateway = Arc::new(FetchGateway::from_config(&config, transport));
        let store = Arc::new(SnapshotStore::new());
        let bus = Arc::new(EventBus::new());
        Self {
            aggregator: Aggregator::new(Arc::clone(&gateway)),
            scope: ScopeController::new(Arc::clone(&bus)),
            actions: ActionExecutor::new(Arc::clone(&gateway), Arc::clone(&store), Arc::clone(&bus)),
            config,
            gateway,
            store,
            bus,
        }
    }

    /// Dashboard backed by the HTTP transport.
    pub fn from_config(config: DashboardConfig) -> Result<Self, DashboardError> {
        let transport = HttpTransport::new(
            config.api_key.as_deref(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<FetchGateway> {
        &self.gateway
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn scope(&self) -> &ScopeController {
        &self.scope
    }

    pub fn actions(&self) -> &ActionExecutor {
        &self.actions
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    /// First load. Any resource failing on both paths fails the whole load
    /// so the embedder can show a top-level error state.
    pub async fn initial_load(&self) -> Result<Arc<Snapshot>, DashboardError> {
        let ticket = self.store.begin_reload();
        let payloads = match self.aggregator.load_initial().await {
            Ok(p) => p,
            Err(e) => {
                log::error!("Dashboard: initial load failed: {}", e);
                self.bus.publish(DashboardEvent::LoadFailed {
                    error: ErrorPayload::from(&e),
                });
                return Err(e);
            }
        };
        self.install(Snapshot::from_payloads(ticket.sequence(), &payloads));
        Ok(self.store.current())
    }

    /// Full degrading reload. Returns false if a newer reload committed
    /// first and this result was discarded.
    pub async fn reload(&self) -> bool {
        let ticket = self.store.begin_reload();
        let payloads = self.aggregator.load_all().await;
        self.install(Snapshot::from_payloads(ticket.sequence(), &payloads))
    }

    fn install(&self, snapshot: Snapshot) -> bool {
        let sequence = snapshot.sequence;
        let anomalies = snapshot.ranked.len();
        if !self.store.commit(snapshot) {
            return false;
        }
        log::info!(
            "Dashboard: snapshot #{} installed ({} ranked anomalies)",
            sequence,
            anomalies
        );
        self.bus.publish(DashboardEvent::SnapshotReplaced { sequence });
        true
    }

    /// Draw the current snapshot under the current scope.
    pub fn render<S: RenderSurface>(&self, dispatcher: &mut RenderDispatcher<S>) -> RenderReport {
        dispatcher.render_all(&self.store.current(), &self.scope.current())
    }

    /// Locale preference at `~/.alris/preferences.json`, falling back to
    /// the configured default locale.
    pub fn preferences(&self) -> Result<PreferenceStore, DashboardError> {
        Ok(PreferenceStore::open_default()?.with_fallback(self.config.default_locale))
    }

    pub fn preferences_at(&self, path: PathBuf) -> PreferenceStore {
        PreferenceStore::new(path).with_fallback(self.config.default_locale)
    }

    /// Translation table for the preferred locale.
    pub async fn translations(&self, preferences: &PreferenceStore) -> Translations {
        Translations::fetch(&self.gateway, preferences.locale()).await
    }

    pub fn investigate(&self, query: &str) -> Result<Investigation, DashboardError> {
        investigate(&self.store.current().anomalies, query)
    }

    /// Start the health poller on the current runtime.
    pub fn spawn_health_poller(&self, shutdown: Arc<Notify>) -> JoinHandle<()> {
        tokio::spawn(run_health_poller(
            Arc::clone(&self.gateway),
            Arc::clone(&self.bus),
            Duration::from_secs(self.config.health_poll_interval_secs.max(1)),
            shutdown,
        ))
    }
}
