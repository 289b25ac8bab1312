//! Admin actions: block, undo, audit export.
//!
//! Each mutation validates locally, posts once, and on success refreshes
//! only the watchlist slice of the current snapshot. Failures surface as an
//! error notification and leave state untouched. Nothing is retried.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::error::DashboardError;
use crate::events::{DashboardEvent, EventBus, Notification, NotificationLevel};
use crate::gateway::{FetchGateway, Resource};
use crate::snapshot::SnapshotStore;
use crate::types::Watchlist;

pub const BLOCK_ENDPOINT: &str = "/api/admin/block";
pub const UNDO_ENDPOINT: &str = "/api/admin/undo";
pub const AUDIT_ENDPOINT: &str = "/api/admin/download-audit";

const DEFAULT_ML_CONFIDENCE: f64 = 85.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Persistence {
    #[default]
    Temporary,
    Permanent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRequest {
    pub entity_id: String,
    pub reason: String,
    pub ml_confidence: Option<f64>,
    pub persistence: Persistence,
}

impl BlockRequest {
    pub fn new(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            reason: reason.into(),
            ml_confidence: None,
            persistence: Persistence::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.ml_confidence = Some(confidence);
        self
    }

    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = persistence;
        self
    }

    fn validate(&self) -> Result<(), DashboardError> {
        if self.entity_id.trim().is_empty() {
            return Err(DashboardError::Validation("entity id is required".to_string()));
        }
        if self.reason.trim().is_empty() {
            return Err(DashboardError::Validation(
                "a reason is required to block an entity".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct ActionExecutor {
    gateway: Arc<FetchGateway>,
    store: Arc<SnapshotStore>,
    bus: Arc<EventBus>,
}

impl ActionExecutor {
    pub fn new(gateway: Arc<FetchGateway>, store: Arc<SnapshotStore>, bus: Arc<EventBus>) -> Self {
        Self {
            gateway,
            store,
            bus,
        }
    }

    pub async fn block(&self, request: BlockRequest) -> Result<Watchlist, DashboardError> {
        if let Err(e) = request.validate() {
            self.bus
                .notify(Notification::new(NotificationLevel::Validation, e.to_string()));
            return Err(e);
        }

        let entity_id = request.entity_id.trim().to_string();
        let body = json!({
            "entity_id": entity_id,
            "reason": request.reason.trim(),
            "ml_confidence": request.ml_confidence.unwrap_or(DEFAULT_ML_CONFIDENCE),
            "persistence": request.persistence,
        });
        self.post(BLOCK_ENDPOINT, &body, "block", &entity_id).await?;

        log::info!("Actions: blocked {}", entity_id);
        self.bus.publish(DashboardEvent::DialogClosed);
        self.bus.notify(
            Notification::new(NotificationLevel::Success, format!("{} blocked", entity_id))
                .with_undo(&entity_id),
        );
        Ok(self.refresh_watchlist().await)
    }

    pub async fn undo(&self, entity_id: &str) -> Result<Watchlist, DashboardError> {
        let entity_id = entity_id.trim();
        if entity_id.is_empty() {
            let e = DashboardError::Validation("entity id is required".to_string());
            self.bus
                .notify(Notification::new(NotificationLevel::Validation, e.to_string()));
            return Err(e);
        }

        self.post(UNDO_ENDPOINT, &json!({ "entity_id": entity_id }), "undo", entity_id)
            .await?;

        log::info!("Actions: reversed block on {}", entity_id);
        self.bus.notify(Notification::new(
            NotificationLevel::Success,
            format!("Action for {} reversed", entity_id),
        ));
        Ok(self.refresh_watchlist().await)
    }

    /// Raw CSV bytes of the audit trail.
    pub async fn download_audit_trail(&self) -> Result<Vec<u8>, DashboardError> {
        let url = self.gateway.endpoint(AUDIT_ENDPOINT);
        let result = match self.gateway.transport().get(&url).await {
            Ok(resp) => resp.error_for_status().map(|r| r.body),
            Err(e) => Err(e),
        };
        match result {
            Ok(bytes) => {
                log::info!("Actions: downloaded audit trail ({} bytes)", bytes.len());
                Ok(bytes)
            }
            Err(e) => {
                self.notify_failure("Audit export", &e);
                Err(e)
            }
        }
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
        action: &str,
        entity_id: &str,
    ) -> Result<(), DashboardError> {
        let url = self.gateway.endpoint(path);
        let result = match self.gateway.transport().post_json(&url, body).await {
            Ok(resp) => resp.error_for_status().map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            log::warn!("Actions: {} {} failed: {}", action, entity_id, e);
            self.notify_failure(&format!("Could not {} {}", action, entity_id), e);
        }
        result
    }

    fn notify_failure(&self, what: &str, err: &DashboardError) {
        self.bus.notify(Notification::new(
            NotificationLevel::Error,
            format!("{}: {}", what, err),
        ));
    }

    /// Re-fetch the watchlist and swap it into the current snapshot. The
    /// rest of the snapshot is left as is. When the watchlist cannot be
    /// fetched the cached copy stays in place and is returned.
    async fn refresh_watchlist(&self) -> Watchlist {
        match self.gateway.fetch_resource_strict(Resource::Watchlist).await {
            Ok(value) => {
                let watchlist = Watchlist::from_value(&value);
                self.store.replace_watchlist(watchlist.clone());
                self.bus.publish(DashboardEvent::WatchlistRefreshed {
                    entries: watchlist.len(),
                });
                watchlist
            }
            Err(e) => {
                log::warn!("Actions: watchlist refresh failed, keeping cached copy: {}", e);
                self.notify_failure("Could not refresh watchlist", &e);
                self.store.current().watchlist.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use crate::test_support::{primary_url, FakeTransport, FALLBACK, PRIMARY};
    use parking_lot::Mutex;

    struct Harness {
        fake: Arc<FakeTransport>,
        store: Arc<SnapshotStore>,
        events: Arc<Mutex<Vec<DashboardEvent>>>,
        executor: ActionExecutor,
    }

    fn harness() -> Harness {
        let fake = Arc::new(FakeTransport::new());
        let gateway = Arc::new(FetchGateway::new(fake.clone(), PRIMARY, FALLBACK));
        let store = Arc::new(SnapshotStore::new());
        store.commit(Snapshot {
            sequence: store.begin_reload().sequence(),
            state_data: vec![json!({ "state": "Goa" })],
            ..Snapshot::default()
        });

        let bus = Arc::new(EventBus::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(move |e| sink.lock().push(e.clone()));

        let executor = ActionExecutor::new(gateway, store.clone(), bus);
        Harness {
            fake,
            store,
            events,
            executor,
        }
    }

    fn block_url() -> String {
        format!("{}{}", PRIMARY, BLOCK_ENDPOINT)
    }

    #[tokio::test]
    async fn test_empty_reason_rejected_without_network() {
        let h = harness();

        let err = h.executor.block(BlockRequest::new("CTR-99", "")).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(h.fake.calls().len(), 0);
        let events = h.events.lock();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            DashboardEvent::Notify { notification } if notification.level == NotificationLevel::Validation
        ));
    }

    #[tokio::test]
    async fn test_whitespace_reason_rejected() {
        let h = harness();
        assert!(h.executor.block(BlockRequest::new("CTR-99", "   ")).await.is_err());
        assert_eq!(h.fake.post_count(), 0);
    }

    #[tokio::test]
    async fn test_block_posts_and_refreshes_watchlist_only() {
        let h = harness();
        h.fake.respond_json(&block_url(), json!({ "status": "Success" }));
        h.fake.respond_json(
            &primary_url(Resource::Watchlist),
            json!({ "CTR-99": { "action": "BLOCK", "reason": "Bot traffic", "ml_confidence": 91.0 } }),
        );

        let watchlist = h
            .executor
            .block(
                BlockRequest::new("CTR-99", "Bot traffic")
                    .with_confidence(91.0)
                    .with_persistence(Persistence::Permanent),
            )
            .await
            .unwrap();

        assert!(watchlist.contains("CTR-99"));
        let calls = h.fake.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, "POST");
        let body = calls[0].body.clone().unwrap();
        assert_eq!(body["entity_id"], "CTR-99");
        assert_eq!(body["ml_confidence"], 91.0);
        assert_eq!(body["persistence"], "Permanent");
        assert_eq!(calls[1].url, primary_url(Resource::Watchlist));

        let snap = h.store.current();
        assert!(snap.watchlist.contains("CTR-99"));
        assert_eq!(snap.state_data.len(), 1);

        let events = h.events.lock();
        assert!(matches!(events[0], DashboardEvent::DialogClosed));
        match &events[1] {
            DashboardEvent::Notify { notification } => {
                assert_eq!(notification.level, NotificationLevel::Success);
                assert_eq!(notification.undo_entity.as_deref(), Some("CTR-99"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(events[2], DashboardEvent::WatchlistRefreshed { entries: 1 }));
    }

    #[tokio::test]
    async fn test_failed_block_leaves_state_untouched() {
        let h = harness();
        h.fake.respond_status(&block_url(), 500);
        let before = h.store.current();

        let err = h.executor.block(BlockRequest::new("CTR-99", "Bot traffic")).await.unwrap_err();

        assert!(matches!(err, DashboardError::Server { status: 500, .. }));
        // one POST, no retry, no watchlist refetch
        assert_eq!(h.fake.calls().len(), 1);
        assert!(Arc::ptr_eq(&before, &h.store.current()));
        let events = h.events.lock();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            DashboardEvent::Notify { notification } if notification.level == NotificationLevel::Error
        ));
    }

    #[tokio::test]
    async fn test_undo_posts_entity_and_refreshes() {
        let h = harness();
        h.fake.respond_json(&format!("{}{}", PRIMARY, UNDO_ENDPOINT), json!({ "status": "Success" }));
        h.fake.respond_json(&primary_url(Resource::Watchlist), json!({}));

        let watchlist = h.executor.undo("CTR-99").await.unwrap();

        assert!(watchlist.is_empty());
        assert_eq!(h.fake.calls()[0].body, Some(json!({ "entity_id": "CTR-99" })));
        assert!(h
            .events
            .lock()
            .iter()
            .any(|e| matches!(e, DashboardEvent::WatchlistRefreshed { entries: 0 })));
    }

    #[tokio::test]
    async fn test_unreachable_watchlist_keeps_cached_entries() {
        let h = harness();
        h.store.replace_watchlist(Watchlist::from_value(&json!({
            "CTR-1": { "action": "BLOCK", "reason": "Bot traffic" },
            "CTR-2": { "action": "BLOCK", "reason": "Replay" }
        })));
        h.fake.respond_json(&block_url(), json!({ "status": "Success" }));

        let watchlist = h.executor.block(BlockRequest::new("CTR-99", "Bot traffic")).await.unwrap();

        assert_eq!(watchlist.len(), 2);
        assert_eq!(h.store.current().watchlist.len(), 2);
        // primary and static fallback both tried
        assert_eq!(h.fake.get_count(), 2);
        let events = h.events.lock();
        assert!(!events
            .iter()
            .any(|e| matches!(e, DashboardEvent::WatchlistRefreshed { .. })));
        assert!(matches!(
            events.last(),
            Some(DashboardEvent::Notify { notification }) if notification.level == NotificationLevel::Error
        ));
    }

    #[tokio::test]
    async fn test_download_audit_returns_csv() {
        let h = harness();
        h.fake.respond_raw(
            &format!("{}{}", PRIMARY, AUDIT_ENDPOINT),
            200,
            b"TIMESTAMP,ACTION,ENTITY\n2024-05-01,BLOCK,CTR-99\n",
        );

        let csv = h.executor.download_audit_trail().await.unwrap();
        assert!(String::from_utf8(csv).unwrap().contains("CTR-99"));
    }

    #[tokio::test]
    async fn test_download_audit_missing_notifies() {
        let h = harness();
        let err = h.executor.download_audit_trail().await.unwrap_err();
        assert!(matches!(err, DashboardError::Server { status: 404, .. }));
        assert_eq!(h.events.lock().len(), 1);
    }
}
