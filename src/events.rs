//! Typed dashboard events and the injectable bus that carries them.
//!
//! Widgets and the embedding UI subscribe explicitly; nothing is broadcast
//! through ambient globals. Publishing is synchronous: every listener has
//! run by the time `publish` returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ErrorPayload;
use crate::health::HealthStatus;
use crate::scope::Scope;

pub type SubscriptionId = u64;

type Listener = Arc<dyn Fn(&DashboardEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
    Validation,
}

/// A transient toast. `undo_entity` carries the entity the undo
/// affordance is bound to, if any.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub level: NotificationLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo_entity: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            id: format!("toast-{}", Uuid::new_v4()),
            level,
            message: message.into(),
            undo_entity: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_undo(mut self, entity_id: &str) -> Self {
        self.undo_entity = Some(entity_id.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DashboardEvent {
    ScopeChanged { scope: Scope },
    SnapshotReplaced { sequence: u64 },
    LoadFailed { error: ErrorPayload },
    WatchlistRefreshed { entries: usize },
    DialogClosed,
    Notify { notification: Notification },
    HealthUpdated { status: HealthStatus },
}

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DashboardEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns false when the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn publish(&self, event: DashboardEvent) {
        // Listeners run outside the lock so they may subscribe or publish.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn notify(&self, notification: Notification) {
        self.publish(DashboardEvent::Notify { notification });
    }
}
