//! Filter scope and its controller.
//!
//! The controller is the only writer of the current `Scope`. Changes are
//! staged with `set_filter` and broadcast with `apply`; `reset` restores
//! defaults and broadcasts in one step.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::events::{DashboardEvent, EventBus};

/// One filter value: everything, or a single concrete value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Only(String),
}

impl Filter {
    /// `"all"` (any case) and blank input select everything.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Filter::All
        } else {
            Filter::Only(trimmed.to_string())
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }

    /// Case-insensitive equality of two selections.
    pub fn same_selection(&self, other: &Filter) -> bool {
        match (self, other) {
            (Filter::All, Filter::All) => true,
            (Filter::Only(a), Filter::Only(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    /// Case-insensitive match; `All` matches every value.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(v) => v.eq_ignore_ascii_case(value.trim()),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str("all"),
            Filter::Only(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeField {
    State,
    Period,
    AgeGroup,
    UpdateType,
    District,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub state: Filter,
    pub period: Filter,
    pub age_group: Filter,
    pub update_type: Filter,
    /// Only meaningful once a state is selected.
    pub district: Option<String>,
}

impl Scope {
    pub fn is_default(&self) -> bool {
        *self == Scope::default()
    }

    /// Whether a record for `state` is in scope. Records with no state are
    /// shown only when no state filter is active.
    pub fn matches_state(&self, state: Option<&str>) -> bool {
        match state {
            Some(s) => self.state.matches(s),
            None => self.state.is_all(),
        }
    }
}

pub struct ScopeController {
    scope: RwLock<Scope>,
    bus: Arc<EventBus>,
}

impl ScopeController {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            scope: RwLock::new(Scope::default()),
            bus,
        }
    }

    pub fn current(&self) -> Scope {
        self.scope.read().clone()
    }

    /// Stage a change without broadcasting.
    pub fn set_filter(&self, field: ScopeField, raw: &str) {
        let mut scope = self.scope.write();
        match field {
            ScopeField::State => {
                let next = Filter::parse(raw);
                if !next.same_selection(&scope.state) {
                    // district belongs to the previous state
                    scope.district = None;
                }
                scope.state = next;
            }
            ScopeField::Period => scope.period = Filter::parse(raw),
            ScopeField::AgeGroup => scope.age_group = Filter::parse(raw),
            ScopeField::UpdateType => scope.update_type = Filter::parse(raw),
            ScopeField::District => {
                scope.district = match Filter::parse(raw) {
                    Filter::All => None,
                    Filter::Only(d) => Some(d),
                }
            }
        }
    }

    /// Broadcast the current scope to every listener, once each.
    pub fn apply(&self) -> Scope {
        let scope = self.current();
        log::debug!("Scope: applying state={} period={}", scope.state, scope.period);
        self.bus.publish(DashboardEvent::ScopeChanged {
            scope: scope.clone(),
        });
        scope
    }

    pub fn reset(&self) -> Scope {
        *self.scope.write() = Scope::default();
        self.apply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(bus: &EventBus) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        bus.subscribe(move |event| {
            if matches!(event, DashboardEvent::ScopeChanged { .. }) {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });
        hits
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(Filter::parse("ALL"), Filter::All);
        assert_eq!(Filter::parse("  "), Filter::All);
        assert_eq!(Filter::parse(" Kerala "), Filter::Only("Kerala".into()));
        assert!(Filter::parse("Kerala").matches("kerala"));
        assert!(!Filter::parse("Kerala").matches("Goa"));
    }

    #[test]
    fn test_set_filter_does_not_publish() {
        let bus = Arc::new(EventBus::new());
        let hits = counting_listener(&bus);
        let ctl = ScopeController::new(bus.clone());

        ctl.set_filter(ScopeField::State, "Bihar");
        ctl.set_filter(ScopeField::Period, "2024-Q1");

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(ctl.current().state, Filter::Only("Bihar".into()));
    }

    #[test]
    fn test_reset_restores_default_and_publishes_once_per_listener() {
        let bus = Arc::new(EventBus::new());
        let first = counting_listener(&bus);
        let second = counting_listener(&bus);
        let ctl = ScopeController::new(bus.clone());
        ctl.set_filter(ScopeField::State, "Kerala");
        ctl.set_filter(ScopeField::AgeGroup, "18+");

        let scope = ctl.reset();

        assert_eq!(scope.state, Filter::All);
        assert!(ctl.current().is_default());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_apply_carries_scope_in_event() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let s = seen.clone();
        bus.subscribe(move |event| {
            if let DashboardEvent::ScopeChanged { scope } = event {
                *s.lock() = Some(scope.clone());
            }
        });
        let ctl = ScopeController::new(bus);
        ctl.set_filter(ScopeField::UpdateType, "biometric");
        ctl.apply();

        let scope = seen.lock().clone().unwrap();
        assert_eq!(scope.update_type, Filter::Only("biometric".into()));
    }

    #[test]
    fn test_changing_state_clears_district() {
        let ctl = ScopeController::new(Arc::new(EventBus::new()));
        ctl.set_filter(ScopeField::State, "Bihar");
        ctl.set_filter(ScopeField::District, "Patna");
        assert_eq!(ctl.current().district.as_deref(), Some("Patna"));

        // same state in another case keeps the district
        ctl.set_filter(ScopeField::State, "bihar ");
        assert_eq!(ctl.current().district.as_deref(), Some("Patna"));

        ctl.set_filter(ScopeField::State, "Goa");
        assert_eq!(ctl.current().district, None);

        ctl.set_filter(ScopeField::District, "North Goa");
        ctl.set_filter(ScopeField::State, "all");
        assert_eq!(ctl.current().district, None);
    }

    #[test]
    fn test_matches_state() {
        let mut scope = Scope::default();
        assert!(scope.matches_state(None));
        assert!(scope.matches_state(Some("Goa")));
        scope.state = Filter::Only("Goa".into());
        assert!(scope.matches_state(Some("GOA")));
        assert!(!scope.matches_state(Some("Bihar")));
        assert!(!scope.matches_state(None));
    }
}
