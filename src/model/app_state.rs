//! Process-wide application state owned by the page orchestrator.

use crate::model::PageKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Component names reported in [`ApplicationState::module_readiness`].
pub const MODULES: [&str; 6] = [
    "route_classifier",
    "remote_cache",
    "data_gateway",
    "support_index",
    "navigation_monitor",
    "overlay_renderer",
];

/// Last failure surfaced by a page handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// Page kind whose handler failed.
    pub page_kind: PageKind,
    /// Human-readable failure message.
    pub message: String,
    /// Wall-clock time of the failure.
    pub at: DateTime<Utc>,
}

/// Application state. Mutated only by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationState {
    /// Set once `initialize` completes, cleared by `destroy`.
    pub initialized: bool,
    /// Page kind of the most recent qualifying transition.
    pub current_page_kind: PageKind,
    /// Most recent handler failure, if any.
    pub last_error: Option<ErrorRecord>,
    /// Readiness flag per component.
    pub module_readiness: BTreeMap<String, bool>,
    /// Wall-clock time of the last successful data render.
    pub last_rendered_at: Option<DateTime<Utc>>,
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self {
            initialized: false,
            current_page_kind: PageKind::Unknown,
            last_error: None,
            module_readiness: MODULES
                .iter()
                .map(|name| ((*name).to_string(), false))
                .collect(),
            last_rendered_at: None,
        }
    }
}

impl ApplicationState {
    /// Mark one component ready (or not).
    pub fn set_ready(&mut self, module: &str, ready: bool) {
        self.module_readiness.insert(module.to_string(), ready);
    }

    /// Mark every known component ready or not.
    pub fn set_all_ready(&mut self, ready: bool) {
        for flag in self.module_readiness.values_mut() {
            *flag = ready;
        }
    }

    /// Record a handler failure.
    pub fn record_error(&mut self, page_kind: PageKind, message: impl Into<String>) {
        self.last_error = Some(ErrorRecord {
            page_kind,
            message: message.into(),
            at: Utc::now(),
        });
    }

    /// True when every known component reports ready.
    pub fn all_ready(&self) -> bool {
        self.module_readiness.values().all(|ready| *ready)
    }
}
