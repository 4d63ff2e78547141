//! Route transition events emitted by the navigation monitor.

use crate::model::PageKind;
use serde::Serialize;
use tokio::time::Instant;

/// Browser-level signal that caused a URL check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationTrigger {
    /// Synthesised first observation at startup.
    Initial,
    /// Back/forward navigation.
    PopState,
    /// Fragment change.
    HashChange,
    /// Intercepted `history.pushState`.
    PushState,
    /// Intercepted `history.replaceState`.
    ReplaceState,
    /// Backstop poll timer.
    Poll,
    /// Delayed check after a captured click.
    Click,
}

/// A detected change from one URL (and page kind) to another.
///
/// Created once per detected change and never mutated afterwards.
/// Subscribers receive it by reference, synchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTransition {
    previous_url: String,
    current_url: String,
    previous_kind: PageKind,
    current_kind: PageKind,
    trigger: NavigationTrigger,
    observed_at: Instant,
}

impl RouteTransition {
    /// Build a transition observed now.
    pub fn new(
        previous_url: impl Into<String>,
        current_url: impl Into<String>,
        previous_kind: PageKind,
        current_kind: PageKind,
        trigger: NavigationTrigger,
    ) -> Self {
        Self {
            previous_url: previous_url.into(),
            current_url: current_url.into(),
            previous_kind,
            current_kind,
            trigger,
            observed_at: Instant::now(),
        }
    }

    /// The first observation of a page: empty previous URL, unknown previous kind.
    pub fn initial(current_url: impl Into<String>, current_kind: PageKind) -> Self {
        Self::new(
            String::new(),
            current_url,
            PageKind::Unknown,
            current_kind,
            NavigationTrigger::Initial,
        )
    }

    /// URL before the change (empty for the first observation).
    pub fn previous_url(&self) -> &str {
        &self.previous_url
    }

    /// URL after the change.
    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    /// Page kind before the change.
    pub fn previous_kind(&self) -> PageKind {
        self.previous_kind
    }

    /// Page kind after the change.
    pub fn current_kind(&self) -> PageKind {
        self.current_kind
    }

    /// Signal that observed the change first.
    pub fn trigger(&self) -> NavigationTrigger {
        self.trigger
    }

    /// Monotonic timestamp of the observation.
    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }

    /// True when there was no previously observed URL.
    pub fn is_initial(&self) -> bool {
        self.previous_url.is_empty()
    }

    /// True when the page kind differs across the change.
    pub fn kind_changed(&self) -> bool {
        self.previous_kind != self.current_kind
    }
}
