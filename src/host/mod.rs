//! Capability interfaces for everything outside the engine.
//!
//! The engine never touches a browser directly. The embedding host hands it
//! implementations of these traits: the current location and page globals,
//! the history API it intercepts, the overlay renderer, the model-card
//! discovery that scrapes third-party markup, and a small persisted
//! key-value store.

pub mod store;

pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

use crate::model::BalanceSummary;
use serde::Serialize;

/// Read-only view of the host page.
pub trait HostPage {
    /// Full current URL (`location.href`).
    fn href(&self) -> String;

    /// Subject id exposed by the page as a global, if any.
    fn subject_global(&self) -> Option<String>;

    /// Text of the page's inline `<script>` elements.
    fn inline_scripts(&self) -> Vec<String>;
}

/// The page's original history-mutation entry points.
///
/// The history interceptor always calls through to these before checking for
/// a route change.
pub trait HistoryBackend {
    /// Original `history.pushState`.
    fn push_state(&self, url: &str);

    /// Original `history.replaceState`.
    fn replace_state(&self, url: &str);
}

/// Opaque reference to one model card in the host markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CardHandle(u64);

impl CardHandle {
    /// Wrap a host-assigned card id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The host-assigned id.
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Discovers model cards on the catalog page.
pub trait ModelCardSource {
    /// Cards currently visible, in document order.
    fn list_visible_model_cards(&self) -> Vec<CardHandle>;

    /// Model identifier shown on `card`, if one can be read.
    fn card_display_name(&self, card: &CardHandle) -> Option<String>;
}

/// One badge to draw: a card whose model is covered by voucher packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeTarget {
    /// Card to decorate.
    pub card: CardHandle,
    /// Model name read from the card.
    pub model_name: String,
    /// Covering package ids in index order.
    pub package_ids: Vec<i64>,
}

/// Result of one render attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderOutcome {
    /// The overlay was drawn.
    Rendered,
    /// No anchor was found in the markup; the attempt may be retried on the
    /// next DOM mutation.
    Skipped,
}

/// Draws and removes overlays. Failures degrade to [`RenderOutcome::Skipped`].
pub trait OverlayRenderer {
    /// Draw (or redraw) the balance panel on the expense bill page.
    fn render_balance_panel(&self, summary: &BalanceSummary) -> RenderOutcome;

    /// Draw badges on matching model cards, replacing earlier badges.
    fn render_badges(&self, targets: &[BadgeTarget]) -> RenderOutcome;

    /// Remove the balance panel. Safe when nothing is drawn.
    fn clear_panel(&self);

    /// Remove every badge. Safe when nothing is drawn.
    fn clear_badges(&self);
}
