//! Page orchestrator: the state machine over [`PageKind`].
//!
//! Every route transition that changes the page kind (or the very first
//! observation) cleans up the previous page's overlay, records the new kind
//! and dispatches that kind's handler. Handlers suspend on network I/O, so a
//! newer transition can land while an older handler is still waiting; each
//! dispatch carries a [`DispatchTicket`] and its results are dropped when the
//! ticket is no longer current.
//!
//! Handlers run as `spawn_local` tasks; everything here must run inside a
//! `tokio::task::LocalSet`.

use crate::cache::CacheStats;
use crate::gateway::RemoteDataGateway;
use crate::host::store::MARKING_ENABLED_KEY;
use crate::host::{BadgeTarget, KeyValueStore, ModelCardSource, OverlayRenderer, RenderOutcome};
use crate::model::{
    ApplicationState, BalanceSummary, InitError, PageKind, RouteTransition, StoreError,
};
use crate::navigation::{MonitorState, NavigationMonitor, SubscriptionId};
use crate::support::{build_index_with, LanguagePrefs, SupportIndex};
use chrono::Utc;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Timing and language settings of the page handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Wait before the expense bill handler fetches, letting the host render.
    pub initial_settle: Duration,
    /// How long badge rendering waits for model cards to appear.
    pub card_wait_timeout: Duration,
    /// Languages used to read package descriptions.
    pub languages: LanguagePrefs,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            initial_settle: Duration::from_millis(1500),
            card_wait_timeout: Duration::from_secs(10),
            languages: LanguagePrefs::default(),
        }
    }
}

/// Host collaborators the handlers draw through.
#[derive(Clone)]
pub struct OverlayCollaborators {
    /// Draws the panel and badges.
    pub renderer: Rc<dyn OverlayRenderer>,
    /// Finds model cards on the catalog page.
    pub cards: Rc<dyn ModelCardSource>,
    /// Holds the marking toggle.
    pub store: Rc<dyn KeyValueStore>,
}

/// Identifies one handler dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTicket {
    kind: PageKind,
    epoch: u64,
}

impl DispatchTicket {
    /// Page kind the dispatch was issued for.
    pub fn kind(&self) -> PageKind {
        self.kind
    }

    /// Dispatch sequence number.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The overlay was drawn.
    Rendered,
    /// Data is ready but the renderer found no anchor (or no cards yet); the
    /// render is retried on DOM mutations.
    Pending,
    /// Support data was refreshed but model marking is switched off.
    MarkingDisabled,
    /// A newer transition superseded this dispatch; its results were dropped.
    Stale,
    /// The fetch failed; see the last error.
    Failed,
    /// Nothing to do for this page kind.
    Idle,
}

/// Serializable diagnostics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorStatus {
    /// Application state.
    pub app: ApplicationState,
    /// Navigation monitor state.
    pub monitor: MonitorState,
    /// Remote cache entries.
    pub cache: CacheStats,
    /// Persisted model-marking toggle.
    pub marking_enabled: bool,
    /// Models in the current support index, if one was built.
    pub support_index_models: Option<usize>,
    /// A panel render is waiting for its anchor.
    pub panel_pending: bool,
    /// A badge render is waiting for cards.
    pub badges_pending: bool,
    /// Outcome of the most recent finished dispatch.
    pub last_outcome: Option<DispatchOutcome>,
    /// Dispatches issued so far.
    pub epoch: u64,
}

#[derive(Default)]
struct OrchestratorState {
    app: ApplicationState,
    epoch: u64,
    subscription: Option<SubscriptionId>,
    index: Option<Rc<SupportIndex>>,
    pending_panel: Option<BalanceSummary>,
    badge_deadline: Option<Instant>,
    last_outcome: Option<DispatchOutcome>,
}

struct OrchestratorInner {
    monitor: NavigationMonitor,
    gateway: Rc<RemoteDataGateway>,
    overlay: OverlayCollaborators,
    settings: OrchestratorSettings,
    state: RefCell<OrchestratorState>,
    in_flight: RefCell<Vec<JoinHandle<()>>>,
}

/// Root component. Cheap to clone; clones share one state.
#[derive(Clone)]
pub struct PageOrchestrator {
    inner: Rc<OrchestratorInner>,
}

impl std::fmt::Debug for PageOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("PageOrchestrator")
            .field("initialized", &state.app.initialized)
            .field("current_page_kind", &state.app.current_page_kind)
            .field("epoch", &state.epoch)
            .finish_non_exhaustive()
    }
}

impl PageOrchestrator {
    /// Orchestrator over already-constructed components. Inert until
    /// [`PageOrchestrator::initialize`].
    pub fn new(
        monitor: NavigationMonitor,
        gateway: Rc<RemoteDataGateway>,
        overlay: OverlayCollaborators,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            inner: Rc::new(OrchestratorInner {
                monitor,
                gateway,
                overlay,
                settings,
                state: RefCell::new(OrchestratorState::default()),
                in_flight: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Start the engine: subscribe to navigation, start the monitor and
    /// dispatch the handler for the current page.
    ///
    /// Refuses to start off the target host. Calling it again while running
    /// is a no-op.
    pub fn initialize(&self) -> Result<(), InitError> {
        let url = self.inner.monitor.current_url();
        if !self.inner.monitor.classifier().is_target_host(&url) {
            tracing::warn!(url = %url, "Not on the target host, staying inert");
            return Err(InitError::ForeignHost { url });
        }
        if self.inner.state.borrow().app.initialized {
            tracing::debug!("Orchestrator already initialized");
            return Ok(());
        }

        let weak: Weak<OrchestratorInner> = Rc::downgrade(&self.inner);
        let subscription = self.inner.monitor.on_change(move |transition| {
            if let Some(inner) = weak.upgrade() {
                PageOrchestrator { inner }.on_transition(transition);
            }
            Ok(())
        });
        {
            let mut state = self.inner.state.borrow_mut();
            state.app.initialized = true;
            state.app.set_all_ready(true);
            state.subscription = Some(subscription);
        }

        let initial = self.inner.monitor.init().unwrap_or_else(|| {
            let kind = self.inner.monitor.classifier().classify(&url);
            RouteTransition::initial(url.clone(), kind)
        });
        tracing::info!(url = %initial.current_url(), kind = %initial.current_kind(), "Orchestrator initialized");
        self.on_transition(&initial);
        Ok(())
    }

    /// React to one route transition.
    fn on_transition(&self, transition: &RouteTransition) {
        let Some(ticket) = self.begin_transition(transition) else {
            return;
        };
        if ticket.kind == PageKind::Unknown {
            self.finish(ticket, DispatchOutcome::Idle);
            return;
        }
        let this = self.clone();
        let handle = tokio::task::spawn_local(async move {
            this.dispatch(ticket).await;
        });
        let mut in_flight = self.inner.in_flight.borrow_mut();
        in_flight.retain(|task| !task.is_finished());
        in_flight.push(handle);
    }

    /// Steps 1 and 2 of a transition: clean up the previous kind and make the
    /// new kind current. Returns the ticket for step 3, or `None` when the
    /// transition does not qualify.
    pub(crate) fn begin_transition(&self, transition: &RouteTransition) -> Option<DispatchTicket> {
        if !transition.is_initial() && !transition.kind_changed() {
            tracing::debug!(
                kind = %transition.current_kind(),
                "Same page kind, no dispatch"
            );
            return None;
        }

        let previous = self.inner.state.borrow().app.current_page_kind;
        self.cleanup(previous);

        let mut state = self.inner.state.borrow_mut();
        state.app.current_page_kind = transition.current_kind();
        state.epoch += 1;
        Some(DispatchTicket {
            kind: transition.current_kind(),
            epoch: state.epoch,
        })
    }

    /// Step 3: run the handler for the ticket's kind.
    pub(crate) async fn dispatch(&self, ticket: DispatchTicket) -> DispatchOutcome {
        let outcome = match ticket.kind {
            PageKind::ExpenseBill => self.handle_expense_bill(ticket).await,
            PageKind::ModelCatalog => self.handle_model_catalog(ticket).await,
            PageKind::Unknown => DispatchOutcome::Idle,
        };
        self.finish(ticket, outcome)
    }

    fn finish(&self, ticket: DispatchTicket, outcome: DispatchOutcome) -> DispatchOutcome {
        tracing::info!(kind = %ticket.kind, epoch = ticket.epoch, ?outcome, "Dispatch finished");
        if outcome != DispatchOutcome::Stale {
            self.inner.state.borrow_mut().last_outcome = Some(outcome);
        }
        outcome
    }

    fn is_stale(&self, ticket: DispatchTicket) -> bool {
        let state = self.inner.state.borrow();
        !state.app.initialized
            || state.app.current_page_kind != ticket.kind
            || state.epoch != ticket.epoch
    }

    async fn handle_expense_bill(&self, ticket: DispatchTicket) -> DispatchOutcome {
        if !self.inner.settings.initial_settle.is_zero() {
            tokio::time::sleep(self.inner.settings.initial_settle).await;
            if self.is_stale(ticket) {
                return DispatchOutcome::Stale;
            }
        }

        let result = self.inner.gateway.fetch_wallets(true).await;
        if self.is_stale(ticket) {
            tracing::debug!(epoch = ticket.epoch, "Dropping late wallets result");
            return DispatchOutcome::Stale;
        }

        match result {
            Ok(payload) => {
                let summary = BalanceSummary::from_wallets(&payload.wallets);
                tracing::info!(
                    vouchers = summary.voucher_count(),
                    total = %summary.format_amount(2),
                    "Balance summary computed"
                );
                self.render_panel(summary)
            }
            Err(error) => {
                tracing::error!(error = %error, "Wallets fetch failed");
                self.inner
                    .state
                    .borrow_mut()
                    .app
                    .record_error(ticket.kind, error.to_string());
                DispatchOutcome::Failed
            }
        }
    }

    async fn handle_model_catalog(&self, ticket: DispatchTicket) -> DispatchOutcome {
        let result = self.inner.gateway.fetch_packages(true).await;
        if self.is_stale(ticket) {
            tracing::debug!(epoch = ticket.epoch, "Dropping late packages result");
            return DispatchOutcome::Stale;
        }

        let payload = match result {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(error = %error, "Packages fetch failed");
                self.inner
                    .state
                    .borrow_mut()
                    .app
                    .record_error(ticket.kind, error.to_string());
                return DispatchOutcome::Failed;
            }
        };

        let index = Rc::new(build_index_with(
            &payload.packages,
            &self.inner.settings.languages,
        ));
        self.inner.state.borrow_mut().index = Some(Rc::clone(&index));

        if !self.is_marking_enabled() {
            tracing::debug!("Model marking disabled, badges not drawn");
            return DispatchOutcome::MarkingDisabled;
        }
        self.render_badges(&index)
    }

    fn render_panel(&self, summary: BalanceSummary) -> DispatchOutcome {
        let outcome = self.inner.overlay.renderer.render_balance_panel(&summary);
        let mut state = self.inner.state.borrow_mut();
        match outcome {
            RenderOutcome::Rendered => {
                state.pending_panel = None;
                state.app.last_rendered_at = Some(Utc::now());
                DispatchOutcome::Rendered
            }
            RenderOutcome::Skipped => {
                tracing::debug!("Panel anchor missing, render pending");
                state.pending_panel = Some(summary);
                DispatchOutcome::Pending
            }
        }
    }

    fn render_badges(&self, index: &SupportIndex) -> DispatchOutcome {
        let cards = self.inner.overlay.cards.list_visible_model_cards();
        if cards.is_empty() {
            self.arm_badge_deadline();
            tracing::debug!("No model cards yet, badges pending");
            return DispatchOutcome::Pending;
        }

        let targets: Vec<BadgeTarget> = cards
            .iter()
            .filter_map(|card| {
                let model_name = self.inner.overlay.cards.card_display_name(card)?;
                let package_ids = index.lookup(&model_name)?.to_vec();
                Some(BadgeTarget {
                    card: *card,
                    model_name,
                    package_ids,
                })
            })
            .collect();
        tracing::info!(cards = cards.len(), matched = targets.len(), "Marking model cards");

        match self.inner.overlay.renderer.render_badges(&targets) {
            RenderOutcome::Rendered => {
                let mut state = self.inner.state.borrow_mut();
                state.badge_deadline = None;
                state.app.last_rendered_at = Some(Utc::now());
                DispatchOutcome::Rendered
            }
            RenderOutcome::Skipped => {
                self.arm_badge_deadline();
                DispatchOutcome::Pending
            }
        }
    }

    fn arm_badge_deadline(&self) {
        let timeout = self.inner.settings.card_wait_timeout;
        self.inner
            .state
            .borrow_mut()
            .badge_deadline
            .get_or_insert_with(|| Instant::now() + timeout);
    }

    fn cleanup(&self, kind: PageKind) {
        match kind {
            PageKind::ExpenseBill => {
                self.inner.overlay.renderer.clear_panel();
                self.inner.state.borrow_mut().pending_panel = None;
            }
            PageKind::ModelCatalog => {
                self.inner.overlay.renderer.clear_badges();
                self.inner.state.borrow_mut().badge_deadline = None;
            }
            PageKind::Unknown => {}
        }
        tracing::debug!(kind = %kind, "Cleaned up page");
    }

    /// Retry renders left pending by a missing anchor or missing cards.
    ///
    /// The host calls this on DOM mutations. A pending badge render whose
    /// card wait window has elapsed is dropped instead. Returns the retry's
    /// outcome, or `None` when nothing was pending.
    pub fn notify_dom_mutation(&self) -> Option<DispatchOutcome> {
        let (kind, pending_panel, badge_deadline, index) = {
            let state = self.inner.state.borrow();
            if !state.app.initialized {
                return None;
            }
            (
                state.app.current_page_kind,
                state.pending_panel.clone(),
                state.badge_deadline,
                state.index.clone(),
            )
        };

        match kind {
            PageKind::ExpenseBill => pending_panel.map(|summary| self.render_panel(summary)),
            PageKind::ModelCatalog => {
                let deadline = badge_deadline?;
                if Instant::now() >= deadline {
                    tracing::debug!("Card wait window elapsed, giving up on badges");
                    self.inner.state.borrow_mut().badge_deadline = None;
                    return None;
                }
                if !self.is_marking_enabled() {
                    return None;
                }
                index.map(|index| self.render_badges(&index))
            }
            PageKind::Unknown => None,
        }
    }

    /// Whether model cards get badges. Defaults to on; an unreadable value
    /// counts as on.
    pub fn is_marking_enabled(&self) -> bool {
        self.inner
            .overlay
            .store
            .get(MARKING_ENABLED_KEY)
            .map(|value| value.trim() != "false")
            .unwrap_or(true)
    }

    /// Persist the marking toggle and apply it to the current page without
    /// re-fetching.
    pub fn set_marking_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.inner
            .overlay
            .store
            .set(MARKING_ENABLED_KEY, if enabled { "true" } else { "false" })?;
        tracing::info!(enabled, "Model marking toggled");

        let (kind, index) = {
            let state = self.inner.state.borrow();
            (state.app.current_page_kind, state.index.clone())
        };
        if kind != PageKind::ModelCatalog {
            return Ok(());
        }
        if enabled {
            if let Some(index) = index {
                self.render_badges(&index);
            }
        } else {
            self.inner.overlay.renderer.clear_badges();
            self.inner.state.borrow_mut().badge_deadline = None;
        }
        Ok(())
    }

    /// Flip the marking toggle; returns the new value.
    pub fn toggle_marking(&self) -> Result<bool, StoreError> {
        let enabled = !self.is_marking_enabled();
        self.set_marking_enabled(enabled)?;
        Ok(enabled)
    }

    /// Clear the whole cache and re-run the current kind's handler without
    /// re-classifying. Supersedes any dispatch still in flight.
    pub async fn force_refresh(&self) -> DispatchOutcome {
        let ticket = {
            let mut state = self.inner.state.borrow_mut();
            if !state.app.initialized {
                return DispatchOutcome::Idle;
            }
            state.epoch += 1;
            DispatchTicket {
                kind: state.app.current_page_kind,
                epoch: state.epoch,
            }
        };
        self.inner.gateway.clear_cache();
        tracing::info!(kind = %ticket.kind, "Forced refresh");
        self.dispatch(ticket).await
    }

    /// Await every spawned dispatch, including ones spawned while waiting.
    pub async fn wait_for_dispatches(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.in_flight.borrow_mut());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(error) = handle.await {
                    if !error.is_cancelled() {
                        tracing::error!(error = %error, "Dispatch task failed");
                    }
                }
            }
        }
    }

    /// Diagnostics snapshot.
    pub fn status(&self) -> OrchestratorStatus {
        let marking_enabled = self.is_marking_enabled();
        let state = self.inner.state.borrow();
        OrchestratorStatus {
            app: state.app.clone(),
            monitor: self.inner.monitor.state(),
            cache: self.inner.gateway.cache_stats(),
            marking_enabled,
            support_index_models: state.index.as_ref().map(|index| index.len()),
            panel_pending: state.pending_panel.is_some(),
            badges_pending: state.badge_deadline.is_some(),
            last_outcome: state.last_outcome,
            epoch: state.epoch,
        }
    }

    /// Current page kind.
    pub fn current_page_kind(&self) -> PageKind {
        self.inner.state.borrow().app.current_page_kind
    }

    /// Detach from navigation, abort in-flight dispatches, remove overlays,
    /// clear the cache and reset state. Idempotent; `initialize` may be called
    /// again afterwards.
    pub fn destroy(&self) {
        let (was_initialized, subscription, kind, epoch) = {
            let mut state = self.inner.state.borrow_mut();
            (
                state.app.initialized,
                state.subscription.take(),
                state.app.current_page_kind,
                state.epoch,
            )
        };
        if !was_initialized {
            return;
        }

        if let Some(id) = subscription {
            self.inner.monitor.off_change(id);
        }
        self.inner.monitor.destroy();
        for handle in self.inner.in_flight.borrow_mut().drain(..) {
            handle.abort();
        }
        self.cleanup(kind);
        self.inner.gateway.clear_cache();

        *self.inner.state.borrow_mut() = OrchestratorState {
            epoch: epoch + 1,
            ..OrchestratorState::default()
        };
        tracing::info!("Orchestrator destroyed");
    }
}
