//! Route event sources.
//!
//! Each source owns one way of noticing that the URL may have changed and
//! forwards it to the monitor through a [`SignalSink`]. Sources have an explicit
//! install/uninstall lifecycle; an uninstalled source forwards nothing.

use super::SignalSink;
use crate::host::HistoryBackend;
use crate::model::{NavigationTrigger, RouteTransition};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Default backstop poll period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default delay between a captured click and the route check.
pub const DEFAULT_CLICK_DELAY: Duration = Duration::from_millis(100);

/// Shortest poll period accepted; interval timers reject a zero period.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

const MARKER_CAPACITY: usize = 16;

/// A lifecycle-managed producer of route-check signals.
pub trait RouteEventSource {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Start forwarding signals to `sink`.
    fn install(&mut self, sink: SignalSink);

    /// Stop forwarding and release timers. Idempotent.
    fn uninstall(&mut self);
}

/// Published after an intercepted history mutation, for listeners other than
/// the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryMarker {
    /// `pushState` was called with this URL.
    PushState {
        /// Target URL.
        url: String,
    },
    /// `replaceState` was called with this URL.
    ReplaceState {
        /// Target URL.
        url: String,
    },
}

/// Wraps the page's history entry points: calls through, publishes a
/// [`HistoryMarker`], then checks for a route change.
///
/// Clones share state, so the host keeps one clone to route its history calls
/// through while the monitor owns another.
#[derive(Clone)]
pub struct HistoryInterceptor {
    backend: Rc<dyn HistoryBackend>,
    markers: broadcast::Sender<HistoryMarker>,
    sink: Rc<RefCell<Option<SignalSink>>>,
}

impl std::fmt::Debug for HistoryInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryInterceptor")
            .field("installed", &self.is_installed())
            .finish_non_exhaustive()
    }
}

impl HistoryInterceptor {
    /// Interceptor forwarding to `backend`.
    pub fn new(backend: Rc<dyn HistoryBackend>) -> Self {
        let (markers, _) = broadcast::channel(MARKER_CAPACITY);
        Self {
            backend,
            markers,
            sink: Rc::new(RefCell::new(None)),
        }
    }

    /// Receive markers for history calls made after this point.
    pub fn subscribe_markers(&self) -> broadcast::Receiver<HistoryMarker> {
        self.markers.subscribe()
    }

    /// Whether the interceptor is currently wired to a monitor.
    pub fn is_installed(&self) -> bool {
        self.sink.borrow().is_some()
    }

    /// Intercepted `history.pushState`.
    pub fn push_state(&self, url: &str) -> Option<RouteTransition> {
        self.backend.push_state(url);
        self.after_mutation(
            HistoryMarker::PushState {
                url: url.to_string(),
            },
            NavigationTrigger::PushState,
        )
    }

    /// Intercepted `history.replaceState`.
    pub fn replace_state(&self, url: &str) -> Option<RouteTransition> {
        self.backend.replace_state(url);
        self.after_mutation(
            HistoryMarker::ReplaceState {
                url: url.to_string(),
            },
            NavigationTrigger::ReplaceState,
        )
    }

    fn after_mutation(
        &self,
        marker: HistoryMarker,
        trigger: NavigationTrigger,
    ) -> Option<RouteTransition> {
        let sink = self.sink.borrow().clone()?;
        // no receivers is fine
        let _ = self.markers.send(marker);
        sink.signal(trigger)
    }
}

impl RouteEventSource for HistoryInterceptor {
    fn name(&self) -> &'static str {
        "history"
    }

    fn install(&mut self, sink: SignalSink) {
        *self.sink.borrow_mut() = Some(sink);
    }

    fn uninstall(&mut self) {
        self.sink.borrow_mut().take();
    }
}

struct DomState {
    sink: Option<SignalSink>,
    pending_clicks: Vec<JoinHandle<()>>,
}

/// Document-level events: `popstate`, `hashchange`, and captured clicks.
///
/// Clicks are checked after a short delay so client-side routers get a chance
/// to update the URL first. Clones share state.
#[derive(Clone)]
pub struct DomEventSource {
    click_delay: Duration,
    state: Rc<RefCell<DomState>>,
}

impl std::fmt::Debug for DomEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomEventSource")
            .field("click_delay", &self.click_delay)
            .finish_non_exhaustive()
    }
}

impl Default for DomEventSource {
    fn default() -> Self {
        Self::new(DEFAULT_CLICK_DELAY)
    }
}

impl DomEventSource {
    /// Source checking `click_delay` after each click.
    pub fn new(click_delay: Duration) -> Self {
        Self {
            click_delay,
            state: Rc::new(RefCell::new(DomState {
                sink: None,
                pending_clicks: Vec::new(),
            })),
        }
    }

    /// A `popstate` event fired.
    pub fn pop_state(&self) -> Option<RouteTransition> {
        self.signal_now(NavigationTrigger::PopState)
    }

    /// A `hashchange` event fired.
    pub fn hash_change(&self) -> Option<RouteTransition> {
        self.signal_now(NavigationTrigger::HashChange)
    }

    /// A click was captured at the document root. Schedules a delayed check.
    ///
    /// Must run inside a `LocalSet`.
    pub fn click(&self) {
        let mut state = self.state.borrow_mut();
        let Some(sink) = state.sink.clone() else {
            return;
        };
        let delay = self.click_delay;
        state.pending_clicks.retain(|handle| !handle.is_finished());
        state.pending_clicks.push(tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            sink.signal(NavigationTrigger::Click);
        }));
    }

    /// Delayed click checks not yet run.
    pub fn pending_clicks(&self) -> usize {
        self.state
            .borrow()
            .pending_clicks
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn signal_now(&self, trigger: NavigationTrigger) -> Option<RouteTransition> {
        let sink = self.state.borrow().sink.clone()?;
        sink.signal(trigger)
    }
}

impl RouteEventSource for DomEventSource {
    fn name(&self) -> &'static str {
        "dom"
    }

    fn install(&mut self, sink: SignalSink) {
        self.state.borrow_mut().sink = Some(sink);
    }

    fn uninstall(&mut self) {
        let mut state = self.state.borrow_mut();
        state.sink = None;
        for handle in state.pending_clicks.drain(..) {
            handle.abort();
        }
    }
}

/// Backstop timer catching URL changes that fire no event at all.
#[derive(Debug)]
pub struct PollSource {
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl Default for PollSource {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollSource {
    /// Poll every `period`, floored at [`MIN_POLL_INTERVAL`].
    pub fn new(period: Duration) -> Self {
        if period < MIN_POLL_INTERVAL {
            tracing::warn!(
                period_ms = period.as_millis() as u64,
                "Poll period too short, using minimum"
            );
        }
        Self {
            period: period.max(MIN_POLL_INTERVAL),
            task: None,
        }
    }

    /// Effective poll period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the poll task is running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl RouteEventSource for PollSource {
    fn name(&self) -> &'static str {
        "poll"
    }

    /// Spawns the poll task; must run inside a `LocalSet`.
    fn install(&mut self, sink: SignalSink) {
        self.uninstall();
        let period = self.period;
        self.task = Some(tokio::task::spawn_local(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !sink.is_connected() {
                    break;
                }
                sink.signal(NavigationTrigger::Poll);
            }
        }));
    }

    fn uninstall(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PollSource {
    fn drop(&mut self) {
        self.uninstall();
    }
}
