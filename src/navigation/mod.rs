//! Navigation monitor: deduplicated route transitions from unreliable signals.
//!
//! The host application routes client-side and announces nothing. Several
//! independent [`RouteEventSource`]s (history interception, popstate and
//! hashchange, delayed post-click checks, a backstop poll) all funnel into
//! [`NavigationMonitor::check`]. A check compares the page's current URL to
//! the last observed one; only the first trigger to see a difference emits a
//! [`RouteTransition`], later triggers for the same change find nothing new.
//! That comparison is the whole dedup mechanism.
//!
//! The monitor is a cheap `Rc` handle. Sources hold a [`SignalSink`] (a weak
//! reference) so dropping every handle tears the monitor down.

pub mod sources;

pub use sources::{
    DomEventSource, HistoryInterceptor, HistoryMarker, PollSource, RouteEventSource,
    MIN_POLL_INTERVAL,
};

use crate::host::HostPage;
use crate::model::{NavigationTrigger, PageKind, RouteTransition, SubscriberError};
use crate::route::RouteClassifier;
use serde::Serialize;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

#[cfg(test)]
#[path = "navigation_tests.rs"]
mod tests;

/// Callback invoked synchronously for every emitted transition.
pub type Subscriber = Rc<dyn Fn(&RouteTransition) -> Result<(), SubscriberError>>;

/// Handle returned by [`NavigationMonitor::on_change`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Diagnostic snapshot of the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorState {
    /// Whether sources are installed and checks are live.
    pub initialized: bool,
    /// Last observed URL.
    pub last_url: String,
    /// Kind of the last observed URL.
    pub last_kind: PageKind,
    /// Registered subscribers.
    pub subscriber_count: usize,
    /// Attached route event sources.
    pub source_count: usize,
    /// Transitions emitted since construction.
    pub emitted: u64,
}

struct MonitorCore {
    initialized: bool,
    last_url: String,
    last_kind: PageKind,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    emitted: u64,
}

struct MonitorInner {
    page: Rc<dyn HostPage>,
    classifier: RouteClassifier,
    core: RefCell<MonitorCore>,
    sources: RefCell<Vec<Box<dyn RouteEventSource>>>,
}

/// Weak entry point handed to route event sources.
#[derive(Clone)]
pub struct SignalSink {
    monitor: Weak<MonitorInner>,
}

impl std::fmt::Debug for SignalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSink")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl SignalSink {
    /// Ask the monitor to check for a route change.
    ///
    /// Returns the emitted transition, or `None` when nothing changed, the
    /// monitor is not initialised, or it no longer exists.
    pub fn signal(&self, trigger: NavigationTrigger) -> Option<RouteTransition> {
        let inner = self.monitor.upgrade()?;
        NavigationMonitor { inner }.check(trigger)
    }

    /// Whether the monitor behind this sink is still alive.
    pub fn is_connected(&self) -> bool {
        self.monitor.strong_count() > 0
    }
}

/// Observes route signals and emits deduplicated transitions.
#[derive(Clone)]
pub struct NavigationMonitor {
    inner: Rc<MonitorInner>,
}

impl std::fmt::Debug for NavigationMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationMonitor")
            .field("state", &self.state())
            .finish()
    }
}

impl NavigationMonitor {
    /// Monitor for `page`, classifying URLs with `classifier`. No sources are
    /// attached and nothing is observed until [`NavigationMonitor::init`].
    pub fn new(page: Rc<dyn HostPage>, classifier: RouteClassifier) -> Self {
        Self {
            inner: Rc::new(MonitorInner {
                page,
                classifier,
                core: RefCell::new(MonitorCore {
                    initialized: false,
                    last_url: String::new(),
                    last_kind: PageKind::Unknown,
                    subscribers: Vec::new(),
                    next_subscription: 0,
                    emitted: 0,
                }),
                sources: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Attach a route event source. Installed immediately when the monitor is
    /// already running, otherwise on the next `init`.
    pub fn add_source(&self, mut source: Box<dyn RouteEventSource>) {
        if self.inner.core.borrow().initialized {
            source.install(self.sink());
        }
        self.inner.sources.borrow_mut().push(source);
    }

    /// Sink bound to this monitor.
    pub fn sink(&self) -> SignalSink {
        SignalSink {
            monitor: Rc::downgrade(&self.inner),
        }
    }

    /// Classifier used for both sides of every transition.
    pub fn classifier(&self) -> &RouteClassifier {
        &self.inner.classifier
    }

    /// The page's URL right now.
    pub fn current_url(&self) -> String {
        self.inner.page.href()
    }

    /// Start observing: record the current URL and install every source.
    ///
    /// Returns the first observation as an initial transition (empty previous
    /// URL). It is not delivered to subscribers; the caller decides what the
    /// first observation means. Returns `None` when already running.
    pub fn init(&self) -> Option<RouteTransition> {
        let url = self.inner.page.href();
        let kind = self.inner.classifier.classify(&url);
        {
            let mut core = self.inner.core.borrow_mut();
            if core.initialized {
                tracing::debug!("Navigation monitor already initialized");
                return None;
            }
            core.initialized = true;
            core.last_url = url.clone();
            core.last_kind = kind;
        }

        let mut sources = std::mem::take(&mut *self.inner.sources.borrow_mut());
        for source in sources.iter_mut() {
            source.install(self.sink());
            tracing::debug!(source = source.name(), "Route event source installed");
        }
        self.restore_sources(sources);

        tracing::info!(url = %url, kind = %kind, "Navigation monitor started");
        Some(RouteTransition::initial(url, kind))
    }

    /// Compare the current URL with the last observed one and emit a
    /// transition when they differ.
    pub fn check(&self, trigger: NavigationTrigger) -> Option<RouteTransition> {
        let current_url = self.inner.page.href();
        let (transition, subscribers) = {
            let mut core = self.inner.core.borrow_mut();
            if !core.initialized {
                return None;
            }
            if core.last_url == current_url {
                tracing::trace!(?trigger, "No route change");
                return None;
            }

            let previous_url = std::mem::replace(&mut core.last_url, current_url.clone());
            let previous_kind = self.inner.classifier.classify(&previous_url);
            let current_kind = self.inner.classifier.classify(&current_url);
            core.last_kind = current_kind;
            core.emitted += 1;

            let transition = RouteTransition::new(
                previous_url,
                current_url,
                previous_kind,
                current_kind,
                trigger,
            );
            let subscribers: Vec<(SubscriptionId, Subscriber)> = core
                .subscribers
                .iter()
                .map(|(id, subscriber)| (*id, Rc::clone(subscriber)))
                .collect();
            (transition, subscribers)
        };

        tracing::info!(
            from = %transition.previous_url(),
            to = %transition.current_url(),
            previous_kind = %transition.previous_kind(),
            current_kind = %transition.current_kind(),
            ?trigger,
            "Route changed"
        );

        for (id, subscriber) in subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber(&transition))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(subscription = id.0, error = %error, "Subscriber failed");
                }
                Err(panic) => {
                    tracing::error!(
                        subscription = id.0,
                        panic = panic_message(panic.as_ref()),
                        "Subscriber panicked"
                    );
                }
            }
        }

        Some(transition)
    }

    /// Register `subscriber` for every future transition.
    pub fn on_change<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&RouteTransition) -> Result<(), SubscriberError> + 'static,
    {
        let mut core = self.inner.core.borrow_mut();
        let id = SubscriptionId(core.next_subscription);
        core.next_subscription += 1;
        core.subscribers.push((id, Rc::new(subscriber)));
        id
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn off_change(&self, id: SubscriptionId) -> bool {
        let mut core = self.inner.core.borrow_mut();
        let before = core.subscribers.len();
        core.subscribers.retain(|(existing, _)| *existing != id);
        core.subscribers.len() != before
    }

    /// Uninstall every source, drop all subscribers and reset. Idempotent;
    /// `init` may be called again afterwards.
    pub fn destroy(&self) {
        let was_initialized = {
            let mut core = self.inner.core.borrow_mut();
            let was = core.initialized;
            core.initialized = false;
            core.subscribers.clear();
            was
        };
        if !was_initialized {
            return;
        }

        let mut sources = std::mem::take(&mut *self.inner.sources.borrow_mut());
        for source in sources.iter_mut() {
            source.uninstall();
        }
        self.restore_sources(sources);
        tracing::info!("Navigation monitor destroyed");
    }

    /// Diagnostic snapshot.
    pub fn state(&self) -> MonitorState {
        let core = self.inner.core.borrow();
        MonitorState {
            initialized: core.initialized,
            last_url: core.last_url.clone(),
            last_kind: core.last_kind,
            subscriber_count: core.subscribers.len(),
            source_count: self.inner.sources.borrow().len(),
            emitted: core.emitted,
        }
    }

    fn restore_sources(&self, mut sources: Vec<Box<dyn RouteEventSource>>) {
        let mut slot = self.inner.sources.borrow_mut();
        // sources added while the list was taken out go after the originals
        sources.append(&mut slot);
        *slot = sources;
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
