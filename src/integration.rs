//! Wiring of the engine from configuration and host collaborators.
//!
//! [`bootstrap`] resolves configuration and installs file logging;
//! [`assemble`] builds the component graph over whatever the host supplies.
//! Neither starts anything: call [`Engine::start`] from inside a
//! `tokio::task::LocalSet`.

use crate::config::{self, ConfigError, ResolvedConfig};
use crate::gateway::{HttpTransport, RemoteDataGateway, SubjectResolver};
use crate::host::{HistoryBackend, HostPage, KeyValueStore, ModelCardSource, OverlayRenderer};
use crate::logging::{self, LoggingError};
use crate::model::InitError;
use crate::navigation::{DomEventSource, HistoryInterceptor, NavigationMonitor, PollSource};
use crate::orchestrator::{OrchestratorStatus, OverlayCollaborators, PageOrchestrator};
use crate::route::RouteClassifier;
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;

/// Failures before the engine exists.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Logging could not be installed.
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Resolve configuration and install the file logger.
///
/// # Errors
///
/// Returns [`BootstrapError`] when a config file is unreadable or logging
/// cannot be initialized.
pub fn bootstrap(config_path: Option<PathBuf>) -> Result<ResolvedConfig, BootstrapError> {
    let config = config::resolve_config(config_path)?;
    logging::init(&config.log_file_path)?;
    tracing::info!(
        target_host = %config.target_host,
        api_base_url = %config.api_base_url,
        "configuration resolved"
    );
    Ok(config)
}

/// Everything the host environment provides.
#[derive(Clone)]
pub struct HostCollaborators {
    /// Current URL, subject global and inline scripts.
    pub page: Rc<dyn HostPage>,
    /// Underlying `pushState`/`replaceState`.
    pub history: Rc<dyn HistoryBackend>,
    /// Draws the panel and badges.
    pub renderer: Rc<dyn OverlayRenderer>,
    /// Lists model cards on the catalog page.
    pub cards: Rc<dyn ModelCardSource>,
    /// Persistent key-value storage.
    pub store: Rc<dyn KeyValueStore>,
    /// HTTP client for the remote API.
    pub transport: Rc<dyn HttpTransport>,
}

/// The assembled component graph.
pub struct Engine {
    orchestrator: PageOrchestrator,
    monitor: NavigationMonitor,
    history: HistoryInterceptor,
    dom: DomEventSource,
    gateway: Rc<RemoteDataGateway>,
}

/// Build the engine described by `config` over the host's collaborators.
///
/// Sources are registered with the monitor but not installed until
/// [`Engine::start`].
pub fn assemble(config: &ResolvedConfig, host: HostCollaborators) -> Engine {
    let classifier = RouteClassifier::new(&config.target_host);
    let monitor = NavigationMonitor::new(host.page.clone(), classifier);

    let history = HistoryInterceptor::new(host.history);
    let dom = DomEventSource::new(config.click_delay());
    monitor.add_source(Box::new(history.clone()));
    monitor.add_source(Box::new(dom.clone()));
    monitor.add_source(Box::new(PollSource::new(config.poll_interval())));

    let subject = SubjectResolver::new(host.page, host.store.clone());
    let gateway = Rc::new(RemoteDataGateway::new(
        host.transport,
        subject,
        config.gateway_settings(),
    ));

    let orchestrator = PageOrchestrator::new(
        monitor.clone(),
        gateway.clone(),
        OverlayCollaborators {
            renderer: host.renderer,
            cards: host.cards,
            store: host.store,
        },
        config.orchestrator_settings(),
    );

    Engine {
        orchestrator,
        monitor,
        history,
        dom,
        gateway,
    }
}

impl Engine {
    /// Initialize the orchestrator, which starts route monitoring and the
    /// first dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`InitError::ForeignHost`] when the page is not on the target host.
    pub fn start(&self) -> Result<(), InitError> {
        self.orchestrator.initialize()
    }

    /// Tear everything down. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.orchestrator.destroy();
        tracing::debug!("engine shut down");
    }

    /// The page state machine.
    pub fn orchestrator(&self) -> &PageOrchestrator {
        &self.orchestrator
    }

    /// The route monitor.
    pub fn monitor(&self) -> &NavigationMonitor {
        &self.monitor
    }

    /// Route `pushState`/`replaceState` through this to get change signals.
    pub fn history(&self) -> &HistoryInterceptor {
        &self.history
    }

    /// Feed popstate, hashchange and click events through this.
    pub fn dom_events(&self) -> &DomEventSource {
        &self.dom
    }

    /// The remote data gateway.
    pub fn gateway(&self) -> &RemoteDataGateway {
        &self.gateway
    }

    /// Combined diagnostic snapshot.
    pub fn status(&self) -> OrchestratorStatus {
        self.orchestrator.status()
    }
}
