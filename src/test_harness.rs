//! Recording fakes for every host collaborator, plus an engine fixture.
//!
//! The fakes record what the engine asked of them so tests can assert on
//! call order, and expose knobs (response scripts, render outcomes, a request
//! gate) to steer the engine into the interesting paths.

#![allow(dead_code)]

use crate::gateway::{
    GatewaySettings, HttpRequest, HttpResponse, HttpTransport, RemoteDataGateway,
    SubjectResolver,
};
use crate::host::{
    BadgeTarget, CardHandle, HistoryBackend, HostPage, MemoryStore,
    ModelCardSource, OverlayRenderer, RenderOutcome,
};
use crate::model::{BalanceSummary, TransportError};
use crate::navigation::{DomEventSource, HistoryInterceptor, NavigationMonitor, PollSource};
use crate::orchestrator::{OrchestratorSettings, OverlayCollaborators, PageOrchestrator};
use crate::route::RouteClassifier;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::LocalSet;

pub const HOST: &str = "https://cloud.siliconflow.cn";
pub const EXPENSE_URL: &str = "https://cloud.siliconflow.cn/me/expensebill";
pub const MODELS_URL: &str = "https://cloud.siliconflow.cn/me/models";
pub const OTHER_URL: &str = "https://cloud.siliconflow.cn/me/account";

/// Run `future` on a fresh `LocalSet` so `spawn_local` works.
pub async fn run_local<F: Future>(future: F) -> F::Output {
    LocalSet::new().run_until(future).await
}

/// Let spawned local tasks run until they block.
pub async fn drain() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ===== Host page =====

/// In-memory page whose history calls move the URL.
#[derive(Debug, Default)]
pub struct FakePage {
    href: RefCell<String>,
    subject_global: Option<String>,
    scripts: Vec<String>,
    history: RefCell<Vec<String>>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            href: RefCell::new(url.to_string()),
            ..Self::default()
        }
    }

    pub fn with_subject_global(mut self, subject: &str) -> Self {
        self.subject_global = Some(subject.to_string());
        self
    }

    pub fn with_scripts(mut self, scripts: Vec<String>) -> Self {
        self.scripts = scripts;
        self
    }

    /// Change the URL without firing anything, like a router that bypasses
    /// the history API.
    pub fn set_href(&self, url: &str) {
        *self.href.borrow_mut() = url.to_string();
    }

    /// URLs passed to the original history entry points.
    pub fn history_calls(&self) -> Vec<String> {
        self.history.borrow().clone()
    }
}

impl HostPage for FakePage {
    fn href(&self) -> String {
        self.href.borrow().clone()
    }

    fn subject_global(&self) -> Option<String> {
        self.subject_global.clone()
    }

    fn inline_scripts(&self) -> Vec<String> {
        self.scripts.clone()
    }
}

impl HistoryBackend for FakePage {
    fn push_state(&self, url: &str) {
        self.history.borrow_mut().push(url.to_string());
        self.set_href(url);
    }

    fn replace_state(&self, url: &str) {
        self.history.borrow_mut().push(url.to_string());
        self.set_href(url);
    }
}

// ===== Transport =====

/// Canned reply for requests whose URL contains a fragment.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Raw(u16, Vec<u8>),
    Fail(TransportError),
}

/// Transport answering from a script and recording every request.
///
/// `hold()` parks every request until `release()`, which lets a test change
/// the page while a fetch is in flight.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: RefCell<Vec<(String, Reply)>>,
    requests: RefCell<Vec<HttpRequest>>,
    gate: RefCell<Option<watch::Sender<bool>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the reply for URLs containing `fragment`.
    pub fn respond(&self, fragment: &str, reply: Reply) {
        let mut replies = self.replies.borrow_mut();
        replies.retain(|(existing, _)| existing != fragment);
        replies.push((fragment.to_string(), reply));
    }

    pub fn hold(&self) {
        let (tx, _) = watch::channel(false);
        *self.gate.borrow_mut() = Some(tx);
    }

    pub fn release(&self) {
        if let Some(tx) = self.gate.borrow_mut().take() {
            tx.send_replace(true);
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls_to(&self, fragment: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }
}

#[async_trait(?Send)]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());

        let gate = self.gate.borrow().as_ref().map(watch::Sender::subscribe);
        if let Some(mut rx) = gate {
            // sender dropped counts as released
            let _ = rx.wait_for(|open| *open).await;
        }

        let reply = self
            .replies
            .borrow()
            .iter()
            .find(|(fragment, _)| request.url.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone());
        match reply {
            Some(Reply::Json(status, body)) => Ok(HttpResponse {
                status,
                body: body.to_string().into_bytes(),
            }),
            Some(Reply::Raw(status, body)) => Ok(HttpResponse { status, body }),
            Some(Reply::Fail(error)) => Err(error),
            None => Ok(HttpResponse {
                status: 404,
                body: Vec::new(),
            }),
        }
    }
}

/// Coded wallets envelope with one wallet per balance (package ids 1..).
pub fn wallets_body(balances: &[i64]) -> Value {
    let wallets: Vec<Value> = balances
        .iter()
        .enumerate()
        .map(|(i, balance)| {
            let package_id = i as i64 + 1;
            json!({"packageId": package_id, "balance": balance})
        })
        .collect();
    json!({"code": 20000, "data": {"wallets": wallets, "pagination": {"total": balances.len()}}})
}

/// Coded packages envelope; each entry is (id, models).
pub fn packages_body(packages: &[(i64, &[&str])]) -> Value {
    let packages: Vec<Value> = packages
        .iter()
        .map(|(id, models)| {
            let text: Vec<String> = models.iter().map(|m| format!("- {m}")).collect();
            json!({"id": id, "description": json!({"zh-cn": text.join("\n")}).to_string()})
        })
        .collect();
    json!({"code": 20000, "data": {"packages": packages}})
}

// ===== Renderer =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    Panel { total_raw_units: i128, voucher_count: usize },
    Badges(Vec<BadgeTarget>),
    ClearPanel,
    ClearBadges,
}

/// Renderer recording every call; outcomes are configurable.
#[derive(Debug)]
pub struct RecordingRenderer {
    calls: RefCell<Vec<RenderCall>>,
    panel_outcome: Cell<RenderOutcome>,
    badge_outcome: Cell<RenderOutcome>,
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            panel_outcome: Cell::new(RenderOutcome::Rendered),
            badge_outcome: Cell::new(RenderOutcome::Rendered),
        }
    }
}

impl RecordingRenderer {
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.borrow().clone()
    }

    pub fn reset(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn panel_renders(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, RenderCall::Panel { .. }))
            .count()
    }

    pub fn badge_renders(&self) -> Vec<Vec<BadgeTarget>> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                RenderCall::Badges(targets) => Some(targets.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn set_panel_outcome(&self, outcome: RenderOutcome) {
        self.panel_outcome.set(outcome);
    }

    pub fn set_badge_outcome(&self, outcome: RenderOutcome) {
        self.badge_outcome.set(outcome);
    }
}

impl OverlayRenderer for RecordingRenderer {
    fn render_balance_panel(&self, summary: &BalanceSummary) -> RenderOutcome {
        self.calls.borrow_mut().push(RenderCall::Panel {
            total_raw_units: summary.total_raw_units(),
            voucher_count: summary.voucher_count(),
        });
        self.panel_outcome.get()
    }

    fn render_badges(&self, targets: &[BadgeTarget]) -> RenderOutcome {
        self.calls
            .borrow_mut()
            .push(RenderCall::Badges(targets.to_vec()));
        self.badge_outcome.get()
    }

    fn clear_panel(&self) {
        self.calls.borrow_mut().push(RenderCall::ClearPanel);
    }

    fn clear_badges(&self) {
        self.calls.borrow_mut().push(RenderCall::ClearBadges);
    }
}

// ===== Model cards =====

/// Card list set by the test; card ids are positions.
#[derive(Debug, Default)]
pub struct FakeCards {
    names: RefCell<Vec<Option<String>>>,
}

impl FakeCards {
    pub fn set(&self, names: &[&str]) {
        *self.names.borrow_mut() = names.iter().map(|n| Some(n.to_string())).collect();
    }

    pub fn set_raw(&self, names: Vec<Option<String>>) {
        *self.names.borrow_mut() = names;
    }
}

impl ModelCardSource for FakeCards {
    fn list_visible_model_cards(&self) -> Vec<CardHandle> {
        (0..self.names.borrow().len() as u64)
            .map(CardHandle::new)
            .collect()
    }

    fn card_display_name(&self, card: &CardHandle) -> Option<String> {
        self.names
            .borrow()
            .get(card.id() as usize)
            .cloned()
            .flatten()
    }
}

// ===== Engine fixture =====

/// Fully wired engine over fakes.
pub struct Fixture {
    pub page: Rc<FakePage>,
    pub transport: Rc<ScriptedTransport>,
    pub renderer: Rc<RecordingRenderer>,
    pub cards: Rc<FakeCards>,
    pub store: Rc<MemoryStore>,
    pub history: HistoryInterceptor,
    pub dom: DomEventSource,
    pub monitor: NavigationMonitor,
    pub gateway: Rc<RemoteDataGateway>,
    pub orchestrator: PageOrchestrator,
}

pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        initial_settle: Duration::ZERO,
        card_wait_timeout: Duration::from_secs(10),
        ..OrchestratorSettings::default()
    }
}

impl Fixture {
    /// Engine on `url` with default responses scripted for both endpoints.
    pub fn new(url: &str) -> Self {
        Self::with_settings(url, fast_settings())
    }

    pub fn with_settings(url: &str, settings: OrchestratorSettings) -> Self {
        let page = Rc::new(FakePage::new(url));
        let transport = Rc::new(ScriptedTransport::new());
        transport.respond(
            "wallets",
            Reply::Json(200, wallets_body(&[10_000_000_000_000, 4_000_000_000_000])),
        );
        transport.respond(
            "packages",
            Reply::Json(
                200,
                packages_body(&[
                    (1, &["deepseek-ai/DeepSeek-V3", "Qwen/QwQ-32B"]),
                    (2, &["deepseek-ai/DeepSeek-V3"]),
                ]),
            ),
        );
        let renderer = Rc::new(RecordingRenderer::default());
        let cards = Rc::new(FakeCards::default());
        let store = Rc::new(MemoryStore::new());

        let classifier = RouteClassifier::default();
        let monitor = NavigationMonitor::new(page.clone(), classifier);
        let history = HistoryInterceptor::new(page.clone());
        let dom = DomEventSource::default();
        monitor.add_source(Box::new(history.clone()));
        monitor.add_source(Box::new(dom.clone()));
        monitor.add_source(Box::new(PollSource::default()));

        let subject = SubjectResolver::new(page.clone(), store.clone());
        let gateway = Rc::new(RemoteDataGateway::new(
            transport.clone(),
            subject,
            GatewaySettings::default(),
        ));
        let orchestrator = PageOrchestrator::new(
            monitor.clone(),
            gateway.clone(),
            OverlayCollaborators {
                renderer: renderer.clone(),
                cards: cards.clone(),
                store: store.clone(),
            },
            settings,
        );

        Self {
            page,
            transport,
            renderer,
            cards,
            store,
            history,
            dom,
            monitor,
            gateway,
            orchestrator,
        }
    }

    /// Navigate via the intercepted `pushState`.
    pub fn navigate(&self, url: &str) {
        self.history.push_state(url);
    }
}
