//! End-to-end flow through the public API: config -> assemble -> start.
//!
//! Host collaborators are minimal in-memory stand-ins; the store is a real
//! JSON file so persistence across engine restarts is exercised.

use async_trait::async_trait;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use tempfile::TempDir;
use tokio::task::LocalSet;
use voucher_lens::config::ResolvedConfig;
use voucher_lens::gateway::{HttpRequest, HttpResponse, HttpTransport};
use voucher_lens::host::{
    BadgeTarget, CardHandle, HistoryBackend, HostPage, JsonFileStore, ModelCardSource,
    OverlayRenderer, RenderOutcome,
};
use voucher_lens::model::{BalanceSummary, TransportError};
use voucher_lens::orchestrator::DispatchOutcome;
use voucher_lens::{assemble, Engine, HostCollaborators, PageKind};

// ===== Host stand-ins =====

struct Page {
    href: RefCell<String>,
}

impl HostPage for Page {
    fn href(&self) -> String {
        self.href.borrow().clone()
    }

    fn subject_global(&self) -> Option<String> {
        None
    }

    fn inline_scripts(&self) -> Vec<String> {
        Vec::new()
    }
}

impl HistoryBackend for Page {
    fn push_state(&self, url: &str) {
        *self.href.borrow_mut() = url.to_string();
    }

    fn replace_state(&self, url: &str) {
        *self.href.borrow_mut() = url.to_string();
    }
}

#[derive(Default)]
struct Api {
    seen: RefCell<Vec<HttpRequest>>,
}

#[async_trait(?Send)]
impl HttpTransport for Api {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.borrow_mut().push(request.clone());
        let body = if request.url.contains("wallets") {
            json!({"code": 20000, "data": {"wallets": [
                {"packageId": 3, "balance": 2_500_000_000_000_i64},
                {"packageId": 3, "balance": 500_000_000_000_i64},
            ]}})
        } else {
            json!({"code": 20000, "data": [
                {"id": 3, "description": "{\"en-us\": \"- Qwen/Qwen2.5-72B-Instruct\"}"},
            ]})
        };
        Ok(HttpResponse {
            status: 200,
            body: body.to_string().into_bytes(),
        })
    }
}

#[derive(Default)]
struct Overlay {
    panels: RefCell<Vec<String>>,
    badges: RefCell<Vec<Vec<BadgeTarget>>>,
}

impl OverlayRenderer for Overlay {
    fn render_balance_panel(&self, summary: &BalanceSummary) -> RenderOutcome {
        self.panels.borrow_mut().push(summary.format_amount(2));
        RenderOutcome::Rendered
    }

    fn render_badges(&self, targets: &[BadgeTarget]) -> RenderOutcome {
        self.badges.borrow_mut().push(targets.to_vec());
        RenderOutcome::Rendered
    }

    fn clear_panel(&self) {}

    fn clear_badges(&self) {}
}

struct Cards;

impl ModelCardSource for Cards {
    fn list_visible_model_cards(&self) -> Vec<CardHandle> {
        vec![CardHandle::new(1)]
    }

    fn card_display_name(&self, _card: &CardHandle) -> Option<String> {
        Some("qwen/qwen2.5-72b-instruct".to_string())
    }
}

struct Host {
    page: Rc<Page>,
    api: Rc<Api>,
    overlay: Rc<Overlay>,
}

fn engine_at(url: &str, store_dir: &TempDir) -> (Engine, Host) {
    let config = ResolvedConfig {
        initial_settle_ms: 0,
        store_path: store_dir.path().join("store.json"),
        ..ResolvedConfig::default()
    };
    let host = Host {
        page: Rc::new(Page {
            href: RefCell::new(url.to_string()),
        }),
        api: Rc::new(Api::default()),
        overlay: Rc::new(Overlay::default()),
    };
    let engine = assemble(
        &config,
        HostCollaborators {
            page: host.page.clone(),
            history: host.page.clone(),
            renderer: host.overlay.clone(),
            cards: Rc::new(Cards),
            store: Rc::new(JsonFileStore::new(&config.store_path)),
            transport: host.api.clone(),
        },
    );
    (engine, host)
}

// ===== Flows =====

#[tokio::test(start_paused = true)]
async fn expense_then_catalog_through_public_api() {
    LocalSet::new()
        .run_until(async {
            let dir = TempDir::new().unwrap();
            let (engine, host) = engine_at("https://cloud.siliconflow.cn/abc123/expensebill", &dir);

            engine.start().unwrap();
            engine.orchestrator().wait_for_dispatches().await;

            assert_eq!(*host.overlay.panels.borrow(), vec!["3.00".to_string()]);
            assert_eq!(
                host.api.seen.borrow()[0].header("x-subject-id"),
                Some("abc123")
            );

            engine.history().push_state("https://cloud.siliconflow.cn/me/models");
            engine.orchestrator().wait_for_dispatches().await;

            assert_eq!(engine.orchestrator().current_page_kind(), PageKind::ModelCatalog);
            let badges = host.overlay.badges.borrow();
            assert_eq!(badges.len(), 1);
            assert_eq!(badges[0][0].package_ids, vec![3]);

            engine.shutdown();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn marking_choice_survives_restart() {
    LocalSet::new()
        .run_until(async {
            let dir = TempDir::new().unwrap();
            let url = "https://cloud.siliconflow.cn/me/models";

            let (first, _host) = engine_at(url, &dir);
            first.start().unwrap();
            first.orchestrator().wait_for_dispatches().await;
            assert!(!first.orchestrator().toggle_marking().unwrap());
            first.shutdown();

            let (second, host) = engine_at(url, &dir);
            second.start().unwrap();
            second.orchestrator().wait_for_dispatches().await;

            assert_eq!(
                second.status().last_outcome,
                Some(DispatchOutcome::MarkingDisabled)
            );
            assert!(host.overlay.badges.borrow().is_empty());
            second.shutdown();
        })
        .await;
}
