//! End-to-end `drive` runs against a simulated page.

use anyhow::Result;
use async_trait::async_trait;
use sdk_loader::{FailureClass, LoaderConfig};
use sdk_loader_runtime::cli::load_cmd::{drive, LoadOptions};
use sdk_loader_runtime::renderer::{NavigationResult, RenderContext, Renderer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy)]
enum Sdk {
    Initializes,
    NeverInitializes,
    Blocked,
}

/// A page that understands the loader's three JavaScript snippets.
struct SimPage {
    sdk: Sdk,
    global: AtomicBool,
    tags: AtomicUsize,
    /// Tags whose `error` event fired; the page no longer counts them.
    failed_tags: AtomicUsize,
    closed: AtomicBool,
}

impl SimPage {
    fn new(sdk: Sdk) -> Arc<Self> {
        Arc::new(Self {
            sdk,
            global: AtomicBool::new(false),
            tags: AtomicUsize::new(0),
            failed_tags: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }
}

struct SimContext(Arc<SimPage>);

#[async_trait]
impl RenderContext for SimContext {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 5,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        let page = &self.0;
        if script.contains("createElement('script')") {
            page.tags.fetch_add(1, Ordering::SeqCst);
            return Ok(match page.sdk {
                Sdk::Initializes => {
                    page.global.store(true, Ordering::SeqCst);
                    json!({ "event": "load" })
                }
                Sdk::NeverInitializes => json!({ "event": "load" }),
                Sdk::Blocked => {
                    page.failed_tags.fetch_add(1, Ordering::SeqCst);
                    json!({ "event": "error", "detail": "script error event" })
                }
            });
        }
        if script.contains("querySelectorAll") {
            let live = page.tags.load(Ordering::SeqCst) - page.failed_tags.load(Ordering::SeqCst);
            return Ok(json!(live));
        }
        if script.contains("let o = window") {
            return Ok(json!(page.global.load(Ordering::SeqCst)));
        }
        Ok(Value::Null)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.0.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct SimRenderer(Arc<SimPage>);

#[async_trait]
impl Renderer for SimRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Ok(Box::new(SimContext(Arc::clone(&self.0))))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

fn options(callers: usize) -> LoadOptions {
    LoadOptions {
        page: "https://twin.example.com/house".to_string(),
        callers,
        headless: true,
        journal: false,
    }
}

fn config() -> LoaderConfig {
    LoaderConfig::new("AIzaKey", ["places"], "weekly")
}

#[tokio::test]
async fn many_callers_one_tag() {
    let page = SimPage::new(Sdk::Initializes);
    let renderer = SimRenderer(Arc::clone(&page));

    let summary = drive(&renderer, &config(), &options(8)).await.unwrap();

    assert!(summary.result.is_ok());
    assert_eq!(summary.callers_ready, 8);
    assert_eq!(summary.insertions, 1);
    assert_eq!(summary.tags_in_page, 1);
    assert_eq!(summary.final_url, "https://twin.example.com/house");
    assert!(page.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn sdk_without_global_reports_integration() {
    let page = SimPage::new(Sdk::NeverInitializes);
    let renderer = SimRenderer(Arc::clone(&page));

    let summary = drive(&renderer, &config(), &options(3)).await.unwrap();

    let err = summary.result.unwrap_err();
    assert_eq!(err.class(), FailureClass::Integration);
    assert_eq!(summary.callers_ready, 0);
    assert_eq!(summary.insertions, 1);
}

#[tokio::test]
async fn blocked_script_reports_network() {
    let page = SimPage::new(Sdk::Blocked);
    let renderer = SimRenderer(Arc::clone(&page));

    let summary = drive(&renderer, &config(), &options(2)).await.unwrap();

    let err = summary.result.unwrap_err();
    assert_eq!(err.class(), FailureClass::Network);
    assert_eq!(page.tags.load(Ordering::SeqCst), 1);
    assert_eq!(summary.insertions, 1);
    assert_eq!(summary.tags_in_page, 0);
}
