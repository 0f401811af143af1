//! Browser rendering seam.
//!
//! The runtime talks to pages only through [`RenderContext`]; the Chromium
//! implementation lives in [`chromium`].

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;

/// Outcome of navigating a context to a URL.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// URL after redirects.
    pub final_url: String,
    /// Time until the navigation settled, in milliseconds.
    pub load_time_ms: u64,
}

/// A single page that can navigate and evaluate JavaScript.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to `url`, giving up after `timeout_ms`.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;

    /// Evaluate `script` in the page. Promises are awaited; the settled
    /// value comes back as JSON (`null` for `undefined`).
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;

    /// Close the page.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Something that hands out fresh page contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;

    /// Shut the browser down. Contexts must be closed first.
    async fn shutdown(&self) -> Result<()>;
}
