//! [`ScriptHost`] over a live page.
//!
//! Every host operation is a small JavaScript snippet evaluated through a
//! [`RenderContext`]. Strings are embedded as JSON literals.

use crate::renderer::RenderContext;
use async_trait::async_trait;
use sdk_loader::{HostError, ScriptEvent, ScriptHost, ScriptTag};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

pub struct PageScriptHost {
    context: Box<dyn RenderContext>,
    insertions: AtomicUsize,
}

impl PageScriptHost {
    pub fn new(context: Box<dyn RenderContext>) -> Self {
        Self {
            context,
            insertions: AtomicUsize::new(0),
        }
    }

    /// Script tags this host has appended to the page.
    pub fn insertions(&self) -> usize {
        self.insertions.load(Ordering::SeqCst)
    }

    /// Count `<script>` elements in the page whose `src` starts with `prefix`,
    /// skipping those whose `error` event fired.
    pub async fn count_scripts(&self, prefix: &str) -> Result<usize, HostError> {
        let value = self.eval(&count_scripts_js(prefix)).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| HostError::new(format!("unexpected script count: {value}")))
    }

    /// Give the page context back, e.g. to close it.
    pub fn into_context(self) -> Box<dyn RenderContext> {
        self.context
    }

    async fn eval(&self, script: &str) -> Result<Value, HostError> {
        self.context
            .execute_js(script)
            .await
            .map_err(|e| HostError::new(format!("{e:#}")))
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn count_scripts_js(prefix: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll('script[src]'))\
         .filter(s => s.src.startsWith({}) && s.dataset.loadFailed !== '1').length",
        js_string(prefix)
    )
}

fn insert_script_js(tag: &ScriptTag) -> String {
    format!(
        r#"new Promise((resolve) => {{
    const s = document.createElement('script');
    s.src = {src};
    s.async = {async_load};
    s.defer = {defer};
    s.onload = () => resolve({{ event: 'load' }});
    s.onerror = () => {{
        s.dataset.loadFailed = '1';
        resolve({{ event: 'error', detail: 'script error event' }});
    }};
    document.head.appendChild(s);
}})"#,
        src = js_string(&tag.src),
        async_load = tag.async_load,
        defer = tag.defer,
    )
}

fn global_present_js(namespace: &str) -> String {
    let parts: Vec<&str> = namespace.split('.').collect();
    let parts = serde_json::to_string(&parts).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
    let o = window;
    for (const p of {parts}) {{
        if (o == null) return false;
        o = o[p];
    }}
    return o != null && (typeof o === 'object' || typeof o === 'function');
}})()"#
    )
}

fn parse_event(value: &Value) -> Result<ScriptEvent, HostError> {
    match value.get("event").and_then(Value::as_str) {
        Some("load") => Ok(ScriptEvent::Loaded),
        Some("error") => {
            let detail = value
                .get("detail")
                .and_then(Value::as_str)
                .unwrap_or("script error event");
            Ok(ScriptEvent::Errored(detail.to_string()))
        }
        _ => Err(HostError::new(format!("unexpected script event: {value}"))),
    }
}

#[async_trait]
impl ScriptHost for PageScriptHost {
    async fn has_script(&self, src_prefix: &str) -> Result<bool, HostError> {
        Ok(self.count_scripts(src_prefix).await? > 0)
    }

    async fn insert_script(&self, tag: &ScriptTag) -> Result<ScriptEvent, HostError> {
        self.insertions.fetch_add(1, Ordering::SeqCst);
        let value = self.eval(&insert_script_js(tag)).await?;
        let event = parse_event(&value)?;
        debug!(?event, "script settled");
        Ok(event)
    }

    async fn global_present(&self, namespace: &str) -> Result<bool, HostError> {
        let value = self.eval(&global_present_js(namespace)).await?;
        value
            .as_bool()
            .ok_or_else(|| HostError::new(format!("unexpected probe result: {value}")))
    }
}
