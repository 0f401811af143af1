//! The page seam: everything the loader needs from `document` and `window`.
//!
//! Implementations drive a real browser page (see the runtime crate) or a
//! scripted fake ([`crate::testing::FakeHost`]).

use crate::config::LoaderConfig;
use crate::error::HostError;
use async_trait::async_trait;

/// A `<script>` element to be appended to `document.head`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTag {
    pub src: String,
    pub async_load: bool,
    pub defer: bool,
}

impl ScriptTag {
    /// The tag for a config's script URL, with `async` and `defer` set.
    pub fn for_config(config: &LoaderConfig) -> Self {
        Self {
            src: config.script_url(),
            async_load: true,
            defer: true,
        }
    }
}

/// Which of the script element's events fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEvent {
    Loaded,
    /// `onerror` fired; the payload is whatever detail the host could get.
    Errored(String),
}

#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Whether a script whose `src` starts with `src_prefix` is already in
    /// the document. Tags whose `error` event fired do not count, so a
    /// fresh loader can fetch again after a network failure.
    async fn has_script(&self, src_prefix: &str) -> Result<bool, HostError>;

    /// Insert `tag` into the document head and resolve once its `load` or
    /// `error` event fires. May never resolve if neither fires.
    async fn insert_script(&self, tag: &ScriptTag) -> Result<ScriptEvent, HostError>;

    /// Whether the dotted global path (e.g. `google.maps`) resolves to an
    /// object on `window`.
    async fn global_present(&self, namespace: &str) -> Result<bool, HostError>;
}
