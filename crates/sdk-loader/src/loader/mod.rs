//! The single-flight script loader.
//!
//! State moves `Uninitialized -> Loading -> Ready | Failed` and never back.
//! The first `load()` spawns one background task; every concurrent caller
//! awaits a clone of the same shared future, so the script tag is inserted
//! at most once. Dropping a caller's future does not cancel the load.

pub mod probe;
pub mod registry;

use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::host::{ScriptEvent, ScriptHost, ScriptTag};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{info, warn};

use self::probe::{probe_ready, wait_for_global};

type PendingLoad = Shared<BoxFuture<'static, Result<(), LoadError>>>;

enum LoaderState {
    Uninitialized,
    Loading(PendingLoad),
    Ready,
    Failed(LoadError),
}

/// Observable state of a loader, without the pending future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

struct Inner {
    config: LoaderConfig,
    host: Arc<dyn ScriptHost>,
    state: Mutex<LoaderState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the outcome. Only the first settle after `Loading` counts.
    fn settle(&self, result: &Result<(), LoadError>) {
        let mut state = self.lock();
        if let LoaderState::Loading(_) = *state {
            *state = match result {
                Ok(()) => LoaderState::Ready,
                Err(e) => LoaderState::Failed(e.clone()),
            };
        }
    }
}

/// Handle to one external SDK's loader. Clones share state.
#[derive(Clone)]
pub struct ScriptLoader {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ScriptLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptLoader")
            .field("key", &self.inner.config.cache_key())
            .field("status", &self.status())
            .finish()
    }
}

impl ScriptLoader {
    /// Create a loader. No host I/O happens until [`ScriptLoader::load`].
    pub fn new(config: LoaderConfig, host: Arc<dyn ScriptHost>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                host,
                state: Mutex::new(LoaderState::Uninitialized),
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn status(&self) -> LoaderStatus {
        match *self.inner.lock() {
            LoaderState::Uninitialized => LoaderStatus::Uninitialized,
            LoaderState::Loading(_) => LoaderStatus::Loading,
            LoaderState::Ready => LoaderStatus::Ready,
            LoaderState::Failed(_) => LoaderStatus::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == LoaderStatus::Ready
    }

    /// The terminal error, if the load failed.
    pub fn failure(&self) -> Option<LoadError> {
        match &*self.inner.lock() {
            LoaderState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Whether both handles point at the same loader instance.
    pub fn ptr_eq(&self, other: &ScriptLoader) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Make the SDK ready, inserting its script at most once.
    ///
    /// Resolves immediately once ready, and fails immediately with the
    /// first error once failed. Must be called inside a tokio runtime.
    pub async fn load(&self) -> Result<(), LoadError> {
        let pending = {
            let mut state = self.inner.lock();
            let existing = match &*state {
                LoaderState::Ready => return Ok(()),
                LoaderState::Failed(e) => return Err(e.clone()),
                LoaderState::Loading(pending) => Some(pending.clone()),
                LoaderState::Uninitialized => None,
            };
            match existing {
                Some(pending) => pending,
                None => {
                    let pending = self.start();
                    *state = LoaderState::Loading(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn start(&self) -> PendingLoad {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let result = run_load(&inner.config, inner.host.as_ref()).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => info!(key = %inner.config.cache_key(), elapsed_ms, "sdk ready"),
                Err(e) => warn!(
                    key = %inner.config.cache_key(),
                    class = %e.class(),
                    elapsed_ms,
                    error = %e,
                    "sdk load failed"
                ),
            }
            inner.settle(&result);
            result
        });

        let inner = Arc::clone(&self.inner);
        async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(LoadError::Aborted(e.to_string())),
            };
            inner.settle(&result);
            result
        }
        .boxed()
        .shared()
    }
}

async fn run_load(config: &LoaderConfig, host: &dyn ScriptHost) -> Result<(), LoadError> {
    let namespace = config.namespace.as_str();

    if probe_ready(host, namespace).await? {
        info!(namespace, "global object already present, skipping insertion");
        return Ok(());
    }

    if host.has_script(&config.script_prefix()).await? {
        info!(namespace, "script tag already in page, polling for global object");
        return wait_for_global(host, namespace, &config.poll).await;
    }

    let tag = ScriptTag::for_config(config);
    info!(url = %config.redacted_url(), "inserting script tag");

    let event = tokio::time::timeout(config.load_timeout(), host.insert_script(&tag))
        .await
        .map_err(|_| LoadError::Timeout {
            waited: config.load_timeout(),
            stage: "script load event",
        })??;

    match event {
        ScriptEvent::Loaded => {
            if probe_ready(host, namespace).await? {
                Ok(())
            } else {
                Err(LoadError::Integration {
                    namespace: namespace.to_string(),
                })
            }
        }
        ScriptEvent::Errored(detail) => Err(LoadError::Network {
            url: config.redacted_url(),
            detail,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureClass;
    use crate::testing::{FakeHost, Response};
    use std::time::Duration;

    fn config() -> LoaderConfig {
        LoaderConfig::new("test_key", ["places"], "3.55")
    }

    fn loader_with(host: &Arc<FakeHost>) -> ScriptLoader {
        ScriptLoader::new(config(), Arc::clone(host) as Arc<dyn ScriptHost>)
    }

    #[tokio::test]
    async fn test_new_loader_does_no_io() {
        let host = Arc::new(FakeHost::new());
        let loader = loader_with(&host);
        assert_eq!(loader.status(), LoaderStatus::Uninitialized);
        assert!(!loader.is_ready());
        assert_eq!(host.calls(), 0);
    }

    #[tokio::test]
    async fn test_load_success_inserts_tag() {
        let host = Arc::new(FakeHost::new().with_response(Response::Load));
        let loader = loader_with(&host);

        loader.load().await.unwrap();

        assert!(loader.is_ready());
        let tags = host.inserted_tags();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].src, config().script_url());
        assert!(tags[0].async_load && tags[0].defer);
    }

    #[tokio::test]
    async fn test_ready_is_idempotent() {
        let host = Arc::new(FakeHost::new().with_response(Response::Load));
        let loader = loader_with(&host);
        loader.load().await.unwrap();
        let calls = host.calls();

        loader.load().await.unwrap();
        loader.load().await.unwrap();

        assert_eq!(host.insertions(), 1);
        assert_eq!(host.calls(), calls);
    }

    #[tokio::test]
    async fn test_loaded_without_global_is_integration_error() {
        let host = Arc::new(FakeHost::new().with_response(Response::LoadWithoutGlobal));
        let loader = loader_with(&host);

        let err = loader.load().await.unwrap_err();
        assert_eq!(err.class(), FailureClass::Integration);
        assert_eq!(loader.status(), LoaderStatus::Failed);
    }

    #[tokio::test]
    async fn test_error_event_is_network_error() {
        let host = Arc::new(FakeHost::new().with_response(Response::Error("403".into())));
        let loader = loader_with(&host);

        let err = loader.load().await.unwrap_err();
        assert_eq!(err.class(), FailureClass::Network);
        assert!(err.to_string().contains("credential"));
        assert!(!err.to_string().contains("test_key"));
    }

    #[tokio::test]
    async fn test_failure_is_terminal() {
        let host = Arc::new(FakeHost::new().with_response(Response::Error("boom".into())));
        let loader = loader_with(&host);

        let first = loader.load().await.unwrap_err();
        let calls = host.calls();
        let second = loader.load().await.unwrap_err();

        assert_eq!(first, second);
        assert_eq!(host.calls(), calls);
        assert_eq!(loader.failure(), Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_times_out() {
        let host = Arc::new(FakeHost::new().with_response(Response::Hang));
        let loader = ScriptLoader::new(
            config().with_load_timeout(Duration::from_secs(3)),
            Arc::clone(&host) as Arc<dyn ScriptHost>,
        );

        let err = loader.load().await.unwrap_err();
        assert_eq!(
            err,
            LoadError::Timeout {
                waited: Duration::from_secs(3),
                stage: "script load event",
            }
        );
        assert_eq!(host.insertions(), 1);
    }

    #[tokio::test]
    async fn test_global_already_present_skips_insertion() {
        let host = Arc::new(FakeHost::new());
        host.set_global(true);
        let loader = loader_with(&host);

        loader.load().await.unwrap();
        assert_eq!(host.insertions(), 0);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_cancel() {
        let host = Arc::new(FakeHost::new());
        let loader = loader_with(&host);

        let first = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load().await }
        });
        host.wait_for_insertions(1).await;
        first.abort();

        host.fire_load(true);
        loader.load().await.unwrap();
        assert_eq!(host.insertions(), 1);
    }
}
