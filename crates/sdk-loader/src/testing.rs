//! A scripted [`ScriptHost`] for tests and for applications that want to
//! render without a real page.
//!
//! By default inserted scripts wait until the test fires `load` or `error`
//! through [`FakeHost::fire_load`] / [`FakeHost::fire_error`]. An automatic
//! [`Response`] can be set instead.

use crate::error::HostError;
use crate::host::{ScriptEvent, ScriptHost, ScriptTag};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};

/// What an inserted script does on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Wait for the test to fire an event.
    Manual,
    /// Fire `load` immediately and attach the global object.
    Load,
    /// Fire `load` immediately but leave the global object missing.
    LoadWithoutGlobal,
    /// Fire `error` immediately.
    Error(String),
    /// Never fire anything.
    Hang,
}

#[derive(Default)]
struct FakeState {
    existing_tag: Option<String>,
    global: bool,
    inserted: Vec<ScriptTag>,
    /// Indices into `inserted` whose `error` event fired.
    failed: Vec<usize>,
    waiting: Vec<(usize, oneshot::Sender<ScriptEvent>)>,
    probe_error: Option<String>,
}

/// In-memory stand-in for a browser page.
pub struct FakeHost {
    state: Mutex<FakeState>,
    response: Mutex<Response>,
    calls: AtomicUsize,
    inserted_notify: Notify,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            response: Mutex::new(Response::Manual),
            calls: AtomicUsize::new(0),
            inserted_notify: Notify::new(),
        }
    }

    /// A page that already carries a script tag with `src`, inserted by
    /// someone else.
    pub fn with_existing_tag(src: impl Into<String>) -> Self {
        let host = Self::new();
        host.lock().existing_tag = Some(src.into());
        host
    }

    pub fn with_response(self, response: Response) -> Self {
        self.set_response(response);
        self
    }

    /// Change how scripts inserted from now on behave.
    pub fn set_response(&self, response: Response) {
        *self.response.lock().unwrap_or_else(|e| e.into_inner()) = response;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_response(&self) -> Response {
        self.response.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Attach or remove the SDK's global object.
    pub fn set_global(&self, present: bool) {
        self.lock().global = present;
    }

    /// Make every readiness probe fail with a host error until cleared.
    pub fn set_probe_error(&self, error: Option<&str>) {
        self.lock().probe_error = error.map(String::from);
    }

    /// Fire `load` on every pending script, optionally attaching the global
    /// object first.
    pub fn fire_load(&self, with_global: bool) {
        let waiting = {
            let mut state = self.lock();
            if with_global {
                state.global = true;
            }
            std::mem::take(&mut state.waiting)
        };
        for (_, tx) in waiting {
            let _ = tx.send(ScriptEvent::Loaded);
        }
    }

    /// Fire `error` on every pending script.
    pub fn fire_error(&self, detail: &str) {
        let waiting = {
            let mut state = self.lock();
            let waiting = std::mem::take(&mut state.waiting);
            state.failed.extend(waiting.iter().map(|(idx, _)| *idx));
            waiting
        };
        for (_, tx) in waiting {
            let _ = tx.send(ScriptEvent::Errored(detail.to_string()));
        }
    }

    /// Number of script tags inserted so far.
    pub fn insertions(&self) -> usize {
        self.lock().inserted.len()
    }

    pub fn inserted_tags(&self) -> Vec<ScriptTag> {
        self.lock().inserted.clone()
    }

    /// Total number of host operations performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` scripts have been inserted.
    pub async fn wait_for_insertions(&self, n: usize) {
        loop {
            let notified = self.inserted_notify.notified();
            if self.insertions() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ScriptHost for FakeHost {
    async fn has_script(&self, src_prefix: &str) -> Result<bool, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        let existing = state
            .existing_tag
            .iter()
            .chain(
                state
                    .inserted
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| !state.failed.contains(idx))
                    .map(|(_, t)| &t.src),
            )
            .any(|src| src.starts_with(src_prefix));
        Ok(existing)
    }

    async fn insert_script(&self, tag: &ScriptTag) -> Result<ScriptEvent, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.current_response();
        let rx = {
            let mut state = self.lock();
            let idx = state.inserted.len();
            state.inserted.push(tag.clone());
            match &response {
                Response::Manual => {
                    let (tx, rx) = oneshot::channel();
                    state.waiting.push((idx, tx));
                    Some(rx)
                }
                Response::Load => {
                    state.global = true;
                    None
                }
                Response::Error(_) => {
                    state.failed.push(idx);
                    None
                }
                _ => None,
            }
        };
        self.inserted_notify.notify_waiters();

        match response {
            Response::Manual => match rx {
                Some(rx) => rx
                    .await
                    .map_err(|_| HostError::new("page discarded before script settled")),
                None => Err(HostError::new("no pending script slot")),
            },
            Response::Load | Response::LoadWithoutGlobal => Ok(ScriptEvent::Loaded),
            Response::Error(detail) => Ok(ScriptEvent::Errored(detail)),
            Response::Hang => std::future::pending().await,
        }
    }

    async fn global_present(&self, _namespace: &str) -> Result<bool, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        match &state.probe_error {
            Some(msg) => Err(HostError::new(msg.clone())),
            None => Ok(state.global),
        }
    }
}
