//! Readiness probing.
//!
//! A script can finish loading without the SDK ever attaching its global
//! object, so readiness always means "the global object is present".

use crate::config::PollPolicy;
use crate::error::{HostError, LoadError};
use crate::host::ScriptHost;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

/// Probe once for the global object.
pub async fn probe_ready(host: &dyn ScriptHost, namespace: &str) -> Result<bool, HostError> {
    let present = host.global_present(namespace).await?;
    debug!(namespace, present, "readiness probe");
    Ok(present)
}

/// Wait for the global object to appear, probing every `policy.interval`.
///
/// Each attempt is bounded by `policy.timeout`; up to `policy.retries`
/// further attempts follow a timed-out or failed one. Returns
/// [`LoadError::Timeout`] once every attempt timed out, or the last host
/// error if the final attempt failed on the host side.
pub async fn wait_for_global(
    host: &dyn ScriptHost,
    namespace: &str,
    policy: &PollPolicy,
) -> Result<(), LoadError> {
    let attempts = policy.attempts();

    for attempt in 1..=attempts {
        match time::timeout(policy.timeout(), poll_until_present(host, namespace, policy)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) if attempt == attempts => return Err(e.into()),
            Ok(Err(e)) => {
                warn!(namespace, attempt, error = %e, "probe failed, retrying");
                time::sleep(policy.interval()).await;
            }
            Err(_) => {
                warn!(namespace, attempt, attempts, "global object still missing");
            }
        }
    }

    Err(LoadError::Timeout {
        waited: policy.budget(),
        stage: "global object",
    })
}

async fn poll_until_present(
    host: &dyn ScriptHost,
    namespace: &str,
    policy: &PollPolicy,
) -> Result<(), HostError> {
    let mut ticker = time::interval(policy.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if probe_ready(host, namespace).await? {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use std::sync::Arc;
    use std::time::Duration;

    fn policy() -> PollPolicy {
        PollPolicy {
            interval_ms: 100,
            timeout_ms: 1_000,
            retries: 1,
        }
    }

    #[tokio::test]
    async fn test_probe_ready() {
        let host = FakeHost::new();
        assert!(!probe_ready(&host, "google.maps").await.unwrap());
        host.set_global(true);
        assert!(probe_ready(&host, "google.maps").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_global_present_immediately() {
        let host = FakeHost::new();
        host.set_global(true);
        wait_for_global(&host, "google.maps", &policy()).await.unwrap();
        assert_eq!(host.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_global_appears_later() {
        let host = Arc::new(FakeHost::new());
        let setter = Arc::clone(&host);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_350)).await;
            setter.set_global(true);
        });

        // First attempt times out at 1s, the retry sees the object.
        wait_for_global(host.as_ref(), "google.maps", &policy())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_global_times_out() {
        let host = FakeHost::new();
        let err = wait_for_global(&host, "google.maps", &policy())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LoadError::Timeout {
                waited: Duration::from_secs(2),
                stage: "global object",
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_global_host_error_surfaces() {
        let host = FakeHost::new();
        host.set_probe_error(Some("target closed"));
        let err = wait_for_global(&host, "google.maps", &policy())
            .await
            .unwrap_err();
        assert_eq!(err, LoadError::Host(HostError::new("target closed")));
    }
}
