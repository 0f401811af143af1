//! HTTP preflight for the SDK script URL.
//!
//! Fetches the script outside the browser so an operator can tell a network
//! or credential problem apart from an SDK that loads but never initializes.
//! A 2xx answer does not prove the credential is accepted: some providers
//! serve the script anyway and reject the key at runtime.

use anyhow::{Context, Result};
use sdk_loader::{LoadError, LoaderConfig};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

/// What the script URL answered.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    /// Script URL with the credential masked.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: usize,
    pub elapsed_ms: u64,
}

impl PreflightReport {
    /// The load failure a browser would most likely report, if any.
    pub fn failure(&self) -> Option<LoadError> {
        let detail = if !(200..300).contains(&self.status) {
            format!("HTTP {}", self.status)
        } else if self.bytes == 0 {
            "empty response body".to_string()
        } else {
            return None;
        };
        Some(LoadError::Network {
            url: self.url.clone(),
            detail,
        })
    }

    /// Whether the body looks like JavaScript.
    pub fn is_javascript(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("javascript") || ct.contains("ecmascript"))
            .unwrap_or(false)
    }
}

/// GET the config's script URL with a bounded timeout.
///
/// Transport failures come back as a [`LoadError::Network`] wrapped in
/// `anyhow`; HTTP-level failures are reported through
/// [`PreflightReport::failure`].
pub async fn preflight(config: &LoaderConfig, timeout: Duration) -> Result<PreflightReport> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")?;

    let url = config.redacted_url();
    let started = Instant::now();
    let response = client
        .get(config.script_url())
        .send()
        .await
        .map_err(|e| LoadError::Network {
            url: url.clone(),
            detail: transport_detail(&e),
        })?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = response
        .bytes()
        .await
        .map_err(|e| LoadError::Network {
            url: url.clone(),
            detail: transport_detail(&e),
        })?;

    let report = PreflightReport {
        url,
        status,
        content_type,
        bytes: body.len(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(status, bytes = report.bytes, elapsed_ms = report.elapsed_ms, "preflight done");
    Ok(report)
}

fn transport_detail(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        // The top-level message embeds the URL, and with it the credential.
        std::error::Error::source(e)
            .map(|source| source.to_string())
            .unwrap_or_else(|| "request failed".to_string())
    }
}
