//! Error taxonomy for configuration, loading, and the loader registry.
//!
//! Load failures are `Clone` because one outcome is fanned out to every
//! caller waiting on the same pending load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Invalid or unreadable loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("invalid origin {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// The page (or whatever stands in for it) could not perform an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host error: {0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Coarse classification of a load failure, for operators and UI fallbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    Network,
    Integration,
    Timeout,
    Host,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureClass::Network => "network",
            FailureClass::Integration => "integration",
            FailureClass::Timeout => "timeout",
            FailureClass::Host => "host",
        };
        f.write_str(s)
    }
}

/// Why a load did not reach the ready state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The script's `error` event fired.
    #[error(
        "script request failed for {url} ({detail}); likely causes: invalid or \
         restricted credential, a required feature not enabled for this \
         credential, or a network failure"
    )]
    Network { url: String, detail: String },

    /// The script loaded but the SDK never attached its global object.
    #[error(
        "{namespace} object not available after script load; the script ran \
         but the SDK did not initialize (credential rejected at runtime or \
         unexpected namespace)"
    )]
    Integration { namespace: String },

    #[error("timed out after {waited:?} waiting for {stage}")]
    Timeout { waited: Duration, stage: &'static str },

    #[error(transparent)]
    Host(#[from] HostError),

    /// The background load task died before producing an outcome.
    #[error("load task aborted: {0}")]
    Aborted(String),
}

impl LoadError {
    pub fn class(&self) -> FailureClass {
        match self {
            LoadError::Network { .. } => FailureClass::Network,
            LoadError::Integration { .. } => FailureClass::Integration,
            LoadError::Timeout { .. } => FailureClass::Timeout,
            LoadError::Host(_) | LoadError::Aborted(_) => FailureClass::Host,
        }
    }
}

/// Misuse of the [`crate::LoaderRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A loader already exists for this key with a different configuration.
    #[error("loader for {key} already configured differently; evict it before reconfiguring")]
    Reconfigured { key: String },
}
