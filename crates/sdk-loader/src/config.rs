//! Loader configuration.
//!
//! A [`LoaderConfig`] is captured once when a loader is built and never
//! changes afterwards. It can be assembled in code, read from a JSON file, or
//! taken from `SDK_LOADER_*` environment variables.

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Default script origin (the Google Maps JavaScript API).
pub const DEFAULT_ORIGIN: &str = "https://maps.googleapis.com/maps";
/// Default global namespace the SDK attaches to `window`.
pub const DEFAULT_NAMESPACE: &str = "google.maps";
pub const DEFAULT_VERSION: &str = "weekly";
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 15_000;
/// Upper bound accepted for [`PollPolicy::retries`].
pub const MAX_POLL_RETRIES: u32 = 20;

/// How to wait for the global object when a script tag already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Delay between two probes.
    pub interval_ms: u64,
    /// Upper bound for a single waiting attempt.
    pub timeout_ms: u64,
    /// Extra attempts after the first one times out.
    pub retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            timeout_ms: 5_000,
            retries: 2,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Longest time a full poll can take across all attempts.
    pub fn budget(&self) -> Duration {
        self.timeout()
            .checked_mul(self.attempts())
            .unwrap_or(Duration::MAX)
    }

    /// Total number of waiting attempts, the first one included.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Immutable configuration of one external SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// API key passed as `key=`. Trusted to be URL-safe once validated.
    pub credential: String,
    /// Libraries passed as `libraries=`, comma-joined.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Dotted path of the global object, e.g. `google.maps`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Bound on waiting for the inserted script's `load`/`error` event.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    #[serde(default)]
    pub poll: PollPolicy,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_load_timeout_ms() -> u64 {
    DEFAULT_LOAD_TIMEOUT_MS
}

fn credential_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid credential regex"))
}

impl LoaderConfig {
    /// Build a config with default origin, namespace, and timeouts.
    pub fn new<I, S>(credential: impl Into<String>, features: I, version: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            credential: credential.into(),
            features: features.into_iter().map(Into::into).collect(),
            version: version.into(),
            origin: default_origin(),
            namespace: default_namespace(),
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Origin without a trailing slash.
    fn base(&self) -> &str {
        self.origin.trim_end_matches('/')
    }

    /// The prefix every script URL for this origin starts with. Used to spot
    /// a tag inserted by someone else.
    pub fn script_prefix(&self) -> String {
        format!("{}/api/js", self.base())
    }

    /// `<origin>/api/js?key=<credential>&libraries=<a,b>&v=<version>`.
    ///
    /// Plain interpolation: the credential is not escaped.
    pub fn script_url(&self) -> String {
        format!(
            "{}?key={}&libraries={}&v={}",
            self.script_prefix(),
            self.credential,
            self.features.join(","),
            self.version
        )
    }

    /// Script URL with the credential masked, for logs and error messages.
    pub fn redacted_url(&self) -> String {
        format!(
            "{}?key=***&libraries={}&v={}",
            self.script_prefix(),
            self.features.join(","),
            self.version
        )
    }

    /// Identity of the external capability: one loader per origin and namespace.
    pub fn cache_key(&self) -> String {
        format!("{}#{}", self.base(), self.namespace)
    }

    /// Check the config before handing it to a loader. The loader itself
    /// never re-validates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credential.is_empty() {
            return Err(ConfigError::Missing("credential"));
        }
        if !credential_pattern().is_match(&self.credential) {
            return Err(ConfigError::InvalidCredential(
                "only ASCII letters, digits, '-' and '_' are allowed".to_string(),
            ));
        }

        let origin = url::Url::parse(&self.origin).map_err(|e| ConfigError::InvalidOrigin {
            origin: self.origin.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidOrigin {
                origin: self.origin.clone(),
                reason: format!("unsupported scheme {}", origin.scheme()),
            });
        }

        if self.version.trim().is_empty() {
            return Err(ConfigError::Missing("version"));
        }
        if self.namespace.split('.').any(|part| part.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "namespace",
                reason: format!("{:?} is not a dotted identifier path", self.namespace),
            });
        }
        if let Some(bad) = self.features.iter().find(|f| f.is_empty() || f.contains(',')) {
            return Err(ConfigError::Invalid {
                field: "features",
                reason: format!("{bad:?} is not a feature name"),
            });
        }
        if self.load_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "load_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll.interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll.timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll.retries > MAX_POLL_RETRIES {
            return Err(ConfigError::Invalid {
                field: "poll.retries",
                reason: format!("at most {MAX_POLL_RETRIES} retries are allowed"),
            });
        }
        Ok(())
    }

    /// Read and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a config from `SDK_LOADER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`LoaderConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential = lookup("SDK_LOADER_CREDENTIAL")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("SDK_LOADER_CREDENTIAL"))?;
        let features: Vec<String> = lookup("SDK_LOADER_FEATURES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let version = lookup("SDK_LOADER_VERSION").unwrap_or_else(default_version);

        let mut config = Self::new(credential, features, version);
        if let Some(origin) = lookup("SDK_LOADER_ORIGIN") {
            config.origin = origin;
        }
        if let Some(namespace) = lookup("SDK_LOADER_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(ms) = lookup("SDK_LOADER_TIMEOUT_MS") {
            config.load_timeout_ms = ms.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "SDK_LOADER_TIMEOUT_MS",
                reason: format!("{ms:?} is not a number of milliseconds"),
            })?;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample() -> LoaderConfig {
        LoaderConfig::new("AIzaTestKey_123", ["places", "geometry"], "3.55")
    }

    #[test]
    fn test_script_url_interpolation() {
        assert_eq!(
            sample().script_url(),
            "https://maps.googleapis.com/maps/api/js?key=AIzaTestKey_123&libraries=places,geometry&v=3.55"
        );
    }

    #[test]
    fn test_script_url_without_features() {
        let config = LoaderConfig::new("k", Vec::<String>::new(), "weekly")
            .with_origin("https://cdn.example.com/");
        assert_eq!(
            config.script_url(),
            "https://cdn.example.com/api/js?key=k&libraries=&v=weekly"
        );
        assert_eq!(config.script_prefix(), "https://cdn.example.com/api/js");
    }

    #[test]
    fn test_redacted_url_hides_credential() {
        let url = sample().redacted_url();
        assert!(!url.contains("AIzaTestKey_123"));
        assert!(url.contains("key=***"));
    }

    #[test]
    fn test_cache_key_ignores_credential() {
        let a = sample();
        let mut b = sample();
        b.credential = "other".to_string();
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), a.clone().with_namespace("mapkit").cache_key());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(sample().validate().is_ok());

        let mut c = sample();
        c.credential.clear();
        assert_eq!(c.validate(), Err(ConfigError::Missing("credential")));

        let mut c = sample();
        c.credential = "bad key&x=1".to_string();
        assert!(matches!(c.validate(), Err(ConfigError::InvalidCredential(_))));

        let c = sample().with_origin("ftp://example.com");
        assert!(matches!(c.validate(), Err(ConfigError::InvalidOrigin { .. })));

        let c = sample().with_namespace("google..maps");
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "namespace", .. })
        ));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("SDK_LOADER_CREDENTIAL", "abc-123"),
            ("SDK_LOADER_FEATURES", "places, drawing ,"),
            ("SDK_LOADER_TIMEOUT_MS", "2500"),
        ]
        .into_iter()
        .collect();

        let config = LoaderConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.credential, "abc-123");
        assert_eq!(config.features, vec!["places", "drawing"]);
        assert_eq!(config.version, DEFAULT_VERSION);
        assert_eq!(config.load_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_from_lookup_missing_credential() {
        let err = LoaderConfig::from_lookup(|_| None).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SDK_LOADER_CREDENTIAL"));
    }

    #[test]
    fn test_from_json_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.json");
        std::fs::write(&path, r#"{"credential":"key_1","features":["places"]}"#).unwrap();

        let config = LoaderConfig::from_json_file(&path).unwrap();
        assert_eq!(config.origin, DEFAULT_ORIGIN);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.poll, PollPolicy::default());
    }

    #[test]
    fn test_from_json_file_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LoaderConfig::from_json_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_poll_budget() {
        let poll = PollPolicy {
            interval_ms: 50,
            timeout_ms: 1_000,
            retries: 2,
        };
        assert_eq!(poll.budget(), Duration::from_secs(3));
        assert_eq!(poll.attempts(), 3);

        let poll = PollPolicy {
            interval_ms: 1,
            timeout_ms: u64::MAX,
            retries: u32::MAX,
        };
        assert_eq!(poll.attempts(), u32::MAX);
        assert_eq!(poll.budget(), Duration::MAX);
    }

    #[test]
    fn test_validate_rejects_bad_poll_policy() {
        let mut c = sample();
        c.poll.retries = u32::MAX;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "poll.retries", .. })
        ));

        let mut c = sample();
        c.poll.timeout_ms = 0;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "poll.timeout_ms", .. })
        ));

        let mut c = sample();
        c.poll.interval_ms = 0;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "poll.interval_ms", .. })
        ));

        let mut c = sample();
        c.poll.retries = MAX_POLL_RETRIES;
        assert!(c.validate().is_ok());
    }
}
