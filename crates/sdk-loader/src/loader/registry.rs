//! Keyed loader instances, constructed once and shared.
//!
//! The application builds one [`LoaderRegistry`] at startup and passes it to
//! the components that need an SDK. Each external capability, identified by
//! [`LoaderConfig::cache_key`], gets exactly one [`ScriptLoader`].

use super::{LoaderStatus, ScriptLoader};
use crate::config::LoaderConfig;
use crate::error::RegistryError;
use crate::host::ScriptHost;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct LoaderRegistry {
    host: Arc<dyn ScriptHost>,
    loaders: DashMap<String, ScriptLoader>,
}

impl LoaderRegistry {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self {
            host,
            loaders: DashMap::new(),
        }
    }

    /// Return the loader for `config`'s key, creating it on first use.
    ///
    /// Asking again with an identical config returns the same instance.
    /// Asking with a different config for an existing key is an error rather
    /// than a silent no-op; call [`LoaderRegistry::evict`] first.
    pub fn get_instance(&self, config: &LoaderConfig) -> Result<ScriptLoader, RegistryError> {
        let key = config.cache_key();
        match self.loaders.entry(key) {
            Entry::Occupied(entry) => {
                if entry.get().config() == config {
                    Ok(entry.get().clone())
                } else {
                    Err(RegistryError::Reconfigured {
                        key: entry.key().clone(),
                    })
                }
            }
            Entry::Vacant(entry) => {
                debug!(key = %entry.key(), "creating loader");
                let loader = ScriptLoader::new(config.clone(), Arc::clone(&self.host));
                entry.insert(loader.clone());
                Ok(loader)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<ScriptLoader> {
        self.loaders.get(key).map(|l| l.clone())
    }

    /// Drop the loader for `config`'s key so the next `get_instance` builds a
    /// fresh one. Existing handles keep working against the old instance.
    pub fn evict(&self, config: &LoaderConfig) -> Option<ScriptLoader> {
        let removed = self.loaders.remove(&config.cache_key()).map(|(_, l)| l);
        if let Some(loader) = &removed {
            info!(key = %config.cache_key(), status = ?loader.status(), "evicted loader");
        }
        removed
    }

    /// Key and status of every registered loader, sorted by key.
    pub fn statuses(&self) -> Vec<(String, LoaderStatus)> {
        let mut out: Vec<_> = self
            .loaders
            .iter()
            .map(|e| (e.key().clone(), e.value().status()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    fn registry() -> (Arc<FakeHost>, LoaderRegistry) {
        let host = Arc::new(FakeHost::new());
        let registry = LoaderRegistry::new(Arc::clone(&host) as Arc<dyn ScriptHost>);
        (host, registry)
    }

    #[test]
    fn test_same_config_same_instance() {
        let (host, registry) = registry();
        let config = LoaderConfig::new("key_a", ["places"], "weekly");

        let a = registry.get_instance(&config).unwrap();
        let b = registry.get_instance(&config).unwrap();

        assert!(a.ptr_eq(&b));
        assert_eq!(registry.len(), 1);
        assert_eq!(host.calls(), 0);
    }

    #[test]
    fn test_reconfiguration_rejected() {
        let (_host, registry) = registry();
        let config = LoaderConfig::new("key_a", ["places"], "weekly");
        registry.get_instance(&config).unwrap();

        let other = LoaderConfig::new("key_b", ["places"], "weekly");
        let err = registry.get_instance(&other).unwrap_err();
        assert_eq!(
            err,
            RegistryError::Reconfigured {
                key: config.cache_key()
            }
        );
    }

    #[test]
    fn test_distinct_keys_distinct_loaders() {
        let (_host, registry) = registry();
        let maps = LoaderConfig::new("k", ["places"], "weekly");
        let kit = LoaderConfig::new("k", Vec::<String>::new(), "5")
            .with_origin("https://cdn.apple-mapkit.com/mk")
            .with_namespace("mapkit");

        let a = registry.get_instance(&maps).unwrap();
        let b = registry.get_instance(&kit).unwrap();
        assert!(!a.ptr_eq(&b));

        let statuses = registry.statuses();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|(_, s)| *s == LoaderStatus::Uninitialized));
    }

    #[test]
    fn test_evict_allows_new_instance() {
        let (_host, registry) = registry();
        let config = LoaderConfig::new("key_a", ["places"], "weekly");
        let first = registry.get_instance(&config).unwrap();

        let evicted = registry.evict(&config).unwrap();
        assert!(evicted.ptr_eq(&first));
        assert!(registry.is_empty());

        let second = registry.get_instance(&config).unwrap();
        assert!(!second.ptr_eq(&first));
        assert!(registry.get(&config.cache_key()).unwrap().ptr_eq(&second));
    }
}
