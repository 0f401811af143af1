//! Single-flight loader for third-party browser SDK scripts.
//!
//! A [`ScriptLoader`] makes sure an external script (a mapping SDK, say) is
//! inserted into a page at most once, no matter how many callers ask for it at
//! the same time. Readiness is decided by probing for the SDK's global
//! namespace object, not by the script's `load` event alone.
//!
//! Loaders are handed out by a [`LoaderRegistry`] that the application builds
//! once at startup and passes to whatever needs it. The page itself is reached
//! through the [`ScriptHost`] trait so tests can inject
//! [`testing::FakeHost`].

pub mod config;
pub mod error;
pub mod host;
pub mod loader;
pub mod testing;

pub use config::{LoaderConfig, PollPolicy};
pub use error::{ConfigError, FailureClass, HostError, LoadError, RegistryError};
pub use host::{ScriptEvent, ScriptHost, ScriptTag};
pub use loader::registry::LoaderRegistry;
pub use loader::{LoaderStatus, ScriptLoader};
