//! Browser runtime for the single-flight SDK loader.
//!
//! Connects [`sdk_loader`] to real pages: a Chromium [`renderer`], a
//! [`page_host::PageScriptHost`] that performs the loader's DOM operations
//! through JavaScript, an HTTP [`preflight`], a JSONL [`journal`] of load
//! attempts, and the `sdkload` [`cli`].

pub mod cli;
pub mod journal;
pub mod page_host;
pub mod preflight;
pub mod renderer;
