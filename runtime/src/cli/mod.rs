//! `sdkload` command-line interface.

pub mod check_cmd;
pub mod history_cmd;
pub mod load_cmd;
pub mod output;
pub mod url_cmd;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sdk_loader::LoaderConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sdkload", version, about = "Load a third-party browser SDK exactly once and report readiness")]
pub struct Cli {
    /// Emit machine-readable JSON on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub no_color: bool,

    /// JSON config file. Defaults to ~/.sdk-loader/config.json, then SDK_LOADER_* variables.
    #[arg(long, short, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the script URL the loader would insert.
    Url {
        /// Show the credential instead of masking it.
        #[arg(long)]
        reveal: bool,
    },
    /// Validate the config and fetch the script URL over HTTP.
    Check {
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },
    /// Launch Chromium, load the SDK into a page, and report readiness.
    Load {
        /// Page to load the SDK into.
        #[arg(long, default_value = "about:blank")]
        page: String,
        /// Number of concurrent load() callers.
        #[arg(long, default_value_t = 2)]
        callers: usize,
        /// Show the browser window.
        #[arg(long)]
        headful: bool,
        /// Do not append to the load journal.
        #[arg(long)]
        no_journal: bool,
    },
    /// Show recent load attempts from the journal.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl Cli {
    /// Export global flags so every command sees them through `output`.
    pub fn apply_global_flags(&self) {
        if self.json {
            std::env::set_var("SDKLOAD_JSON", "1");
        }
        if self.quiet {
            std::env::set_var("SDKLOAD_QUIET", "1");
        }
        if self.no_color {
            std::env::set_var("SDKLOAD_NO_COLOR", "1");
        }
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Url { reveal } => {
                let config = resolve_config(self.config.as_deref())?;
                url_cmd::run(&config, reveal)
            }
            Command::Check { timeout_ms } => {
                let config = resolve_config(self.config.as_deref())?;
                check_cmd::run(&config, timeout_ms).await
            }
            Command::Load {
                page,
                callers,
                headful,
                no_journal,
            } => {
                let config = resolve_config(self.config.as_deref())?;
                let opts = load_cmd::LoadOptions {
                    page,
                    callers: callers.max(1),
                    headless: !headful,
                    journal: !no_journal,
                };
                load_cmd::run(&config, &opts).await
            }
            Command::History { limit } => history_cmd::run(limit),
        }
    }
}

/// Install the tracing subscriber. Logs go to stderr so JSON output on
/// stdout stays clean.
pub fn init_tracing(json: bool, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("sdk_loader={level}").parse()?)
        .add_directive(format!("sdk_loader_runtime={level}").parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Base directory for config and journal (`SDK_LOADER_HOME` or `~/.sdk-loader`).
pub fn loader_home() -> PathBuf {
    if let Ok(p) = std::env::var("SDK_LOADER_HOME") {
        return PathBuf::from(p);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".sdk-loader")
}

pub fn journal_path() -> PathBuf {
    loader_home().join("loads.jsonl")
}

/// Explicit file, then the default config file, then the environment.
pub fn resolve_config(explicit: Option<&Path>) -> Result<LoaderConfig> {
    if let Some(path) = explicit {
        return LoaderConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()));
    }

    let default_path = loader_home().join("config.json");
    if default_path.exists() {
        return LoaderConfig::from_json_file(&default_path)
            .with_context(|| format!("loading config from {}", default_path.display()));
    }

    LoaderConfig::from_env().context("reading SDK_LOADER_* environment")
}
