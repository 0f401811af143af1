//! `sdkload load`: load the SDK into a real page.

use crate::cli::output::{self, Styled};
use crate::journal::{LoadJournal, LoadRecord};
use crate::page_host::PageScriptHost;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use futures::future::join_all;
use sdk_loader::{LoadError, LoaderConfig, LoaderRegistry, ScriptHost};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub page: String,
    pub callers: usize,
    pub headless: bool,
    pub journal: bool,
}

/// What happened when the SDK was loaded into one page.
#[derive(Debug)]
pub struct LoadSummary {
    pub final_url: String,
    pub result: std::result::Result<(), LoadError>,
    /// Callers whose `load()` resolved successfully.
    pub callers_ready: usize,
    /// Tags inserted by this run.
    pub insertions: usize,
    /// Matching `<script>` elements that had not errored, counted afterwards.
    pub tags_in_page: usize,
    pub duration_ms: u64,
}

pub async fn run(config: &LoaderConfig, opts: &LoadOptions) -> Result<()> {
    let s = Styled::new();
    if !output::is_quiet() && !output::is_json() {
        eprintln!("  Loading {} into {} ...", config.redacted_url(), opts.page);
    }

    let renderer = ChromiumRenderer::launch(opts.headless).await?;
    let outcome = drive(&renderer, config, opts).await;
    if let Err(e) = renderer.shutdown().await {
        warn!("browser shutdown failed: {e:#}");
    }
    let summary = outcome?;

    if opts.journal {
        let record = LoadRecord::new(
            config,
            &opts.page,
            opts.callers,
            summary.insertions,
            &summary.result,
            summary.duration_ms,
        );
        match LoadJournal::open(&crate::cli::journal_path()) {
            Ok(mut journal) => {
                journal.append(&record)?;
                debug!(path = %journal.path().display(), "load recorded");
            }
            Err(e) => warn!("journal unavailable: {e:#}"),
        }
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "page": summary.final_url,
            "ready": summary.result.is_ok(),
            "class": summary.result.as_ref().err().map(|e| e.class()),
            "error": summary.result.as_ref().err().map(|e| e.to_string()),
            "callers": opts.callers,
            "callers_ready": summary.callers_ready,
            "insertions": summary.insertions,
            "tags_in_page": summary.tags_in_page,
            "duration_ms": summary.duration_ms,
        }));
    } else if !output::is_quiet() {
        print_summary(&s, opts, &summary);
    }

    if summary.result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

/// Open a page, run `opts.callers` concurrent loads through one registry
/// loader, and collect the outcome.
pub async fn drive(
    renderer: &dyn Renderer,
    config: &LoaderConfig,
    opts: &LoadOptions,
) -> Result<LoadSummary> {
    let mut context = renderer.new_context().await?;
    let nav = context
        .navigate(&opts.page, NAVIGATION_TIMEOUT_MS)
        .await
        .with_context(|| format!("opening {}", opts.page))?;
    debug!(final_url = %nav.final_url, load_time_ms = nav.load_time_ms, "page ready");

    let host = Arc::new(PageScriptHost::new(context));
    let registry = LoaderRegistry::new(Arc::clone(&host) as Arc<dyn ScriptHost>);
    let loader = registry.get_instance(config)?;

    let started = Instant::now();
    let results = join_all((0..opts.callers).map(|_| {
        let loader = loader.clone();
        async move { loader.load().await }
    }))
    .await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let callers_ready = results.iter().filter(|r| r.is_ok()).count();
    let result = results
        .into_iter()
        .find(|r| r.is_err())
        .unwrap_or(Ok(()));

    let tags_in_page = match host.count_scripts(&config.script_prefix()).await {
        Ok(n) => n,
        Err(e) => {
            warn!("could not count script tags: {e}");
            0
        }
    };
    let insertions = host.insertions();

    drop(loader);
    drop(registry);
    match Arc::try_unwrap(host) {
        Ok(host) => {
            if let Err(e) = host.into_context().close().await {
                warn!("closing page failed: {e:#}");
            }
        }
        Err(_) => debug!("page still referenced, leaving it to browser shutdown"),
    }

    Ok(LoadSummary {
        final_url: nav.final_url,
        result,
        callers_ready,
        insertions,
        tags_in_page,
        duration_ms,
    })
}

fn print_summary(s: &Styled, opts: &LoadOptions, summary: &LoadSummary) {
    eprintln!();
    output::print_section(s, "Result");
    output::print_check(" ", "Page:", &summary.final_url);
    output::print_check(
        " ",
        "Callers:",
        &format!("{} / {} ready", summary.callers_ready, opts.callers),
    );
    output::print_check(
        " ",
        "Script tags:",
        &format!(
            "{} inserted, {} live in page",
            summary.insertions, summary.tags_in_page
        ),
    );
    match &summary.result {
        Ok(()) => output::print_check(
            s.ok_sym(),
            "SDK:",
            &format!("ready in {}", output::format_millis(summary.duration_ms)),
        ),
        Err(e) => {
            output::print_check(s.fail_sym(), "SDK:", &format!("unavailable ({})", e.class()));
            output::print_detail(&e.to_string());
            output::print_detail("Render the static fallback instead of the widget.");
        }
    }
}
