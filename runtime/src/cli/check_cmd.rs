//! `sdkload check`: config validation plus an HTTP preflight.

use crate::cli::output::{self, Styled};
use crate::preflight::{preflight, PreflightReport};
use anyhow::Result;
use sdk_loader::LoaderConfig;
use std::time::Duration;

pub async fn run(config: &LoaderConfig, timeout_ms: u64) -> Result<()> {
    let s = Styled::new();
    let result = preflight(config, Duration::from_millis(timeout_ms)).await;
    let ok = is_reachable(&result);

    if output::is_json() {
        let value = match &result {
            Ok(report) => serde_json::json!({
                "config": "ok",
                "reachable": ok,
                "preflight": report,
                "failure": report.failure().map(|e| e.to_string()),
            }),
            Err(e) => serde_json::json!({
                "config": "ok",
                "reachable": ok,
                "error": format!("{e:#}"),
            }),
        };
        output::print_json(&value);
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    output::print_header(&s);
    output::print_section(&s, "Config");
    output::print_check(s.ok_sym(), "Key:", &config.cache_key());
    output::print_check(s.ok_sym(), "Script:", &config.redacted_url());
    eprintln!();

    output::print_section(&s, "Preflight");
    match &result {
        Ok(report) => match report.failure() {
            None => {
                output::print_check(
                    s.ok_sym(),
                    "Fetch:",
                    &format!(
                        "HTTP {} in {}, {}",
                        report.status,
                        output::format_millis(report.elapsed_ms),
                        output::format_size(report.bytes as u64)
                    ),
                );
                if !report.is_javascript() {
                    output::print_check(
                        s.warn_sym(),
                        "Content-Type:",
                        report.content_type.as_deref().unwrap_or("missing"),
                    );
                    output::print_detail("Expected a JavaScript response; check the origin.");
                }
            }
            Some(e) => {
                output::print_check(s.fail_sym(), "Fetch:", &format!("HTTP {}", report.status));
                output::print_detail(&e.to_string());
            }
        },
        Err(e) => {
            output::print_check(s.fail_sym(), "Fetch:", &s.red("failed"));
            output::print_detail(&format!("{e:#}"));
        }
    }

    eprintln!();
    if ok {
        eprintln!("  {}", s.green("Script reachable."));
    } else {
        eprintln!("  {}", s.red("Script unreachable; the SDK would be unavailable."));
        std::process::exit(1);
    }
    Ok(())
}

/// Whether the preflight says a browser could fetch the script.
fn is_reachable(result: &Result<PreflightReport>) -> bool {
    matches!(result, Ok(report) if report.failure().is_none())
}
