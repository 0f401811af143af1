//! `sdkload url`: print the script URL.

use crate::cli::output;
use anyhow::Result;
use sdk_loader::LoaderConfig;

pub fn run(config: &LoaderConfig, reveal: bool) -> Result<()> {
    let url = if reveal {
        config.script_url()
    } else {
        config.redacted_url()
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "url": url,
            "key": config.cache_key(),
            "namespace": config.namespace,
        }));
    } else {
        println!("{url}");
    }
    Ok(())
}
