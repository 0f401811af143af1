//! `sdkload history`: recent load attempts.

use crate::cli::output::{self, Styled};
use crate::journal::LoadJournal;
use anyhow::Result;

pub fn run(limit: usize) -> Result<()> {
    let path = crate::cli::journal_path();
    let records = LoadJournal::tail(&path, limit)?;

    if output::is_json() {
        output::print_json(&serde_json::to_value(&records)?);
        return Ok(());
    }

    let s = Styled::new();
    if records.is_empty() {
        eprintln!("  No load attempts recorded in {}.", path.display());
        return Ok(());
    }

    output::print_section(&s, &format!("Load history ({})", records.len()));
    for r in &records {
        let sym = if r.outcome == "ready" {
            s.ok_sym()
        } else {
            s.fail_sym()
        };
        let class = r.class.map(|c| format!(" [{c}]")).unwrap_or_default();
        eprintln!(
            "    {sym} {}  {:<40} {:>8}  {}{class}",
            s.dim(&r.timestamp),
            r.key,
            output::format_millis(r.duration_ms),
            r.outcome
        );
    }
    Ok(())
}
