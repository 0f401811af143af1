use clap::Parser;
use sdk_loader_runtime::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.apply_global_flags();
    cli::init_tracing(cli.json, cli.verbose)?;
    cli.run().await
}
