use anyhow::Result;
use tracing::info;

use sable_uci::UciEngine;

fn main() -> Result<()> {
    // UCI owns stdout; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
    info!("sable starting");

    UciEngine::new().run()?;
    Ok(())
}
