use anyhow::Result;
use educonnect::{build_runtime, run, shutdown_signal, Config};
use std::path::PathBuf;
use tracing::info;

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    edu_metrics::tracing::init(&config.logging)?;

    info!(
        "Starting EduConnect on {} with {} workers",
        config.bind_address(),
        config.server.workers
    );

    let runtime = build_runtime(&config.server)?;
    runtime.block_on(run(config, shutdown_signal()))
}
