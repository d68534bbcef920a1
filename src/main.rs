mod analysis;
mod app;
mod bridge;
mod config;
mod db;
mod domain;
mod infrastructure;
mod notify;
mod tasks;
#[cfg(test)]
mod test_support;

use std::time::Duration;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(async {
        let (shutdown, _) = shutdown::Shutdown::new();
        shutdown::install_signal_handlers(shutdown.clone());

        let app = app::PhishGuardApp::initialize(config, paths, shutdown.clone()).await?;
        app.run().await
    });
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}
