//! Binary entry point: parse flags, load config, wire up logging, and run
//! the accept loop until killed.

use std::sync::Arc;

use beeblink_server::config::{Cli, Config};
use beeblink_server::dispatcher::Dispatcher;
use beeblink_server::fs::FileSystem;
use beeblink_server::server;
use clap::Parser;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli).await?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log_level.clone()))
        .init();

    let fs = FileSystem::new(config.discovery.clone());
    let rom = server::load_rom(&config).await?;
    let dispatcher = Arc::new(Dispatcher::new(fs, rom));

    server::run(config, dispatcher).await
}
