use std::path::PathBuf;
use std::sync::Arc;

use beeblink_server::dispatcher::Dispatcher;
use beeblink_server::fs::volume::DiscoveryConfig;
use beeblink_server::fs::FileSystem;
use beeblink_server::server;

/// Minimal demo: serves a single directory as a DFS volume root over HTTP.
#[tokio::main]
async fn main() -> std::io::Result<()> {
    let path = std::env::args().nth(1).expect("must supply a directory to serve as a DFS volume root");
    let discovery = DiscoveryConfig { volume_roots: vec![PathBuf::from(path)], ..Default::default() };

    let dispatcher = Arc::new(Dispatcher::new(FileSystem::new(discovery.clone()), None));
    println!("serving DFS volume on http://127.0.0.1:48875/request");

    let config = beeblink_server::config::Config {
        discovery,
        first_handle: beeblink_server::session::DEFAULT_FIRST_HANDLE,
        handle_count: beeblink_server::session::DEFAULT_HANDLE_COUNT,
        rom: None,
        log_level: "info".to_owned(),
        transports: beeblink_server::config::Transports { usb: false, serial: None, http: Some("127.0.0.1:48875".parse().unwrap()) },
    };

    server::run(config, dispatcher).await
}
