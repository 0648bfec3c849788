//! Accept-loop wiring: brings up whichever transports the configuration
//! selects and services each link with the shared dispatcher.
//!
//! There are up to three independent link sources (USB hotplug, one serial
//! port, HTTP), so each runs as its own task and the function returns once
//! all selected ones have ended.

use std::sync::Arc;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::transport::serial::SerialLink;
use crate::transport::usb::{self, UsbLink};
use crate::transport::{http, serve_link};

/// Brings up every transport named in `config.transports` and runs until
/// they all exit (normally this means forever, since USB/serial links are
/// reconnected in a loop and HTTP serves until killed).
pub async fn run(config: Config, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    let mut tasks = tokio::task::JoinSet::new();

    if config.transports.usb {
        let dispatcher = dispatcher.clone();
        tasks.spawn(async move { run_usb(dispatcher).await });
    }

    if let Some(path) = config.transports.serial.clone() {
        let dispatcher = dispatcher.clone();
        tasks.spawn(async move { run_serial(path, dispatcher).await });
    }

    if let Some(addr) = config.transports.http {
        let dispatcher = dispatcher.clone();
        let rom = dispatcher.rom.clone();
        tasks.spawn(async move { http::serve(addr, dispatcher, rom).await });
    }

    if tasks.is_empty() {
        tracing::warn!("no transports configured, server is idle");
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result.expect("transport task panicked") {
            tracing::error!(%err, "transport exited with an error");
        }
    }
    Ok(())
}

/// Loads the configured ROM image once at startup, shared by `GET_ROM`
/// (every transport) and the HTTP link's `GET /beeblink.rom` route.
pub async fn load_rom(config: &Config) -> std::io::Result<Option<Vec<u8>>> {
    match &config.rom {
        Some(path) => Ok(Some(tokio::fs::read(path).await?)),
        None => Ok(None),
    }
}

/// Services the USB link forever, reconnecting on hotplug after every
/// session ends (§4.1.1 "polled at ≥1 Hz").
async fn run_usb(dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    loop {
        let link = UsbLink::wait_for_device(usb::DEFAULT_VENDOR_ID, usb::DEFAULT_PRODUCT_ID)
            .await
            .map_err(std::io::Error::other)?;
        serve_link(link, dispatcher.clone()).await;
    }
}

/// Services the serial link forever, reopening the port if it drops.
async fn run_serial(path: String, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    loop {
        let link = SerialLink::open(&path).map_err(std::io::Error::other)?;
        serve_link(link, dispatcher.clone()).await;
    }
}
