//! CLI flags and optional on-disk config file (§2.3 ambient stack).
//!
//! The wire protocol and filing-system semantics are fully specified; the
//! operator-facing surface (which transport to bring up, which directories
//! are volumes) is not, so this module defines one directly rather than
//! guessing at an existing tool's flag names.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::fs::volume::DiscoveryConfig;
use crate::session::{DEFAULT_FIRST_HANDLE, DEFAULT_HANDLE_COUNT};

#[derive(Debug, Parser)]
#[command(name = "beeblink-server", about = "Host-side filing system server for the BeebLink protocol")]
pub struct Cli {
    /// Path to an optional TOML config file; CLI flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bring up the USB link (fixed VID/PID device).
    #[arg(long)]
    pub usb: bool,

    /// Bring up a serial link on the given port path (e.g. `/dev/ttyUSB0`).
    #[arg(long)]
    pub serial: Option<String>,

    /// Bring up the HTTP link, bound to the given address.
    #[arg(long)]
    pub http: Option<SocketAddr>,

    /// Directory to scan for DFS/ADFS volumes; repeatable.
    #[arg(long = "volume-root")]
    pub volume_roots: Vec<PathBuf>,

    /// Directory to scan for TubeHost changer folders; repeatable.
    #[arg(long = "tubehost-root")]
    pub tubehost_roots: Vec<PathBuf>,

    /// Directory to serve as a read-only PC volume; repeatable.
    #[arg(long = "pc-root")]
    pub pc_roots: Vec<PathBuf>,

    /// First file handle issued to a session before any `SET_FILE_HANDLE_RANGE`.
    #[arg(long, default_value_t = DEFAULT_FIRST_HANDLE)]
    pub first_handle: u8,

    /// Number of file handles issued to a session before any `SET_FILE_HANDLE_RANGE`.
    #[arg(long, default_value_t = DEFAULT_HANDLE_COUNT)]
    pub handle_count: u8,

    /// Path to a BBC-side ROM image served by `GET_ROM`/`GET /beeblink.rom`.
    #[arg(long)]
    pub rom: Option<PathBuf>,

    /// `tracing-subscriber` env-filter directive, e.g. `beeblink_server=debug`.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// The on-disk config file shape merged under CLI flags (§2.3).
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub volume_roots: Vec<PathBuf>,
    #[serde(default)]
    pub tubehost_roots: Vec<PathBuf>,
    #[serde(default)]
    pub pc_roots: Vec<PathBuf>,
    pub first_handle: Option<u8>,
    pub handle_count: Option<u8>,
    pub log_level: Option<String>,
}

/// Fully resolved server configuration: CLI flags layered over an optional
/// config file, with CLI values taking precedence wherever both are set.
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub first_handle: u8,
    pub handle_count: u8,
    pub rom: Option<PathBuf>,
    pub log_level: String,
    pub transports: Transports,
}

pub struct Transports {
    pub usb: bool,
    pub serial: Option<String>,
    pub http: Option<SocketAddr>,
}

impl Config {
    pub async fn load(cli: Cli) -> std::io::Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let text = tokio::fs::read_to_string(path).await?;
                toml::from_str(&text).map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?
            }
            None => ConfigFile::default(),
        };

        let volume_roots = merged(cli.volume_roots, file.volume_roots);
        let tubehost_roots = merged(cli.tubehost_roots, file.tubehost_roots);
        let pc_roots = merged(cli.pc_roots, file.pc_roots);

        Ok(Self {
            discovery: DiscoveryConfig { volume_roots, tubehost_roots, pc_roots },
            first_handle: if cli.first_handle != DEFAULT_FIRST_HANDLE { cli.first_handle } else { file.first_handle.unwrap_or(cli.first_handle) },
            handle_count: if cli.handle_count != DEFAULT_HANDLE_COUNT { cli.handle_count } else { file.handle_count.unwrap_or(cli.handle_count) },
            rom: cli.rom,
            log_level: file.log_level.unwrap_or(cli.log_level),
            transports: Transports { usb: cli.usb, serial: cli.serial, http: cli.http },
        })
    }
}

fn merged(cli: Vec<PathBuf>, file: Vec<PathBuf>) -> Vec<PathBuf> {
    if cli.is_empty() { file } else { cli }
}
