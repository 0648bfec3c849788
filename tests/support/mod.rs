use std::path::PathBuf;

use beeblink_server::dispatcher::Dispatcher;
use beeblink_server::fs::volume::DiscoveryConfig;
use beeblink_server::fs::FileSystem;
use beeblink_server::session::Session;
use tempfile::TempDir;
use tokio::fs;

/// A dispatcher wired to a single temp-dir volume root, plus a fresh
/// session. Mirrors the request/response round trip a real link performs.
pub struct Fixture {
    pub tempdir: TempDir,
    pub dispatcher: Dispatcher,
    pub session: Session,
}

impl Fixture {
    pub async fn new() -> Self {
        let tempdir = TempDir::new().expect("create temp dir");
        let discovery = DiscoveryConfig { volume_roots: vec![tempdir.path().to_path_buf()], ..Default::default() };
        Self::with_discovery(tempdir, discovery)
    }

    /// Builds a fixture with a caller-supplied discovery config, for
    /// TubeHost/PC volume roots that `new()` doesn't set up.
    pub fn with_discovery(tempdir: TempDir, discovery: DiscoveryConfig) -> Self {
        let dispatcher = Dispatcher::new(FileSystem::new(discovery), None);
        Self { tempdir, dispatcher, session: Session::new() }
    }

    /// Builds a fixture with a configured ROM image, for `GET_ROM` tests.
    pub async fn with_rom(rom: Vec<u8>) -> Self {
        let tempdir = TempDir::new().expect("create temp dir");
        let discovery = DiscoveryConfig { volume_roots: vec![tempdir.path().to_path_buf()], ..Default::default() };
        let dispatcher = Dispatcher::new(FileSystem::new(discovery), Some(rom));
        Self { tempdir, dispatcher, session: Session::new() }
    }

    pub fn volume_path(&self, name: &str) -> PathBuf {
        self.tempdir.path().join(name)
    }

    /// Creates a bare DFS volume named `name` with drive `0`.
    pub async fn make_dfs_volume(&self, name: &str) {
        fs::create_dir_all(self.volume_path(name).join("0")).await.expect("create drive 0");
    }

    /// Selects `name` as the session's current volume via `*VOL`.
    pub async fn select_volume(&mut self, name: &str) {
        let payload = star_command_payload(&format!("*VOL {name}"));
        let (opcode, resp) = self.dispatcher.dispatch(&mut self.session, 0x0A, &payload).await;
        assert_eq!(opcode, 0x80, "*VOL failed: {resp:?}");
    }

    pub async fn dispatch(&mut self, opcode: u8, payload: &[u8]) -> (u8, Vec<u8>) {
        self.dispatcher.dispatch(&mut self.session, opcode, payload).await
    }
}

/// Encodes a `STAR_COMMAND`/`STAR_RUN` payload: the command line followed by
/// a CR terminator (§6.1).
pub fn star_command_payload(cmdline: &str) -> Vec<u8> {
    let mut out = cmdline.as_bytes().to_vec();
    out.push(0x0D);
    out
}

/// Encodes an `OSFILE` request payload: `A, block(16), name\r, data`.
pub fn osfile_payload(a: u8, load: u32, exec: u32, size: u32, attr: u32, name: &str, data: &[u8]) -> Vec<u8> {
    let mut out = vec![a];
    out.extend_from_slice(&load.to_le_bytes());
    out.extend_from_slice(&exec.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&attr.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(0x0D);
    out.extend_from_slice(data);
    out
}

/// Encodes an `OSFIND` (open) request payload: `A, name\r`.
pub fn osfind_payload(a: u8, name: &str) -> Vec<u8> {
    let mut out = vec![a];
    out.extend_from_slice(name.as_bytes());
    out.push(0x0D);
    out
}
