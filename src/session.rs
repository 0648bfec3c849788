//! Per-link session state (§4.2 "The dispatcher also owns... the
//! file-handle table"; §3 "Lifecycle"). One [`Session`] exists per link id,
//! created lazily on first request and torn down on link loss.

use crate::error::{BbcError, BbcResult};
use crate::fs::openfile::HandleTable;
use crate::fs::path::{FilePath, Fqn};
use crate::fs::volume::Volume;

/// Default first handle and count for a session's file-handle range
/// (`SET_FILE_HANDLE_RANGE` can reconfigure this, §4.2).
pub const DEFAULT_FIRST_HANDLE: u8 = 0xB0;
pub const DEFAULT_HANDLE_COUNT: u8 = 16;

/// State tracked per BBC link: current volume/drive/dir, the library
/// drive/dir (used when a path omits its dir and isn't found in the
/// current one), the open-file-handle table, and the last `*CAT`/command
/// output string surfaced to `READ_STRING`.
pub struct Session {
    pub volume: Option<Volume>,
    pub current_drive: String,
    pub current_dir: String,
    pub previous_dir: String,
    pub library_drive: String,
    pub library_dir: String,
    pub boot_option: u8,
    pub handles: HandleTable,
    pub server_string: Vec<u8>,
    server_string_pos: usize,
}

impl Session {
    pub fn new() -> Self {
        Self {
            volume: None,
            current_drive: "0".to_owned(),
            current_dir: "$".to_owned(),
            previous_dir: "$".to_owned(),
            library_drive: "0".to_owned(),
            library_dir: "$".to_owned(),
            boot_option: 0,
            handles: HandleTable::new(DEFAULT_FIRST_HANDLE, DEFAULT_HANDLE_COUNT),
            server_string: Vec::new(),
            server_string_pos: 0,
        }
    }

    pub fn volume(&self) -> BbcResult<&Volume> {
        self.volume.as_ref().ok_or_else(BbcError::no_volume)
    }

    /// Fills in drive/dir defaults from session state for any component the
    /// wire left implicit (§3 "FilePath" — the *explicit* flags record
    /// which components actually came from the BBC).
    pub fn default_path(&self, mut path: FilePath) -> FilePath {
        if path.drive.is_none() {
            path.drive = Some(self.current_drive.clone());
        }
        if path.dir.is_none() {
            path.dir = Some(self.current_dir.clone());
        }
        path
    }

    pub fn default_fqn(&self, mut fqn: Fqn) -> Fqn {
        fqn.path = self.default_path(fqn.path);
        fqn
    }

    /// Sets the `*CAT`/`*`-command reply text surfaced by `READ_STRING`.
    pub fn set_server_string(&mut self, text: String) {
        self.server_string = text.into_bytes();
        self.server_string_pos = 0;
    }

    /// `READ_STRING`/`READ_STRING_VERBOSE`: returns up to `max` remaining
    /// characters of the server string, or `None` once drained.
    pub fn read_server_string(&mut self, max: usize) -> Option<Vec<u8>> {
        if self.server_string_pos >= self.server_string.len() {
            return None;
        }
        let end = (self.server_string_pos + max).min(self.server_string.len());
        let chunk = self.server_string[self.server_string_pos..end].to_vec();
        self.server_string_pos = end;
        Some(chunk)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
