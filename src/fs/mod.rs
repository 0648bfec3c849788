//! The filing-system façade (§4.3): routes dispatcher-level operations to
//! the current volume's FS-type adapter and owns open-file bookkeeping.
//!
//! Per the §9 "Dynamic dispatch across FS types" design note, FS-type
//! dispatch is a tagged variant with a single capability trait
//! ([`FsAdapter`]) rather than `instanceof`-style downcasts: each adapter
//! implements the whole trait, with capability-specific methods (TubeHost's
//! changer commands, ADFS's `*BACK`) defaulting to [`BbcError::NotSupported`]
//! for adapters that don't support them.

pub mod adfs;
pub mod dfs;
pub mod escape;
pub mod inf;
pub mod object;
pub mod openfile;
pub mod path;
pub mod pc;
pub mod tubehost;
pub mod volume;
pub mod wildcard;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BbcError, BbcResult};
use crate::fs::object::{Attr, FsObject};
use crate::fs::openfile::{HandleTable, OpenFile};
use crate::fs::path::{parse_dir, parse_fqn, FilePath, Fqn};
use crate::fs::volume::{DiscoveryConfig, FsType, Volume};
use crate::gitattributes::{GitAttributes, NoGitAttributes};

/// Per-FS-type capability table (§9). Every operation the dispatcher can
/// invoke on the current volume goes through this trait; adapters that
/// don't support a given capability (e.g. PC's writes, DFS's `*BACK`)
/// return [`BbcError::NotSupported`] rather than being downcast away.
#[async_trait]
pub trait FsAdapter: Send + Sync {
    /// Maximum leaf-name length this FS type allows (§3 "FQN").
    fn max_name_len(&self) -> usize;

    /// Lists on-disk objects in `fqn.path`'s directory matching `fqn.name`
    /// (an AFSP pattern).
    async fn find_objects(&self, volume: &Volume, fqn: &Fqn) -> BbcResult<Vec<FsObject>>;

    /// Reads an object's full contents into memory.
    async fn read_bytes(&self, object: &FsObject) -> BbcResult<Vec<u8>>;

    /// `OSFILE SAVE`: creates (or overwrites) a file with the given
    /// load/exec addresses and contents.
    async fn write_file(&self, volume: &Volume, fqn: &Fqn, load: u32, exec: u32, data: &[u8]) -> BbcResult<FsObject>;

    /// `OSFILE WRITE_CAT/WRITE_LOAD/WRITE_EXEC/WRITE_ATTR`: updates metadata
    /// for an existing object without touching its contents.
    async fn write_meta(
        &self,
        volume: &Volume,
        object: &FsObject,
        load: Option<u32>,
        exec: Option<u32>,
        attr: Option<Attr>,
    ) -> BbcResult<FsObject>;

    async fn delete(&self, volume: &Volume, object: &FsObject) -> BbcResult<()>;

    async fn rename(&self, volume: &Volume, from: &FsObject, to: &Fqn) -> BbcResult<FsObject>;

    async fn create_dir(&self, volume: &Volume, fqn: &Fqn) -> BbcResult<FsObject>;

    /// Parses an attribute string (`*ACCESS`) into this FS type's [`Attr`]
    /// bits; DFS accepts only empty/`L`, ADFS accepts any subset of `RWLE`.
    fn parse_attr(&self, text: &str) -> BbcResult<Attr>;

    /// Formats an object's attributes the way this FS type's `*INFO` does.
    fn format_attr(&self, attr: Attr) -> String;

    /// ADFS `*BACK`: swap the saved previous directory with the current
    /// one. Default: unsupported.
    fn swap_back(&self, _current_dir: &str, _previous_dir: &str) -> BbcResult<(String, String)> {
        Err(BbcError::NotSupported)
    }

    /// TubeHost `*DIN drive name`: insert a disk into a changer slot.
    /// Default: unsupported.
    async fn insert_disk(&self, _volume: &Volume, _drive: &str, _name: &str) -> BbcResult<()> {
        Err(BbcError::NotSupported)
    }

    /// TubeHost `*DOUT drive`: eject a changer slot. Default: unsupported.
    async fn eject_disk(&self, _volume: &Volume, _drive: &str) -> BbcResult<()> {
        Err(BbcError::NotSupported)
    }

    /// TubeHost `*HFOLDERS`: lists the host folders available under the
    /// volume root. Default: unsupported.
    async fn list_folders(&self, _volume: &Volume) -> BbcResult<Vec<String>> {
        Err(BbcError::NotSupported)
    }

    /// TubeHost `*HMKF name`: creates a new host folder. Default:
    /// unsupported.
    async fn make_folder(&self, _volume: &Volume, _name: &str) -> BbcResult<()> {
        Err(BbcError::NotSupported)
    }

    /// TubeHost `*HCF name`: selects the host folder that `*DCAT`/`*DCREATE`
    /// operate on by default. Default: unsupported.
    async fn set_current_folder(&self, _volume: &Volume, _name: &str) -> BbcResult<()> {
        Err(BbcError::NotSupported)
    }

    /// TubeHost `*DCAT [folder]`: lists the disks (sub-folders) within a
    /// host folder, or the selected one if omitted. Default: unsupported.
    async fn list_disks(&self, _volume: &Volume, _folder: Option<&str>) -> BbcResult<Vec<String>> {
        Err(BbcError::NotSupported)
    }

    /// TubeHost `*DCREATE name`: creates a new disk within the selected
    /// host folder. Default: unsupported.
    async fn create_disk(&self, _volume: &Volume, _name: &str) -> BbcResult<()> {
        Err(BbcError::NotSupported)
    }
}

/// The set of FS-type adapters available to the façade, one per
/// [`FsType`] (§9 "Global FS-type registry" — explicit construction and
/// injection replaces the source's module-level mutable refs).
pub struct AdapterSet {
    pub dfs: Arc<dyn FsAdapter>,
    pub adfs: Arc<dyn FsAdapter>,
    pub tubehost: Arc<dyn FsAdapter>,
    pub pc: Arc<dyn FsAdapter>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self {
            dfs: Arc::new(dfs::Dfs),
            adfs: Arc::new(adfs::Adfs),
            tubehost: Arc::new(tubehost::TubeHost::default()),
            pc: Arc::new(pc::Pc),
        }
    }

    pub fn for_type(&self, fs_type: FsType) -> &Arc<dyn FsAdapter> {
        match fs_type {
            FsType::Dfs => &self.dfs,
            FsType::Adfs => &self.adfs,
            FsType::TubeHost => &self.tubehost,
            FsType::Pc => &self.pc,
        }
    }
}

impl Default for AdapterSet {
    fn default() -> Self {
        Self::new()
    }
}

/// The filing-system façade, shared across sessions. Volume discovery
/// config is immutable after startup; volumes themselves are rescanned per
/// query rather than cached (§5).
pub struct FileSystem {
    adapters: AdapterSet,
    discovery: DiscoveryConfig,
    gitattributes: Arc<dyn GitAttributes>,
}

impl FileSystem {
    pub fn new(discovery: DiscoveryConfig) -> Self {
        Self { adapters: AdapterSet::new(), discovery, gitattributes: Arc::new(NoGitAttributes) }
    }

    /// Builds a façade with a caller-supplied `.gitattributes` policy in
    /// place of the default no-op.
    pub fn with_gitattributes(discovery: DiscoveryConfig, gitattributes: Arc<dyn GitAttributes>) -> Self {
        Self { adapters: AdapterSet::new(), discovery, gitattributes }
    }

    pub async fn volumes(&self) -> BbcResult<Vec<Volume>> {
        volume::discover(&self.discovery).await
    }

    pub async fn find_volume(&self, pattern: &str) -> BbcResult<Volume> {
        let volumes = self.volumes().await?;
        let volume = volume::select(&volumes, pattern).cloned()?;
        self.gitattributes.mark_volume_not_text(volume.root())?;
        Ok(volume)
    }

    fn adapter_for(&self, volume: &Volume) -> &Arc<dyn FsAdapter> {
        self.adapters.for_type(volume.fs_type)
    }

    pub fn parse_file(&self, input: &str) -> BbcResult<Fqn> {
        parse_fqn(input)
    }

    pub fn parse_dir(&self, input: &str) -> BbcResult<FilePath> {
        parse_dir(input)
    }

    pub async fn find_objects(&self, volume: &Volume, fqn: &Fqn) -> BbcResult<Vec<FsObject>> {
        self.adapter_for(volume).find_objects(volume, fqn).await
    }

    /// Exactly-one-or-none variant of [`Self::find_objects`]; ambiguity
    /// (more than one match) is an error even when wildcards are allowed.
    pub async fn get_object(&self, volume: &Volume, fqn: &Fqn, wildcards_ok: bool) -> BbcResult<Option<FsObject>> {
        if !wildcards_ok && wildcard::is_wildcarded(&fqn.name) {
            return Err(BbcError::BadName);
        }
        let mut matches = self.find_objects(volume, fqn).await?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches.remove(0))),
            _ => Err(BbcError::AmbiguousName),
        }
    }

    pub async fn write_file(&self, volume: &Volume, fqn: &Fqn, load: u32, exec: u32, data: &[u8]) -> BbcResult<FsObject> {
        if volume.read_only {
            return Err(BbcError::VolumeReadOnly);
        }
        let object = self.adapter_for(volume).write_file(volume, fqn, load, exec, data).await?;
        self.gitattributes.mark_file_basic(object.server_path.as_path())?;
        Ok(object)
    }

    pub async fn write_meta(
        &self,
        volume: &Volume,
        object: &FsObject,
        load: Option<u32>,
        exec: Option<u32>,
        attr: Option<Attr>,
    ) -> BbcResult<FsObject> {
        if volume.read_only {
            return Err(BbcError::VolumeReadOnly);
        }
        self.adapter_for(volume).write_meta(volume, object, load, exec, attr).await
    }

    pub async fn delete(&self, volume: &Volume, object: &FsObject) -> BbcResult<()> {
        if volume.read_only {
            return Err(BbcError::VolumeReadOnly);
        }
        if object.attr.contains(Attr::LOCKED) {
            return Err(BbcError::Locked);
        }
        self.adapter_for(volume).delete(volume, object).await?;
        self.gitattributes.on_delete(object.server_path.as_path())
    }

    /// Rename within the same volume only; the target must not already
    /// exist (§4.3 "delete / rename").
    pub async fn rename(&self, volume: &Volume, from: &FsObject, to: &Fqn) -> BbcResult<FsObject> {
        if volume.read_only {
            return Err(BbcError::VolumeReadOnly);
        }
        if from.attr.contains(Attr::LOCKED) {
            return Err(BbcError::Locked);
        }
        if self.get_object(volume, to, false).await?.is_some() {
            return Err(BbcError::Exists);
        }
        let renamed = self.adapter_for(volume).rename(volume, from, to).await?;
        self.gitattributes.on_rename(from.server_path.as_path(), renamed.server_path.as_path())?;
        Ok(renamed)
    }

    /// `*CDIR`: creates a directory, failing if it already exists.
    pub async fn create_dir(&self, volume: &Volume, fqn: &Fqn) -> BbcResult<FsObject> {
        if volume.read_only {
            return Err(BbcError::VolumeReadOnly);
        }
        if self.get_object(volume, fqn, false).await?.is_some() {
            return Err(BbcError::Exists);
        }
        self.adapter_for(volume).create_dir(volume, fqn).await
    }

    pub fn parse_attr(&self, volume: &Volume, text: &str) -> BbcResult<Attr> {
        self.adapter_for(volume).parse_attr(text)
    }

    pub fn format_attr(&self, volume: &Volume, attr: Attr) -> String {
        self.adapter_for(volume).format_attr(attr)
    }

    pub async fn read_bytes(&self, volume: &Volume, object: &FsObject) -> BbcResult<Vec<u8>> {
        self.adapter_for(volume).read_bytes(object).await
    }

    /// ADFS `*BACK`: swaps the session's current/previous directory.
    pub fn swap_back(&self, volume: &Volume, current_dir: &str, previous_dir: &str) -> BbcResult<(String, String)> {
        self.adapter_for(volume).swap_back(current_dir, previous_dir)
    }

    pub async fn insert_disk(&self, volume: &Volume, drive: &str, name: &str) -> BbcResult<()> {
        self.adapter_for(volume).insert_disk(volume, drive, name).await
    }

    pub async fn eject_disk(&self, volume: &Volume, drive: &str) -> BbcResult<()> {
        self.adapter_for(volume).eject_disk(volume, drive).await
    }

    pub async fn list_folders(&self, volume: &Volume) -> BbcResult<Vec<String>> {
        self.adapter_for(volume).list_folders(volume).await
    }

    pub async fn make_folder(&self, volume: &Volume, name: &str) -> BbcResult<()> {
        self.adapter_for(volume).make_folder(volume, name).await
    }

    pub async fn set_current_folder(&self, volume: &Volume, name: &str) -> BbcResult<()> {
        self.adapter_for(volume).set_current_folder(volume, name).await
    }

    pub async fn list_disks(&self, volume: &Volume, folder: Option<&str>) -> BbcResult<Vec<String>> {
        self.adapter_for(volume).list_disks(volume, folder).await
    }

    pub async fn create_disk(&self, volume: &Volume, name: &str) -> BbcResult<()> {
        self.adapter_for(volume).create_disk(volume, name).await
    }

    /// Recursive search across every discoverable volume for a wildcard
    /// match (`*`/`#`), yielding `(volume, object)` pairs (§4.3 "locate").
    pub async fn locate(&self, fqn: &Fqn) -> BbcResult<Vec<(Volume, FsObject)>> {
        let mut out = Vec::new();
        for volume in self.volumes().await? {
            if let Ok(objects) = self.find_objects(&volume, fqn).await {
                for object in objects {
                    out.push((volume.clone(), object));
                }
            }
        }
        Ok(out)
    }

    /// `open(fqn, read, write, text?)`: allocates a handle in `handles`,
    /// enforcing single-writer and loading contents into the buffer.
    /// Text mode prepends `text_prefix` and rewrites CR/LF/LFCR/CRLF line
    /// endings to bare `0x0D` (§4.3 "open").
    pub async fn open(
        &self,
        volume: &Volume,
        fqn: &Fqn,
        read: bool,
        write: bool,
        text_prefix: Option<&[u8]>,
        handles: &mut HandleTable,
    ) -> BbcResult<u8> {
        let existing = self.get_object(volume, fqn, false).await?;

        let (server_path, object) = match existing {
            Some(object) => (object.server_path.clone(), Some(object)),
            None if write => {
                let created = self.write_file(volume, fqn, 0xFFFF_FFFF, 0xFFFF_FFFF, &[]).await?;
                let path = created.server_path.clone();
                (path, Some(created))
            }
            None => return Err(BbcError::FileNotFound),
        };

        if write && handles.is_open_for_write(&server_path) {
            return Err(BbcError::Open);
        }
        if let Some(object) = &object {
            if write && object.attr.contains(Attr::LOCKED) {
                return Err(BbcError::Locked);
            }
        }

        let mut contents = if let Some(object) = &object {
            self.adapter_for(volume).read_bytes(object).await?
        } else {
            Vec::new()
        };

        if let Some(prefix) = text_prefix {
            let mut buf = Vec::with_capacity(prefix.len() + contents.len());
            buf.extend_from_slice(prefix);
            buf.extend_from_slice(&contents);
            contents = normalize_line_endings(&buf);
        }

        let handle = handles.allocate()?;
        let file = OpenFile::new(handle, server_path, fqn.clone(), read, write, text_prefix.is_some(), contents);
        handles.insert(file);
        Ok(handle)
    }

    /// `close(handle)` or `close(0)`: flushes dirty buffers and releases
    /// handles. `0` closes every open handle, aggregating any flush errors
    /// into a single [`BbcError::DataLost`].
    pub async fn close(&self, volume: &Volume, handle: u8, handles: &mut HandleTable) -> BbcResult<()> {
        if handle == 0 {
            let mut any_error = false;
            for file in handles.drain_all() {
                if self.flush(volume, &file).await.is_err() {
                    any_error = true;
                }
            }
            return if any_error { Err(BbcError::DataLost) } else { Ok(()) };
        }
        let file = handles.remove(handle)?;
        self.flush(volume, &file).await
    }

    /// Flushes a single open file's dirty buffer to disk; exposed
    /// separately from [`Self::close`] for callers that have already
    /// removed the handle from the table (`SET_FILE_HANDLE_RANGE`, §4.2).
    pub async fn flush(&self, volume: &Volume, file: &OpenFile) -> BbcResult<()> {
        if !file.dirty {
            return Ok(());
        }
        let adapter = self.adapter_for(volume);
        let existing = adapter
            .find_objects(volume, &Fqn::with_name(file.fqn.path.clone(), file.fqn.name.clone()))
            .await?
            .into_iter()
            .next();
        let (load, exec) = match &existing {
            Some(object) => (object.load, object.exec),
            None => (0xFFFF_FFFF, 0xFFFF_FFFF),
        };
        adapter.write_file(volume, &file.fqn, load, exec, &file.contents).await?;
        Ok(())
    }
}

/// Rewrites CR, LF, LFCR and CRLF sequences to a bare `0x0D` and ensures the
/// result ends with one, even if the input didn't (§4.3 "open", scenario
/// E6).
fn normalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 1);
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\n' => {
                out.push(0x0D);
                if data.get(i + 1) == Some(&b'\r') {
                    i += 2;
                } else {
                    i += 1;
                }
            }
            b'\r' => {
                out.push(0x0D);
                if data.get(i + 1) == Some(&b'\n') {
                    i += 2;
                } else {
                    i += 1;
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    if out.last() != Some(&0x0D) {
        out.push(0x0D);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_all_four_line_ending_styles() {
        let input = b"X\nY\r\nZ\r\rW\n\r";
        let normalized = normalize_line_endings(input);
        assert_eq!(normalized, b"X\rY\rZ\r\rW\r");
    }

    #[test]
    fn scenario_e6_text_open_prefix() {
        let prefix = b"REM a\rPRINT 1\r";
        let body = b"X\nY\r\nZ";
        let mut buf = Vec::new();
        buf.extend_from_slice(prefix);
        buf.extend_from_slice(body);
        let result = normalize_line_endings(&buf);
        assert_eq!(result, b"REM a\rPRINT 1\rX\rY\rZ\r");
    }
}
