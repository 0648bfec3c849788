//! TubeHost adapter (§4.4.3): a 10-drive "disk changer". The volume
//! contains *folders* (host directories); each folder may contain *disks*
//! (subdirectories) that get mounted into drive slots `0..9` plus a
//! library slot `L`.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs;

use crate::error::{BbcError, BbcResult};
use crate::fs::escape::{escape_name, unescape_name};
use crate::fs::inf::{self, InfAttr, InfMetadata, InfStyle};
use crate::fs::object::{Attr, FsObject, ObjectType};
use crate::fs::path::{FilePath, Fqn};
use crate::fs::volume::Volume;
use crate::fs::wildcard;
use crate::fs::FsAdapter;

const LIBRARY_FOLDER: &str = "_Library";
const LIBRARY_SLOT: &str = "L";

/// What's mounted in a drive slot: the host-relative path of the folder
/// and disk that were inserted.
#[derive(Debug, Clone)]
struct MountedDisk {
    folder: String,
    disk: String,
}

/// Per-volume changer state: which disk (if any) is mounted in each slot.
/// Persists for the lifetime of the server process (§4.4.3 "Persistent
/// settings"); restored on session reconnect because it's keyed by volume
/// path, not by session.
#[derive(Default)]
pub struct TubeHost {
    slots: DashMap<String, DashMap<String, MountedDisk>>,
    /// The host folder `*HCF` most recently selected per volume, used as
    /// the default for `*DCAT`/`*DCREATE` when no folder is named.
    current_folder: DashMap<String, String>,
}

impl TubeHost {
    fn volume_slots(&self, volume: &Volume) -> dashmap::mapref::one::RefMut<'_, String, DashMap<String, MountedDisk>> {
        let key = volume.root().to_string_lossy().into_owned();
        self.slots.entry(key).or_default()
    }

    fn volume_key(volume: &Volume) -> String {
        volume.root().to_string_lossy().into_owned()
    }

    /// Auto-mounts drives on first access to a volume: a disk named
    /// `N.name` (N < 10) mounts into drive `N`; a folder named `_Library`
    /// mounts into slot `L`.
    async fn ensure_auto_mounted(&self, volume: &Volume) -> BbcResult<()> {
        let slots = self.volume_slots(volume);
        if !slots.is_empty() {
            return Ok(());
        }
        let mut entries = match fs::read_dir(volume.root()).await {
            Ok(entries) => entries,
            Err(_) => return Ok(()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let folder = entry.file_name().to_string_lossy().into_owned();
            if folder.eq_ignore_ascii_case(LIBRARY_FOLDER) {
                slots.insert(LIBRARY_SLOT.to_owned(), MountedDisk { folder: folder.clone(), disk: String::new() });
                continue;
            }
            let mut disks = match fs::read_dir(entry.path()).await {
                Ok(disks) => disks,
                Err(_) => continue,
            };
            while let Some(disk_entry) = disks.next_entry().await? {
                if !disk_entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                let disk_name = disk_entry.file_name().to_string_lossy().into_owned();
                if let Some((prefix, rest)) = disk_name.split_once('.') {
                    if let Ok(slot) = prefix.parse::<u8>() {
                        if slot < 10 {
                            slots.insert(slot.to_string(), MountedDisk { folder: folder.clone(), disk: rest.to_owned() });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn disk_path(&self, volume: &Volume, mount: &MountedDisk) -> crate::fs::path::AbsolutePath {
        if mount.disk.is_empty() {
            volume.resolve(&[mount.folder.clone()])
        } else {
            volume.resolve(&[mount.folder.clone(), format!("0.{}", mount.disk)])
        }
    }
}

#[async_trait]
impl FsAdapter for TubeHost {
    fn max_name_len(&self) -> usize {
        10
    }

    async fn find_objects(&self, volume: &Volume, fqn: &Fqn) -> BbcResult<Vec<FsObject>> {
        self.ensure_auto_mounted(volume).await?;
        let drive = fqn.path.drive.as_deref().ok_or_else(BbcError::no_volume)?;
        let slots = self.volume_slots(volume);
        let mount = slots.get(drive).ok_or(BbcError::DiscFault("Drive empty".to_owned()))?.clone();
        drop(slots);
        let disk_path = self.disk_path(volume, &mount);

        let mut entries = match fs::read_dir(disk_path.as_path()).await {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let raw_name = entry.file_name().to_string_lossy().into_owned();
            if raw_name.ends_with(".inf") {
                continue;
            }
            let name = unescape_name(&raw_name);
            if !wildcard::matches(&fqn.name, &name) {
                continue;
            }
            let host_path = disk_path.join(&raw_name);
            let stat = fs::metadata(host_path.as_path()).await?;
            let meta = inf::read_inf(host_path.as_path()).await?;
            let path = FilePath { drive: Some(drive.to_owned()), drive_explicit: true, ..Default::default() };
            out.push(FsObject {
                server_path: host_path,
                fqn: Fqn::with_name(path, name),
                load: meta.load,
                exec: meta.exec,
                attr: Attr::READ.union(Attr::WRITE),
                object_type: if stat.is_dir() { ObjectType::Dir } else { ObjectType::File },
                size: stat.len(),
            });
        }
        Ok(out)
    }

    async fn read_bytes(&self, object: &FsObject) -> BbcResult<Vec<u8>> {
        Ok(fs::read(object.server_path.as_path()).await?)
    }

    async fn write_file(&self, volume: &Volume, fqn: &Fqn, load: u32, exec: u32, data: &[u8]) -> BbcResult<FsObject> {
        self.ensure_auto_mounted(volume).await?;
        let drive = fqn.path.drive.as_deref().ok_or_else(BbcError::no_volume)?;
        let slots = self.volume_slots(volume);
        let mount = slots.get(drive).ok_or(BbcError::DiscFault("Drive empty".to_owned()))?.clone();
        drop(slots);
        let disk_path = self.disk_path(volume, &mount);
        let host_path = disk_path.join(&escape_name(&fqn.name));

        fs::write(host_path.as_path(), data).await?;
        let meta = InfMetadata { bbc_name: fqn.name.clone(), load, exec, attr: InfAttr::default(), no_inf: false };
        inf::write_inf(host_path.as_path(), &meta, InfStyle::Dfs).await?;

        Ok(FsObject {
            server_path: host_path,
            fqn: fqn.clone(),
            load,
            exec,
            attr: Attr::READ.union(Attr::WRITE),
            object_type: ObjectType::File,
            size: data.len() as u64,
        })
    }

    async fn write_meta(
        &self,
        _volume: &Volume,
        object: &FsObject,
        load: Option<u32>,
        exec: Option<u32>,
        attr: Option<Attr>,
    ) -> BbcResult<FsObject> {
        let mut updated = object.clone();
        if let Some(load) = load {
            updated.load = load;
        }
        if let Some(exec) = exec {
            updated.exec = exec;
        }
        if let Some(attr) = attr {
            updated.attr = attr;
        }
        Ok(updated)
    }

    async fn delete(&self, _volume: &Volume, object: &FsObject) -> BbcResult<()> {
        fs::remove_file(object.server_path.as_path()).await?;
        Ok(())
    }

    async fn rename(&self, _volume: &Volume, from: &FsObject, to: &Fqn) -> BbcResult<FsObject> {
        let dest = from.server_path.as_path().parent().map(|p| p.join(escape_name(&to.name)));
        let dest_path = dest.ok_or(BbcError::BadName)?;
        fs::rename(from.server_path.as_path(), &dest_path).await?;
        let mut object = from.clone();
        object.server_path = crate::fs::path::AbsolutePath::new(dest_path);
        object.fqn = to.clone();
        Ok(object)
    }

    async fn create_dir(&self, _volume: &Volume, _fqn: &Fqn) -> BbcResult<FsObject> {
        Err(BbcError::NotSupported)
    }

    fn parse_attr(&self, _text: &str) -> BbcResult<Attr> {
        Err(BbcError::NotSupported)
    }

    fn format_attr(&self, _attr: Attr) -> String {
        String::new()
    }

    /// `*DIN drive name`: mounts `name` (a folder) into `drive`.
    async fn insert_disk(&self, volume: &Volume, drive: &str, name: &str) -> BbcResult<()> {
        let folder_path = volume.resolve(&[name.to_owned()]);
        if fs::metadata(folder_path.as_path()).await.map(|m| m.is_dir()).unwrap_or(false) {
            self.volume_slots(volume).insert(drive.to_owned(), MountedDisk { folder: name.to_owned(), disk: String::new() });
            Ok(())
        } else {
            Err(BbcError::FileNotFound)
        }
    }

    /// `*DOUT drive`: ejects whatever is mounted in `drive`.
    async fn eject_disk(&self, volume: &Volume, drive: &str) -> BbcResult<()> {
        self.volume_slots(volume).remove(drive);
        Ok(())
    }

    /// `*HFOLDERS`: lists the host folders (top-level directories) under
    /// the volume root.
    async fn list_folders(&self, volume: &Volume) -> BbcResult<Vec<String>> {
        let mut entries = fs::read_dir(volume.root()).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                out.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }

    /// `*HMKF name`: creates a new host folder under the volume root.
    async fn make_folder(&self, volume: &Volume, name: &str) -> BbcResult<()> {
        let path = volume.resolve(&[name.to_owned()]);
        if fs::metadata(path.as_path()).await.is_ok() {
            return Err(BbcError::Exists);
        }
        fs::create_dir(path.as_path()).await?;
        Ok(())
    }

    /// `*HCF name`: selects `name` as the folder `*DCAT`/`*DCREATE` default
    /// to.
    async fn set_current_folder(&self, volume: &Volume, name: &str) -> BbcResult<()> {
        let path = volume.resolve(&[name.to_owned()]);
        if !fs::metadata(path.as_path()).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(BbcError::FileNotFound);
        }
        self.current_folder.insert(Self::volume_key(volume), name.to_owned());
        Ok(())
    }

    /// `*DCAT [folder]`: lists the disks (sub-folders) within `folder`, or
    /// the folder last selected by `*HCF` if omitted.
    async fn list_disks(&self, volume: &Volume, folder: Option<&str>) -> BbcResult<Vec<String>> {
        let key = Self::volume_key(volume);
        let folder = match folder {
            Some(folder) => folder.to_owned(),
            None => self.current_folder.get(&key).map(|f| f.clone()).ok_or(BbcError::FileNotFound)?,
        };
        let path = volume.resolve(&[folder]);
        let mut entries = match fs::read_dir(path.as_path()).await {
            Ok(entries) => entries,
            Err(_) => return Err(BbcError::FileNotFound),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                out.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }

    /// `*DCREATE name`: creates a new disk (sub-folder) within the folder
    /// last selected by `*HCF`.
    async fn create_disk(&self, volume: &Volume, name: &str) -> BbcResult<()> {
        let key = Self::volume_key(volume);
        let folder = self.current_folder.get(&key).map(|f| f.clone()).ok_or(BbcError::FileNotFound)?;
        let path = volume.resolve(&[folder, name.to_owned()]);
        if fs::metadata(path.as_path()).await.is_ok() {
            return Err(BbcError::Exists);
        }
        fs::create_dir(path.as_path()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::volume::FsType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn scenario_e5_din_mounts_folder_and_dout_empties_it() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("misc")).await.unwrap();
        fs::write(tmp.path().join("misc").join("GAME"), b"x").await.unwrap();
        let volume = Volume::new(tmp.path().to_path_buf(), "T", FsType::TubeHost, false);
        let th = TubeHost::default();

        th.insert_disk(&volume, "3", "misc").await.unwrap();
        let fqn = Fqn::with_name(
            FilePath { drive: Some("3".into()), drive_explicit: true, ..Default::default() },
            "*".into(),
        );
        let found = th.find_objects(&volume, &fqn).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fqn.name, "GAME");

        th.eject_disk(&volume, "3").await.unwrap();
        assert!(matches!(th.find_objects(&volume, &fqn).await, Err(BbcError::DiscFault(_))));
    }
}
