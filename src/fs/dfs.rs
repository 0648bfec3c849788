//! DFS adapter (§4.4.1): single-char drive `0..7`, single-char dir, 7-char
//! name. On disk: `<drive>/<dir>.<name>[.inf]`. Only the `L` attribute is
//! preserved; every file is implicitly `RW`.

use async_trait::async_trait;
use tokio::fs;

use crate::error::{BbcError, BbcResult};
use crate::fs::escape::{escape_name, unescape_name};
use crate::fs::inf::{self, InfAttr, InfMetadata, InfStyle};
use crate::fs::object::{Attr, FsObject, ObjectType};
use crate::fs::path::{FilePath, Fqn};
use crate::fs::volume::Volume;
use crate::fs::wildcard;
use crate::fs::FsAdapter;

pub struct Dfs;

const DEFAULT_DIR: &str = "$";

fn host_filename(dir: &str, name: &str) -> String {
    format!("{}.{}", escape_name(dir), escape_name(name))
}

fn to_attr(meta: &InfAttr) -> Attr {
    let mut attr = Attr::READ.union(Attr::WRITE);
    if meta.locked {
        attr.insert(Attr::LOCKED);
    }
    attr
}

async fn object_from_entry(drive_path: &crate::fs::path::AbsolutePath, file_name: &str, drive: &str) -> BbcResult<Option<FsObject>> {
    if file_name.ends_with(".inf") {
        return Ok(None);
    }
    let Some((dir_part, name_part)) = file_name.split_once('.') else {
        return Ok(None);
    };
    let dir = unescape_name(dir_part);
    let name = unescape_name(name_part);

    let host_path = drive_path.join(file_name);
    let stat = match fs::metadata(host_path.as_path()).await {
        Ok(stat) => stat,
        Err(_) => return Ok(None),
    };
    let meta = inf::read_inf(host_path.as_path()).await?;
    let object_type = if stat.is_dir() { ObjectType::Dir } else { ObjectType::File };

    let path = FilePath {
        volume: None,
        volume_explicit: false,
        drive: Some(drive.to_owned()),
        drive_explicit: true,
        dir: Some(dir),
        dir_explicit: true,
    };
    Ok(Some(FsObject {
        server_path: host_path,
        fqn: Fqn::with_name(path, name),
        load: meta.load,
        exec: meta.exec,
        attr: to_attr(&meta.attr),
        object_type,
        size: stat.len(),
    }))
}

#[async_trait]
impl FsAdapter for Dfs {
    fn max_name_len(&self) -> usize {
        7
    }

    async fn find_objects(&self, volume: &Volume, fqn: &Fqn) -> BbcResult<Vec<FsObject>> {
        let drive = fqn.path.drive.as_deref().ok_or_else(BbcError::no_volume)?;
        let dir_pattern = fqn.path.dir.as_deref().unwrap_or(DEFAULT_DIR);
        let drive_path = volume.resolve(&[drive.to_owned()]);

        let mut entries = match fs::read_dir(drive_path.as_path()).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(BbcError::BadDrive),
            Err(err) => return Err(err.into()),
        };

        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(object) = object_from_entry(&drive_path, &file_name, drive).await? else {
                continue;
            };
            if !wildcard::matches(dir_pattern, object.fqn.path.dir.as_deref().unwrap_or_default()) {
                continue;
            }
            if !wildcard::matches(&fqn.name, &object.fqn.name) {
                continue;
            }
            out.push(object);
        }
        Ok(out)
    }

    async fn read_bytes(&self, object: &FsObject) -> BbcResult<Vec<u8>> {
        Ok(fs::read(object.server_path.as_path()).await?)
    }

    async fn write_file(&self, volume: &Volume, fqn: &Fqn, load: u32, exec: u32, data: &[u8]) -> BbcResult<FsObject> {
        let drive = fqn.path.drive.as_deref().ok_or_else(BbcError::no_volume)?;
        let dir = fqn.path.dir.as_deref().unwrap_or(DEFAULT_DIR);
        if fqn.name.len() > self.max_name_len() {
            return Err(BbcError::BadName);
        }
        let drive_path = volume.resolve(&[drive.to_owned()]);
        let host_path = drive_path.join(&host_filename(dir, &fqn.name));

        fs::write(host_path.as_path(), data).await?;
        let meta = InfMetadata {
            bbc_name: fqn.name.clone(),
            load,
            exec,
            attr: InfAttr::default(),
            no_inf: false,
        };
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
        let meta = InfMetadata {
            bbc_name: updated.fqn.name.clone(),
            load: updated.load,
            exec: updated.exec,
            attr: InfAttr { locked: updated.attr.contains(Attr::LOCKED), mask: if updated.attr.contains(Attr::LOCKED) { InfAttr::LOCKED } else { 0 } },
            no_inf: false,
        };
        inf::write_inf(updated.server_path.as_path(), &meta, InfStyle::Dfs).await?;
        Ok(updated)
    }

    async fn delete(&self, _volume: &Volume, object: &FsObject) -> BbcResult<()> {
        fs::remove_file(object.server_path.as_path()).await?;
        let _ = fs::remove_file(inf::sidecar_path(object.server_path.as_path())).await;
        Ok(())
    }

    async fn rename(&self, volume: &Volume, from: &FsObject, to: &Fqn) -> BbcResult<FsObject> {
        let drive = to.path.drive.as_deref().unwrap_or(from.fqn.path.drive.as_deref().unwrap_or("0"));
        let dir = to.path.dir.as_deref().unwrap_or(DEFAULT_DIR);
        if to.name.len() > self.max_name_len() {
            return Err(BbcError::BadName);
        }
        let drive_path = volume.resolve(&[drive.to_owned()]);
        let dest = drive_path.join(&host_filename(dir, &to.name));

        fs::rename(from.server_path.as_path(), dest.as_path()).await?;
        let from_inf = inf::sidecar_path(from.server_path.as_path());
        if fs::try_exists(&from_inf).await.unwrap_or(false) {
            fs::rename(&from_inf, inf::sidecar_path(dest.as_path())).await?;
        }

        let mut object = from.clone();
        object.server_path = dest;
        object.fqn = to.clone();
        Ok(object)
    }

    async fn create_dir(&self, _volume: &Volume, _fqn: &Fqn) -> BbcResult<FsObject> {
        Err(BbcError::NotSupported)
    }

    fn parse_attr(&self, text: &str) -> BbcResult<Attr> {
        match text.trim() {
            "" => Ok(Attr::READ.union(Attr::WRITE)),
            s if s.eq_ignore_ascii_case("L") => Ok(Attr::READ.union(Attr::WRITE).union(Attr::LOCKED)),
            _ => Err(BbcError::BadAttribute),
        }
    }

    fn format_attr(&self, attr: Attr) -> String {
        if attr.contains(Attr::LOCKED) {
            "L".to_owned()
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::volume::FsType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_then_load_round_trips_scenario_e1() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("0")).await.unwrap();
        let volume = Volume::new(tmp.path().to_path_buf(), "TEST", FsType::Dfs, false);
        let dfs = Dfs;

        let fqn = Fqn::with_name(
            FilePath { drive: Some("0".into()), drive_explicit: true, dir: Some("$".into()), dir_explicit: true, ..Default::default() },
            "TEST".into(),
        );
        let saved = dfs.write_file(&volume, &fqn, 0x1900, 0x8023, b"HELLO").await.unwrap();
        assert_eq!(saved.load, 0x1900);
        assert_eq!(saved.size, 5);

        let found = dfs.find_objects(&volume, &fqn).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].load, 0x1900);
        assert_eq!(found[0].exec, 0x8023);

        let data = dfs.read_bytes(&found[0]).await.unwrap();
        assert_eq!(data, b"HELLO");
    }

    #[tokio::test]
    async fn missing_drive_is_bad_drive() {
        let tmp = TempDir::new().unwrap();
        let volume = Volume::new(tmp.path().to_path_buf(), "TEST", FsType::Dfs, false);
        let dfs = Dfs;
        let fqn = Fqn::with_name(
            FilePath { drive: Some("9".into()), drive_explicit: true, ..Default::default() },
            "X".into(),
        );
        assert!(matches!(dfs.find_objects(&volume, &fqn).await, Err(BbcError::BadDrive)));
    }
}
