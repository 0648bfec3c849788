//! ADFS adapter (§4.4.2): single alphanumeric drive, hierarchical
//! directories (10-char names), leaf name up to 10 chars. `$` is the root;
//! `.inf` attributes encode `R`, `W`, `L`, `E`.

use async_trait::async_trait;
use tokio::fs;

use crate::error::{BbcError, BbcResult};
use crate::fs::escape::{escape_name, unescape_name};
use crate::fs::inf::{self, InfAttr, InfMetadata, InfStyle};
use crate::fs::object::{Attr, FsObject, ObjectType};
use crate::fs::path::{AbsolutePath, FilePath, Fqn};
use crate::fs::volume::Volume;
use crate::fs::wildcard;
use crate::fs::FsAdapter;

pub struct Adfs;

const MAX_LEN: usize = 10;

fn to_attr(meta: &InfAttr) -> Attr {
    let mut attr = Attr::NONE;
    if meta.mask & InfAttr::READ != 0 {
        attr.insert(Attr::READ);
    }
    if meta.mask & InfAttr::WRITE != 0 {
        attr.insert(Attr::WRITE);
    }
    if meta.mask & InfAttr::EXEC != 0 {
        attr.insert(Attr::EXEC);
    }
    if meta.locked {
        attr.insert(Attr::LOCKED);
    }
    if meta.mask == 0 && !meta.locked {
        attr = Attr::READ.union(Attr::WRITE);
    }
    attr
}

fn attr_to_mask(attr: Attr) -> u32 {
    let mut mask = 0;
    if attr.contains(Attr::READ) {
        mask |= InfAttr::READ;
    }
    if attr.contains(Attr::WRITE) {
        mask |= InfAttr::WRITE;
    }
    if attr.contains(Attr::EXEC) {
        mask |= InfAttr::EXEC;
    }
    if attr.contains(Attr::LOCKED) {
        mask |= InfAttr::LOCKED;
    }
    mask
}

/// Walks `$.x.y.z`-style directory strings component by component,
/// verifying each exists on disk; an ambiguous match mid-walk is an error
/// (§4.4.2, scenario E2).
async fn walk_dir(drive_path: &AbsolutePath, dir: &str) -> BbcResult<AbsolutePath> {
    let mut current = drive_path.clone();
    for component in dir.split('.') {
        if component.is_empty() || component == "$" {
            continue;
        }
        let mut entries = fs::read_dir(current.as_path()).await.map_err(|_| BbcError::FileNotFound)?;
        let mut found = None;
        while let Some(entry) = entries.next_entry().await? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = unescape_name(&entry.file_name().to_string_lossy());
            if wildcard::matches(component, &name) {
                if found.is_some() {
                    return Err(BbcError::AmbiguousName);
                }
                found = Some(current.join(&entry.file_name().to_string_lossy()));
            }
        }
        current = found.ok_or(BbcError::FileNotFound)?;
    }
    Ok(current)
}

#[async_trait]
impl FsAdapter for Adfs {
    fn max_name_len(&self) -> usize {
        MAX_LEN
    }

    async fn find_objects(&self, volume: &Volume, fqn: &Fqn) -> BbcResult<Vec<FsObject>> {
        let drive = fqn.path.drive.as_deref().ok_or_else(BbcError::no_volume)?;
        let dir = fqn.path.dir.as_deref().unwrap_or("$");
        let drive_path = volume.resolve(&[drive.to_owned()]);
        let dir_path = walk_dir(&drive_path, dir).await?;

        let mut entries = match fs::read_dir(dir_path.as_path()).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(BbcError::BadDrive),
            Err(err) => return Err(err.into()),
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
            let host_path = dir_path.join(&raw_name);
            let stat = fs::metadata(host_path.as_path()).await?;
            let object_type = if stat.is_dir() { ObjectType::Dir } else { ObjectType::File };
            let meta = if object_type == ObjectType::File {
                inf::read_inf(host_path.as_path()).await?
            } else {
                InfMetadata { bbc_name: name.clone(), load: 0xFFFF_FFFF, exec: 0xFFFF_FFFF, attr: InfAttr::default(), no_inf: true }
            };
            let path = FilePath {
                volume: None,
                volume_explicit: false,
                drive: Some(drive.to_owned()),
                drive_explicit: true,
                dir: Some(dir.to_owned()),
                dir_explicit: true,
            };
            out.push(FsObject {
                server_path: host_path,
                fqn: Fqn::with_name(path, name),
                load: meta.load,
                exec: meta.exec,
                attr: to_attr(&meta.attr),
                object_type,
                size: stat.len(),
            });
        }
        Ok(out)
    }

    async fn read_bytes(&self, object: &FsObject) -> BbcResult<Vec<u8>> {
        Ok(fs::read(object.server_path.as_path()).await?)
    }

    async fn write_file(&self, volume: &Volume, fqn: &Fqn, load: u32, exec: u32, data: &[u8]) -> BbcResult<FsObject> {
        if fqn.name.len() > MAX_LEN {
            return Err(BbcError::BadName);
        }
        let drive = fqn.path.drive.as_deref().ok_or_else(BbcError::no_volume)?;
        let dir = fqn.path.dir.as_deref().unwrap_or("$");
        let drive_path = volume.resolve(&[drive.to_owned()]);
        let dir_path = walk_dir(&drive_path, dir).await?;
        let host_path = dir_path.join(&escape_name(&fqn.name));

        fs::write(host_path.as_path(), data).await?;
        let meta = InfMetadata { bbc_name: fqn.name.clone(), load, exec, attr: InfAttr::default(), no_inf: false };
        inf::write_inf(host_path.as_path(), &meta, InfStyle::Adfs).await?;

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
            attr: InfAttr { locked: updated.attr.contains(Attr::LOCKED), mask: attr_to_mask(updated.attr) },
            no_inf: false,
        };
        inf::write_inf(updated.server_path.as_path(), &meta, InfStyle::Adfs).await?;
        Ok(updated)
    }

    async fn delete(&self, _volume: &Volume, object: &FsObject) -> BbcResult<()> {
        if object.is_dir() {
            fs::remove_dir(object.server_path.as_path()).await?;
        } else {
            fs::remove_file(object.server_path.as_path()).await?;
            let _ = fs::remove_file(inf::sidecar_path(object.server_path.as_path())).await;
        }
        Ok(())
    }

    async fn rename(&self, volume: &Volume, from: &FsObject, to: &Fqn) -> BbcResult<FsObject> {
        if to.name.len() > MAX_LEN {
            return Err(BbcError::BadName);
        }
        let drive = to.path.drive.as_deref().unwrap_or(from.fqn.path.drive.as_deref().unwrap_or("0"));
        let dir = to.path.dir.as_deref().unwrap_or("$");
        let drive_path = volume.resolve(&[drive.to_owned()]);
        let dir_path = walk_dir(&drive_path, dir).await?;
        let dest = dir_path.join(&escape_name(&to.name));

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

    async fn create_dir(&self, volume: &Volume, fqn: &Fqn) -> BbcResult<FsObject> {
        if fqn.name.len() > MAX_LEN {
            return Err(BbcError::BadName);
        }
        let drive = fqn.path.drive.as_deref().ok_or_else(BbcError::no_volume)?;
        let dir = fqn.path.dir.as_deref().unwrap_or("$");
        let drive_path = volume.resolve(&[drive.to_owned()]);
        let dir_path = walk_dir(&drive_path, dir).await?;
        let host_path = dir_path.join(&escape_name(&fqn.name));
        fs::create_dir(host_path.as_path()).await?;
        Ok(FsObject {
            server_path: host_path,
            fqn: fqn.clone(),
            load: 0xFFFF_FFFF,
            exec: 0xFFFF_FFFF,
            attr: Attr::READ.union(Attr::WRITE),
            object_type: ObjectType::Dir,
            size: 0,
        })
    }

    fn parse_attr(&self, text: &str) -> BbcResult<Attr> {
        if !text.chars().all(|c| "RWLErwle".contains(c)) {
            return Err(BbcError::BadAttribute);
        }
        Ok(to_attr(&InfAttr::from_rwle(text)))
    }

    fn format_attr(&self, attr: Attr) -> String {
        let mut out = String::new();
        if attr.contains(Attr::READ) {
            out.push('R');
        }
        if attr.contains(Attr::WRITE) {
            out.push('W');
        }
        if attr.contains(Attr::LOCKED) {
            out.push('L');
        }
        if attr.contains(Attr::EXEC) {
            out.push('E');
        }
        out
    }

    /// `*BACK`: swap the saved previous directory with the current one.
    fn swap_back(&self, current_dir: &str, previous_dir: &str) -> BbcResult<(String, String)> {
        Ok((previous_dir.to_owned(), current_dir.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::volume::FsType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn scenario_e2_directory_walk_and_ambiguity() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("0").join("DOCS")).await.unwrap();
        fs::write(tmp.path().join("0").join("DOCS").join("LETTER"), b"hi").await.unwrap();
        let volume = Volume::new(tmp.path().to_path_buf(), "V", FsType::Adfs, false);
        let adfs = Adfs;

        let fqn = Fqn::with_name(
            FilePath { drive: Some("0".into()), drive_explicit: true, dir: Some("$.DOCS".into()), dir_explicit: true, ..Default::default() },
            "LETTER".into(),
        );
        let found = adfs.find_objects(&volume, &fqn).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fqn.name, "LETTER");
    }

    #[tokio::test]
    async fn missing_intermediate_dir_is_file_not_found() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("0")).await.unwrap();
        let volume = Volume::new(tmp.path().to_path_buf(), "V", FsType::Adfs, false);
        let adfs = Adfs;

        let fqn = Fqn::with_name(
            FilePath { drive: Some("0".into()), drive_explicit: true, dir: Some("$.DOCS".into()), dir_explicit: true, ..Default::default() },
            "LETTER".into(),
        );
        assert!(matches!(adfs.find_objects(&volume, &fqn).await, Err(BbcError::FileNotFound)));
    }

    #[tokio::test]
    async fn ambiguous_directory_component_errors() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("0").join("DOCA")).await.unwrap();
        fs::create_dir_all(tmp.path().join("0").join("DOCB")).await.unwrap();
        let volume = Volume::new(tmp.path().to_path_buf(), "V", FsType::Adfs, false);
        let adfs = Adfs;

        let fqn = Fqn::with_name(
            FilePath { drive: Some("0".into()), drive_explicit: true, dir: Some("$.DOC#".into()), dir_explicit: true, ..Default::default() },
            "LETTER".into(),
        );
        assert!(matches!(adfs.find_objects(&volume, &fqn).await, Err(BbcError::AmbiguousName)));
    }
}
