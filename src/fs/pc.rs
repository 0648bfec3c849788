//! PC adapter (§4.4.4): read-only pass-through onto a flat host directory.
//! Filenames up to 31 ASCII chars; no BBC attributes, no hierarchy, no
//! `*RUN`; every write fails with [`BbcError::NotSupported`].

use async_trait::async_trait;
use tokio::fs;

use crate::error::{BbcError, BbcResult};
use crate::fs::object::{Attr, FsObject, ObjectType};
use crate::fs::path::{FilePath, Fqn};
use crate::fs::volume::Volume;
use crate::fs::wildcard;
use crate::fs::FsAdapter;

pub struct Pc;

#[async_trait]
impl FsAdapter for Pc {
    fn max_name_len(&self) -> usize {
        31
    }

    async fn find_objects(&self, volume: &Volume, fqn: &Fqn) -> BbcResult<Vec<FsObject>> {
        let mut entries = fs::read_dir(volume.root()).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !wildcard::matches(&fqn.name, &name) {
                continue;
            }
            let stat = entry.metadata().await?;
            out.push(FsObject {
                server_path: volume.resolve(&[name.clone()]),
                fqn: Fqn::with_name(FilePath::default(), name),
                load: 0xFFFF_FFFF,
                exec: 0xFFFF_FFFF,
                attr: Attr::READ,
                object_type: if stat.is_dir() { ObjectType::Dir } else { ObjectType::File },
                size: stat.len(),
            });
        }
        Ok(out)
    }

    async fn read_bytes(&self, object: &FsObject) -> BbcResult<Vec<u8>> {
        Ok(fs::read(object.server_path.as_path()).await?)
    }

    async fn write_file(&self, _volume: &Volume, _fqn: &Fqn, _load: u32, _exec: u32, _data: &[u8]) -> BbcResult<FsObject> {
        Err(BbcError::NotSupported)
    }

    async fn write_meta(
        &self,
        _volume: &Volume,
        _object: &FsObject,
        _load: Option<u32>,
        _exec: Option<u32>,
        _attr: Option<Attr>,
    ) -> BbcResult<FsObject> {
        Err(BbcError::NotSupported)
    }

    async fn delete(&self, _volume: &Volume, _object: &FsObject) -> BbcResult<()> {
        Err(BbcError::NotSupported)
    }

    async fn rename(&self, _volume: &Volume, _from: &FsObject, _to: &Fqn) -> BbcResult<FsObject> {
        Err(BbcError::NotSupported)
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::volume::FsType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lists_files_read_only_and_rejects_writes() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("readme.txt"), b"hi").await.unwrap();
        let volume = Volume::new(tmp.path().to_path_buf(), "PC", FsType::Pc, true);
        let pc = Pc;

        let fqn = Fqn::with_name(FilePath::default(), "*".into());
        let found = pc.find_objects(&volume, &fqn).await.unwrap();
        assert_eq!(found.len(), 1);

        assert!(matches!(
            pc.write_file(&volume, &Fqn::with_name(FilePath::default(), "x".into()), 0, 0, b"").await,
            Err(BbcError::NotSupported)
        ));
    }
}
