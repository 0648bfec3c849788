//! Volume discovery and the [`Volume`] handle (§4.3 "Volume discovery",
//! §3 "Volume"). There is deliberately no discovery cache (§5): every
//! `*VOL`/`*CAT` that names a volume re-scans the configured roots, since
//! volumes may appear or disappear out of band.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{BbcError, BbcResult};
use crate::fs::path::AbsolutePath;
use crate::fs::wildcard;

/// Sidecar that promotes a volume directory to ADFS.
const ADFS_SIDECAR: &str = ".adfs";
/// Sidecar overriding a volume's displayed name.
const NAME_SIDECAR: &str = ".volume";
/// Sidecar that prunes a subtree from discovery.
const IGNORE_SIDECAR: &str = ".beeblink-ignore";

/// Which on-disk layout a volume's FS-type adapter should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsType {
    Dfs,
    Adfs,
    TubeHost,
    Pc,
}

/// A root directory on the host filesystem containing one BBC "disc".
/// Equality is by path alone (§3): two volumes at the same path are the
/// same volume regardless of displayed name.
#[derive(Debug, Clone)]
pub struct Volume {
    root: PathBuf,
    pub name: String,
    pub fs_type: FsType,
    pub read_only: bool,
}

impl PartialEq for Volume {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}
impl Eq for Volume {}

impl Volume {
    /// Constructs a volume directly, bypassing discovery. Used by adapters
    /// that synthesize a sub-volume view (e.g. a TubeHost changer slot) and
    /// by tests.
    pub fn new(root: PathBuf, name: impl Into<String>, fs_type: FsType, read_only: bool) -> Self {
        Self { root, name: name.into(), fs_type, read_only }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a volume-relative host path to an [`AbsolutePath`]. This is
    /// the sole constructor for [`AbsolutePath`] outside of this module.
    pub fn resolve(&self, components: &[String]) -> AbsolutePath {
        let mut path = self.root.clone();
        for component in components {
            path.push(component);
        }
        AbsolutePath::new(path)
    }

    pub fn resolve_root(&self) -> AbsolutePath {
        AbsolutePath::new(self.root.clone())
    }
}

/// Where to look for volumes, and which explicit root lists force a
/// non-discovered FS type (§4.3, §4.4.3, §4.4.4).
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    pub volume_roots: Vec<PathBuf>,
    pub tubehost_roots: Vec<PathBuf>,
    pub pc_roots: Vec<PathBuf>,
}

/// Recursively scans the configured roots, returning every discoverable
/// volume. A directory containing a subdirectory literally named `0` is a
/// DFS/ADFS volume (promoted to ADFS by a `.adfs` sidecar); `.beeblink-ignore`
/// prunes a subtree; duplicate paths (by canonical form) are deduplicated.
pub async fn discover(config: &DiscoveryConfig) -> BbcResult<Vec<Volume>> {
    let mut found = Vec::new();
    let mut seen = Vec::new();

    for root in &config.volume_roots {
        scan_dir(root, &mut found, &mut seen).await?;
    }
    for root in &config.tubehost_roots {
        if let Some(volume) = volume_at(root, FsType::TubeHost).await? {
            push_unique(&mut found, &mut seen, volume);
        }
    }
    for root in &config.pc_roots {
        if let Some(volume) = volume_at(root, FsType::Pc).await? {
            push_unique(&mut found, &mut seen, volume);
        }
    }

    Ok(found)
}

fn scan_dir<'a>(
    dir: &'a Path,
    found: &'a mut Vec<Volume>,
    seen: &'a mut Vec<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = BbcResult<()>> + Send + 'a>> {
    Box::pin(async move {
        if fs::try_exists(dir.join(IGNORE_SIDECAR)).await.unwrap_or(false) {
            return Ok(());
        }

        if let Some(volume) = volume_at(dir, FsType::Dfs).await? {
            push_unique(found, seen, volume);
            return Ok(());
        }

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                scan_dir(&entry.path(), found, seen).await?;
            }
        }
        Ok(())
    })
}

/// Checks whether `dir` is itself a volume root (has a `0` subdirectory),
/// returning its [`Volume`] if so.
async fn volume_at(dir: &Path, forced_type: FsType) -> BbcResult<Option<Volume>> {
    let has_drive_zero = fs::try_exists(dir.join("0")).await.unwrap_or(false);
    if !has_drive_zero && !matches!(forced_type, FsType::TubeHost | FsType::Pc) {
        return Ok(None);
    }

    let fs_type = if matches!(forced_type, FsType::TubeHost | FsType::Pc) {
        forced_type
    } else if fs::try_exists(dir.join(ADFS_SIDECAR)).await.unwrap_or(false) {
        FsType::Adfs
    } else {
        FsType::Dfs
    };

    let name = match fs::read_to_string(dir.join(NAME_SIDECAR)).await {
        Ok(contents) => contents.lines().next().unwrap_or_default().trim().to_owned(),
        Err(_) => dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
    };
    let name = if name.is_empty() {
        dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    } else {
        name
    };

    Ok(Some(Volume { root: dir.to_path_buf(), name, fs_type, read_only: false }))
}

fn push_unique(found: &mut Vec<Volume>, seen: &mut Vec<PathBuf>, volume: Volume) {
    if seen.iter().any(|p| *p == volume.root) {
        return;
    }
    seen.push(volume.root.clone());
    found.push(volume);
}

/// Resolves a `::name` volume specifier (wildcards accepted) against a
/// discovered set; ambiguity (more than one match) is an error (§4.3
/// "Volume parsing").
pub fn select<'a>(volumes: &'a [Volume], pattern: &str) -> BbcResult<&'a Volume> {
    let mut matches = volumes.iter().filter(|v| wildcard::matches(pattern, &v.name));
    let first = matches.next().ok_or(BbcError::FileNotFound)?;
    if matches.next().is_some() {
        return Err(BbcError::AmbiguousName);
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn make_dfs_volume(root: &Path, name: &str) {
        let vol = root.join(name);
        fs::create_dir_all(vol.join("0")).await.unwrap();
    }

    #[tokio::test]
    async fn discovers_dfs_volume_by_drive_zero_subdir() {
        let tmp = TempDir::new().unwrap();
        make_dfs_volume(tmp.path(), "MYDISC").await;

        let config = DiscoveryConfig { volume_roots: vec![tmp.path().to_path_buf()], ..Default::default() };
        let volumes = discover(&config).await.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].name, "MYDISC");
        assert_eq!(volumes[0].fs_type, FsType::Dfs);
    }

    #[tokio::test]
    async fn adfs_sidecar_promotes_type() {
        let tmp = TempDir::new().unwrap();
        let vol = tmp.path().join("BIGDISC");
        fs::create_dir_all(vol.join("0")).await.unwrap();
        fs::write(vol.join(ADFS_SIDECAR), b"").await.unwrap();

        let config = DiscoveryConfig { volume_roots: vec![tmp.path().to_path_buf()], ..Default::default() };
        let volumes = discover(&config).await.unwrap();
        assert_eq!(volumes[0].fs_type, FsType::Adfs);
    }

    #[tokio::test]
    async fn ignore_sidecar_prunes_subtree() {
        let tmp = TempDir::new().unwrap();
        let vol = tmp.path().join("SKIPME");
        fs::create_dir_all(vol.join("0")).await.unwrap();
        fs::write(tmp.path().join(IGNORE_SIDECAR), b"").await.unwrap();

        let config = DiscoveryConfig { volume_roots: vec![tmp.path().to_path_buf()], ..Default::default() };
        let volumes = discover(&config).await.unwrap();
        assert!(volumes.is_empty());
    }

    #[tokio::test]
    async fn name_sidecar_overrides_displayed_name() {
        let tmp = TempDir::new().unwrap();
        let vol = tmp.path().join("dirname");
        fs::create_dir_all(vol.join("0")).await.unwrap();
        fs::write(vol.join(NAME_SIDECAR), b"PrettyName\n").await.unwrap();

        let config = DiscoveryConfig { volume_roots: vec![tmp.path().to_path_buf()], ..Default::default() };
        let volumes = discover(&config).await.unwrap();
        assert_eq!(volumes[0].name, "PrettyName");
    }

    #[test]
    fn select_errors_on_ambiguous_wildcard() {
        let volumes = vec![
            Volume::new(PathBuf::from("/a"), "DISC1", FsType::Dfs, false),
            Volume::new(PathBuf::from("/b"), "DISC2", FsType::Dfs, false),
        ];
        assert!(matches!(select(&volumes, "DISC*"), Err(BbcError::AmbiguousName)));
        assert!(select(&volumes, "DISC1").is_ok());
    }
}
