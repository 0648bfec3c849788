//! `.gitattributes` manipulator boundary.
//!
//! Volumes kept under git can mark BBC binaries as non-text so line-ending
//! normalisation doesn't corrupt them; the policy for *when* to do that is
//! external tooling. This trait is the seam a real implementation would
//! plug into — the no-op default is what the façade uses today.

use std::path::Path;

use crate::error::BbcResult;

/// Hooks a volume's adapter calls when an operation might need a
/// `.gitattributes` entry updated. The default implementation does nothing;
/// a git-aware deployment would supply its own.
pub trait GitAttributes: Send + Sync {
    fn mark_volume_not_text(&self, _volume_root: &Path) -> BbcResult<()> {
        Ok(())
    }

    fn mark_file_basic(&self, _path: &Path) -> BbcResult<()> {
        Ok(())
    }

    fn on_rename(&self, _from: &Path, _to: &Path) -> BbcResult<()> {
        Ok(())
    }

    fn on_delete(&self, _path: &Path) -> BbcResult<()> {
        Ok(())
    }
}

/// The default no-op policy.
pub struct NoGitAttributes;

impl GitAttributes for NoGitAttributes {}
