//! Platform-specific locations
//!
//! The engine never looks at the platform itself; the binary resolves these
//! paths once and hands them in.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{FileOperation, Result, SyncError};

/// Subdirectory of the platform temp directory owned by the installer
pub const SCRATCH_NAMESPACE: &str = "modpack-installer";

/// Base temp directory the scratch space lives under
pub fn scratch_base() -> Result<PathBuf> {
    if cfg!(windows) {
        dirs::data_local_dir()
            .map(|local| local.join("Temp"))
            .ok_or_else(unsupported)
    } else if cfg!(unix) {
        // /tmp may be a small tmpfs; mod jars go to disk
        Ok(PathBuf::from("/var/tmp"))
    } else {
        Err(unsupported())
    }
}

/// Root of the volume checked by the capacity guard
pub fn capacity_root() -> Result<PathBuf> {
    if cfg!(windows) {
        Ok(PathBuf::from("C:\\"))
    } else if cfg!(unix) {
        Ok(PathBuf::from("/"))
    } else {
        Err(unsupported())
    }
}

fn unsupported() -> SyncError {
    SyncError::UnsupportedPlatform {
        platform: std::env::consts::OS.to_string(),
    }
}

/// Create the namespaced scratch directory under `base`
///
/// `base` itself must already exist.
pub fn prepare_scratch_dir<P: AsRef<Path>>(base: P) -> Result<PathBuf> {
    let base = base.as_ref();
    if !base.is_dir() {
        return Err(SyncError::ScratchUnavailable {
            path: base.to_path_buf(),
        });
    }

    let scratch = base.join(SCRATCH_NAMESPACE);
    std::fs::create_dir_all(&scratch).map_err(|e| SyncError::fs(&scratch, FileOperation::CreateDir, e))?;
    info!("Using temp directory: `{}`", scratch.display());
    Ok(scratch)
}
