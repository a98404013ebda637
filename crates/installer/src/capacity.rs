//! Free space precondition

use std::path::Path;
use sysinfo::Disks;
use tracing::{debug, info};

use crate::config::LauncherConfig;
use crate::error::{Result, SyncError};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Free gigabytes on the volume holding `root`
///
/// Picks the disk with the longest mount point that prefixes `root`. When
/// nothing matches, the first disk reported is used.
pub fn query_available_space<P: AsRef<Path>>(root: P) -> Result<f64> {
    let root = root.as_ref();
    let disks = Disks::new_with_refreshed_list();

    let best_match = disks
        .list()
        .iter()
        .filter(|disk| root.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .or_else(|| disks.list().first());

    let disk = best_match.ok_or_else(|| SyncError::UnsupportedPlatform {
        platform: format!("{} (no disks reported)", std::env::consts::OS),
    })?;

    let available = disk.available_space() as f64 / BYTES_PER_GB;
    debug!(
        "Volume {} has {:.2} GB free",
        disk.mount_point().display(),
        available
    );
    Ok(available)
}

pub fn query_required_space(config: &LauncherConfig) -> f64 {
    config.modpack_size_gb
}

/// Fail when less than `required` gigabytes are available
pub fn validate(available: f64, required: f64) -> Result<()> {
    if available < required {
        return Err(SyncError::InsufficientStorage {
            available_gb: available,
            required_gb: required,
        });
    }
    info!("Free space OK: {:.2} GB available, {} GB required", available, required);
    Ok(())
}
