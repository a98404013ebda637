//! Reconciliation engine
//!
//! Converges an installation target directory onto the required set of the
//! manifest. Each target is handled on its own:
//!
//! 1. enumerate the files directly inside the target
//! 2. compute the required set (core plus the target's category)
//! 3. classify every required mod as up to date or missing
//! 4. fetch, verify and relocate the missing mods one at a time, in manifest order
//! 5. delete local files that are not required
//!
//! Pruning only starts once every install of the target succeeded, and a
//! downloaded file only enters the target after its hash was verified.

use std::collections::{BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{FileOperation, Result, SyncError};
use crate::fetch::Fetcher;
use crate::index::{self, Descriptor};
use crate::manifest::{Manifest, RequiredMod, Target};

/// A directory mods get installed into
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationTarget {
    pub kind: Target,
    pub dir: PathBuf,
}

impl InstallationTarget {
    pub fn new<P: Into<PathBuf>>(kind: Target, dir: P) -> Self {
        Self { kind, dir: dir.into() }
    }
}

/// What needs to happen to one target
#[derive(Debug, Clone)]
pub struct TargetPlan<'a> {
    pub target: Target,
    pub dir: PathBuf,
    /// Required mods already present, in manifest order
    pub up_to_date: Vec<RequiredMod<'a>>,
    /// Required mods to install, in manifest order
    pub missing: Vec<RequiredMod<'a>>,
    /// Local files that are not required
    pub stale: Vec<String>,
}

impl TargetPlan<'_> {
    pub fn is_converged(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty()
    }
}

/// Outcome of reconciling one target
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    pub target: Target,
    pub up_to_date: Vec<String>,
    pub installed: Vec<String>,
    pub removed: Vec<String>,
}

/// Applies a manifest to installation targets
pub struct Reconciler<F: Fetcher> {
    fetcher: F,
    index_root: PathBuf,
    scratch_dir: PathBuf,
}

impl<F: Fetcher> Reconciler<F> {
    /// `scratch_dir` must exist; verified downloads wait there before relocation
    pub fn new<I: Into<PathBuf>, S: Into<PathBuf>>(fetcher: F, index_root: I, scratch_dir: S) -> Self {
        Self {
            fetcher,
            index_root: index_root.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Reconcile every target in turn, stopping at the first failure
    ///
    /// Targets finished before a failure keep their changes.
    pub async fn reconcile_all(
        &self,
        manifest: &Manifest,
        targets: &[InstallationTarget],
    ) -> Result<Vec<ReconcileReport>> {
        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            reports.push(self.reconcile(manifest, target).await?);
        }
        Ok(reports)
    }

    /// Install missing mods, then prune stale files, for a single target
    pub async fn reconcile(&self, manifest: &Manifest, target: &InstallationTarget) -> Result<ReconcileReport> {
        index::require_root(&self.index_root)?;
        info!("Reconciling {} mods in {}", target.kind, target.dir.display());
        let plan = plan(manifest, target).await?;

        let mut report = ReconcileReport {
            target: plan.target,
            up_to_date: Vec::new(),
            installed: Vec::new(),
            removed: Vec::new(),
        };

        for required in &plan.up_to_date {
            info!("[ ok ] Mod '{}' already installed and up to date", required.record.name);
            report.up_to_date.push(required.record.filename.clone());
        }

        for required in &plan.missing {
            info!("[ .. ] Installing mod '{}'", required.record.name);
            self.install(required, &plan.dir).await?;
            info!("[ ok ] Installed mod '{}'", required.record.name);
            report.installed.push(required.record.filename.clone());
        }

        for name in &plan.stale {
            let path = plan.dir.join(name);
            info!("Deleting file {}", name);
            fs::remove_file(&path)
                .await
                .map_err(|e| SyncError::fs(&path, FileOperation::Delete, e))?;
            report.removed.push(name.clone());
        }

        info!(
            "{}: {} up to date, {} installed, {} removed",
            target.kind,
            report.up_to_date.len(),
            report.installed.len(),
            report.removed.len()
        );
        Ok(report)
    }

    async fn install(&self, required: &RequiredMod<'_>, target_dir: &Path) -> Result<()> {
        let record = required.record;
        let resolved_path = record.resolved_path().ok_or_else(|| SyncError::UnresolvedMod {
            name: record.name.clone(),
            filename: record.filename.clone(),
        })?;

        let descriptor = Descriptor::read(self.index_root.join(resolved_path))?;
        debug!(
            "Descriptor '{}' for {} side",
            descriptor.display_name,
            descriptor.side.as_deref().unwrap_or("both")
        );
        if descriptor.filename != record.filename {
            return Err(SyncError::IntegrityMismatch {
                name: record.name.clone(),
                expected: record.filename.clone(),
                declared: descriptor.filename,
            });
        }

        let scratch_path = self.scratch_dir.join(&descriptor.filename);
        let verified = match self
            .fetcher
            .fetch_and_verify(&descriptor.download.url, &scratch_path, &descriptor.download.hash)
            .await
        {
            Ok(verified) => verified,
            Err(e) => {
                discard(&scratch_path).await;
                return Err(e);
            }
        };
        debug!("Verified {} ({} bytes)", verified.path.display(), verified.size);

        relocate(&verified.path, &target_dir.join(&descriptor.filename)).await
    }
}

/// Compute the plan for a single target without changing anything
pub async fn plan<'m>(manifest: &'m Manifest, target: &InstallationTarget) -> Result<TargetPlan<'m>> {
    if !target.dir.is_dir() {
        return Err(SyncError::TargetUnavailable {
            path: target.dir.clone(),
        });
    }

    let local = enumerate_local(&target.dir).await?;
    let required = manifest.required_set(target.kind);

    let required_names: HashSet<&str> = required.iter().map(|r| r.record.filename.as_str()).collect();
    let stale = local
        .iter()
        .filter(|name| !required_names.contains(name.as_str()))
        .cloned()
        .collect();

    let (up_to_date, missing): (Vec<_>, Vec<_>) = required
        .into_iter()
        .partition(|required| local.contains(&required.record.filename));

    Ok(TargetPlan {
        target: target.kind,
        dir: target.dir.clone(),
        up_to_date,
        missing,
        stale,
    })
}

/// Names of the regular files directly inside `dir`
async fn enumerate_local(dir: &Path) -> Result<BTreeSet<String>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| SyncError::fs(dir, FileOperation::ListDir, e))?;

    let mut files = BTreeSet::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SyncError::fs(dir, FileOperation::ListDir, e))?
    {
        let path = entry.path();
        // Symlinks count when they lead to a file; dangling ones are skipped
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => continue,
            Err(e) => {
                debug!("Skipping unreadable entry {}: {}", path.display(), e);
                continue;
            }
        }
        match entry.file_name().into_string() {
            Ok(name) => {
                files.insert(name);
            }
            Err(name) => warn!("Ignoring non UTF-8 file name {:?}", name),
        }
    }
    Ok(files)
}

/// Move a verified file into its target directory
///
/// Falls back to copy-then-rename inside the target when the scratch
/// directory lives on another filesystem, so the final name still appears
/// in one step.
async fn relocate(from: &Path, to: &Path) -> Result<()> {
    debug!("Moving {} to {}", from.display(), to.display());
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => copy_into_place(from, to).await,
        Err(e) => Err(SyncError::fs(to, FileOperation::Move, e)),
    }
}

/// Copy `from` to a hidden sibling of `to`, then rename it over `to`
///
/// A failed copy leaves only the `.partial` file behind, which the next run
/// prunes as stale.
async fn copy_into_place(from: &Path, to: &Path) -> Result<()> {
    let partial = partial_path(to);
    if let Err(e) = fs::copy(from, &partial).await {
        discard(&partial).await;
        return Err(SyncError::fs(&partial, FileOperation::Copy, e));
    }
    fs::rename(&partial, to)
        .await
        .map_err(|e| SyncError::fs(to, FileOperation::Move, e))?;
    discard(from).await;
    Ok(())
}

/// `.<name>.partial` next to `path`
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed scratch file {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove scratch file {}: {}", path.display(), e),
    }
}
