//! Modpack Installer Library
//!
//! This library keeps a directory of game mods in line with a declared
//! manifest. Missing mods are downloaded and verified against their SHA-512,
//! mods that are no longer listed are deleted.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use installer::{
//!     capacity, DescriptorIndex, HttpFetcher, InstallationTarget, LauncherConfig,
//!     Layout, Manifest, Reconciler, Target,
//! };
//!
//! # async fn example() -> installer::Result<()> {
//! let layout = Layout::from_data_dir("data");
//! let manifest = Manifest::load(&layout.manifest_path)?;
//! let config = LauncherConfig::load(&layout.config_path)?;
//!
//! // Refuse to start downloading without enough room for the pack
//! let available = capacity::query_available_space("/")?;
//! capacity::validate(available, capacity::query_required_space(&config))?;
//!
//! let fetcher = HttpFetcher::from_config(&config.fetch)?;
//! let reconciler = Reconciler::new(fetcher, &layout.index_dir, "/var/tmp/modpack-installer");
//!
//! let targets = [InstallationTarget::new(Target::Client, "/games/minecraft/mods")];
//! for report in reconciler.reconcile_all(&manifest, &targets).await? {
//!     println!("{}: installed {:?}, removed {:?}", report.target, report.installed, report.removed);
//! }
//!
//! // Rebuilding the index annotations of the manifest
//! let index = DescriptorIndex::build(&layout.index_dir)?;
//! let mut manifest = manifest;
//! manifest.resolve_and_persist(&index, &layout.manifest_path)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Per-target reconciliation**: core mods go everywhere, client and server mods only to their target
//! - **Hash gate**: nothing enters a target before its SHA-512 matched the descriptor
//! - **Sequential installs**: one mod at a time, in manifest order, aborting on the first failure
//! - **Prune after install**: stale files are removed only once every install succeeded

pub mod capacity;
pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod manifest;
pub mod platform;
pub mod reconcile;

// Re-export commonly used types for convenience
pub use config::{FetchConfig, LauncherConfig, Layout};
pub use error::{FileOperation, Result, SyncError};
pub use fetch::{
    Fetcher, HttpFetcher, IntoProgressCallback, LogProgressReporter, ProgressCallback, ProgressEvent,
    ProgressReporter, VerifiedFile,
};
pub use index::{Descriptor, DescriptorIndex, IndexEntry};
pub use manifest::{Category, Manifest, ModRecord, RequiredMod, Target};
pub use reconcile::{InstallationTarget, ReconcileReport, Reconciler, TargetPlan};
