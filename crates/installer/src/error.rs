//! Error types for the installer

use std::path::PathBuf;
use thiserror::Error;

use crate::manifest::Category;

/// Every failure the installer can report. All of them are fatal to the run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Could not find descriptor index directory '{path}'")]
    IndexUnavailable { path: PathBuf },

    #[error("Could not read manifest '{path}'")]
    ManifestUnreadable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Could not read config '{path}'")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Mod '{name}' ({filename}) has no descriptor in the index")]
    UnresolvedMod { name: String, filename: String },

    #[error("Mod file '{filename}' is listed in both '{first}' and '{second}'")]
    DuplicateMod {
        filename: String,
        first: Category,
        second: Category,
    },

    #[error("Mod file '{filename}' is declared by both '{first}' and '{second}'")]
    DuplicateDescriptor {
        filename: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Insufficient storage on device: {available_gb:.2} GB available, expected at least {required_gb} GB")]
    InsufficientStorage { available_gb: f64, required_gb: f64 },

    #[error("Could not read descriptor '{path}'")]
    DescriptorUnreadable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Download of '{url}' failed")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to create HTTP client")]
    HttpClient {
        #[source]
        source: reqwest::Error,
    },

    #[error("Hash mismatch for '{file}'\n  got:      {actual}\n  expected: {expected}")]
    HashMismatch {
        file: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Descriptor for mod '{name}' declares file '{declared}' but the manifest expects '{expected}'")]
    IntegrityMismatch {
        name: String,
        expected: String,
        declared: String,
    },

    #[error("Unsupported platform '{platform}'")]
    UnsupportedPlatform { platform: String },

    #[error("Could not find scratch directory '{path}'")]
    ScratchUnavailable { path: PathBuf },

    #[error("Installation target '{path}' does not exist or is not a directory")]
    TargetUnavailable { path: PathBuf },

    #[error("Failed {operation} '{path}'")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },
}

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Move,
    Copy,
    ListDir,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::Copy => write!(f, "copying"),
            FileOperation::ListDir => write!(f, "listing"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub(crate) fn fs(path: impl Into<PathBuf>, operation: FileOperation, source: std::io::Error) -> Self {
        SyncError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Short label used in log lines and tests
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::IndexUnavailable { .. } => "index_unavailable",
            SyncError::ManifestUnreadable { .. } => "manifest_unreadable",
            SyncError::ConfigUnreadable { .. } => "config_unreadable",
            SyncError::UnresolvedMod { .. } => "unresolved_mod",
            SyncError::DuplicateMod { .. } => "duplicate_mod",
            SyncError::DuplicateDescriptor { .. } => "duplicate_descriptor",
            SyncError::InsufficientStorage { .. } => "insufficient_storage",
            SyncError::DescriptorUnreadable { .. } => "descriptor_unreadable",
            SyncError::FetchFailed { .. } => "fetch_failed",
            SyncError::HttpClient { .. } => "http_client",
            SyncError::HashMismatch { .. } => "hash_mismatch",
            SyncError::IntegrityMismatch { .. } => "integrity_mismatch",
            SyncError::UnsupportedPlatform { .. } => "unsupported_platform",
            SyncError::ScratchUnavailable { .. } => "scratch_unavailable",
            SyncError::TargetUnavailable { .. } => "target_unavailable",
            SyncError::FileSystem { .. } => "file_system",
        }
    }
}
