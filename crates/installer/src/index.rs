//! Descriptor index
//!
//! The index is a directory tree with one subdirectory per category, each
//! holding one TOML descriptor per mod:
//!
//! ```toml
//! name = "Iris Shaders"
//! filename = "iris-1.0.jar"
//!
//! [download]
//! url = "https://cdn.example.com/iris-1.0.jar"
//! hash-format = "sha512"
//! hash = "..."
//! ```
//!
//! Descriptors are keyed by the `filename` they declare, which need not match
//! the name of the descriptor file itself.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{FileOperation, Result, SyncError};

const SUPPORTED_HASH_FORMAT: &str = "sha512";

/// A per-mod descriptor record
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Descriptor {
    #[serde(rename = "name")]
    pub display_name: String,
    pub filename: String,
    #[serde(default)]
    pub side: Option<String>,
    pub download: DownloadInfo,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DownloadInfo {
    pub url: String,
    /// Hex encoded SHA-512 of the mod file
    pub hash: String,
    #[serde(default)]
    pub hash_format: Option<String>,
}

impl Descriptor {
    /// Parse the descriptor file at `path`
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| SyncError::DescriptorUnreadable {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        let descriptor: Descriptor = toml::from_str(contents).map_err(|e| SyncError::DescriptorUnreadable {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;

        // Installed under this name, so it must not reach outside the target
        if Path::new(&descriptor.filename).file_name() != Some(OsStr::new(&descriptor.filename)) {
            return Err(SyncError::DescriptorUnreadable {
                path: path.to_path_buf(),
                source: format!("filename '{}' is not a plain file name", descriptor.filename).into(),
            });
        }

        if let Some(format) = descriptor.download.hash_format.as_deref() {
            if !format.eq_ignore_ascii_case(SUPPORTED_HASH_FORMAT) {
                return Err(SyncError::DescriptorUnreadable {
                    path: path.to_path_buf(),
                    source: format!("unsupported hash format '{format}', expected '{SUPPORTED_HASH_FORMAT}'").into(),
                });
            }
        }

        Ok(descriptor)
    }
}

/// Where a descriptor was found inside the index tree
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Name of the category subdirectory holding the descriptor
    pub category_dir: String,
    /// Full path of the descriptor file
    pub path: PathBuf,
}

impl IndexEntry {
    /// Location relative to the index root, always `/` separated
    ///
    /// Uses the directory the descriptor was found in, not the category the
    /// manifest lists the mod under.
    pub fn resolved_path(&self) -> String {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}", self.category_dir, file_name)
    }
}

/// Lookup from mod filename to descriptor location
#[derive(Debug, Clone, Default)]
pub struct DescriptorIndex {
    root: PathBuf,
    entries: BTreeMap<String, IndexEntry>,
}

impl DescriptorIndex {
    /// Scan every category subdirectory of `root` and parse each descriptor
    pub fn build<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = require_root(root.as_ref())?;

        let mut index = Self {
            root: root.to_path_buf(),
            entries: BTreeMap::new(),
        };

        for category_dir in sorted_entries(root)? {
            if !category_dir.is_dir() {
                continue;
            }
            let category_name = category_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            for descriptor_path in sorted_entries(&category_dir)? {
                if !descriptor_path.is_file() {
                    continue;
                }
                let descriptor = Descriptor::read(&descriptor_path)?;
                index.insert(
                    descriptor.filename,
                    IndexEntry {
                        category_dir: category_name.clone(),
                        path: descriptor_path,
                    },
                )?;
            }
        }

        debug!("Indexed {} descriptors under {}", index.len(), root.display());
        Ok(index)
    }

    fn insert(&mut self, filename: String, entry: IndexEntry) -> Result<()> {
        if let Some(existing) = self.entries.get(&filename) {
            return Err(SyncError::DuplicateDescriptor {
                filename,
                first: existing.path.clone(),
                second: entry.path,
            });
        }
        self.entries.insert(filename, entry);
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lookup(&self, filename: &str) -> Option<&IndexEntry> {
        self.entries.get(filename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fail with `IndexUnavailable` unless `root` is a directory
pub fn require_root(root: &Path) -> Result<&Path> {
    if !root.is_dir() {
        return Err(SyncError::IndexUnavailable {
            path: root.to_path_buf(),
        });
    }
    Ok(root)
}

/// Directory entries sorted by path, so builds are deterministic
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| SyncError::fs(dir, FileOperation::ListDir, e))?;
    let mut paths = read_dir
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| SyncError::fs(dir, FileOperation::ListDir, e))?;
    paths.sort();
    Ok(paths)
}
