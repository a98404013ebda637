//! Configuration types for the installer

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SyncError};

/// Contents of `launcher.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Minimum free space, in gigabytes, needed to install the modpack
    pub modpack_size_gb: f64,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl LauncherConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unreadable = |source: Box<dyn std::error::Error + Send + Sync>| SyncError::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| unreadable(e.into()))?;
        serde_json::from_str(&contents).map_err(|e| unreadable(e.into()))
    }
}

/// Configuration for mod downloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Time allowed to establish a connection
    pub connect_timeout_secs: u64,
    /// Time allowed for a whole download
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl FetchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            timeout_secs: 600, // large jars on slow mirrors
            user_agent: concat!("modpack-installer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// File locations derived from the data directory
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub index_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub config_path: PathBuf,
}

impl Layout {
    /// `<data>/index`, `<data>/mods.json` and `<data>/launcher.json`
    pub fn from_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            index_dir: data_dir.join("index"),
            manifest_path: data_dir.join("mods.json"),
            config_path: data_dir.join("launcher.json"),
        }
    }
}
