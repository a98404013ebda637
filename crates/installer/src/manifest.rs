//! Desired-state manifest
//!
//! The manifest lists the mods of the modpack in three categories. `core` mods
//! go to every installation target, `client` and `server` mods only to their
//! own target. Each record may carry the path of its descriptor inside the
//! index tree once [`Manifest::resolve_and_persist`] has run.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{FileOperation, Result, SyncError};
use crate::index::DescriptorIndex;

/// Mod category, matching the top-level keys of the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Core,
    Client,
    Server,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Core, Category::Client, Category::Server];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Core => "core",
            Category::Client => "client",
            Category::Server => "server",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An installation target kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Client,
    Server,
}

impl Target {
    /// The category holding mods specific to this target
    pub fn category(self) -> Category {
        match self {
            Target::Client => Category::Client,
            Target::Server => Category::Server,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.category().as_str())
    }
}

/// Key older manifests use for the descriptor location
const LEGACY_RESOLVED_KEY: &str = "index";

/// A single mod entry of the manifest
///
/// Fields other than `name`, `filename` and `resolved_path` are kept as they
/// are and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModRecord {
    pub name: String,
    pub filename: String,
    /// Descriptor location relative to the index root, e.g. `client/iris.pw.toml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModRecord {
    pub fn new<S: Into<String>, F: Into<String>>(name: S, filename: F) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            resolved_path: None,
            extra: Map::new(),
        }
    }

    pub fn with_resolved_path<S: Into<String>>(mut self, resolved_path: S) -> Self {
        self.set_resolved_path(resolved_path.into());
        self
    }

    /// Descriptor location, read from `resolved_path` or the legacy `index` key
    pub fn resolved_path(&self) -> Option<&str> {
        self.resolved_path
            .as_deref()
            .or_else(|| self.extra.get(LEGACY_RESOLVED_KEY).and_then(Value::as_str))
    }

    /// Store the descriptor location under whichever key the record already uses
    pub fn set_resolved_path(&mut self, resolved_path: String) {
        if self.resolved_path.is_none() && self.extra.contains_key(LEGACY_RESOLVED_KEY) {
            self.extra.insert(LEGACY_RESOLVED_KEY.to_string(), Value::String(resolved_path));
        } else {
            self.resolved_path = Some(resolved_path);
        }
    }
}

/// A mod of a target's required set, with the category it was listed under
#[derive(Debug, Clone, Copy)]
pub struct RequiredMod<'a> {
    pub category: Category,
    pub record: &'a ModRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub core: Vec<ModRecord>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub client: Vec<ModRecord>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub server: Vec<ModRecord>,
}

/// A `null` category lists no mods
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<ModRecord>, D::Error> {
    Option::<Vec<ModRecord>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Manifest {
    /// Read and validate the manifest at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unreadable = |source: Box<dyn std::error::Error + Send + Sync>| SyncError::ManifestUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| unreadable(e.into()))?;
        let manifest: Manifest = serde_json::from_str(&contents).map_err(|e| unreadable(e.into()))?;
        manifest.validate_unique()?;

        for category in Category::ALL {
            let mods = manifest.mods(category);
            if mods.is_empty() {
                continue;
            }
            info!("[{}]", category.as_str().to_uppercase());
            for record in mods {
                info!("Found mod '{}' in latest list", record.name);
            }
        }

        Ok(manifest)
    }

    pub fn mods(&self, category: Category) -> &[ModRecord] {
        match category {
            Category::Core => &self.core,
            Category::Client => &self.client,
            Category::Server => &self.server,
        }
    }

    pub fn mods_mut(&mut self, category: Category) -> &mut Vec<ModRecord> {
        match category {
            Category::Core => &mut self.core,
            Category::Client => &mut self.client,
            Category::Server => &mut self.server,
        }
    }

    /// All records in manifest order: core, client, then server
    pub fn entries(&self) -> impl Iterator<Item = (Category, &ModRecord)> {
        Category::ALL
            .into_iter()
            .flat_map(move |category| self.mods(category).iter().map(move |record| (category, record)))
    }

    /// Reject a filename that appears more than once anywhere in the manifest
    pub fn validate_unique(&self) -> Result<()> {
        let mut seen: HashMap<&str, Category> = HashMap::new();
        for (category, record) in self.entries() {
            if let Some(first) = seen.insert(record.filename.as_str(), category) {
                return Err(SyncError::DuplicateMod {
                    filename: record.filename.clone(),
                    first,
                    second: category,
                });
            }
        }
        Ok(())
    }

    /// Core mods followed by the target's own mods, first occurrence of each filename wins
    pub fn required_set(&self, target: Target) -> Vec<RequiredMod<'_>> {
        let mut seen = HashSet::new();
        [Category::Core, target.category()]
            .into_iter()
            .flat_map(|category| {
                self.mods(category)
                    .iter()
                    .map(move |record| RequiredMod { category, record })
            })
            .filter(|required| seen.insert(required.record.filename.as_str()))
            .collect()
    }

    /// Attach the descriptor location of every record from the index
    pub fn resolve(&mut self, index: &DescriptorIndex) -> Result<()> {
        for category in Category::ALL {
            for record in self.mods_mut(category) {
                let entry = index.lookup(&record.filename).ok_or_else(|| SyncError::UnresolvedMod {
                    name: record.name.clone(),
                    filename: record.filename.clone(),
                })?;
                // Points at the directory the descriptor was found in, which may
                // differ from the category the manifest lists the mod under
                let resolved = entry.resolved_path();
                debug!("Resolved '{}' to '{}'", record.filename, resolved);
                record.set_resolved_path(resolved);
            }
        }
        Ok(())
    }

    /// Resolve every record, then write the manifest back to `path`
    ///
    /// The previous file is copied to `<path>.bak` first.
    pub fn resolve_and_persist<P: AsRef<Path>>(&mut self, index: &DescriptorIndex, path: P) -> Result<()> {
        self.resolve(index)?;
        self.save(path)
    }

    /// Write the manifest to `path`, keeping a `.bak` copy of any previous version
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if path.is_file() {
            let backup = backup_path(path);
            std::fs::copy(path, &backup).map_err(|e| SyncError::fs(&backup, FileOperation::Copy, e))?;
            debug!("Backed up manifest to {}", backup.display());
        }

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)
            .map_err(|e| SyncError::fs(path, FileOperation::Write, e.into()))?;
        buffer.push(b'\n');

        // Write next to the manifest, then rename over it
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &buffer).map_err(|e| SyncError::fs(&temp_path, FileOperation::Write, e))?;
        std::fs::rename(&temp_path, path).map_err(|e| SyncError::fs(path, FileOperation::Move, e))?;

        info!("Wrote manifest {}", path.display());
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_manifest() -> Manifest {
        Manifest {
            core: vec![ModRecord::new("Cobblemon", "cobblemon-1.0.jar")],
            client: vec![ModRecord::new("Iris", "iris-1.0.jar")],
            server: vec![ModRecord::new("Spark", "spark-1.0.jar")],
        }
    }

    fn filenames(required: &[RequiredMod<'_>]) -> Vec<String> {
        required.iter().map(|r| r.record.filename.clone()).collect()
    }

    #[test]
    fn test_load_reads_categories_and_legacy_index_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mods.json");
        std::fs::write(
            &path,
            r#"{
                "core": [{"name": "Cobblemon", "filename": "cobblemon-1.0.jar", "index": "core/cobblemon.pw.toml"}],
                "client": [{"name": "Iris", "filename": "iris-1.0.jar"}],
                "server": []
            }"#,
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.core.len(), 1);
        assert_eq!(manifest.core[0].resolved_path(), Some("core/cobblemon.pw.toml"));
        assert_eq!(manifest.client[0].resolved_path(), None);
        assert!(manifest.server.is_empty());
    }

    #[test]
    fn test_load_rejects_unknown_category() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mods.json");
        std::fs::write(&path, r#"{"core": [], "optional": []}"#).unwrap();

        let err = Manifest::load(&path).unwrap_err();
        assert!(matches!(err, SyncError::ManifestUnreadable { .. }));
    }

    #[test]
    fn test_load_missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = Manifest::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SyncError::ManifestUnreadable { .. }));
    }

    #[test]
    fn test_load_rejects_duplicate_filenames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mods.json");
        std::fs::write(
            &path,
            r#"{
                "core": [{"name": "Cobblemon", "filename": "cobblemon-1.0.jar"}],
                "server": [{"name": "Cobblemon again", "filename": "cobblemon-1.0.jar"}]
            }"#,
        )
        .unwrap();

        match Manifest::load(&path).unwrap_err() {
            SyncError::DuplicateMod { filename, first, second } => {
                assert_eq!(filename, "cobblemon-1.0.jar");
                assert_eq!(first, Category::Core);
                assert_eq!(second, Category::Server);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_required_set_propagates_core_to_every_target() {
        let manifest = sample_manifest();

        let client = manifest.required_set(Target::Client);
        assert_eq!(filenames(&client), vec!["cobblemon-1.0.jar", "iris-1.0.jar"]);
        assert_eq!(client[0].category, Category::Core);

        let server = manifest.required_set(Target::Server);
        assert_eq!(filenames(&server), vec!["cobblemon-1.0.jar", "spark-1.0.jar"]);
    }

    #[test]
    fn test_required_set_deduplicates_by_filename() {
        let mut manifest = sample_manifest();
        manifest.client.push(ModRecord::new("Cobblemon (client copy)", "cobblemon-1.0.jar"));

        let client = manifest.required_set(Target::Client);
        assert_eq!(filenames(&client), vec!["cobblemon-1.0.jar", "iris-1.0.jar"]);
        assert_eq!(client[0].record.name, "Cobblemon");
    }

    #[test]
    fn test_save_keeps_backup_and_uses_four_space_indent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mods.json");
        std::fs::write(&path, "{\"core\": []}").unwrap();

        sample_manifest().save(&path).unwrap();

        let backup = std::fs::read_to_string(dir.path().join("mods.json.bak")).unwrap();
        assert_eq!(backup, "{\"core\": []}");

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n    \"core\": ["));
        assert!(!written.contains("resolved_path"));
        assert!(!dir.path().join("mods.json.tmp").exists());
        assert_eq!(Manifest::load(&path).unwrap(), sample_manifest());
    }

    fn write_index(root: &Path, entries: &[(&str, &str, &str)]) -> DescriptorIndex {
        for (category, file, filename) in entries {
            let dir = root.join(category);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join(file),
                format!(
                    "name = \"{filename}\"\nfilename = \"{filename}\"\n\n[download]\nurl = \"https://cdn.example.com/{filename}\"\nhash = \"00\"\n"
                ),
            )
            .unwrap();
        }
        DescriptorIndex::build(root).unwrap()
    }

    #[test]
    fn test_load_treats_null_category_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mods.json");
        std::fs::write(
            &path,
            r#"{"core": [{"name": "Cobblemon", "filename": "cobblemon-1.0.jar"}], "client": null, "server": null}"#,
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.core.len(), 1);
        assert!(manifest.client.is_empty());
        assert!(manifest.server.is_empty());
    }

    #[test]
    fn test_resolve_and_persist_keeps_extra_fields_and_legacy_key() {
        let dir = tempdir().unwrap();
        let index = write_index(
            &dir.path().join("index"),
            &[
                ("core", "cobblemon.pw.toml", "cobblemon-1.0.jar"),
                ("client", "iris.pw.toml", "iris-1.0.jar"),
            ],
        );
        let path = dir.path().join("mods.json");
        std::fs::write(
            &path,
            r#"{
                "core": [{"name": "Cobblemon", "filename": "cobblemon-1.0.jar", "index": "core/old.pw.toml"}],
                "client": [{"name": "Iris", "filename": "iris-1.0.jar", "side": "both", "url": "x"}]
            }"#,
        )
        .unwrap();

        let mut manifest = Manifest::load(&path).unwrap();
        manifest.resolve_and_persist(&index, &path).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let cobblemon = &written["core"][0];
        assert_eq!(cobblemon["index"], "core/cobblemon.pw.toml");
        assert!(cobblemon.get("resolved_path").is_none());

        let iris = &written["client"][0];
        assert_eq!(iris["resolved_path"], "client/iris.pw.toml");
        assert_eq!(iris["side"], "both");
        assert_eq!(iris["url"], "x");
        assert_eq!(iris["name"], "Iris");
    }

    #[test]
    fn test_resolve_uses_directory_holding_the_descriptor() {
        let dir = tempdir().unwrap();
        // Listed as core, but its descriptor sits in client/
        let index = write_index(dir.path(), &[("client", "cobblemon.pw.toml", "cobblemon-1.0.jar")]);
        let mut manifest = Manifest {
            core: vec![ModRecord::new("Cobblemon", "cobblemon-1.0.jar")],
            ..Manifest::default()
        };

        manifest.resolve(&index).unwrap();
        assert_eq!(manifest.core[0].resolved_path(), Some("client/cobblemon.pw.toml"));
    }

    #[test]
    fn test_resolve_missing_descriptor_is_unresolved() {
        let dir = tempdir().unwrap();
        let index = write_index(dir.path(), &[("core", "cobblemon.pw.toml", "cobblemon-1.0.jar")]);
        let mut manifest = sample_manifest();

        let err = manifest.resolve(&index).unwrap_err();
        assert!(matches!(err, SyncError::UnresolvedMod { ref filename, .. } if filename == "iris-1.0.jar"));
    }
}
