use anyhow::{Context, Result};
use log::debug;
use mongoly::{CollectionNaming, CollectionOptions, LoadedManifest, Manifest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "mongoly.toml";

/// Project context for mongoly operations
pub struct ProjectContext {
    /// Directory holding mongoly.toml, or the current directory when there is none
    pub project_root: PathBuf,
    /// Loaded configuration
    pub config: MongolyConfig,
}

/// Configuration stored in mongoly.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MongolyConfig {
    #[serde(default)]
    pub mongoly: MongolySettings,
    #[serde(default)]
    pub collections: CollectionSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MongolySettings {
    #[serde(default = "default_manifest")]
    pub manifest: String,
}

impl Default for MongolySettings {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
        }
    }
}

fn default_manifest() -> String {
    "documents.toml".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSettings {
    #[serde(default)]
    pub naming: CollectionNaming,
    #[serde(default)]
    pub drop_old_indexes: bool,
}

impl ProjectContext {
    /// Find and load project context from current directory or ancestors
    pub fn find() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::find_from(&current_dir)
    }

    /// Find project context starting from the given directory
    pub fn find_from(start: &Path) -> Result<Self> {
        match Self::find_project_root(start) {
            Some(root) => Self::from_root(root),
            None => Ok(Self {
                project_root: start.to_path_buf(),
                config: MongolyConfig::default(),
            }),
        }
    }

    /// Create context from a directory containing mongoly.toml
    pub fn from_root(project_root: PathBuf) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE);
        debug!("loading {}", config_path.display());
        let content = std::fs::read_to_string(&config_path).context("Failed to read mongoly.toml")?;
        let config: MongolyConfig = toml::from_str(&content).context("Failed to parse mongoly.toml")?;
        Ok(Self { project_root, config })
    }

    fn find_project_root(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(CONFIG_FILE).exists() {
                return Some(current);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Manifest path: the explicit override, else the configured one relative to the project root
    pub fn manifest_path(&self, explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => self.project_root.join(&self.config.mongoly.manifest),
        }
    }

    pub fn collection_defaults(&self) -> CollectionOptions {
        CollectionOptions {
            naming: self.config.collections.naming,
            drop_old_indexes: self.config.collections.drop_old_indexes,
            ..CollectionOptions::default()
        }
    }

    /// Reads and builds the manifest into a catalog
    pub fn load_manifest(&self, explicit: Option<&Path>) -> Result<LoadedManifest> {
        let path = self.manifest_path(explicit);
        let manifest =
            Manifest::load(&path).with_context(|| format!("Failed to load manifest {}", path.display()))?;
        manifest
            .build(&self.collection_defaults())
            .with_context(|| format!("Invalid manifest {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = MongolyConfig::default();
        assert_eq!(config.mongoly.manifest, "documents.toml");
        assert_eq!(config.collections.naming, CollectionNaming::SnakePlural);
        assert!(!config.collections.drop_old_indexes);
    }

    #[test]
    fn test_config_discovered_from_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[mongoly]\nmanifest = \"schema/docs.toml\"\n\n[collections]\nnaming = \"verbatim\"\n",
        )
        .unwrap();
        let nested = dir.path().join("src").join("models");
        fs::create_dir_all(&nested).unwrap();

        let ctx = ProjectContext::find_from(&nested).unwrap();
        assert_eq!(ctx.project_root, dir.path());
        assert_eq!(ctx.config.collections.naming, CollectionNaming::Verbatim);
        assert_eq!(ctx.manifest_path(None), dir.path().join("schema/docs.toml"));
        assert_eq!(ctx.manifest_path(Some(Path::new("other.json"))), PathBuf::from("other.json"));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ProjectContext::find_from(dir.path()).unwrap();
        assert_eq!(ctx.config, MongolyConfig::default());
    }

    #[test]
    fn test_load_manifest_applies_collection_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[collections]\nnaming = \"verbatim\"\ndrop_old_indexes = true\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("documents.toml"),
            "[[document]]\nname = \"CatOwner\"\n\n[[document.field]]\nname = \"email\"\ntype = \"String\"\n",
        )
        .unwrap();

        let ctx = ProjectContext::find_from(dir.path()).unwrap();
        let mut loaded = ctx.load_manifest(None).unwrap();
        let plan = loaded.plan("CatOwner").unwrap().unwrap();
        assert_eq!(plan.collection_name, "CatOwner");
        assert!(plan.drop_old_indexes);
    }
}
