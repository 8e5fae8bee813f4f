//! Persisted set of monitored projects.
//!
//! Stored as pretty JSON mapping each canonical project root to its
//! settings. The CLI edits the file; the daemon re-reads it periodically.

use crate::{CoreError, GlobalConfig};
use codemap_indexer::ProjectConfig;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Project registry backed by a JSON file
#[derive(Debug)]
pub struct ProjectRegistry {
    path: PathBuf,
    projects: BTreeMap<PathBuf, ProjectConfig>,
}

impl ProjectRegistry {
    /// Open the registry at `path`. A missing file is an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let mut registry = Self {
            path: path.into(),
            projects: BTreeMap::new(),
        };
        registry.load()?;
        Ok(registry)
    }

    /// Open the registry in the configuration directory.
    pub fn open_default() -> Result<Self, CoreError> {
        Self::open(GlobalConfig::registry_path())
    }

    /// File backing this registry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the registry from disk, replacing the in-memory entries.
    ///
    /// A corrupt file is reported and treated as empty.
    pub fn load(&mut self) -> Result<(), CoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.projects.clear();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let projects: BTreeMap<PathBuf, ProjectConfig> = match serde_json::from_str(&content) {
            Ok(projects) => projects,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Ignoring unreadable project registry");
                BTreeMap::new()
            }
        };

        // The key is authoritative for the project root.
        self.projects = projects
            .into_iter()
            .map(|(root, mut config)| {
                config.path = root.clone();
                (root, config)
            })
            .collect();

        debug!(path = ?self.path, projects = self.projects.len(), "Registry loaded");
        Ok(())
    }

    /// Write the registry to disk.
    pub fn save(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.projects)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Register the directory at `path` with the global defaults.
    ///
    /// Returns the existing entry unchanged when the root is already
    /// registered.
    pub fn add_project(
        &mut self,
        path: &Path,
        defaults: &GlobalConfig,
    ) -> Result<ProjectConfig, CoreError> {
        let root = path
            .canonicalize()
            .map_err(|_| CoreError::InvalidPath(path.display().to_string()))?;
        if !root.is_dir() {
            return Err(CoreError::InvalidPath(root.display().to_string()));
        }

        if let Some(existing) = self.projects.get(&root) {
            return Ok(existing.clone());
        }

        let config = defaults.project_config(root.clone());
        self.projects.insert(root.clone(), config.clone());
        self.save()?;

        info!(path = ?root, "Project registered");
        Ok(config)
    }

    /// Unregister a project. Returns false when it was not registered.
    pub fn remove_project(&mut self, path: &Path) -> Result<bool, CoreError> {
        let root = registry_key(path)?;
        if self.projects.remove(&root).is_none() {
            return Ok(false);
        }
        self.save()?;

        info!(path = ?root, "Project unregistered");
        Ok(true)
    }

    pub fn get_project(&self, path: &Path) -> Option<&ProjectConfig> {
        let root = registry_key(path).ok()?;
        self.projects.get(&root)
    }

    /// All registered projects, ordered by path.
    pub fn list_projects(&self) -> Vec<&ProjectConfig> {
        self.projects.values().collect()
    }

    /// Registered projects whose monitoring is enabled.
    pub fn enabled_projects(&self) -> impl Iterator<Item = &ProjectConfig> {
        self.projects.values().filter(|p| p.enabled)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Enable or disable monitoring for a registered project.
    pub fn set_enabled(&mut self, path: &Path, enabled: bool) -> Result<(), CoreError> {
        let root = registry_key(path)?;
        let config = self
            .projects
            .get_mut(&root)
            .ok_or_else(|| CoreError::NotRegistered(root.clone()))?;

        if config.enabled != enabled {
            config.enabled = enabled;
            self.save()?;
        }
        Ok(())
    }

    /// Drop projects whose root no longer exists or is not a directory.
    /// Returns the removed roots.
    pub fn cleanup_stale(&mut self) -> Result<Vec<PathBuf>, CoreError> {
        let stale: Vec<PathBuf> = self
            .projects
            .keys()
            .filter(|root| !root.is_dir())
            .cloned()
            .collect();

        if stale.is_empty() {
            return Ok(stale);
        }

        for root in &stale {
            self.projects.remove(root);
            info!(path = ?root, "Removed stale project");
        }
        self.save()?;

        Ok(stale)
    }
}

/// Canonical form of `path` when it exists, otherwise an absolute form, so
/// that roots deleted from disk can still be looked up.
fn registry_key(path: &Path) -> Result<PathBuf, CoreError> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
