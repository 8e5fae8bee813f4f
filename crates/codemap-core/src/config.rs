//! Global configuration for codemap.

use crate::CoreError;
use codemap_indexer::{IndexSettings, ProjectConfig, DEFAULT_OUTPUT_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the configuration directory when set.
pub const CONFIG_DIR_ENV: &str = "CODEMAP_CONFIG_DIR";

const CONFIG_FILE: &str = "config.yaml";
const REGISTRY_FILE: &str = "projects.json";

/// Settings shared by every project and by the daemon itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Ignore patterns given to newly added projects
    #[serde(default = "default_ignore_patterns")]
    pub default_ignore_patterns: Vec<String>,

    /// Indexed extensions given to newly added projects
    #[serde(default = "default_file_extensions")]
    pub default_file_extensions: Vec<String>,

    /// Recognized manifest filenames
    #[serde(default = "default_config_files")]
    pub config_files: Vec<String>,

    /// Debounce window in seconds for newly added projects
    #[serde(default = "default_update_delay")]
    pub update_delay: f64,

    /// Maximum indexed file size in bytes (default: 1MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Name of the generated document at each project root
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory for the PID file and daemon log
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// How often the daemon re-reads the project registry, in seconds
    #[serde(default = "default_registry_sync_interval")]
    pub registry_sync_interval: f64,
}

fn default_ignore_patterns() -> Vec<String> {
    [
        ".git",
        "__pycache__",
        "node_modules",
        ".venv",
        "venv",
        "dist",
        "build",
        ".pytest_cache",
        ".mypy_cache",
        ".coverage",
        "*.pyc",
        "*.pyo",
        "*.pyd",
        ".DS_Store",
        "thumbs.db",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_file_extensions() -> Vec<String> {
    [
        ".py", ".js", ".jsx", ".ts", ".tsx", ".java", ".cpp", ".c", ".h", ".hpp", ".cs", ".rb",
        ".go", ".rs", ".php", ".swift", ".kt", ".scala", ".r", ".m", ".mm", ".sh", ".bash", ".zsh",
        ".lua", ".ahk",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_config_files() -> Vec<String> {
    IndexSettings::default().manifest_files.into_iter().collect()
}

fn default_update_delay() -> f64 {
    2.0
}

fn default_max_file_size() -> u64 {
    1024 * 1024 // 1MB
}

fn default_max_depth() -> usize {
    10
}

fn default_output_file() -> String {
    DEFAULT_OUTPUT_FILE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn home_or_current() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| home_or_current().join(".local/share"))
        .join("codemap")
}

fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| home_or_current().join(".local/state"))
        .join("codemap")
}

fn default_pid_file() -> PathBuf {
    default_state_dir().join("codemap.pid")
}

fn default_log_file() -> PathBuf {
    default_state_dir().join("daemon.log")
}

fn default_registry_sync_interval() -> f64 {
    5.0
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_ignore_patterns: default_ignore_patterns(),
            default_file_extensions: default_file_extensions(),
            config_files: default_config_files(),
            update_delay: default_update_delay(),
            max_file_size: default_max_file_size(),
            max_depth: default_max_depth(),
            output_file: default_output_file(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            state_dir: default_state_dir(),
            pid_file: default_pid_file(),
            log_file: default_log_file(),
            registry_sync_interval: default_registry_sync_interval(),
        }
    }
}

impl GlobalConfig {
    /// Directory holding `config.yaml` and the project registry.
    pub fn config_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .unwrap_or_else(|| home_or_current().join(".config"))
            .join("codemap")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join(CONFIG_FILE)
    }

    /// Location of the persisted project registry.
    pub fn registry_path() -> PathBuf {
        Self::config_dir().join(REGISTRY_FILE)
    }

    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let config_path = Self::config_path();

        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = ?config_path, error = %e, "Using default configuration");
                }
            }
        }

        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Ensure data and state directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.state_dir)?;
        for file in [&self.pid_file, &self.log_file] {
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Settings handed to every project indexer.
    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            manifest_files: self.config_files.iter().cloned().collect(),
            output_file: self.output_file.clone(),
        }
    }

    /// Configuration for a newly registered project at `path`.
    pub fn project_config(&self, path: impl Into<PathBuf>) -> ProjectConfig {
        let mut config = ProjectConfig::new(path)
            .with_extensions(self.default_file_extensions.iter().cloned())
            .with_ignore_patterns(self.default_ignore_patterns.iter().cloned());
        config.max_file_size = self.max_file_size;
        config.max_depth = self.max_depth;
        config.update_delay = self.update_delay;
        config
    }

    pub fn registry_sync_interval(&self) -> Duration {
        if self.registry_sync_interval.is_finite() && self.registry_sync_interval > 0.0 {
            Duration::from_secs_f64(self.registry_sync_interval)
        } else {
            Duration::from_secs_f64(default_registry_sync_interval())
        }
    }
}
