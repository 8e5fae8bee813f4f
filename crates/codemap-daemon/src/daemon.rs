//! Daemon lifecycle management.

use anyhow::{Context, Result};
use codemap_core::{pidfile, GlobalConfig, Monitor, MonitorOptions, ProjectRegistry};
use std::path::Path;

use crate::signals;

/// The main daemon process
pub struct Daemon {
    config: GlobalConfig,
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new(config: GlobalConfig) -> Result<Self> {
        // Ensure data directories exist
        config
            .ensure_dirs()
            .context("Failed to create data directories")?;

        Ok(Self { config })
    }

    /// Run the daemon
    pub async fn run(&self) -> Result<()> {
        // Check single instance
        acquire_pid_lock(&self.config.pid_file)?;

        let registry = ProjectRegistry::open_default().context("Failed to open project registry")?;

        tracing::info!(
            registry = %registry.path().display(),
            pid_file = %self.config.pid_file.display(),
            "Daemon starting"
        );

        let mut monitor = Monitor::new(
            registry,
            self.config.index_settings(),
            MonitorOptions::from_config(&self.config),
        );

        let result = monitor.run(signals::wait_for_shutdown()).await;
        if let Err(e) = &result {
            tracing::error!("Monitor error: {}", e);
        }

        // Cleanup
        self.cleanup();

        result.context("Monitor failed")
    }

    /// Cleanup resources on shutdown
    fn cleanup(&self) {
        tracing::info!("Cleaning up...");

        release_pid_lock(&self.config.pid_file);

        tracing::info!("Cleanup complete");
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        // Ensure cleanup happens even on panic
        release_pid_lock(&self.config.pid_file);
    }
}

/// Acquire PID lock to ensure single instance
fn acquire_pid_lock(pid_file: &Path) -> Result<()> {
    // Removes the file when it names a dead process
    if let Some(pid) = pidfile::running_daemon(pid_file) {
        if pid != std::process::id() {
            anyhow::bail!("Daemon already running (PID: {})", pid);
        }
    }

    if let Some(parent) = pid_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Write our PID
    std::fs::write(pid_file, std::process::id().to_string())
        .with_context(|| format!("Failed to write PID file {}", pid_file.display()))?;

    tracing::debug!(pid = std::process::id(), "PID lock acquired");

    Ok(())
}

/// Remove the PID file if it still names this process.
fn release_pid_lock(pid_file: &Path) {
    if pidfile::read_pid(pid_file) == Some(std::process::id()) {
        let _ = std::fs::remove_file(pid_file);
    }
}
