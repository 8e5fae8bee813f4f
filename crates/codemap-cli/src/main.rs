//! Codemap CLI
//!
//! Command-line interface for managing monitored projects and the codemap
//! daemon. Running `codemap` without a subcommand adds the current directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codemap_core::{pidfile, regenerate_once, GlobalConfig, ProjectRegistry};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

const DAEMON_BIN: &str = "codemap-daemon";

#[derive(Parser)]
#[command(name = "codemap")]
#[command(about = "Codemap - keeps a live code index of your projects for AI coding assistants")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a project to monitor
    Add {
        /// Project path (default: current directory)
        path: Option<PathBuf>,
    },

    /// Remove a project from monitoring
    Remove {
        /// Project path (default: current directory)
        path: Option<PathBuf>,
    },

    /// List all monitored projects
    List,

    /// Show daemon status
    Status,

    /// Start the codemap daemon
    Start {
        /// Run in foreground instead of detaching
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the codemap daemon
    Stop,

    /// Register the current directory and write its index once
    Init {
        /// Initialize even if the index document already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Regenerate a project's index now
    Update {
        /// Project path (default: current directory)
        path: Option<PathBuf>,
    },

    /// Remove projects whose directory no longer exists
    Cleanup,

    /// Show daemon logs
    Logs {
        /// Follow log output
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Simple logging for CLI
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt().with_target(false).init();
    }

    let cli = Cli::parse();
    let config = GlobalConfig::load();

    match cli.command {
        None => cmd_add(&config, None),
        Some(Commands::Add { path }) => cmd_add(&config, path),
        Some(Commands::Remove { path }) => cmd_remove(path),
        Some(Commands::List) => cmd_list(&config),
        Some(Commands::Status) => cmd_status(&config),
        Some(Commands::Start { foreground }) => cmd_start(&config, foreground).await,
        Some(Commands::Stop) => cmd_stop(&config).await,
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Update { path }) => cmd_update(&config, path),
        Some(Commands::Cleanup) => cmd_cleanup(),
        Some(Commands::Logs { follow, lines }) => cmd_logs(&config, follow, lines).await,
    }
}

/// The given path, or the current directory.
fn project_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("Failed to read current directory"),
    }
}

fn open_registry() -> Result<ProjectRegistry> {
    ProjectRegistry::open_default().context("Failed to open project registry")
}

fn cmd_add(config: &GlobalConfig, path: Option<PathBuf>) -> Result<()> {
    let path = project_path(path)?;
    let mut registry = open_registry()?;

    if let Some(existing) = registry.get_project(&path) {
        println!("Already monitoring: {}", existing.path.display());
        return Ok(());
    }

    let project = registry
        .add_project(&path, config)
        .with_context(|| format!("{} is not a valid directory", path.display()))?;
    info!(path = ?project.path, "Registered project");
    println!("✓ Added project: {}", project.path.display());

    if pidfile::running_daemon(&config.pid_file).is_some() {
        println!("Daemon is running - the project will be monitored automatically.");
    } else {
        println!("Daemon not running. Start with: codemap start");
    }

    Ok(())
}

fn cmd_remove(path: Option<PathBuf>) -> Result<()> {
    let path = project_path(path)?;
    let mut registry = open_registry()?;

    if !registry.remove_project(&path)? {
        anyhow::bail!("Project not found: {}", path.display());
    }
    info!(path = ?path, "Unregistered project");

    println!("✓ Removed project: {}", path.display());
    Ok(())
}

fn cmd_list(config: &GlobalConfig) -> Result<()> {
    let registry = open_registry()?;
    let projects = registry.list_projects();

    if projects.is_empty() {
        println!("No projects being monitored.");
        return Ok(());
    }

    let width = projects
        .iter()
        .map(|p| p.path.display().to_string().len())
        .max()
        .unwrap_or(0)
        .max("PATH".len());

    println!("{:<width$}  {:<10}  {:>5}", "PATH", "STATUS", "FILES");
    for project in projects {
        let status = if project.enabled { "enabled" } else { "disabled" };
        let files = indexed_file_count(&project.path.join(&config.output_file))
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "{:<width$}  {:<10}  {:>5}",
            project.path.display(),
            status,
            files
        );
    }

    Ok(())
}

/// Number of files listed in a generated index document.
fn indexed_file_count(doc: &Path) -> Option<usize> {
    let content = std::fs::read_to_string(doc).ok()?;
    let count = content
        .lines()
        .filter(|line| line.starts_with("#### `"))
        .count();
    (count > 0).then_some(count)
}

fn cmd_status(config: &GlobalConfig) -> Result<()> {
    match pidfile::running_daemon(&config.pid_file) {
        Some(pid) => {
            let registry = open_registry()?;
            println!("✓ Daemon is running (PID: {})", pid);
            println!(
                "  Monitoring {} project(s)",
                registry.enabled_projects().count()
            );
        }
        None => {
            println!("✗ Daemon is not running.");
            println!("\nStart with: codemap start");
        }
    }

    Ok(())
}

/// The daemon binary next to this executable, falling back to `PATH`.
fn daemon_command() -> Command {
    let sibling = std::env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name(DAEMON_BIN))
        .filter(|path| path.is_file());

    match sibling {
        Some(path) => Command::new(path),
        None => Command::new(DAEMON_BIN),
    }
}

async fn cmd_start(config: &GlobalConfig, foreground: bool) -> Result<()> {
    if let Some(pid) = pidfile::running_daemon(&config.pid_file) {
        println!("Codemap daemon is already running (PID: {}).", pid);
        return Ok(());
    }

    let removed = open_registry()?.cleanup_stale()?;
    if !removed.is_empty() {
        println!("Cleaned up {} stale project(s)", removed.len());
    }

    if foreground {
        println!("Starting codemap daemon in foreground...");
        println!("Press Ctrl+C to stop.");

        let status = daemon_command()
            .status()
            .context("Failed to start daemon. Is codemap-daemon in PATH?")?;

        if !status.success() {
            anyhow::bail!("Daemon exited with error");
        }
        return Ok(());
    }

    config
        .ensure_dirs()
        .context("Failed to create state directory")?;
    let log = File::create(&config.log_file)
        .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;
    let log_err = log.try_clone()?;

    let mut command = daemon_command();
    debug!(program = ?command.get_program(), log = ?config.log_file, "Spawning daemon");
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Detach from the terminal's process group
        command.process_group(0);
    }

    let mut child = command
        .spawn()
        .context("Failed to start daemon. Is codemap-daemon in PATH?")?;

    // Give it a moment to start
    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Some(status) = child.try_wait()? {
        anyhow::bail!(
            "Daemon exited during startup ({}). Check logs: {}",
            status,
            config.log_file.display()
        );
    }

    info!(pid = child.id(), "Daemon started");
    println!("✓ Codemap daemon started (PID: {})", child.id());
    println!("  Logs: {}", config.log_file.display());
    Ok(())
}

async fn cmd_stop(config: &GlobalConfig) -> Result<()> {
    let Some(pid) = pidfile::running_daemon(&config.pid_file) else {
        println!("Codemap daemon is not running.");
        return Ok(());
    };

    pidfile::terminate(pid).with_context(|| format!("Failed to stop daemon (PID: {})", pid))?;

    // Wait a moment for cleanup
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if !pidfile::is_process_running(pid) {
            break;
        }
    }

    if pidfile::is_process_running(pid) {
        warn!(pid, "Daemon ignored SIGTERM, sending SIGKILL");
        println!("Daemon didn't stop gracefully, forcing...");
        pidfile::kill(pid).with_context(|| format!("Failed to kill daemon (PID: {})", pid))?;
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    if pidfile::read_pid(&config.pid_file) == Some(pid) {
        if let Err(e) = std::fs::remove_file(&config.pid_file) {
            warn!(path = ?config.pid_file, error = %e, "Failed to remove PID file");
        }
    }
    info!(pid, "Daemon stopped");

    println!("✓ Daemon stopped.");
    Ok(())
}

fn cmd_init(config: &GlobalConfig, force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let doc = cwd.join(&config.output_file);

    if doc.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to initialize anyway",
            config.output_file
        );
    }

    let mut registry = open_registry()?;
    let project = registry.add_project(&cwd, config)?;

    let outcome = regenerate_once(project, config.index_settings())
        .context("Failed to create index")?;

    println!("✓ Wrote {}", outcome.path().display());
    println!("  Project added to the monitoring list");
    Ok(())
}

fn cmd_update(config: &GlobalConfig, path: Option<PathBuf>) -> Result<()> {
    let path = project_path(path)?;
    let registry = open_registry()?;

    let project = match registry.get_project(&path) {
        Some(project) => project.clone(),
        None => {
            let root = path
                .canonicalize()
                .with_context(|| format!("Invalid path: {}", path.display()))?;
            config.project_config(root)
        }
    };

    let outcome = regenerate_once(project, config.index_settings())
        .context("Failed to update index")?;

    if outcome.was_written() {
        println!("✓ Updated {}", outcome.path().display());
    } else {
        println!("{} is up to date", outcome.path().display());
    }
    Ok(())
}

fn cmd_cleanup() -> Result<()> {
    let removed = open_registry()?.cleanup_stale()?;

    if removed.is_empty() {
        println!("No stale projects found.");
    } else {
        for path in &removed {
            info!(path = ?path, "Removed stale project");
            println!("  removed {}", path.display());
        }
        println!("✓ Cleaned up {} stale project(s)", removed.len());
    }
    Ok(())
}

async fn cmd_logs(config: &GlobalConfig, follow: bool, lines: usize) -> Result<()> {
    let log_file = &config.log_file;

    if !log_file.exists() {
        println!("No log file found.");
        println!("Expected location: {}", log_file.display());
        return Ok(());
    }

    let mut file =
        File::open(log_file).with_context(|| format!("Failed to open {}", log_file.display()))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    print!("{}", last_lines(&content, lines));

    if !follow {
        return Ok(());
    }

    let mut position = file.stream_position()?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
        }

        let len = file.metadata()?.len();
        if len < position {
            // Truncated by a daemon restart
            position = 0;
        }
        if len == position {
            continue;
        }

        file.seek(SeekFrom::Start(position))?;
        let mut appended = String::new();
        file.read_to_string(&mut appended)?;
        print!("{}", appended);
        position = file.stream_position()?;
    }
}

/// The last `n` lines of `content`, each newline-terminated.
fn last_lines(content: &str, n: usize) -> String {
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(n);
    all[start..].iter().map(|line| format!("{}\n", line)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cli_parses_default_and_subcommands() {
        let cli = Cli::try_parse_from(["codemap"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["codemap", "logs", "-n", "5", "--follow"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Logs {
                follow: true,
                lines: 5
            })
        ));

        let cli = Cli::try_parse_from(["codemap", "add", "/tmp/project"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Add { path: Some(ref p) }) if p == Path::new("/tmp/project")
        ));

        let cli = Cli::try_parse_from(["codemap", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Init { force: true })));
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc\n", 2), "b\nc\n");
        assert_eq!(last_lines("a\nb", 5), "a\nb\n");
        assert_eq!(last_lines("a\nb\n", 0), "");
        assert_eq!(last_lines("", 3), "");
    }

    #[test]
    fn test_indexed_file_count() {
        let temp_dir = tempdir().unwrap();
        let doc = temp_dir.path().join("CLAUDE.md");
        assert_eq!(indexed_file_count(&doc), None);

        std::fs::write(
            &doc,
            "## Code Index\n\n### Project Code Files\n\n#### `a.py`\n\n#### `b/c.rs`\n",
        )
        .unwrap();
        assert_eq!(indexed_file_count(&doc), Some(2));

        std::fs::write(&doc, "# Notes\n").unwrap();
        assert_eq!(indexed_file_count(&doc), None);
    }

    #[test]
    fn test_add_remove_cleanup_round() {
        let config_dir = tempdir().unwrap();
        let projects = tempdir().unwrap();
        std::env::set_var(codemap_core::CONFIG_DIR_ENV, config_dir.path());

        let kept = projects.path().join("kept");
        let gone = projects.path().join("gone");
        std::fs::create_dir_all(&kept).unwrap();
        std::fs::create_dir_all(&gone).unwrap();

        let mut config = GlobalConfig::default();
        config.pid_file = config_dir.path().join("codemap.pid");
        cmd_add(&config, Some(kept.clone())).unwrap();
        cmd_add(&config, Some(gone.clone())).unwrap();
        assert_eq!(open_registry().unwrap().len(), 2);

        cmd_remove(Some(kept.clone())).unwrap();
        assert!(cmd_remove(Some(kept)).is_err());

        std::fs::remove_dir(&gone).unwrap();
        cmd_cleanup().unwrap();
        assert!(open_registry().unwrap().is_empty());

        std::env::remove_var(codemap_core::CONFIG_DIR_ENV);
    }
}
