//! Multi-project monitor.
//!
//! Each monitored project gets one task that owns its watcher queue and its
//! debounce state. Regeneration passes run on the blocking pool, one at a
//! time per project. The supervisor loop restarts tasks that died and keeps
//! the monitored set in line with the registry.

use crate::{CoreError, GlobalConfig, ProjectRegistry};
use codemap_indexer::{
    FileChange, FileWatcher, IndexSettings, IndexerError, ProjectConfig, ProjectIndexer,
    UpdateOutcome, WatcherOptions,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Timing knobs for the monitor.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// How often each project checks whether its quiet period has elapsed
    pub check_interval: Duration,
    /// Consecutive failures tolerated before backing off
    pub failure_threshold: u32,
    /// First backoff delay, doubled on each further failure
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// How often dead project tasks are restarted
    pub health_interval: Duration,
    pub registry_sync_interval: Duration,
    /// Per-project change queue capacity
    pub queue_capacity: usize,
    pub watcher: WatcherOptions,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(250),
            failure_threshold: 3,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(60),
            health_interval: Duration::from_secs(1),
            registry_sync_interval: Duration::from_secs(5),
            queue_capacity: 1024,
            watcher: WatcherOptions::default(),
        }
    }
}

impl MonitorOptions {
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            registry_sync_interval: config.registry_sync_interval(),
            ..Self::default()
        }
    }

    /// Delay after `failures` consecutive failures, if any.
    fn backoff(&self, failures: u32) -> Option<Duration> {
        if failures < self.failure_threshold {
            return None;
        }
        let doublings = (failures - self.failure_threshold).min(16);
        Some(
            self.backoff_base
                .saturating_mul(1 << doublings)
                .min(self.backoff_max),
        )
    }
}

/// Trailing-debounce bookkeeping for one project.
#[derive(Debug, Default)]
struct DebounceState {
    pending: bool,
    last_event: Option<Instant>,
    consecutive_failures: u32,
    backoff_until: Option<Instant>,
}

impl DebounceState {
    /// A state whose first check fires immediately.
    fn primed() -> Self {
        Self {
            pending: true,
            ..Self::default()
        }
    }

    fn record(&mut self, at: Instant) {
        self.pending = true;
        self.last_event = Some(self.last_event.map_or(at, |last| last.max(at)));
    }

    fn is_due(&self, now: Instant, window: Duration) -> bool {
        if !self.pending {
            return false;
        }
        if self.backoff_until.is_some_and(|until| now < until) {
            return false;
        }
        match self.last_event {
            Some(last) => now.saturating_duration_since(last) >= window,
            None => true,
        }
    }

    fn succeeded(&mut self) {
        self.pending = false;
        self.consecutive_failures = 0;
        self.backoff_until = None;
    }

    /// Keep the update pending and back off once failures pile up.
    fn failed(&mut self, now: Instant, options: &MonitorOptions) -> Option<Duration> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = options.backoff(self.consecutive_failures);
        self.backoff_until = delay.map(|d| now + d);
        delay
    }
}

/// Orders the regeneration passes of one root across task restarts.
///
/// Passes run one at a time under `pass`. A pass whose task has been
/// replaced or stopped sees a newer generation and writes nothing.
#[derive(Debug, Default)]
struct WriteGate {
    generation: AtomicU64,
    pass: Mutex<()>,
}

impl WriteGate {
    /// Invalidate earlier tasks and return the new generation.
    fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// The per-project debounce loop.
struct ProjectTask {
    root: PathBuf,
    indexer: Arc<Mutex<ProjectIndexer>>,
    gate: Arc<WriteGate>,
    generation: u64,
    events: mpsc::Receiver<FileChange>,
    window: Duration,
    options: MonitorOptions,
    // Dropped with the task, which stops notification.
    _watcher: Option<FileWatcher>,
}

impl ProjectTask {
    async fn run(mut self) {
        let mut state = DebounceState::primed();
        let mut ticker = time::interval(self.options.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                change = self.events.recv() => {
                    let Some(change) = change else {
                        debug!(path = ?self.root, "Change queue closed");
                        return;
                    };
                    if self.indexer.lock().should_regenerate(&change) {
                        debug!(path = ?change.path, kind = ?change.kind, "Change queued");
                        state.record(change.at);
                    }
                }
                _ = ticker.tick() => {
                    if !self.gate.is_current(self.generation) {
                        debug!(path = ?self.root, "Task replaced");
                        return;
                    }
                    if state.is_due(Instant::now(), self.window) {
                        self.regenerate(&mut state).await;
                    }
                }
            }
        }
    }

    async fn regenerate(&self, state: &mut DebounceState) {
        let indexer = Arc::clone(&self.indexer);
        let gate = Arc::clone(&self.gate);
        let generation = self.generation;
        let result = tokio::task::spawn_blocking(move || {
            let _pass = gate.pass.lock();
            if !gate.is_current(generation) {
                return Ok(None);
            }
            let mut indexer = indexer.lock();
            indexer.update_index().map(Some)
        })
        .await;

        match result {
            Ok(Ok(None)) => {
                debug!(path = ?self.root, "Skipped pass of a replaced task");
            }
            Ok(Ok(Some(outcome))) => {
                state.succeeded();
                if let UpdateOutcome::Written { path, files } = outcome {
                    info!(path = ?path, files, "Regenerated index");
                }
            }
            Ok(Err(e)) => {
                if e.is_missing_root() {
                    warn!(path = ?self.root, error = %e, "Project root unavailable");
                } else {
                    error!(path = ?self.root, error = %e, "Failed to update index");
                }
                self.back_off(state);
            }
            Err(e) => {
                error!(path = ?self.root, error = %e, "Regeneration task failed");
                self.back_off(state);
            }
        }
    }

    fn back_off(&self, state: &mut DebounceState) {
        if let Some(delay) = state.failed(Instant::now(), &self.options) {
            warn!(
                path = ?self.root,
                failures = state.consecutive_failures,
                delay_secs = delay.as_secs_f64(),
                "Backing off"
            );
        }
    }
}

/// A running project: its config and the task that owns its watcher.
struct ProjectHandle {
    config: ProjectConfig,
    task: JoinHandle<()>,
}

/// Changes applied by one registry sync.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub started: Vec<PathBuf>,
    pub stopped: Vec<PathBuf>,
    /// Registry entries dropped because their root no longer exists
    pub removed: Vec<PathBuf>,
}

/// Watches every enabled project in the registry.
pub struct Monitor {
    registry: ProjectRegistry,
    settings: IndexSettings,
    options: MonitorOptions,
    projects: HashMap<PathBuf, ProjectHandle>,
    gates: HashMap<PathBuf, Arc<WriteGate>>,
}

impl Monitor {
    pub fn new(registry: ProjectRegistry, settings: IndexSettings, options: MonitorOptions) -> Self {
        Self {
            registry,
            settings,
            options,
            projects: HashMap::new(),
            gates: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    /// Start watching one project. Must be called inside a tokio runtime.
    ///
    /// A project that is already running with the same config is left
    /// alone; a changed config restarts it.
    pub fn start_project(&mut self, config: ProjectConfig) -> Result<(), CoreError> {
        if let Some(handle) = self.projects.get(&config.path) {
            if handle.config == config && !handle.task.is_finished() {
                return Ok(());
            }
        }
        self.stop_project(&config.path);

        let (tx, rx) = mpsc::channel(self.options.queue_capacity.max(1));
        let watcher = FileWatcher::watch(&config.path, self.options.watcher.clone(), tx)?;
        let task = self.spawn_task(config.clone(), rx, Some(watcher));

        info!(path = ?config.path, "Started monitoring");
        self.projects
            .insert(config.path.clone(), ProjectHandle { config, task });
        Ok(())
    }

    fn spawn_task(
        &mut self,
        config: ProjectConfig,
        events: mpsc::Receiver<FileChange>,
        watcher: Option<FileWatcher>,
    ) -> JoinHandle<()> {
        let gate = Arc::clone(self.gates.entry(config.path.clone()).or_default());
        let generation = gate.advance();
        let task = ProjectTask {
            root: config.path.clone(),
            gate,
            generation,
            window: config.debounce_window(),
            indexer: Arc::new(Mutex::new(ProjectIndexer::new(
                config,
                self.settings.clone(),
            ))),
            events,
            options: self.options.clone(),
            _watcher: watcher,
        };
        tokio::spawn(task.run())
    }

    /// Stop watching a project, abandoning any pending regeneration.
    /// Returns false when the project was not monitored.
    pub fn stop_project(&mut self, path: &Path) -> bool {
        let key = if self.projects.contains_key(path) {
            path.to_path_buf()
        } else {
            match path.canonicalize() {
                Ok(canonical) => canonical,
                Err(_) => return false,
            }
        };

        match self.projects.remove(&key) {
            Some(handle) => {
                handle.task.abort();
                self.retire(&key);
                info!(path = ?key, "Stopped monitoring");
                true
            }
            None => false,
        }
    }

    /// Make any pass still running for `root` discard its result.
    fn retire(&self, root: &Path) {
        if let Some(gate) = self.gates.get(root) {
            gate.advance();
        }
    }

    /// Roots currently monitored, sorted.
    pub fn monitored(&self) -> Vec<PathBuf> {
        let mut roots: Vec<_> = self.projects.keys().cloned().collect();
        roots.sort();
        roots
    }

    pub fn is_monitored(&self, path: &Path) -> bool {
        self.projects.contains_key(path)
    }

    /// Re-read the registry, drop stale entries, and start or stop projects
    /// so that exactly the enabled ones are monitored.
    pub fn sync_with_registry(&mut self) -> Result<SyncReport, CoreError> {
        self.registry.load()?;
        let mut report = SyncReport {
            removed: self.registry.cleanup_stale()?,
            ..SyncReport::default()
        };

        let desired: HashMap<PathBuf, ProjectConfig> = self
            .registry
            .enabled_projects()
            .map(|p| (p.path.clone(), p.clone()))
            .collect();

        let mut gone: Vec<_> = self
            .projects
            .keys()
            .filter(|root| !desired.contains_key(*root))
            .cloned()
            .collect();
        gone.sort();
        for root in gone {
            self.stop_project(&root);
            report.stopped.push(root);
        }

        let mut wanted: Vec<_> = desired.into_values().collect();
        wanted.sort_by(|a, b| a.path.cmp(&b.path));
        for config in wanted {
            let unchanged = self
                .projects
                .get(&config.path)
                .is_some_and(|h| h.config == config);
            if unchanged {
                continue;
            }

            let root = config.path.clone();
            match self.start_project(config) {
                Ok(()) => report.started.push(root),
                Err(e) => warn!(path = ?root, error = %e, "Failed to start monitoring"),
            }
        }

        if report != SyncReport::default() {
            debug!(
                started = report.started.len(),
                stopped = report.stopped.len(),
                removed = report.removed.len(),
                "Registry synced"
            );
        }
        Ok(report)
    }

    /// Restart project tasks that ended. Returns the restarted roots.
    fn restart_finished(&mut self) -> Vec<PathBuf> {
        let mut dead: Vec<_> = self
            .projects
            .iter()
            .filter(|(_, h)| h.task.is_finished())
            .map(|(root, h)| (root.clone(), h.config.clone()))
            .collect();
        dead.sort_by(|a, b| a.0.cmp(&b.0));

        let mut restarted = Vec::new();
        for (root, config) in dead {
            warn!(path = ?root, "Project task ended, restarting");
            self.projects.remove(&root);
            match self.start_project(config) {
                Ok(()) => restarted.push(root),
                Err(e) => error!(path = ?root, error = %e, "Failed to restart monitoring"),
            }
        }
        restarted
    }

    /// Monitor until `shutdown` completes.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), CoreError>
    where
        F: Future<Output = ()>,
    {
        self.sync_with_registry()?;
        info!(projects = self.projects.len(), "Monitoring projects");
        if self.projects.is_empty() {
            info!("No projects to monitor, waiting for registry changes");
        }

        let mut health = time::interval(self.options.health_interval);
        let mut sync = time::interval(self.options.registry_sync_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);
        sync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Both fire immediately; the initial sync already happened.
        health.tick().await;
        sync.tick().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = health.tick() => {
                    self.restart_finished();
                }
                _ = sync.tick() => {
                    if let Err(e) = self.sync_with_registry() {
                        warn!(error = %e, "Registry sync failed");
                    }
                }
            }
        }

        self.stop_all();
        Ok(())
    }

    /// Stop every project.
    pub fn stop_all(&mut self) {
        for (root, handle) in std::mem::take(&mut self.projects) {
            handle.task.abort();
            self.retire(&root);
            debug!(path = ?root, "Stopped monitoring");
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        for handle in self.projects.values() {
            handle.task.abort();
        }
    }
}

/// Regenerate one project's index outside of the daemon.
pub fn regenerate_once(
    config: ProjectConfig,
    settings: IndexSettings,
) -> Result<UpdateOutcome, IndexerError> {
    ProjectIndexer::new(config, settings).update_index()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemap_indexer::ChangeKind;
    use std::fs;
    use tempfile::tempdir;

    fn fast_options() -> MonitorOptions {
        MonitorOptions {
            check_interval: Duration::from_millis(10),
            health_interval: Duration::from_millis(20),
            registry_sync_interval: Duration::from_millis(50),
            ..MonitorOptions::default()
        }
    }

    fn project_config(root: &Path) -> ProjectConfig {
        let mut config = ProjectConfig::new(root.canonicalize().unwrap()).with_extensions([".py"]);
        config.update_delay = 0.05;
        config
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..500 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn test_backoff_schedule() {
        let options = MonitorOptions::default();
        assert_eq!(options.backoff(1), None);
        assert_eq!(options.backoff(2), None);
        assert_eq!(options.backoff(3), Some(Duration::from_secs(5)));
        assert_eq!(options.backoff(4), Some(Duration::from_secs(10)));
        assert_eq!(options.backoff(5), Some(Duration::from_secs(20)));
        assert_eq!(options.backoff(7), Some(Duration::from_secs(60)));
        assert_eq!(options.backoff(u32::MAX), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_debounce_is_trailing() {
        let window = Duration::from_secs(2);
        let start = Instant::now();
        let mut state = DebounceState::default();
        assert!(!state.is_due(start, window));

        state.record(start);
        assert!(!state.is_due(start + Duration::from_secs(1), window));

        // A later event pushes the deadline out.
        state.record(start + Duration::from_secs(1));
        assert!(!state.is_due(start + Duration::from_secs(2), window));
        assert!(state.is_due(start + Duration::from_secs(3), window));

        // Out-of-order timestamps never pull it back in.
        state.record(start);
        assert!(!state.is_due(start + Duration::from_secs(2), window));

        state.succeeded();
        assert!(!state.is_due(start + Duration::from_secs(10), window));
    }

    #[test]
    fn test_primed_state_is_due_immediately() {
        let state = DebounceState::primed();
        assert!(state.is_due(Instant::now(), Duration::from_secs(2)));
    }

    #[test]
    fn test_failures_keep_pending_and_back_off() {
        let options = MonitorOptions::default();
        let now = Instant::now();
        let mut state = DebounceState::primed();

        assert_eq!(state.failed(now, &options), None);
        assert_eq!(state.failed(now, &options), None);
        assert!(state.is_due(now, Duration::ZERO));

        assert_eq!(state.failed(now, &options), Some(Duration::from_secs(5)));
        assert!(!state.is_due(now + Duration::from_secs(4), Duration::ZERO));
        assert!(state.is_due(now + Duration::from_secs(5), Duration::ZERO));

        state.succeeded();
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.backoff_until.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_task_regenerates_on_start_and_after_changes() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("main.py"), "def main():\n    pass\n").unwrap();

        let config = project_config(root);
        let doc = config.path.join("CLAUDE.md");
        let (tx, rx) = mpsc::channel(16);
        let mut monitor = Monitor::new(
            ProjectRegistry::open(root.join("projects.json")).unwrap(),
            IndexSettings::default(),
            fast_options(),
        );
        let task = monitor.spawn_task(config.clone(), rx, None);

        assert!(wait_for(|| doc.exists()).await, "initial index not written");

        fs::write(root.join("extra.py"), "def extra():\n    pass\n").unwrap();
        tx.send(FileChange::new(
            config.path.join("extra.py"),
            ChangeKind::Created,
            false,
        ))
        .await
        .unwrap();

        let updated = wait_for(|| {
            fs::read_to_string(&doc)
                .map(|text| text.contains("`extra.py`"))
                .unwrap_or(false)
        })
        .await;
        assert!(updated, "index not regenerated after change");

        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replaced_task_discards_running_pass() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("main.py"), "def main():\n    pass\n").unwrap();

        let config = project_config(root);
        let doc = config.path.join("CLAUDE.md");
        let mut monitor = Monitor::new(
            ProjectRegistry::open(root.join("projects.json")).unwrap(),
            IndexSettings::default(),
            fast_options(),
        );
        let gate = Arc::clone(monitor.gates.entry(config.path.clone()).or_default());

        // Hold the gate so the first pass is stuck in flight.
        let held = gate.pass.lock();
        let (_tx, rx) = mpsc::channel(16);
        let stale = monitor.spawn_task(config.clone(), rx, None);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // What a restart does to the previous task.
        gate.advance();
        drop(held);

        tokio::time::timeout(Duration::from_secs(5), stale)
            .await
            .unwrap()
            .unwrap();
        assert!(!doc.exists(), "replaced task wrote the index");

        let (_tx, rx) = mpsc::channel(16);
        let current = monitor.spawn_task(config, rx, None);
        assert!(wait_for(|| doc.exists()).await, "current task did not write");
        current.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_and_stop_project() {
        let temp_dir = tempdir().unwrap();
        let project = temp_dir.path().join("project");
        fs::create_dir(&project).unwrap();
        fs::write(project.join("app.py"), "def app():\n    pass\n").unwrap();

        let mut monitor = Monitor::new(
            ProjectRegistry::open(temp_dir.path().join("projects.json")).unwrap(),
            IndexSettings::default(),
            fast_options(),
        );
        let config = project_config(&project);
        let root = config.path.clone();

        monitor.start_project(config.clone()).unwrap();
        monitor.start_project(config).unwrap();
        assert_eq!(monitor.monitored(), vec![root.clone()]);
        assert!(wait_for(|| root.join("CLAUDE.md").exists()).await);

        assert!(monitor.stop_project(&root));
        assert!(!monitor.stop_project(&root));
        assert!(monitor.monitored().is_empty());
    }

    #[tokio::test]
    async fn test_start_missing_project_fails() {
        let temp_dir = tempdir().unwrap();
        let mut monitor = Monitor::new(
            ProjectRegistry::open(temp_dir.path().join("projects.json")).unwrap(),
            IndexSettings::default(),
            fast_options(),
        );

        let config = ProjectConfig::new(temp_dir.path().join("missing"));
        let err = monitor.start_project(config).unwrap_err();
        assert!(matches!(err, CoreError::Indexer(IndexerError::NotFound(_))));
        assert!(monitor.monitored().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_follows_registry() {
        let temp_dir = tempdir().unwrap();
        let registry_path = temp_dir.path().join("projects.json");
        let one = temp_dir.path().join("one");
        let two = temp_dir.path().join("two");
        fs::create_dir(&one).unwrap();
        fs::create_dir(&two).unwrap();

        let mut registry = ProjectRegistry::open(&registry_path).unwrap();
        let defaults = GlobalConfig::default();
        let one = registry.add_project(&one, &defaults).unwrap().path;
        let two = registry.add_project(&two, &defaults).unwrap().path;
        registry.set_enabled(&two, false).unwrap();

        let mut monitor = Monitor::new(
            ProjectRegistry::open(&registry_path).unwrap(),
            defaults.index_settings(),
            fast_options(),
        );

        let report = monitor.sync_with_registry().unwrap();
        assert_eq!(report.started, vec![one.clone()]);
        assert_eq!(monitor.monitored(), vec![one.clone()]);

        // A second sync with no registry changes is a no-op.
        assert_eq!(monitor.sync_with_registry().unwrap(), SyncReport::default());

        registry.set_enabled(&two, true).unwrap();
        registry.remove_project(&one).unwrap();
        let report = monitor.sync_with_registry().unwrap();
        assert_eq!(report.started, vec![two.clone()]);
        assert_eq!(report.stopped, vec![one]);
        assert_eq!(monitor.monitored(), vec![two]);
    }

    /// Deleted project roots are dropped without disturbing other projects
    #[tokio::test(flavor = "multi_thread")]
    async fn test_deleted_root_is_cleaned_up() {
        let temp_dir = tempdir().unwrap();
        let registry_path = temp_dir.path().join("projects.json");
        let kept = temp_dir.path().join("kept");
        let doomed = temp_dir.path().join("doomed");
        fs::create_dir(&kept).unwrap();
        fs::create_dir(&doomed).unwrap();
        fs::write(kept.join("a.py"), "def a():\n    pass\n").unwrap();

        let mut registry = ProjectRegistry::open(&registry_path).unwrap();
        let defaults = GlobalConfig::default();
        let kept = registry.add_project(&kept, &defaults).unwrap().path;
        let doomed = registry.add_project(&doomed, &defaults).unwrap().path;

        let mut monitor = Monitor::new(
            ProjectRegistry::open(&registry_path).unwrap(),
            defaults.index_settings(),
            fast_options(),
        );
        monitor.sync_with_registry().unwrap();
        assert_eq!(monitor.monitored(), vec![doomed.clone(), kept.clone()]);

        fs::remove_dir_all(&doomed).unwrap();
        let report = monitor.sync_with_registry().unwrap();
        assert_eq!(report.removed, vec![doomed.clone()]);
        assert_eq!(report.stopped, vec![doomed]);
        assert_eq!(monitor.monitored(), vec![kept.clone()]);

        let listed: Vec<_> = ProjectRegistry::open(&registry_path)
            .unwrap()
            .list_projects()
            .iter()
            .map(|p| p.path.clone())
            .collect();
        assert_eq!(listed, vec![kept.clone()]);

        assert!(wait_for(|| kept.join("CLAUDE.md").exists()).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_until_shutdown() {
        let temp_dir = tempdir().unwrap();
        let project = temp_dir.path().join("project");
        fs::create_dir(&project).unwrap();

        let registry_path = temp_dir.path().join("projects.json");
        let mut registry = ProjectRegistry::open(&registry_path).unwrap();
        let root = registry
            .add_project(&project, &GlobalConfig::default())
            .unwrap()
            .path;

        let mut monitor = Monitor::new(
            ProjectRegistry::open(&registry_path).unwrap(),
            IndexSettings::default(),
            fast_options(),
        );

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            monitor
                .run(async move {
                    let _ = stop_rx.await;
                })
                .await
                .map(|()| monitor.monitored())
        });

        assert!(wait_for(|| root.join("CLAUDE.md").exists()).await);
        stop_tx.send(()).unwrap();

        let monitored = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(monitored.is_empty());
    }

    #[test]
    fn test_regenerate_once() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("a.py"), "def a():\n    pass\n").unwrap();

        let outcome = regenerate_once(project_config(temp_dir.path()), IndexSettings::default())
            .unwrap();
        assert!(outcome.was_written());
        assert!(outcome.path().exists());
    }
}
