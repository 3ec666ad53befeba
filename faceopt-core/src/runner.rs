//! Simulated optimization runner.
//!
//! A [`JobRunner`] owns at most one live [`Session`] and drives it through the
//! step catalog on a tokio task:
//!
//! ```text
//! start ──► session running, step 0 running ──► log lines ──► step completed ──► pause
//!                                                    ▲                             │
//!                                                    └──────── next step ◄─────────┘
//! last step completed ──► results synthesized ──► session completed
//! ```
//!
//! `stop` marks the active step and the session as `error` at once. Every
//! mutation made by the advancement task is applied under the state lock and
//! only while the session it belongs to is still the current, running one, so
//! a delay that wakes up after a stop changes nothing.
//!
//! Snapshots are queued on the broadcaster while the lock is held, so
//! listeners see them in mutation order, and delivered after it is released;
//! listeners may call back into the runner.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use rand::Rng;
use tokio::task::{AbortHandle, JoinHandle};

use crate::broadcast::SessionBroadcaster;
use crate::catalog::{initial_steps, StepDefinition, DEFAULT_CATALOG};
use crate::clock::{Clock, SystemClock};
use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::synth::{RandomSynthesizer, ResultSynthesizer};
use crate::types::{OptimizationConfig, Session, SessionStatus, StepStatus};

/// Error recorded on the step that was running when the user stopped the run
pub const CANCELLED_MESSAGE: &str = "Cancelled by user";

/// Handles of the tasks driving the current session
struct RunTasks {
    advance: AbortHandle,
    supervisor: Option<JoinHandle<()>>,
}

struct Inner {
    session: Mutex<Option<Session>>,
    tasks: Mutex<Option<RunTasks>>,
    broadcaster: SessionBroadcaster,
    clock: Arc<dyn Clock>,
    synthesizer: Arc<dyn ResultSynthesizer>,
    catalog: &'static [StepDefinition],
    timing: RunnerConfig,
}

/// Handle to a simulated optimization runner.
///
/// Cloning is cheap; all clones share the same session and broadcaster.
#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<Inner>,
}

/// Builder for [`JobRunner`]
pub struct JobRunnerBuilder {
    broadcaster: SessionBroadcaster,
    clock: Arc<dyn Clock>,
    synthesizer: Arc<dyn ResultSynthesizer>,
    catalog: &'static [StepDefinition],
    timing: RunnerConfig,
}

impl Default for JobRunnerBuilder {
    fn default() -> Self {
        Self {
            broadcaster: SessionBroadcaster::new(),
            clock: Arc::new(SystemClock),
            synthesizer: Arc::new(RandomSynthesizer),
            catalog: DEFAULT_CATALOG,
            timing: RunnerConfig::default(),
        }
    }
}

impl JobRunnerBuilder {
    pub fn broadcaster(mut self, broadcaster: SessionBroadcaster) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn ResultSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn catalog(mut self, catalog: &'static [StepDefinition]) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn timing(mut self, timing: RunnerConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn build(self) -> Result<JobRunner> {
        self.timing.validate()?;
        Ok(JobRunner {
            inner: Arc::new(Inner {
                session: Mutex::new(None),
                tasks: Mutex::new(None),
                broadcaster: self.broadcaster,
                clock: self.clock,
                synthesizer: self.synthesizer,
                catalog: self.catalog,
                timing: self.timing,
            }),
        })
    }
}

impl JobRunner {
    pub fn builder() -> JobRunnerBuilder {
        JobRunnerBuilder::default()
    }

    /// Broadcaster that receives every session snapshot
    pub fn broadcaster(&self) -> &SessionBroadcaster {
        &self.inner.broadcaster
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    pub fn timing(&self) -> RunnerConfig {
        self.inner.timing
    }

    pub fn catalog(&self) -> &'static [StepDefinition] {
        self.inner.catalog
    }

    /// Snapshot of the current session, if a run was ever started
    pub fn current_session(&self) -> Option<Session> {
        self.inner.session.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .session
            .lock()
            .as_ref()
            .is_some_and(Session::is_running)
    }

    /// Start a new run and return its session id.
    ///
    /// Fails with [`Error::AlreadyRunning`] while another session is running,
    /// leaving that session untouched. The first step is already `running`
    /// when this returns; the remaining work happens on a spawned task.
    pub fn start(&self, config: OptimizationConfig) -> Result<String> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(format!("no tokio runtime to drive the run: {e}")))?;

        let created = {
            let mut current = self.inner.session.lock();
            if let Some(running) = current.as_ref().filter(|s| s.is_running()) {
                tracing::warn!(session_id = %running.id, "Start rejected, session already running");
                return Err(Error::AlreadyRunning {
                    session_id: running.id.clone(),
                });
            }

            let session = Session {
                id: new_session_id(),
                config,
                status: SessionStatus::Running,
                steps: initial_steps(self.inner.catalog),
                started_at: Some(self.inner.clock.now()),
                ended_at: None,
                results: None,
            };
            *current = Some(session.clone());
            self.inner.broadcaster.enqueue(session.clone());
            session
        };
        let session_id = created.id.clone();

        tracing::info!(
            session_id = %session_id,
            steps = created.steps.len(),
            "Optimization session started"
        );
        self.inner.broadcaster.deliver_pending();

        if !created.steps.is_empty() {
            self.activate_step(&session_id, 0)?;
        }

        let runner = self.clone();
        let id = session_id.clone();
        let advance = runtime.spawn(async move { runner.advance(&id).await });
        let abort = advance.abort_handle();

        let runner = self.clone();
        let id = session_id.clone();
        let supervisor = runtime.spawn(async move {
            match advance.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => runner.fault(&id, &e.to_string()),
                Err(e) if e.is_panic() => runner.fault(&id, "advancement task panicked"),
                Err(_) => tracing::debug!(session_id = %id, "Advancement task aborted"),
            }
        });

        *self.inner.tasks.lock() = Some(RunTasks {
            advance: abort,
            supervisor: Some(supervisor),
        });

        Ok(session_id)
    }

    /// Cancel the running session.
    ///
    /// Marks the active step and the session as `error` and broadcasts.
    /// Returns `false` (and does nothing) when no session is running.
    pub fn stop(&self) -> bool {
        let stopped = {
            let mut current = self.inner.session.lock();
            let Some(session) = current.as_mut().filter(|s| s.is_running()) else {
                return false;
            };

            let now = self.inner.clock.now();
            if let Some(step) = session
                .steps
                .iter_mut()
                .find(|s| s.status == StepStatus::Running)
            {
                step.status = StepStatus::Error;
                step.error = Some(CANCELLED_MESSAGE.to_string());
                step.ended_at = Some(now);
            }
            session.status = SessionStatus::Error;
            session.ended_at = Some(now);
            self.inner.broadcaster.enqueue(session.clone());
            session.clone()
        };

        if let Some(tasks) = self.inner.tasks.lock().as_ref() {
            tasks.advance.abort();
        }

        tracing::info!(
            session_id = %stopped.id,
            step = ?stopped.steps.iter().position(|s| s.status == StepStatus::Error),
            "Optimization session cancelled"
        );
        self.inner.broadcaster.deliver_pending();
        true
    }

    /// Wait until the task driving the current session has ended.
    ///
    /// Returns immediately when nothing is in flight or another caller is
    /// already waiting.
    pub async fn wait(&self) {
        let supervisor = self
            .inner
            .tasks
            .lock()
            .as_mut()
            .and_then(|tasks| tasks.supervisor.take());

        if let Some(handle) = supervisor {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Runner supervisor task failed");
            }
        }
    }

    // ============================================
    // Advancement
    // ============================================

    async fn advance(&self, session_id: &str) -> Result<()> {
        let catalog = self.inner.catalog;

        for (index, definition) in catalog.iter().enumerate() {
            if index > 0 && !self.activate_step(session_id, index)? {
                return Ok(());
            }

            let lines = definition.lines();
            let interval = self.line_interval(lines.len());
            for (emitted, message) in lines.iter().enumerate() {
                self.inner.clock.sleep(interval).await;
                if !self.append_log(session_id, index, message, emitted + 1, lines.len())? {
                    return Ok(());
                }
            }

            if !self.complete_step(session_id, index)? {
                return Ok(());
            }
            self.inner.clock.sleep(self.inner.timing.step_pause()).await;
        }

        self.finish(session_id)
    }

    /// Per-line delay for one step: a random step duration spread evenly
    fn line_interval(&self, lines: usize) -> Duration {
        let timing = self.inner.timing;
        let total_ms = if timing.step_max_ms > timing.step_min_ms {
            rand::thread_rng().gen_range(timing.step_min_ms..=timing.step_max_ms)
        } else {
            timing.step_min_ms
        };
        let total_ns = Duration::from_millis(total_ms).as_nanos();
        let per_line = total_ns.div_ceil(lines.max(1) as u128);
        Duration::from_nanos(u64::try_from(per_line).unwrap_or(u64::MAX))
    }

    /// Apply `mutate` to the session if it is still the current running one.
    ///
    /// `mutate` returns `Ok(false)` to skip without broadcasting. Returns
    /// whether a mutation was applied.
    fn update<F>(&self, session_id: &str, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Session) -> Result<bool>,
    {
        {
            let mut current = self.inner.session.lock();
            let Some(session) = current
                .as_mut()
                .filter(|s| s.id == session_id && s.is_running())
            else {
                return Ok(false);
            };
            if !mutate(session)? {
                return Ok(false);
            }
            self.inner.broadcaster.enqueue(session.clone());
        }

        self.inner.broadcaster.deliver_pending();
        Ok(true)
    }

    fn activate_step(&self, session_id: &str, index: usize) -> Result<bool> {
        let now = self.inner.clock.now();
        let applied = self.update(session_id, |session| {
            if let Some((active, _)) = session.active_step() {
                return Err(Error::Internal(format!(
                    "cannot start step {index} while step {active} is running"
                )));
            }
            let step = step_mut(session, index)?;
            if step.status != StepStatus::Pending {
                return Err(Error::Internal(format!(
                    "step {} is {}, expected pending",
                    step.id, step.status
                )));
            }
            step.status = StepStatus::Running;
            step.started_at = Some(now);
            Ok(true)
        })?;

        if applied {
            tracing::debug!(session_id, step = index, "Step started");
        }
        Ok(applied)
    }

    fn append_log(
        &self,
        session_id: &str,
        index: usize,
        message: &str,
        emitted: usize,
        total: usize,
    ) -> Result<bool> {
        let now = self.inner.clock.now();
        let line = format!("[{}] {}", now.with_timezone(&Local).format("%H:%M:%S"), message);
        let progress = ((emitted as f64 / total.max(1) as f64) * 100.0).round() as u8;

        self.update(session_id, |session| {
            let step = step_mut(session, index)?;
            if step.status != StepStatus::Running {
                return Ok(false);
            }
            step.logs.push(line);
            step.progress = step.progress.max(progress.min(100));
            Ok(true)
        })
    }

    fn complete_step(&self, session_id: &str, index: usize) -> Result<bool> {
        let now = self.inner.clock.now();
        let applied = self.update(session_id, |session| {
            let step = step_mut(session, index)?;
            if step.status != StepStatus::Running {
                return Ok(false);
            }
            step.status = StepStatus::Completed;
            step.progress = 100;
            step.ended_at = Some(now);
            Ok(true)
        })?;

        if applied {
            tracing::debug!(session_id, step = index, "Step completed");
        }
        Ok(applied)
    }

    fn finish(&self, session_id: &str) -> Result<()> {
        let Some(snapshot) = self
            .current_session()
            .filter(|s| s.id == session_id && s.is_running())
        else {
            return Ok(());
        };

        let results = self.inner.synthesizer.synthesize(&snapshot)?;
        let now = self.inner.clock.now();

        let applied = self.update(session_id, |session| {
            if let Some(step) = session
                .steps
                .iter()
                .find(|s| s.status != StepStatus::Completed)
            {
                return Err(Error::Internal(format!(
                    "cannot complete session while step {} is {}",
                    step.id, step.status
                )));
            }
            session.results = Some(results);
            session.status = SessionStatus::Completed;
            session.ended_at = Some(now);
            Ok(true)
        })?;

        if applied {
            tracing::info!(
                session_id,
                precision = results.precision,
                recall = results.recall,
                f1 = results.f1_score,
                map = results.mean_average_precision,
                "Optimization session completed"
            );
        }
        Ok(())
    }

    /// Record an unexpected advancement failure on the session.
    ///
    /// Does nothing if the session is no longer running, so a cancellation
    /// error is never overwritten.
    fn fault(&self, session_id: &str, message: &str) {
        let now = self.inner.clock.now();
        let applied = self.update(session_id, |session| {
            if let Some(step) = session
                .steps
                .iter_mut()
                .find(|s| s.status == StepStatus::Running)
            {
                step.status = StepStatus::Error;
                step.error = Some(message.to_string());
                step.ended_at = Some(now);
            }
            session.status = SessionStatus::Error;
            session.ended_at = Some(now);
            Ok(true)
        });

        match applied {
            Ok(true) => tracing::error!(session_id, error = message, "Optimization session failed"),
            Ok(false) => {
                tracing::debug!(session_id, error = message, "Fault after session ended ignored")
            }
            Err(e) => tracing::error!(session_id, error = %e, "Failed to record session fault"),
        }
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("steps", &self.inner.catalog.len())
            .field("timing", &self.inner.timing)
            .field("running", &self.is_running())
            .finish()
    }
}

fn step_mut(session: &mut Session, index: usize) -> Result<&mut crate::types::Step> {
    session
        .steps
        .get_mut(index)
        .ok_or_else(|| Error::Internal(format!("step index {index} out of range")))
}

fn new_session_id() -> String {
    format!("opt_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::types::ModelResults;

    fn fast_runner() -> (JobRunner, Arc<VirtualClock>) {
        let clock = Arc::new(VirtualClock::new());
        let runner = JobRunner::builder()
            .clock(clock.clone())
            .build()
            .unwrap();
        (runner, clock)
    }

    struct FailingSynthesizer;

    impl ResultSynthesizer for FailingSynthesizer {
        fn synthesize(&self, _session: &Session) -> Result<ModelResults> {
            Err(Error::Synthesis("evaluator unavailable".to_string()))
        }
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let runner = JobRunner::builder().build().unwrap();
        let err = runner.start(OptimizationConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
        assert!(runner.current_session().is_none());
    }

    #[test]
    fn test_builder_rejects_invalid_timing() {
        let result = JobRunner::builder()
            .timing(RunnerConfig {
                step_min_ms: 10,
                step_max_ms: 1,
                step_pause_ms: 0,
            })
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_start_activates_first_step() {
        let (runner, _clock) = fast_runner();
        let id = runner.start(OptimizationConfig::default()).unwrap();

        let session = runner.current_session().unwrap();
        assert_eq!(session.id, id);
        assert!(id.starts_with("opt_"));
        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.steps[0].status, StepStatus::Running);
        assert!(session.steps[0].started_at.is_some());
        assert!(session.steps[1..]
            .iter()
            .all(|s| s.status == StepStatus::Pending));

        runner.stop();
        runner.wait().await;
    }

    #[tokio::test]
    async fn test_stop_is_noop_without_running_session() {
        let (runner, _clock) = fast_runner();
        assert!(!runner.stop());

        runner.start(OptimizationConfig::default()).unwrap();
        runner.wait().await;
        let before = runner.current_session().unwrap();
        assert_eq!(before.status, SessionStatus::Completed);

        assert!(!runner.stop());
        assert_eq!(runner.current_session().unwrap(), before);
    }

    #[tokio::test]
    async fn test_log_lines_are_timestamped() {
        let (runner, _clock) = fast_runner();
        runner.start(OptimizationConfig::default()).unwrap();
        runner.wait().await;

        let session = runner.current_session().unwrap();
        let first = &session.steps[0].logs[0];
        assert!(first.starts_with('['), "{first}");
        assert!(first.ends_with("] Downloading RetinaFace-Ghost model..."), "{first}");
    }

    #[tokio::test]
    async fn test_synthesizer_failure_marks_session_error() {
        let clock = Arc::new(VirtualClock::new());
        let runner = JobRunner::builder()
            .clock(clock)
            .synthesizer(Arc::new(FailingSynthesizer))
            .build()
            .unwrap();

        runner.start(OptimizationConfig::default()).unwrap();
        runner.wait().await;

        let session = runner.current_session().unwrap();
        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.ended_at.is_some());
        assert!(session.results.is_none());
        assert!(session
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed && s.error.is_none()));
    }

    #[tokio::test]
    async fn test_fault_does_not_overwrite_cancellation() {
        let (runner, _clock) = fast_runner();
        let id = runner.start(OptimizationConfig::default()).unwrap();
        runner.stop();

        runner.fault(&id, "late failure");

        let session = runner.current_session().unwrap();
        assert_eq!(session.steps[0].error.as_deref(), Some(CANCELLED_MESSAGE));
        runner.wait().await;
    }

    #[tokio::test]
    async fn test_line_interval_covers_minimum_duration() {
        let clock = Arc::new(VirtualClock::new());
        let runner = JobRunner::builder()
            .clock(clock)
            .timing(RunnerConfig {
                step_min_ms: 1003,
                step_max_ms: 1003,
                step_pause_ms: 0,
            })
            .build()
            .unwrap();

        let interval = runner.line_interval(5);
        assert!(interval * 5 >= Duration::from_millis(1003));
        assert!(runner.line_interval(0) >= Duration::from_millis(1003));
    }

    #[test]
    fn test_line_interval_at_longest_step_does_not_overflow() {
        use crate::config::MAX_STEP_MS;

        let clock = Arc::new(VirtualClock::new());
        let runner = JobRunner::builder()
            .clock(clock)
            .timing(RunnerConfig {
                step_min_ms: MAX_STEP_MS,
                step_max_ms: MAX_STEP_MS,
                step_pause_ms: 0,
            })
            .build()
            .unwrap();

        assert_eq!(runner.line_interval(1), Duration::from_millis(MAX_STEP_MS));
        assert!(runner.line_interval(7) * 7 >= Duration::from_millis(MAX_STEP_MS));
    }

    #[test]
    fn test_builder_rejects_overflowing_timing() {
        let result = JobRunner::builder()
            .timing(RunnerConfig {
                step_min_ms: 20_000_000_000_000,
                step_max_ms: 20_000_000_000_000,
                step_pause_ms: 0,
            })
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
