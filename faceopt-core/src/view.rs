//! Session view binding for presentation layers.
//!
//! A [`SessionView`] subscribes to a runner's broadcaster for as long as it is
//! alive and keeps the latest session, a busy flag and a user-facing error
//! message. The broadcaster delivers every snapshot; the view keeps only the
//! newest one, which is what a UI renders.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::broadcast::Subscription;
use crate::error::Result;
use crate::runner::JobRunner;
use crate::transfer;
use crate::types::{OptimizationConfig, Session};

#[derive(Debug, Default)]
struct ViewState {
    busy: bool,
    error: Option<String>,
}

/// Reactive adapter over a [`JobRunner`]
pub struct SessionView {
    runner: JobRunner,
    state: Arc<Mutex<ViewState>>,
    updates: watch::Receiver<Option<Session>>,
    subscription: Subscription,
}

impl SessionView {
    /// Subscribe to `runner` and load its current session, if any.
    pub fn attach(runner: &JobRunner) -> Self {
        let (sender, updates) = watch::channel(None);
        let sender = Arc::new(sender);
        let state = Arc::new(Mutex::new(ViewState::default()));

        let listener_sender = Arc::clone(&sender);
        let listener_state = Arc::clone(&state);
        let subscription = runner.broadcaster().subscribe(move |session| {
            listener_state.lock().busy = session.is_running();
            listener_sender.send_replace(Some(session.clone()));
        });

        // Prime after subscribing so a broadcast racing with attach wins.
        if let Some(current) = runner.current_session() {
            let busy = current.is_running();
            let primed = sender.send_if_modified(|slot| {
                if slot.is_none() {
                    *slot = Some(current);
                    true
                } else {
                    false
                }
            });
            if primed {
                state.lock().busy = busy;
            }
        }

        Self {
            runner: runner.clone(),
            state,
            updates,
            subscription,
        }
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    /// Latest session seen by this view
    pub fn session(&self) -> Option<Session> {
        self.updates.borrow().clone()
    }

    /// True while the latest broadcast reports a running session
    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Last user-facing error message
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.lock().error = None;
    }

    /// Wait for the next broadcast and return the latest session.
    ///
    /// Intermediate snapshots delivered while the caller was busy are
    /// collapsed into the newest one.
    pub async fn changed(&mut self) -> Option<Session> {
        self.updates.changed().await.ok()?;
        self.updates.borrow_and_update().clone()
    }

    /// Start a run; on failure the message lands in [`SessionView::error`].
    pub fn request_start(&self, config: OptimizationConfig) -> Option<String> {
        {
            let mut state = self.state.lock();
            state.error = None;
            state.busy = true;
        }

        match self.runner.start(config) {
            Ok(session_id) => Some(session_id),
            Err(e) => {
                tracing::warn!(error = %e, "Start request failed");
                let running = self.runner.is_running();
                let mut state = self.state.lock();
                state.error = Some(e.to_string());
                state.busy = running;
                None
            }
        }
    }

    /// Stop the running session, if any
    pub fn request_stop(&self) {
        self.runner.stop();
        self.state.lock().busy = false;
    }

    /// Write an export document for `config` into `dir`
    pub fn export_config(&self, config: &OptimizationConfig, dir: &Path) -> Result<PathBuf> {
        transfer::export_to_dir(config, dir).map_err(|e| self.record(e))
    }

    /// Read the configuration from an exported document
    pub fn import_config(&self, path: &Path) -> Result<OptimizationConfig> {
        transfer::import_from_path(path).map_err(|e| self.record(e))
    }

    /// Unsubscribe from the runner
    pub fn detach(mut self) {
        self.subscription.unsubscribe();
    }

    fn record(&self, error: crate::error::Error) -> crate::error::Error {
        self.state.lock().error = Some(error.to_string());
        error
    }
}

impl std::fmt::Debug for SessionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SessionView")
            .field("busy", &state.busy)
            .field("error", &state.error)
            .field("subscribed", &self.subscription.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::error::Error;
    use crate::types::SessionStatus;

    fn runner() -> JobRunner {
        JobRunner::builder()
            .clock(Arc::new(VirtualClock::new()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_view_tracks_busy_flag() {
        let runner = runner();
        let view = SessionView::attach(&runner);
        assert!(view.session().is_none());
        assert!(!view.is_busy());

        let id = view.request_start(OptimizationConfig::default()).unwrap();
        assert!(view.is_busy());
        assert_eq!(view.session().unwrap().id, id);

        runner.wait().await;
        assert!(!view.is_busy());
        assert_eq!(view.session().unwrap().status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_second_start_reports_error_and_keeps_busy() {
        let runner = runner();
        let view = SessionView::attach(&runner);

        let first = view.request_start(OptimizationConfig::default()).unwrap();
        assert!(view.request_start(OptimizationConfig::default()).is_none());
        assert!(view.error().unwrap().contains("already running"));
        assert!(view.is_busy());
        assert_eq!(view.session().unwrap().id, first);

        view.request_stop();
        assert!(!view.is_busy());
        runner.wait().await;
    }

    #[tokio::test]
    async fn test_attach_loads_existing_session() {
        let runner = runner();
        runner.start(OptimizationConfig::default()).unwrap();

        let view = SessionView::attach(&runner);
        assert!(view.is_busy());
        assert!(view.session().is_some());

        runner.stop();
        runner.wait().await;
    }

    #[tokio::test]
    async fn test_detach_unsubscribes() {
        let runner = runner();
        let view = SessionView::attach(&runner);
        assert_eq!(runner.broadcaster().listener_count(), 1);

        view.detach();
        assert_eq!(runner.broadcaster().listener_count(), 0);

        {
            let _scoped = SessionView::attach(&runner);
            assert_eq!(runner.broadcaster().listener_count(), 1);
        }
        assert_eq!(runner.broadcaster().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_changed_yields_latest_session() {
        let runner = runner();
        let mut view = SessionView::attach(&runner);
        view.request_start(OptimizationConfig::default()).unwrap();

        let mut last = None;
        while let Some(session) = view.changed().await {
            let done = session.status.is_terminal();
            last = Some(session);
            if done {
                break;
            }
        }
        assert_eq!(last.unwrap().status, SessionStatus::Completed);
    }

    #[test]
    fn test_import_failure_sets_error() {
        let runner = runner();
        let view = SessionView::attach(&runner);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"timestamp": "x"}"#).unwrap();

        let err = view.import_config(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
        assert!(view.error().unwrap().contains("invalid configuration format"));
    }

    #[test]
    fn test_export_then_import_through_view() {
        let runner = runner();
        let view = SessionView::attach(&runner);
        let dir = tempfile::tempdir().unwrap();
        let config = OptimizationConfig::default();

        let path = view.export_config(&config, dir.path()).unwrap();
        assert_eq!(view.import_config(&path).unwrap(), config);
        assert!(view.error().is_none());
    }
}
