//! Capture session lifecycle state machine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{BrowserEngine, BrowserSession, NetworkEvent};
use crate::capture::{finalize, CaptureRecord, Correlator, RecordSink, RecordStore};
use crate::config::Config;
use crate::{Result, SnareError};

/// Lifecycle states of a session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session running
    Idle,
    /// A capture session is running
    Running,
    /// A stop was requested; the session is draining and finalizing
    StoppingDrain,
}

struct ActiveSession {
    stop: CancellationToken,
    task: JoinHandle<Vec<CaptureRecord>>,
}

/// Owns the start/stop lifecycle of capture sessions
///
/// At most one session runs at a time; opening a second one is rejected.
/// One controlling task drives this from the outside while the session
/// itself runs as a background task.
pub struct SessionController {
    config: Arc<Config>,
    engine: Arc<dyn BrowserEngine>,
    sink: Arc<dyn RecordSink>,
    active: Mutex<Option<ActiveSession>>,
    closed: AtomicBool,
}

impl SessionController {
    /// Create a controller over a browser engine and an emission sink
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        engine: Arc<dyn BrowserEngine>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            config,
            engine,
            sink,
            active: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Current lifecycle state
    ///
    /// # Panics
    ///
    /// Panics if the session lock is poisoned (programming error)
    pub fn state(&self) -> SessionState {
        let active = self.active.lock().expect("session lock poisoned");
        match &*active {
            Some(session) if session.stop.is_cancelled() => SessionState::StoppingDrain,
            Some(_) => SessionState::Running,
            None => SessionState::Idle,
        }
    }

    /// Open a capture session
    ///
    /// Launches the browser, navigates to the configured start URL, and
    /// spawns the correlator as a background task that runs until a stop
    /// is requested or the browser session fails.
    ///
    /// # Errors
    ///
    /// Returns `SnareError::SessionActive` if a session is already running,
    /// or a browser error if the launch fails.
    ///
    /// # Panics
    ///
    /// Panics if the session lock is poisoned (programming error)
    pub async fn open_session(&self) -> Result<()> {
        {
            let active = self.active.lock().expect("session lock poisoned");
            if active.is_some() {
                return Err(SnareError::SessionActive);
            }
        }

        let (session, events) = self.engine.launch(&self.config).await?;

        let stop = CancellationToken::new();
        let store = Arc::new(RecordStore::new());
        let task = tokio::spawn(run_session(
            Arc::clone(&self.config),
            session,
            events,
            store,
            Arc::clone(&self.sink),
            stop.clone(),
        ));

        let mut active = self.active.lock().expect("session lock poisoned");
        if active.is_some() {
            // Lost a race against a concurrent open; this controller is
            // driven by one controlling task, so treat it as a contract
            // violation of the caller and refuse the new session.
            stop.cancel();
            return Err(SnareError::SessionActive);
        }
        *active = Some(ActiveSession { stop, task });

        info!(url = %self.config.start_url, "capture session opened");
        Ok(())
    }

    /// Request the running session to stop
    ///
    /// Idempotent and non-blocking: repeated calls, or a call with no
    /// running session, are no-ops.
    ///
    /// # Panics
    ///
    /// Panics if the session lock is poisoned (programming error)
    pub fn request_stop(&self) {
        let active = self.active.lock().expect("session lock poisoned");
        match &*active {
            Some(session) => session.stop.cancel(),
            None => debug!("stop requested with no running session"),
        }
    }

    /// Await session teardown and collect the finalized records
    ///
    /// Returns an empty list when no session was running. The controller
    /// is Idle afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if the background session task panicked or was aborted
    ///
    /// # Panics
    ///
    /// Panics if the session lock is poisoned (programming error)
    pub async fn join_session(&self) -> Result<Vec<CaptureRecord>> {
        let session = self.active.lock().expect("session lock poisoned").take();

        let Some(session) = session else {
            return Ok(Vec::new());
        };

        session
            .task
            .await
            .map_err(|e| SnareError::SessionTask(e.to_string()))
    }

    /// Forcibly terminate any running session
    ///
    /// Terminal and non-idempotent: calling this twice on the same
    /// controller is a contract violation.
    ///
    /// # Panics
    ///
    /// Panics when called more than once, or if the session lock is
    /// poisoned (programming errors)
    pub fn force_close_all(&self) {
        assert!(
            !self.closed.swap(true, Ordering::SeqCst),
            "force_close_all called twice"
        );

        let session = self.active.lock().expect("session lock poisoned").take();
        if let Some(session) = session {
            session.stop.cancel();
            session.task.abort();
            warn!("capture session force-closed");
        }
    }
}

/// Background task driving one capture session from start to finalization
async fn run_session(
    config: Arc<Config>,
    mut session: Box<dyn BrowserSession>,
    mut events: mpsc::Receiver<NetworkEvent>,
    store: Arc<RecordStore>,
    sink: Arc<dyn RecordSink>,
    stop: CancellationToken,
) -> Vec<CaptureRecord> {
    if let Err(err) = session.navigate(&config.start_url).await {
        warn!(error = %err, "initial navigation failed");
    }

    let correlator = Correlator::new(Arc::clone(&store), sink);
    let stopped = correlator.run(&mut events, &stop).await;
    if !stopped {
        warn!("browser session ended before stop was requested");
    }

    // The event stream is drained; no further store mutation can happen.
    finalize(store.as_ref(), session.as_ref()).await;

    if let Err(err) = session.close().await {
        warn!(error = %err, "browser session did not close cleanly");
    }

    store.snapshot()
}
