//! The top-level context: one supervised engine process plus the registry
//! of open sessions, with one idempotent shutdown routine shared by normal
//! teardown and the interrupt handler.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{DroverError, Result};
use crate::lifecycle::{self, DriverProcess};
use crate::session::{Session, SessionOptions};

/// Environment variable naming the engine executable.
const DRIVER_ENV: &str = "CHROME_DRIVER";

/// Context owning the supervised engine process and every open session.
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct Drover {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    active: bool,
    driver: Option<DriverProcess>,
    sessions: Vec<Session>,
    signals_hooked: bool,
    next_session_id: u64,
}

impl Drover {
    pub fn new() -> Self {
        Drover {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Starts or adopts the engine process for this context. Idempotent:
    /// once a supervisor is active, further calls return success without
    /// probing or spawning.
    ///
    /// The executable path comes from the `CHROME_DRIVER` environment
    /// variable. On first success a SIGINT/SIGTERM listener is installed
    /// that runs [`shutdown`](Drover::shutdown) and exits, so an owned
    /// child is never orphaned by an interrupt. A startup failure leaves
    /// no partial state registered.
    pub async fn initialize(&self, port: u16, debug: bool) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.active {
            return Ok(());
        }

        let exe = std::env::var(DRIVER_ENV).unwrap_or_default();
        let exe = exe.trim();
        if exe.is_empty() {
            return Err(DroverError::Startup(format!("env {DRIVER_ENV} is missing")));
        }

        let driver = lifecycle::acquire(exe, port, debug).await?;
        state.driver = Some(driver);
        state.active = true;

        if !state.signals_hooked {
            state.signals_hooked = true;
            self.hook_signals();
        }

        Ok(())
    }

    fn hook_signals(&self) {
        let context = self.clone();
        tokio::spawn(async move {
            wait_for_interrupt().await;
            tracing::info!("interrupt received, shutting down");
            context.shutdown().await;
            std::process::exit(0);
        });
    }

    /// Closes every open session, stops the engine process if owned, and
    /// clears the supervisor marker. Safe to call more than once and safe
    /// to race with individual [`Session::close`] calls. A failure while
    /// closing one session is logged and never stops the remaining
    /// cleanup.
    pub async fn shutdown(&self) {
        let sessions = {
            let mut state = self.inner.state.lock().await;
            std::mem::take(&mut state.sessions)
        };
        for session in sessions {
            tracing::info!(session = session.local_id(), "closing session");
            if let Err(err) = session.close().await {
                tracing::warn!(
                    session = session.local_id(),
                    error = %err,
                    "failed to close session"
                );
            }
        }

        let driver = {
            let mut state = self.inner.state.lock().await;
            state.driver.take()
        };
        if let Some(mut driver) = driver {
            if driver.is_owned() {
                tracing::info!(port = driver.port(), "stopping driver");
                if let Err(err) = driver.stop().await {
                    tracing::warn!(error = %err, "failed to stop driver");
                }
            } else {
                tracing::info!(port = driver.port(), "leaving adopted driver running");
            }
        }

        // The marker falls last so a later initialize starts fresh.
        self.inner.state.lock().await.active = false;
        tracing::info!("shutdown complete");
    }

    /// Opens a new automation session against the supervised engine and
    /// registers it for shutdown.
    pub async fn new_session(&self, options: SessionOptions) -> Result<Session> {
        let (hub, id) = {
            let mut state = self.inner.state.lock().await;
            let hub = match state.driver.as_ref() {
                Some(driver) => driver.hub_url(),
                None => {
                    return Err(DroverError::Startup("context is not initialized".into()));
                }
            };
            state.next_session_id += 1;
            (hub, state.next_session_id)
        };

        let session = Session::connect(&hub, options, id, Arc::downgrade(&self.inner)).await?;

        self.inner.state.lock().await.sessions.push(session.clone());
        Ok(session)
    }
}

impl Default for Drover {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    /// Removes one session from the registry; tolerant of the session
    /// having been removed already by a concurrent shutdown.
    pub(crate) async fn deregister(&self, session: &Session) {
        let mut state = self.state.lock().await;
        match state.sessions.iter().position(|s| s.is_same(session)) {
            Some(idx) => {
                state.sessions.swap_remove(idx);
            }
            None => {
                tracing::debug!(session = session.local_id(), "session already deregistered");
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
        (Ok(mut interrupt), Ok(mut terminate)) => {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
        }
        _ => {
            tracing::warn!("failed to install signal handlers");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install interrupt handler");
        std::future::pending::<()>().await;
    }
}
