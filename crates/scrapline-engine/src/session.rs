use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scrapline_core::config::ExecutionConfig;
use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::{ResultMap, SessionId, StepDecl};

use crate::engine::Engine;

/// Idle timeout used when a caller does not pick one.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// The session is torn down after this long without a `handle` call.
    pub idle_timeout: Duration,
    /// Longest wait for the result of one `handle` call. Defaults to
    /// `idle_timeout`.
    pub result_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            result_timeout: None,
        }
    }
}

impl SessionOptions {
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            result_timeout: None,
        }
    }

    fn result_wait(&self) -> Duration {
        self.result_timeout.unwrap_or(self.idle_timeout)
    }
}

struct Outbound {
    rx: mpsc::Receiver<ResultMap>,
    /// Results still owed to callers that already gave up waiting.
    stale: usize,
}

/// A live streaming execution with an idle kill-switch.
pub struct Session {
    id: SessionId,
    inbound: mpsc::Sender<Vec<StepDecl>>,
    outbound: tokio::sync::Mutex<Outbound>,
    /// Idle deadline, watched by the session's watcher task.
    deadline: watch::Sender<Instant>,
    cancel: CancellationToken,
    options: SessionOptions,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Send a batch of steps and wait for its result.
    ///
    /// Calls are served one at a time in arrival order. Waiting longer than
    /// the result timeout fails with `ResultTimeout` but leaves the session
    /// running; the late result is discarded when it shows up.
    pub async fn handle(&self, steps: Vec<StepDecl>) -> Result<ResultMap> {
        if self.is_closed() {
            return Err(ScraplineError::SessionClosed(self.id.to_string()));
        }
        self.touch();
        let outcome = self.round_trip(steps).await;
        self.touch();
        outcome
    }

    async fn round_trip(&self, steps: Vec<StepDecl>) -> Result<ResultMap> {
        let mut out = self.outbound.lock().await;
        if self.inbound.send(steps).await.is_err() {
            return Err(self.worker_gone());
        }

        let wait = self.options.result_wait();
        let deadline = Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, out.rx.recv()).await {
                Err(_) => {
                    out.stale += 1;
                    warn!(session = %self.id, ?wait, "Timed out waiting for result");
                    return Err(ScraplineError::ResultTimeout {
                        session: self.id.to_string(),
                        timeout_ms: wait.as_millis() as u64,
                    });
                }
                Ok(None) => return Err(self.worker_gone()),
                Ok(Some(_)) if out.stale > 0 => {
                    out.stale -= 1;
                    debug!(session = %self.id, "Discarded late result");
                }
                Ok(Some(result)) => return Ok(result),
            }
        }
    }

    /// The worker has stopped: cancel so the watcher deregisters us.
    fn worker_gone(&self) -> ScraplineError {
        warn!(session = %self.id, "Session worker stopped, closing session");
        self.cancel.cancel();
        ScraplineError::SessionClosed(self.id.to_string())
    }

    /// Push the idle deadline out by a full timeout.
    fn touch(&self) {
        self.deadline
            .send_replace(Instant::now() + self.options.idle_timeout);
    }

    /// Cancel the session now. It deregisters itself shortly after.
    pub fn kill(&self) {
        info!(session = %self.id, "Killing session");
        self.cancel.cancel();
    }
}

type SessionTable = Arc<Mutex<HashMap<SessionId, Arc<Session>>>>;

fn lock(table: &SessionTable) -> MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of active sessions.
///
/// Create one per process and share it with whatever creates, lists or
/// kills sessions.
pub struct SessionManager {
    engine: Engine,
    sessions: SessionTable,
}

impl SessionManager {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a session for `config`.
    ///
    /// A failure to start the browser or the stream is a `SessionStart`
    /// error and nothing is registered.
    pub async fn create(
        &self,
        config: &ExecutionConfig,
        options: SessionOptions,
    ) -> Result<Arc<Session>> {
        let cancel = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::channel(self.engine.options().stream_buffer.max(1));
        let results = self
            .engine
            .stream(config, inbound_rx, cancel.clone())
            .await
            .map_err(|e| {
                cancel.cancel();
                ScraplineError::SessionStart(e.to_string())
            })?;

        let id = SessionId::new();
        let (deadline_tx, deadline_rx) = watch::channel(Instant::now() + options.idle_timeout);
        let session = Arc::new(Session {
            id: id.clone(),
            inbound: inbound_tx,
            outbound: tokio::sync::Mutex::new(Outbound {
                rx: results,
                stale: 0,
            }),
            deadline: deadline_tx,
            cancel: cancel.clone(),
            options,
            created_at: chrono::Utc::now(),
        });

        lock(&self.sessions).insert(id.clone(), Arc::clone(&session));
        tokio::spawn(watch_idle(
            id.clone(),
            deadline_rx,
            cancel,
            Arc::clone(&self.sessions),
        ));

        info!(session = %id, idle_timeout = ?session.options.idle_timeout, "Session created");
        Ok(session)
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        lock(&self.sessions).get(id).cloned()
    }

    /// Ids of the active sessions.
    pub fn list(&self) -> Vec<SessionId> {
        lock(&self.sessions).keys().cloned().collect()
    }

    /// Kill and deregister a session.
    pub fn kill(&self, id: &SessionId) -> Result<()> {
        let session = lock(&self.sessions)
            .remove(id)
            .ok_or_else(|| ScraplineError::SessionNotFound(id.to_string()))?;
        session.kill();
        Ok(())
    }

    /// Send steps to a session and wait for the result.
    pub async fn handle(&self, id: &SessionId, steps: Vec<StepDecl>) -> Result<ResultMap> {
        let session = self
            .get(id)
            .ok_or_else(|| ScraplineError::SessionNotFound(id.to_string()))?;
        session.handle(steps).await
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tears a session down on kill or when its idle deadline passes.
async fn watch_idle(
    id: SessionId,
    mut deadline: watch::Receiver<Instant>,
    cancel: CancellationToken,
    sessions: SessionTable,
) {
    loop {
        let until = *deadline.borrow_and_update();
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(session = %id, "Session cancelled");
                break;
            }
            changed = deadline.changed() => {
                if changed.is_err() {
                    cancel.cancel();
                    break;
                }
            }
            _ = tokio::time::sleep_until(until) => {
                info!(session = %id, "Session idle timeout");
                cancel.cancel();
                break;
            }
        }
    }

    lock(&sessions).remove(&id);
    debug!(session = %id, "Session deregistered");
}
