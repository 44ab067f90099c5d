//! Session lifecycle: creation, lookup, and reclamation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::bus::{DEFAULT_BUS_CAPACITY, DEFAULT_PING_INTERVAL, ProgressBus, Subscription};
use super::job::Job;
use super::orchestrator::PipelineOrchestrator;
use super::store::JobStore;
use crate::config::ConfigStore;
use crate::history::HistoryRepository;
use crate::providers::ProviderFactory;
use crate::{Error, Result};

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Pipeline in flight.
    Running,
    /// Every job reached a terminal state.
    Completed,
    /// A session-fatal error stopped the batch.
    Aborted,
}

/// One input file for a new session.
#[derive(Debug, Clone)]
pub struct FileSpec {
    pub path: PathBuf,
    pub language: String,
}

/// One run of the pipeline over a fixed set of jobs.
///
/// Owns the session's job store and progress bus; membership of the job set
/// is immutable once the session exists.
pub struct Session {
    id: String,
    store: Arc<JobStore>,
    bus: ProgressBus,
    phase: RwLock<SessionPhase>,
    created_at: DateTime<Utc>,
    started: Instant,
}

impl Session {
    fn new(id: String, store: Arc<JobStore>, bus: ProgressBus) -> Self {
        Self {
            id,
            store,
            bus,
            phase: RwLock::new(SessionPhase::Running),
            created_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.read()
    }

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        *self.phase.write() = phase;
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.store.list()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Tunables for session lifetime management.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Event queue capacity per session.
    pub bus_capacity: usize,
    /// Keep-alive interval for idle subscribers.
    pub ping_interval: Duration,
    /// How long a finished session survives without a subscriber.
    pub reclaim_grace: Duration,
    /// Running sessions nobody watches are aborted after this long.
    pub idle_timeout: Duration,
    /// Reclaim sweep cadence.
    pub sweep_interval: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_BUS_CAPACITY,
            ping_interval: DEFAULT_PING_INTERVAL,
            reclaim_grace: Duration::from_secs(5 * 60),
            idle_timeout: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

struct SessionEntry {
    session: Arc<Session>,
    task: JoinHandle<()>,
}

/// Creates sessions on demand, binds each to its progress bus, and reclaims
/// them once finished and unwatched.
pub struct SessionManager {
    sessions: DashMap<String, SessionEntry>,
    config_store: Arc<dyn ConfigStore>,
    history: Arc<dyn HistoryRepository>,
    providers: Arc<dyn ProviderFactory>,
    settings: SessionManagerConfig,
    cancel: CancellationToken,
}

impl SessionManager {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        history: Arc<dyn HistoryRepository>,
        providers: Arc<dyn ProviderFactory>,
        settings: SessionManagerConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            config_store,
            history,
            providers,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Validate preconditions, create the session, and start its pipeline.
    ///
    /// Returns as soon as the orchestrator task is spawned; progress flows
    /// through the session's bus.
    pub fn start(&self, specs: Vec<FileSpec>) -> Result<String> {
        let config = self.config_store.load()?;
        if config.deepgram_api_key.trim().is_empty() {
            return Err(Error::credential("Deepgram API key not configured"));
        }
        if specs.is_empty() {
            return Err(Error::validation("At least one file is required"));
        }

        let store = Arc::new(JobStore::new());
        for spec in &specs {
            if !spec.path.is_file() {
                return Err(Error::not_found("File", spec.path.display().to_string()));
            }
            let file_name = spec
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| spec.path.display().to_string());
            store.create(spec.path.clone(), file_name, spec.language.clone());
        }

        let (bus, publisher) = ProgressBus::new(self.settings.bus_capacity, self.settings.ping_interval);
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone(), store, bus));

        let orchestrator = PipelineOrchestrator::new(
            Arc::clone(&session),
            config,
            publisher,
            Arc::clone(&self.history),
            Arc::clone(&self.providers),
        );
        let task = tokio::spawn(orchestrator.run());

        info!(session_id = %id, jobs = session.store().len(), "session started");
        self.sessions.insert(id.clone(), SessionEntry { session, task });
        Ok(id)
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(&entry.session))
            .ok_or_else(|| Error::not_found("Session", session_id))
    }

    /// Attach a subscriber to a session's bus, detaching any previous one.
    pub fn subscribe(&self, session_id: &str) -> Result<Subscription> {
        Ok(self.get(session_id)?.bus().subscribe())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Start the periodic reclaim sweeper.
    pub fn start_sweeper(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let cancel = self.cancel.clone();
        let sweep_interval = self.settings.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("session sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => manager.sweep(),
                }
            }
        });
    }

    /// Reclaim finished sessions nobody is watching and abort abandoned ones.
    fn sweep(&self) {
        let mut stale = Vec::new();
        for entry in self.sessions.iter() {
            let session = &entry.session;
            let unwatched = !session.bus().has_subscriber();
            let finished = session.phase() != SessionPhase::Running;

            if finished && unwatched && session.bus().idle_for() >= self.settings.reclaim_grace {
                stale.push(entry.key().clone());
            } else if !finished && unwatched && session.age() >= self.settings.idle_timeout {
                stale.push(entry.key().clone());
            }
        }

        for id in stale {
            if let Some((_, entry)) = self.sessions.remove(&id) {
                entry.task.abort();
                info!(session_id = %id, phase = ?entry.session.phase(), "session reclaimed");
            }
        }
    }

    /// Stop the sweeper and every in-flight pipeline.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        for entry in self.sessions.iter() {
            entry.task.abort();
        }
        self.sessions.clear();
    }
}
