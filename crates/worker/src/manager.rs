//! The cache manager and its event dispatch.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, oneshot};

use leumas_core::{CacheStorage, Error, InterceptedRequest, Registration, StoredResponse, Transport, WorkerRegistrar};

use crate::config::WorkerConfig;
use crate::intercept::FetchOutcome;
use crate::lifecycle::{ActivateReport, InstallReport};
use crate::messages::{ControlMessage, ControlReply};
use crate::state::WorkerState;

/// Lifecycle events delivered to the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(InterceptedRequest),
    Message(ControlMessage, Option<oneshot::Sender<ControlReply>>),
}

impl WorkerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::Message(..) => "message",
        }
    }
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetched(FetchOutcome),
    Handled,
}

/// Snapshot of the worker for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub cache_version: String,
    /// Entries in the current store.
    pub cache_size: usize,
    /// Every store present, oldest first.
    pub stores: Vec<String>,
    pub clients_claimed_at: Option<DateTime<Utc>>,
}

pub struct CacheManager {
    pub(crate) config: WorkerConfig,
    pub(crate) storage: Arc<dyn CacheStorage>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) lifecycle: Mutex<()>,
    /// SKIP_WAITING arrived before install finished.
    pub(crate) skip_requested: AtomicBool,
    state: RwLock<WorkerState>,
    claimed_at: RwLock<Option<DateTime<Utc>>>,
}

impl CacheManager {
    pub fn new(config: WorkerConfig, storage: Arc<dyn CacheStorage>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            storage,
            transport,
            lifecycle: Mutex::new(()),
            skip_requested: AtomicBool::new(false),
            state: RwLock::new(WorkerState::Parsed),
            claimed_at: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub(crate) async fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write().await;
        tracing::info!("worker {} -> {}", *state, next);
        *state = next;
    }

    pub(crate) async fn claim_clients(&self) {
        *self.claimed_at.write().await = Some(Utc::now());
    }

    /// Route an event to its handler.
    ///
    /// Only install and activate report errors; fetch and message handling
    /// always settle.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        tracing::debug!("dispatching {} event", event.kind());
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => Ok(EventOutcome::Fetched(self.handle_fetch(&request).await)),
            WorkerEvent::Message(message, reply) => {
                self.handle_message(message, reply).await;
                Ok(EventOutcome::Handled)
            }
        }
    }

    pub async fn status(&self) -> Result<WorkerStatus, Error> {
        Ok(WorkerStatus {
            state: self.state().await,
            cache_version: self.config.cache_version.clone(),
            cache_size: self.storage.entry_count(&self.config.cache_version).await?,
            stores: self.storage.keys().await?,
            clients_claimed_at: *self.claimed_at.read().await,
        })
    }

    async fn registration(&self) -> Result<Registration, Error> {
        Ok(Registration {
            script_path: self.config.script_path.clone(),
            scope: self.config.scope()?.to_string(),
            cache_version: self.config.cache_version.clone(),
            state: self.state().await.to_string(),
        })
    }
}

/// Pages fetching through the manager see intercepted responses.
#[async_trait::async_trait]
impl Transport for CacheManager {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<StoredResponse, Error> {
        self.handle_fetch(request)
            .await
            .response
            .ok_or_else(|| Error::Network(format!("no response for {}", request.url)))
    }
}

#[async_trait::async_trait]
impl WorkerRegistrar for CacheManager {
    /// Install the worker for `script_path`. Registering again returns the
    /// existing registration.
    async fn register(&self, script_path: &str) -> Result<Registration, Error> {
        if script_path != self.config.script_path {
            return Err(Error::Registration(format!(
                "unknown worker script {script_path}, expected {}",
                self.config.script_path
            )));
        }

        if self.state().await.can_install() {
            match self.install().await {
                // lost a race with another registration
                Ok(_) | Err(Error::InvalidState(_)) => {}
                Err(e) => return Err(Error::Registration(e.to_string())),
            }
        }
        self.registration().await
    }
}
