use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::batch::refresh_location;
use crate::config::AnalyticsConfig;
use crate::delivery::{
    retry_durable_batches, DeliveryContext, DeliverySettings, FlushDispatcher, FlushHandle,
    ReplayReport, UploadTask,
};
use crate::error_handling::{AnalyticsError, DeliveryStats};
use crate::initialization::init_client;
use crate::model::{Event, Properties, Session};
use crate::storage::{FailedBatchStore, MemoryBatchStore, SqliteBatchStore};
use crate::transport::{HttpTransport, Transport};

#[derive(Default)]
struct ProxyState {
    session: Option<Session>,
    events: Vec<Event>,
}

/// Entry point for the application: records events and flushes them per session.
///
/// Events logged while no session is active start one. `end_session` hands
/// the queued events to the backend's flush worker and returns immediately;
/// delivery failures never reach the caller.
///
/// # Example
///
/// ```no_run
/// use mcs_analytics::{AnalyticsConfig, AnalyticsProxy, Properties};
///
/// # async fn run() -> Result<(), mcs_analytics::AnalyticsError> {
/// let config = AnalyticsConfig {
///     backend_id: "my-backend".to_string(),
///     base_url: "https://mcs.example.com".to_string(),
///     application_key: "app-key".to_string(),
///     ..Default::default()
/// };
/// let proxy = AnalyticsProxy::from_config(&config).await?;
/// proxy.log_event("checkout", Some(Properties::new().insert("items", "3")))?;
/// proxy.end_session().await;
/// proxy.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct AnalyticsProxy {
    enabled: bool,
    ctx: Arc<DeliveryContext>,
    dispatcher: FlushDispatcher,
    state: Mutex<ProxyState>,
}

impl AnalyticsProxy {
    /// Creates a proxy over an assembled delivery context.
    ///
    /// When called inside a tokio runtime, a device location lookup starts in
    /// the background right away.
    pub fn new(config: &AnalyticsConfig, ctx: DeliveryContext) -> Self {
        let proxy = AnalyticsProxy {
            enabled: config.enabled,
            ctx: Arc::new(ctx),
            dispatcher: FlushDispatcher::new(config.flush_queue_capacity),
            state: Mutex::new(ProxyState::default()),
        };
        if proxy.enabled {
            if tokio::runtime::Handle::try_current().is_ok() {
                proxy.refresh_location();
            } else {
                log::debug!("[analytics] proxy: no async runtime, skipping location lookup");
            }
        }
        proxy
    }

    /// Creates a proxy with the HTTP transport and the SQLite durable store.
    ///
    /// A disabled configuration gets an in-memory store so no database file is
    /// created.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError` if the configuration is invalid, the HTTP
    /// client cannot be built or the database cannot be opened.
    pub async fn from_config(config: &AnalyticsConfig) -> Result<Self, AnalyticsError> {
        let settings = DeliverySettings::from_config(config)?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(init_client(config)?));
        let store: Arc<dyn FailedBatchStore> = if config.enabled {
            Arc::new(SqliteBatchStore::open(&config.db_path).await?)
        } else {
            Arc::new(MemoryBatchStore::new())
        };
        Ok(Self::new(
            config,
            DeliveryContext::new(settings, transport, store),
        ))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn context(&self) -> &Arc<DeliveryContext> {
        &self.ctx
    }

    /// Starts a session unless one is already active; returns the active session id.
    pub fn start_session(&self) -> String {
        let mut state = self.lock_state();
        Self::active_session(&mut state).session_id().to_string()
    }

    /// Id of the active session, if any.
    pub fn session_id(&self) -> Option<String> {
        self.lock_state()
            .session
            .as_ref()
            .map(|s| s.session_id().to_string())
    }

    /// Queues a custom event in the active session.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::InvalidArgument` if `name` is empty or blank.
    pub fn log_event(&self, name: &str, properties: Option<Properties>) -> Result<(), AnalyticsError> {
        let event = Event::new(name, None, properties)?;
        self.log_custom_event(event);
        Ok(())
    }

    /// Queues a prepared event, filling in its timestamp and session id if unset.
    pub fn log_custom_event(&self, mut event: Event) {
        if !self.enabled {
            log::trace!("[analytics] proxy: disabled, ignoring event {}", event.name());
            return;
        }
        let mut state = self.lock_state();
        let session_id = Self::active_session(&mut state).session_id().to_string();
        event.fill_missing(&session_id, Utc::now());
        log::trace!(
            "[analytics] proxy: queued event {} in session {session_id}",
            event.name()
        );
        state.events.push(event);
    }

    /// Events waiting for the next flush.
    pub fn queued_events(&self) -> usize {
        self.lock_state().events.len()
    }

    /// Ends the active session and dispatches its flush.
    ///
    /// The queue is swapped for an empty one before dispatch, so events logged
    /// afterwards belong to the next session. Returns `None` when analytics is
    /// disabled or no session is active. The returned handle may be dropped.
    pub async fn end_session(&self) -> Option<FlushHandle> {
        if !self.enabled {
            return None;
        }
        let (session, events) = {
            let mut state = self.lock_state();
            let session = state.session.take();
            (session, std::mem::take(&mut state.events))
        };
        let Some(mut session) = session else {
            log::debug!("[analytics] proxy: end_session called with no active session");
            return None;
        };
        session.end();
        log::debug!(
            "[analytics] proxy: session {} ended with {} event(s)",
            session.session_id(),
            events.len()
        );
        let task = UploadTask::new(Arc::clone(&self.ctx), session, events);
        Some(self.dispatcher.dispatch(task).await)
    }

    /// Starts a new device location lookup for later context events.
    pub fn refresh_location(&self) -> JoinHandle<()> {
        refresh_location(Arc::clone(&self.ctx.device), Arc::clone(&self.ctx.location))
    }

    /// Resends stored batches now instead of waiting for the next accepted flush.
    pub async fn flush_stored(&self) -> ReplayReport {
        retry_durable_batches(&self.ctx).await
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.ctx.stats)
    }

    /// Waits for every dispatched flush to finish.
    ///
    /// Queued events of a session that was never ended are not sent.
    pub async fn shutdown(&self) {
        let pending = self.queued_events();
        if pending > 0 {
            log::warn!("[analytics] proxy: shutting down with {pending} event(s) in an open session");
        }
        self.dispatcher.shutdown().await;
        for (outcome, count) in self.ctx.stats.summary() {
            log::info!("[analytics] proxy: {outcome}: {count}");
        }
    }

    fn active_session(state: &mut ProxyState) -> &Session {
        state.session.get_or_insert_with(|| {
            let session = Session::new();
            log::debug!("[analytics] proxy: started session {}", session.session_id());
            session
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, ProxyState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
