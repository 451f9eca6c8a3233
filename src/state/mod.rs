pub mod broadcaster;
pub mod live;
pub mod rotation;
pub mod session_code;
pub mod timer;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::record_store::RecordStore,
    error::ServiceError,
    state::{
        broadcaster::SessionHub,
        timer::{Clock, SystemClock},
    },
};

pub type SharedState = Arc<AppState>;

/// Central application state holding the record store, the live-state hub and configuration.
pub struct AppState {
    record_store: RwLock<Option<Arc<dyn RecordStore>>>,
    hub: SessionHub,
    config: Arc<AppConfig>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a record store is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit clock driving session timers.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let hub = SessionHub::new(clock, config.timer_drift_tolerance_secs());
        Arc::new(Self {
            record_store: RwLock::new(None),
            hub,
            config: Arc::new(config),
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current record store, if one is installed.
    pub async fn record_store(&self) -> Option<Arc<dyn RecordStore>> {
        let guard = self.record_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current record store or [`ServiceError::Degraded`] while storage is unhealthy.
    pub async fn require_record_store(&self) -> Result<Arc<dyn RecordStore>, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        self.record_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a record store implementation and leave degraded mode.
    pub async fn install_record_store(&self, store: Arc<dyn RecordStore>) {
        {
            let mut guard = self.record_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current record store and enter degraded mode.
    pub async fn clear_record_store(&self) {
        {
            let mut guard = self.record_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.record_store.read().await;
        guard.is_none() || *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Registry of live session groups.
    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }

    /// Loaded application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Flip the degraded flag while keeping the installed store, notifying watchers on change.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::record_store::memory::MemoryRecordStore;

    #[tokio::test]
    async fn degraded_until_store_installed() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_record_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_record_store(Arc::new(MemoryRecordStore::new()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_record_store().await;
        assert!(*watcher.borrow_and_update());
    }
}
