use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{record_store::RecordStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a record store connected, flipping the shared state into degraded mode while it is not.
///
/// Live session relay keeps working in degraded mode; only REST persistence is refused.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RecordStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "record store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        state.install_record_store(store.clone()).await;
        info!("record store connected; leaving degraded mode");
        delay = INITIAL_DELAY;

        while watch_health(&state, store.as_ref()).await {}

        state.clear_record_store().await;
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// One health round. Returns `false` once reconnecting gave up.
async fn watch_health(state: &SharedState, store: &dyn RecordStore) -> bool {
    if store.health_check().await.is_ok() {
        if state.is_degraded().await {
            info!("record store healthy again; leaving degraded mode");
            state.update_degraded(false);
        }
        sleep(HEALTH_POLL_INTERVAL).await;
        return true;
    }

    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "record store reconnected after failed health check");
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "record store reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "record store reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    warn!("exhausted record store reconnect attempts; staying in degraded mode");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig, dao::record_store::memory::MemoryRecordStore, state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn installs_the_first_store_that_connects() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        let mut calls = 0u32;
        let supervisor = tokio::spawn(run(state.clone(), move || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt == 1 {
                    Err(StorageError::unavailable(
                        "refused".into(),
                        std::io::Error::other("connection refused"),
                    ))
                } else {
                    Ok(Arc::new(MemoryRecordStore::new()) as Arc<dyn RecordStore>)
                }
            }
        }));

        watcher.changed().await.unwrap();
        assert!(!*watcher.borrow());
        assert!(state.require_record_store().await.is_ok());
        supervisor.abort();
    }
}
