use std::{sync::Arc, time::Duration};

use tokio::{
    runtime::Handle,
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

use crate::state::timer::{Clock, SessionTimer};

/// Refresh period of the displayed countdown.
pub const DISPLAY_REFRESH: Duration = Duration::from_secs(1);

/// Local countdown refreshing the displayed remaining seconds from a running clock.
///
/// It never touches the live state itself; reaching 0 calls `on_expired` once
/// and ends the task. The task is aborted when the ticker is dropped.
#[derive(Debug)]
pub struct DisplayTicker {
    handle: JoinHandle<()>,
}

impl DisplayTicker {
    /// Spawn a ticker for `timer`, or `None` outside a tokio runtime.
    pub fn spawn(
        timer: SessionTimer,
        clock: Arc<dyn Clock>,
        display: Arc<watch::Sender<u32>>,
        on_expired: impl FnOnce() + Send + 'static,
    ) -> Option<Self> {
        let runtime = Handle::try_current().ok()?;
        let handle = runtime.spawn(async move {
            let mut ticks = interval(DISPLAY_REFRESH);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                let remaining = timer.remaining_at(clock.now_millis());
                display.send_if_modified(|shown| {
                    let changed = *shown != remaining;
                    *shown = remaining;
                    changed
                });
                if remaining == 0 {
                    on_expired();
                    break;
                }
            }
        });
        Some(Self { handle })
    }
}

impl Drop for DisplayTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
