//! Server-held match clock for a session.
//!
//! Every observer derives the remaining time from the same `startTime` /
//! `durationAtStart` pair, so clients never have to trust their own countdowns.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::live::MatchPhase;

/// Reported and computed remaining time may differ by this much without re-anchoring the clock.
pub const DEFAULT_DRIFT_TOLERANCE_SECS: u32 = 1;

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now_millis(&self) -> u64;
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// [`Clock`] that only moves when told to. Used for replays and deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Clock frozen at `now_millis`.
    pub fn starting_at(now_millis: u64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicU64::new(now_millis),
        })
    }

    /// Move the clock forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Authoritative clock record of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimer {
    /// Epoch milliseconds at which the clock last started, `None` while stopped.
    pub start_time: Option<u64>,
    /// Remaining seconds at the moment the clock last started or stopped.
    pub duration_at_start: u32,
    /// Whether the clock is counting down.
    pub is_running: bool,
}

impl SessionTimer {
    /// Stopped clock showing `remaining` seconds.
    pub fn stopped(remaining: u32) -> Self {
        Self {
            start_time: None,
            duration_at_start: remaining,
            is_running: false,
        }
    }

    /// Clock counting down `remaining` seconds from `now_millis`.
    pub fn started(now_millis: u64, remaining: u32) -> Self {
        Self {
            start_time: Some(now_millis),
            duration_at_start: remaining,
            is_running: true,
        }
    }

    /// Remaining whole seconds at `now_millis`.
    pub fn remaining_at(&self, now_millis: u64) -> u32 {
        match (self.is_running, self.start_time) {
            (true, Some(start)) => {
                let elapsed_secs = now_millis.saturating_sub(start) / 1_000;
                let elapsed_secs = u32::try_from(elapsed_secs).unwrap_or(u32::MAX);
                self.duration_at_start.saturating_sub(elapsed_secs)
            }
            _ => self.duration_at_start,
        }
    }
}

/// Timer Authority for a single session group.
///
/// Owned by the group's actor, so every mutation is serialized with the
/// publish that triggered it.
pub struct TimerAuthority {
    timer: Option<SessionTimer>,
    clock: Arc<dyn Clock>,
    tolerance_secs: u32,
}

impl TimerAuthority {
    /// Authority with no clock yet; one is created on the first state update.
    pub fn new(clock: Arc<dyn Clock>, tolerance_secs: u32) -> Self {
        Self {
            timer: None,
            clock,
            tolerance_secs,
        }
    }

    /// Current record, if any state was published for this session.
    pub fn snapshot(&self) -> Option<SessionTimer> {
        self.timer
    }

    /// Remaining seconds right now. Never mutates the record.
    pub fn remaining(&self) -> Option<u32> {
        self.timer
            .map(|timer| timer.remaining_at(self.clock.now_millis()))
    }

    /// Reconcile the clock with a published phase and the publisher's displayed time.
    ///
    /// Returns the new record when it changed and must be pushed to the whole group.
    pub fn on_phase_transition(&mut self, phase: MatchPhase, reported: u32) -> Option<SessionTimer> {
        let now = self.clock.now_millis();
        let running = phase.is_running();

        if let Some(current) = self.timer {
            let computed = current.remaining_at(now);
            if current.is_running == running && computed.abs_diff(reported) <= self.tolerance_secs {
                return None;
            }
        }

        let next = if running {
            SessionTimer::started(now, reported)
        } else {
            SessionTimer::stopped(reported)
        };
        self.timer = Some(next);
        Some(next)
    }

    /// Unconditionally replace the record, as requested by a manual reset.
    pub fn explicit_resync(&mut self, timer: SessionTimer) -> SessionTimer {
        self.timer = Some(timer);
        timer
    }
}
