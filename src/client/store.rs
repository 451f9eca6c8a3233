//! Per-device live state, mirrored from and published to the session relay.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{runtime::Handle, sync::{mpsc, watch}};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    ClientError, ClientResult,
    persistence::{LocalPersistence, SessionIdentity, load_state, save_state},
    recorder::MatchRecorder,
    ticker::DisplayTicker,
};
use crate::{
    dto::{
        match_log::CreateMatchRequest,
        ws::{ClientMessage, ServerMessage, SyncTimerPayload, UpdateStatePayload},
    },
    state::{
        live::{LiveMatchState, MatchPhase, MatchSettings, Outcome, PlayerSnapshot, Side, WinCondition},
        rotation::{draw_teams, rotate},
        timer::{Clock, SessionTimer, SystemClock},
    },
};

/// Fewest registered players needed to draw two teams.
pub const MIN_PLAYERS: usize = 2;

/// Live state of one open session on this device.
///
/// Every local mutation is persisted and then published to the relay without
/// waiting for anything back. Remote snapshots replace the local one
/// wholesale. The displayed countdown is derived from the last clock record
/// pushed by the server; it never feeds back into the state except when it
/// runs out, which pauses the match at 0.
pub struct LiveStateStore {
    shared: Arc<Shared>,
    recorder: Option<Arc<dyn MatchRecorder>>,
}

/// Everything the display ticker needs to reach when the clock runs out.
struct Shared {
    identity: SessionIdentity,
    state: watch::Sender<LiveMatchState>,
    display: Arc<watch::Sender<u32>>,
    timer: Mutex<Option<SessionTimer>>,
    ticker: Mutex<Option<DisplayTicker>>,
    persistence: Arc<dyn LocalPersistence>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    clock: Arc<dyn Clock>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LiveStateStore {
    /// Rehydrate from `persistence`, or start a fresh `setup` state with `defaults`.
    ///
    /// Messages for the relay are pushed to `outbound`, normally drained by a
    /// [`super::SyncTransport`].
    pub fn open(
        identity: SessionIdentity,
        defaults: MatchSettings,
        persistence: Arc<dyn LocalPersistence>,
        outbound: mpsc::UnboundedSender<ClientMessage>,
    ) -> Self {
        Self::open_with_clock(identity, defaults, persistence, outbound, Arc::new(SystemClock))
    }

    /// Same as [`LiveStateStore::open`], reading the countdown from `clock`.
    pub fn open_with_clock(
        identity: SessionIdentity,
        defaults: MatchSettings,
        persistence: Arc<dyn LocalPersistence>,
        outbound: mpsc::UnboundedSender<ClientMessage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let initial = load_state(persistence.as_ref()).unwrap_or_else(|| LiveMatchState::new(defaults));
        let (display, _) = watch::channel(initial.timer);
        let (state, _) = watch::channel(initial);
        Self {
            shared: Arc::new(Shared {
                identity,
                state,
                display: Arc::new(display),
                timer: Mutex::new(None),
                ticker: Mutex::new(None),
                persistence,
                outbound,
                clock,
            }),
            recorder: None,
        }
    }

    /// Log finished matches through `recorder`.
    pub fn with_recorder(mut self, recorder: Arc<dyn MatchRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Session this store belongs to.
    pub fn identity(&self) -> &SessionIdentity {
        &self.shared.identity
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> LiveMatchState {
        self.shared.state.borrow().clone()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<LiveMatchState> {
        self.shared.state.subscribe()
    }

    /// Observe the displayed remaining seconds.
    pub fn subscribe_display(&self) -> watch::Receiver<u32> {
        self.shared.display.subscribe()
    }

    /// Last clock record pushed by the server.
    pub fn timer(&self) -> Option<SessionTimer> {
        *lock(&self.shared.timer)
    }

    /// Remaining seconds right now: from the server clock while playing, else from the state.
    pub fn remaining(&self) -> u32 {
        self.shared.remaining()
    }

    /// Apply `update`, optionally saving the previous state for undo, then persist and publish.
    ///
    /// While playing, the published `timer` is the live remaining time so the
    /// session clock is not rewound by unrelated changes.
    pub fn mutate(&self, update: impl FnOnce(&mut LiveMatchState), save_history: bool) {
        self.shared.mutate(update, save_history);
    }

    /// Restore the most recent saved state and force it on every member of the session.
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&self) -> bool {
        self.shared.undo()
    }

    /// Adopt a snapshot relayed by the server. Identical snapshots are ignored.
    pub fn receive_remote_state(&self, incoming: LiveMatchState) -> bool {
        let shared = &self.shared;
        if *shared.state.borrow() == incoming {
            return false;
        }
        shared.persist(&incoming);
        shared.refresh_display(&incoming);
        shared.state.send_replace(incoming);
        true
    }

    /// Adopt the server clock and restart the local countdown when it runs.
    pub fn receive_timer_sync(&self, timer: SessionTimer) {
        self.shared.receive_timer_sync(timer);
    }

    /// Route a message received from the relay.
    pub fn apply_server_message(&self, message: ServerMessage) {
        match message {
            ServerMessage::StateUpdated(state) => {
                self.receive_remote_state(Arc::unwrap_or_clone(state));
            }
            ServerMessage::TimerSync(timer) => self.receive_timer_sync(timer),
        }
    }

    /// Replace the match rules; the clock goes back to the full match length.
    pub fn update_settings(&self, settings: MatchSettings) {
        self.mutate(
            |state| {
                state.timer = settings.match_duration_secs();
                state.settings = settings;
            },
            false,
        );
    }

    /// Draw teams at random from `players` and get ready to kick off.
    pub fn start_match(&self, players: &[PlayerSnapshot]) -> ClientResult<()> {
        if players.len() < MIN_PLAYERS {
            return Err(ClientError::NotEnoughPlayers {
                needed: MIN_PLAYERS,
                got: players.len(),
            });
        }
        let players_per_team = self.shared.state.borrow().settings.players_per_team;
        let lineup = draw_teams(players, players_per_team, &mut rand::rng());
        self.mutate(
            move |state| {
                state.team_a = lineup.team_a;
                state.team_b = lineup.team_b;
                state.queue = lineup.queue;
                state.goalie_queue = lineup.goalie_queue;
                state.score_a = 0;
                state.score_b = 0;
                state.phase = MatchPhase::Paused;
                state.timer = state.settings.match_duration_secs();
            },
            true,
        );
        Ok(())
    }

    /// Put a late arrival at the back of the matching queue.
    pub fn add_to_queue(&self, player: PlayerSnapshot) -> bool {
        if self.shared.state.borrow().contains_player(player.id) {
            return false;
        }
        self.mutate(
            move |state| {
                if player.is_goalkeeper {
                    state.goalie_queue.push(player);
                } else {
                    state.queue.push(player);
                }
            },
            true,
        );
        true
    }

    /// Take a player off the pitch and out of the queues.
    pub fn remove_player(&self, id: Uuid) -> bool {
        if !self.shared.state.borrow().contains_player(id) {
            return false;
        }
        self.mutate(
            |state| {
                state.remove_player(id);
            },
            true,
        );
        true
    }

    /// Change a score by `delta`, clamped at zero.
    ///
    /// Under the goals rule, reaching the target stops the match.
    pub fn adjust_score(&self, side: Side, delta: i32) {
        let remaining = self.remaining();
        self.mutate(
            |state| {
                state.adjust_score(side, delta);
                let target_reached = state.settings.win_condition == WinCondition::Goals
                    && delta > 0
                    && state.score(side) >= state.settings.goals_to_win;
                if target_reached && state.phase != MatchPhase::Finished {
                    state.timer = remaining;
                    state.phase = MatchPhase::Finished;
                }
            },
            true,
        );
    }

    /// Start or pause the clock. Returns `false` when the phase does not allow it.
    pub fn toggle_timer(&self) -> bool {
        let (phase, has_teams) = {
            let state = self.shared.state.borrow();
            (state.phase, !state.team_a.is_empty() || !state.team_b.is_empty())
        };
        let next = match phase {
            MatchPhase::Playing => MatchPhase::Paused,
            MatchPhase::Paused if has_teams => MatchPhase::Playing,
            _ => return false,
        };
        let remaining = self.remaining();
        if next == MatchPhase::Playing && remaining == 0 {
            return false;
        }
        self.mutate(
            |state| {
                state.phase = next;
                state.timer = remaining;
            },
            false,
        );
        true
    }

    /// Put the clock back to the full match length and force it on every member.
    pub fn reset_timer(&self) {
        let shared = &self.shared;
        let duration = shared.state.borrow().settings.match_duration_secs();
        shared.mutate(
            |state| {
                state.timer = duration;
                if state.phase == MatchPhase::Playing {
                    state.phase = MatchPhase::Paused;
                }
            },
            false,
        );

        let timer = SessionTimer::stopped(duration);
        shared.receive_timer_sync(timer);
        shared.send(ClientMessage::SyncTimer(SyncTimerPayload {
            session_code: shared.identity.code.to_string(),
            timer_state: timer,
        }));
    }

    /// Confirm the result: log the match in the background and rotate the teams.
    ///
    /// Returns the log entry handed to the recorder.
    pub fn finish_match(&self, outcome: Outcome) -> CreateMatchRequest {
        let remaining = self.remaining();
        let draft = CreateMatchRequest::draft(&self.shared.state.borrow(), outcome, remaining);
        self.spawn_record(draft.clone());
        self.mutate(|state| *state = rotate(state, outcome), true);
        draft
    }

    /// Set or clear the display name of a team.
    pub fn rename_team(&self, side: Side, name: Option<String>) {
        self.mutate(
            |state| match side {
                Side::A => state.team_a_name = name,
                Side::B => state.team_b_name = name,
            },
            false,
        );
    }

    /// Set or clear the color of a team.
    pub fn recolor_team(&self, side: Side, color: Option<String>) {
        self.mutate(
            |state| match side {
                Side::A => state.team_a_color = color,
                Side::B => state.team_b_color = color,
            },
            false,
        );
    }

    fn spawn_record(&self, entry: CreateMatchRequest) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            warn!("no runtime to record the match log; skipping");
            return;
        };
        let session_id = self.shared.identity.id;
        runtime.spawn(async move {
            if let Err(err) = recorder.record(session_id, entry).await {
                warn!(error = %err, %session_id, "failed to record match log");
            }
        });
    }
}

impl Shared {
    fn remaining(&self) -> u32 {
        let state = self.state.borrow();
        match *lock(&self.timer) {
            Some(timer) if timer.is_running && state.phase == MatchPhase::Playing => {
                timer.remaining_at(self.clock.now_millis())
            }
            _ => state.timer,
        }
    }

    fn mutate(&self, update: impl FnOnce(&mut LiveMatchState), save_history: bool) {
        let remaining = self.remaining();
        let mut committed = None;
        self.state.send_modify(|state| {
            if save_history {
                let mut before = state.clone();
                if before.phase == MatchPhase::Playing {
                    before.timer = remaining;
                }
                state.history.push(before);
            }
            update(state);
            if state.phase == MatchPhase::Playing {
                state.timer = remaining;
            }
            committed = Some(state.clone());
        });
        if let Some(state) = committed {
            self.commit(state, false);
        }
    }

    fn undo(&self) -> bool {
        let remaining = self.remaining();
        let mut restored = None;
        self.state.send_if_modified(|state| {
            let Some(previous) = state.history.pop() else {
                return false;
            };
            let mut next = Arc::unwrap_or_clone(previous);
            next.history = std::mem::take(&mut state.history);
            if next.phase == MatchPhase::Playing {
                next.timer = remaining;
            }
            *state = next;
            restored = Some(state.clone());
            true
        });
        match restored {
            Some(state) => {
                self.commit(state, true);
                true
            }
            None => false,
        }
    }

    /// Adopt `timer` and, while it runs during play, tick the display until it
    /// reaches 0, at which point the match is paused.
    fn receive_timer_sync(self: &Arc<Self>, timer: SessionTimer) {
        *lock(&self.timer) = Some(timer);
        self.set_display(timer.remaining_at(self.clock.now_millis()));

        let playing = self.state.borrow().phase == MatchPhase::Playing;
        let mut ticker = lock(&self.ticker);
        *ticker = None;
        if playing && timer.is_running {
            let shared = Arc::downgrade(self);
            *ticker = DisplayTicker::spawn(timer, self.clock.clone(), self.display.clone(), move || {
                if let Some(shared) = shared.upgrade() {
                    shared.expire();
                }
            });
        }
    }

    /// Pause at 0 once the running clock is out.
    fn expire(&self) {
        if self.state.borrow().phase != MatchPhase::Playing {
            return;
        }
        info!(code = %self.identity.code, "match clock ran out; pausing");
        self.mutate(
            |state| {
                state.phase = MatchPhase::Paused;
                state.timer = 0;
            },
            false,
        );
    }

    fn commit(&self, state: LiveMatchState, is_undo: bool) {
        self.persist(&state);
        self.refresh_display(&state);
        self.send(ClientMessage::UpdateState(UpdateStatePayload {
            session_code: self.identity.code.to_string(),
            state,
            is_undo,
        }));
    }

    fn persist(&self, state: &LiveMatchState) {
        if let Err(err) = save_state(self.persistence.as_ref(), state) {
            warn!(error = %err, "failed to persist live state");
        }
    }

    /// Outside of play the displayed time is the state's own value.
    fn refresh_display(&self, state: &LiveMatchState) {
        if state.phase != MatchPhase::Playing {
            let stopped = lock(&self.ticker).take();
            drop(stopped);
            self.set_display(state.timer);
        }
    }

    fn set_display(&self, remaining: u32) {
        self.display.send_if_modified(|shown| {
            let changed = *shown != remaining;
            *shown = remaining;
            changed
        });
    }

    fn send(&self, message: ClientMessage) {
        if self.outbound.send(message).is_err() {
            debug!("sync transport gone; message dropped");
        }
    }
}
