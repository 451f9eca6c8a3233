//! Per-session fan-out groups.
//!
//! Each session code owns one actor task with an unbounded mailbox. Joins,
//! leaves, publishes and timer overrides for that code are processed one at a
//! time in arrival order, which is what orders delivery within a group. The
//! Timer Authority of the session lives inside the actor and is only touched
//! from its loop.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    state::{
        live::LiveMatchState,
        session_code::SessionCode,
        timer::{Clock, SessionTimer, TimerAuthority},
    },
};

/// Identifier of a live-state connection.
pub type ConnectionId = Uuid;

/// Handle used to push messages to one connected client.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Connection identifier, unique per socket.
    pub id: ConnectionId,
    /// Outbound queue drained by the connection's writer task.
    pub tx: mpsc::UnboundedSender<ServerMessage>,
}

#[derive(Debug)]
enum GroupCommand {
    Join(Participant),
    Leave(ConnectionId),
    Publish {
        origin: ConnectionId,
        state: Arc<LiveMatchState>,
        is_undo: bool,
    },
    SyncTimer(SessionTimer),
    InspectTimer(oneshot::Sender<Option<SessionTimer>>),
}

/// State owned by a single group actor.
struct SessionGroup {
    code: SessionCode,
    members: HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    authority: TimerAuthority,
}

impl SessionGroup {
    fn new(code: SessionCode, authority: TimerAuthority) -> Self {
        Self {
            code,
            members: HashMap::new(),
            authority,
        }
    }

    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<GroupCommand>) {
        while let Some(command) = mailbox.recv().await {
            self.handle(command);
        }
        debug!(code = %self.code, "session group mailbox closed");
    }

    fn handle(&mut self, command: GroupCommand) {
        match command {
            GroupCommand::Join(participant) => self.join(participant),
            GroupCommand::Leave(id) => {
                if self.members.remove(&id).is_some() {
                    debug!(code = %self.code, connection = %id, "left session group");
                }
            }
            GroupCommand::Publish {
                origin,
                state,
                is_undo,
            } => self.publish(origin, state, is_undo),
            GroupCommand::SyncTimer(timer) => {
                let timer = self.authority.explicit_resync(timer);
                info!(code = %self.code, running = timer.is_running, "timer resynced by client");
                self.deliver(|_| true, &ServerMessage::TimerSync(timer));
            }
            GroupCommand::InspectTimer(reply) => {
                let _ = reply.send(self.authority.snapshot());
            }
        }
    }

    fn join(&mut self, participant: Participant) {
        if let Some(timer) = self.authority.snapshot() {
            if participant.tx.send(ServerMessage::TimerSync(timer)).is_err() {
                return;
            }
        }
        debug!(code = %self.code, connection = %participant.id, "joined session group");
        self.members.insert(participant.id, participant.tx);
    }

    fn publish(&mut self, origin: ConnectionId, state: Arc<LiveMatchState>, is_undo: bool) {
        let phase = state.phase;
        let reported = state.timer;

        let relay = ServerMessage::StateUpdated(state);
        self.deliver(|id| is_undo || id != origin, &relay);

        if let Some(timer) = self.authority.on_phase_transition(phase, reported) {
            debug!(code = %self.code, ?phase, remaining = reported, "timer authority updated");
            self.deliver(|_| true, &ServerMessage::TimerSync(timer));
        }
    }

    /// Send `message` to every member accepted by `filter`, dropping closed connections.
    fn deliver(&mut self, filter: impl Fn(ConnectionId) -> bool, message: &ServerMessage) {
        let mut closed = Vec::new();
        for (id, tx) in &self.members {
            if filter(*id) && tx.send(message.clone()).is_err() {
                closed.push(*id);
            }
        }
        for id in closed {
            warn!(code = %self.code, connection = %id, "dropping closed connection from group");
            self.members.remove(&id);
        }
    }
}

/// Registry routing commands to the session group actors.
pub struct SessionHub {
    groups: DashMap<SessionCode, mpsc::UnboundedSender<GroupCommand>>,
    memberships: DashMap<ConnectionId, HashSet<SessionCode>>,
    clock: Arc<dyn Clock>,
    tolerance_secs: u32,
}

impl SessionHub {
    /// Empty hub. Groups are spawned lazily and live for the rest of the process.
    pub fn new(clock: Arc<dyn Clock>, tolerance_secs: u32) -> Self {
        Self {
            groups: DashMap::new(),
            memberships: DashMap::new(),
            clock,
            tolerance_secs,
        }
    }

    /// Clock shared with every group's Timer Authority.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Add `participant` to the group named by `raw_code`.
    ///
    /// A late joiner immediately receives the session clock when one exists.
    /// Malformed codes are ignored.
    pub fn join(&self, participant: Participant, raw_code: &str) {
        let Some(code) = parse_code(raw_code) else {
            return;
        };
        self.memberships
            .entry(participant.id)
            .or_default()
            .insert(code.clone());
        self.dispatch(code, GroupCommand::Join(participant));
    }

    /// Relay `state` to the group named by `raw_code`.
    ///
    /// The publisher only gets its own snapshot back for undo. Any resulting
    /// clock change is pushed to every member.
    pub fn publish(&self, origin: ConnectionId, raw_code: &str, state: LiveMatchState, is_undo: bool) {
        let Some(code) = parse_code(raw_code) else {
            return;
        };
        self.dispatch(
            code,
            GroupCommand::Publish {
                origin,
                state: Arc::new(state),
                is_undo,
            },
        );
    }

    /// Overwrite the session clock and push it to every member.
    pub fn sync_timer(&self, raw_code: &str, timer: SessionTimer) {
        let Some(code) = parse_code(raw_code) else {
            return;
        };
        self.dispatch(code, GroupCommand::SyncTimer(timer));
    }

    /// Remove `connection` from every group it joined.
    pub fn leave(&self, connection: ConnectionId) {
        let Some((_, codes)) = self.memberships.remove(&connection) else {
            return;
        };
        for code in codes {
            if let Some(group) = self.groups.get(&code) {
                let _ = group.send(GroupCommand::Leave(connection));
            }
        }
    }

    /// Current clock record of `code`, without creating a group.
    pub async fn timer(&self, code: &SessionCode) -> Option<SessionTimer> {
        let group = self.groups.get(code)?.clone();
        let (reply, response) = oneshot::channel();
        group.send(GroupCommand::InspectTimer(reply)).ok()?;
        response.await.ok().flatten()
    }

    /// Number of session groups spawned so far.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Remaining seconds of `timer` at the hub's current time.
    pub fn remaining(&self, timer: &SessionTimer) -> u32 {
        timer.remaining_at(self.clock.now_millis())
    }

    fn dispatch(&self, code: SessionCode, command: GroupCommand) {
        let group = self
            .groups
            .entry(code.clone())
            .or_insert_with(|| self.spawn_group(code.clone()))
            .clone();

        if let Err(mpsc::error::SendError(command)) = group.send(command) {
            warn!(code = %code, "session group stopped unexpectedly; respawning");
            let group = self.spawn_group(code.clone());
            let _ = group.send(command);
            self.groups.insert(code, group);
        }
    }

    fn spawn_group(&self, code: SessionCode) -> mpsc::UnboundedSender<GroupCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        let authority = TimerAuthority::new(self.clock.clone(), self.tolerance_secs);
        info!(code = %code, "session group created");
        tokio::spawn(SessionGroup::new(code, authority).run(rx));
        tx
    }
}

fn parse_code(raw: &str) -> Option<SessionCode> {
    match SessionCode::parse(raw) {
        Ok(code) => Some(code),
        Err(err) => {
            debug!(code = raw, error = %err, "ignoring message for malformed session code");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::state::{
        live::MatchPhase,
        timer::{DEFAULT_DRIFT_TOLERANCE_SECS, ManualClock},
    };

    const CODE: &str = "ABC123";

    fn participant() -> (Participant, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Participant {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    fn group(clock: &Arc<ManualClock>) -> SessionGroup {
        SessionGroup::new(
            SessionCode::parse(CODE).unwrap(),
            TimerAuthority::new(clock.clone(), DEFAULT_DRIFT_TOLERANCE_SECS),
        )
    }

    fn state(phase: MatchPhase, timer: u32) -> Arc<LiveMatchState> {
        Arc::new(LiveMatchState {
            phase,
            timer,
            ..LiveMatchState::default()
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn publish_skips_origin() {
        let clock = ManualClock::starting_at(0);
        let mut group = group(&clock);
        let (origin, mut origin_rx) = participant();
        let (peer, mut peer_rx) = participant();
        group.handle(GroupCommand::Join(origin.clone()));
        group.handle(GroupCommand::Join(peer));

        let snapshot = state(MatchPhase::Paused, 600);
        group.handle(GroupCommand::Publish {
            origin: origin.id,
            state: snapshot.clone(),
            is_undo: false,
        });

        assert_eq!(
            drain(&mut peer_rx),
            vec![
                ServerMessage::StateUpdated(snapshot),
                ServerMessage::TimerSync(SessionTimer::stopped(600)),
            ]
        );
        assert_eq!(
            drain(&mut origin_rx),
            vec![ServerMessage::TimerSync(SessionTimer::stopped(600))]
        );
    }

    #[test]
    fn undo_is_echoed_to_origin() {
        let clock = ManualClock::starting_at(0);
        let mut group = group(&clock);
        let (origin, mut origin_rx) = participant();
        let (peer, mut peer_rx) = participant();
        group.handle(GroupCommand::Join(origin.clone()));
        group.handle(GroupCommand::Join(peer));
        group.handle(GroupCommand::Publish {
            origin: origin.id,
            state: state(MatchPhase::Paused, 600),
            is_undo: false,
        });
        drain(&mut origin_rx);
        drain(&mut peer_rx);

        let restored = state(MatchPhase::Paused, 600);
        group.handle(GroupCommand::Publish {
            origin: origin.id,
            state: restored.clone(),
            is_undo: true,
        });

        let expected = vec![ServerMessage::StateUpdated(restored)];
        assert_eq!(drain(&mut origin_rx), expected);
        assert_eq!(drain(&mut peer_rx), expected);
    }

    #[test]
    fn unchanged_timer_is_not_rebroadcast() {
        let clock = ManualClock::starting_at(0);
        let mut group = group(&clock);
        let (origin, mut origin_rx) = participant();
        group.handle(GroupCommand::Join(origin.clone()));

        group.handle(GroupCommand::Publish {
            origin: origin.id,
            state: state(MatchPhase::Playing, 600),
            is_undo: false,
        });
        assert_eq!(drain(&mut origin_rx).len(), 1);

        clock.advance(5_000);
        group.handle(GroupCommand::Publish {
            origin: origin.id,
            state: state(MatchPhase::Playing, 595),
            is_undo: false,
        });
        assert!(drain(&mut origin_rx).is_empty());
    }

    #[test]
    fn late_joiner_receives_clock() {
        let clock = ManualClock::starting_at(10_000);
        let mut group = group(&clock);
        let (early, _early_rx) = participant();
        group.handle(GroupCommand::Join(early.clone()));
        group.handle(GroupCommand::Publish {
            origin: early.id,
            state: state(MatchPhase::Playing, 300),
            is_undo: false,
        });

        let (late, mut late_rx) = participant();
        group.handle(GroupCommand::Join(late));
        assert_eq!(
            drain(&mut late_rx),
            vec![ServerMessage::TimerSync(SessionTimer::started(10_000, 300))]
        );
    }

    #[test]
    fn joiner_without_clock_gets_nothing() {
        let clock = ManualClock::starting_at(0);
        let mut group = group(&clock);
        let (member, mut rx) = participant();
        group.handle(GroupCommand::Join(member));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn explicit_resync_reaches_everyone() {
        let clock = ManualClock::starting_at(0);
        let mut group = group(&clock);
        let (a, mut a_rx) = participant();
        let (b, mut b_rx) = participant();
        group.handle(GroupCommand::Join(a));
        group.handle(GroupCommand::Join(b));

        let reset = SessionTimer::stopped(600);
        group.handle(GroupCommand::SyncTimer(reset));

        assert_eq!(drain(&mut a_rx), vec![ServerMessage::TimerSync(reset)]);
        assert_eq!(drain(&mut b_rx), vec![ServerMessage::TimerSync(reset)]);
    }

    #[test]
    fn closed_members_are_dropped() {
        let clock = ManualClock::starting_at(0);
        let mut group = group(&clock);
        let (gone, gone_rx) = participant();
        let (origin, _origin_rx) = participant();
        group.handle(GroupCommand::Join(gone.clone()));
        drop(gone_rx);

        group.handle(GroupCommand::Publish {
            origin: origin.id,
            state: state(MatchPhase::Setup, 600),
            is_undo: false,
        });
        assert!(!group.members.contains_key(&gone.id));
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> ServerMessage {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("message within a second")
            .expect("channel open")
    }

    #[tokio::test]
    async fn hub_routes_by_normalized_code() {
        let clock = ManualClock::starting_at(0);
        let hub = SessionHub::new(clock, DEFAULT_DRIFT_TOLERANCE_SECS);
        let (origin, _origin_rx) = participant();
        let (peer, mut peer_rx) = participant();
        hub.join(origin.clone(), "abc123");
        hub.join(peer, " ABC123 ");

        let snapshot = LiveMatchState::default();
        hub.publish(origin.id, "Abc123", snapshot.clone(), false);

        assert_eq!(
            recv(&mut peer_rx).await,
            ServerMessage::StateUpdated(Arc::new(snapshot))
        );
        let code = SessionCode::parse(CODE).unwrap();
        assert_eq!(hub.timer(&code).await, Some(SessionTimer::stopped(600)));
    }

    #[tokio::test]
    async fn hub_ignores_malformed_codes() {
        let hub = SessionHub::new(ManualClock::starting_at(0), DEFAULT_DRIFT_TOLERANCE_SECS);
        let (member, _rx) = participant();
        hub.join(member.clone(), "nope");
        hub.publish(member.id, "", LiveMatchState::default(), false);

        assert!(hub.groups.is_empty());
        assert!(hub.memberships.is_empty());
    }

    #[tokio::test]
    async fn leave_removes_from_every_group() {
        let hub = SessionHub::new(ManualClock::starting_at(0), DEFAULT_DRIFT_TOLERANCE_SECS);
        let (member, mut member_rx) = participant();
        let (publisher, _publisher_rx) = participant();
        hub.join(member.clone(), "AAAAAA");
        hub.join(member.clone(), "BBBBBB");
        hub.leave(member.id);

        hub.publish(publisher.id, "AAAAAA", LiveMatchState::default(), false);
        hub.publish(publisher.id, "BBBBBB", LiveMatchState::default(), false);

        // Once the publisher has seen both clocks, the groups processed the leave.
        let code_a = SessionCode::parse("AAAAAA").unwrap();
        let code_b = SessionCode::parse("BBBBBB").unwrap();
        assert!(hub.timer(&code_a).await.is_some());
        assert!(hub.timer(&code_b).await.is_some());
        assert!(member_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_session_has_no_timer() {
        let hub = SessionHub::new(ManualClock::starting_at(0), DEFAULT_DRIFT_TOLERANCE_SECS);
        let code = SessionCode::parse("ZZZZZZ").unwrap();
        assert_eq!(hub.timer(&code).await, None);
        assert!(hub.groups.is_empty());
    }
}
