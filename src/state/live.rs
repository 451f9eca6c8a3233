use std::{collections::VecDeque, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

/// Maximum number of prior snapshots kept for undo.
pub const HISTORY_LIMIT: usize = 10;

/// Value copy of a registered player as placed on a team or in a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Record-store identifier of the player.
    pub id: Uuid,
    /// Display name, unique within the session (case-insensitive).
    pub name: String,
    /// Whether the player only ever plays in goal.
    #[serde(default)]
    pub is_goalkeeper: bool,
}

/// Lifecycle stage of the live match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Rosters are being assembled; no match has been drawn yet.
    #[default]
    Setup,
    /// The clock is running.
    Playing,
    /// A match is drawn but the clock is stopped.
    Paused,
    /// The goal target was reached; waiting for the organizer to confirm the outcome.
    Finished,
}

impl MatchPhase {
    /// Whether the session clock runs in this phase.
    pub fn is_running(self) -> bool {
        matches!(self, MatchPhase::Playing)
    }
}

/// How a match is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WinCondition {
    /// Whoever leads when the clock runs out.
    #[default]
    Time,
    /// First team to reach `goals_to_win`.
    Goals,
}

/// Per-session match rules chosen in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchSettings {
    /// Team capacity, goalkeeper included.
    pub players_per_team: usize,
    /// Length of a match in minutes.
    pub match_duration_mins: u32,
    /// Rule deciding when a match is over.
    pub win_condition: WinCondition,
    /// Goal target used with [`WinCondition::Goals`].
    pub goals_to_win: u32,
}

impl MatchSettings {
    /// Full match length in seconds.
    pub fn match_duration_secs(&self) -> u32 {
        self.match_duration_mins.saturating_mul(60)
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            players_per_team: 5,
            match_duration_mins: 10,
            win_condition: WinCondition::Time,
            goals_to_win: 2,
        }
    }
}

/// One of the two teams on the pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Team A (the side the previous winner occupies).
    A,
    /// Team B (the challengers).
    B,
}

/// Result of a finished match as confirmed by the organizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Outcome {
    /// Team A won.
    A,
    /// Team B won.
    B,
    /// Nobody won; Team A stays on.
    #[serde(rename = "DRAW")]
    Draw,
}

impl Outcome {
    /// Side that stays on the pitch after rotation.
    pub fn staying_side(self) -> Side {
        match self {
            Outcome::B => Side::B,
            Outcome::A | Outcome::Draw => Side::A,
        }
    }
}

/// Bounded stack of prior snapshots, most recent first.
///
/// Entries are shared handles: pushing never re-encodes a snapshot and cloning
/// the whole history only bumps reference counts.
///
/// Decoding applies the same bounds as [`History::push`]: entries past
/// [`HISTORY_LIMIT`] are dropped and nested histories are cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct History {
    entries: VecDeque<Arc<LiveMatchState>>,
}

impl History {
    /// Record `snapshot` as the most recent entry, dropping the oldest past [`HISTORY_LIMIT`].
    ///
    /// The snapshot's own history is discarded so entries never nest.
    pub fn push(&mut self, mut snapshot: LiveMatchState) {
        snapshot.history = History::default();
        self.entries.push_front(Arc::new(snapshot));
        self.entries.truncate(HISTORY_LIMIT);
    }

    /// Remove and return the most recent entry.
    pub fn pop(&mut self) -> Option<Arc<LiveMatchState>> {
        self.entries.pop_front()
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there is nothing to undo.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate from most recent to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &LiveMatchState> {
        self.entries.iter().map(|entry| entry.as_ref())
    }
}

impl<'de> Deserialize<'de> for History {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<LiveMatchState>::deserialize(deserializer)?
            .into_iter()
            .take(HISTORY_LIMIT)
            .map(|mut entry| {
                entry.history = History::default();
                Arc::new(entry)
            })
            .collect();
        Ok(Self { entries })
    }
}

/// Full live state of a session's match, mirrored by every connected client.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMatchState {
    /// Players currently on Team A.
    pub team_a: Vec<PlayerSnapshot>,
    /// Players currently on Team B.
    pub team_b: Vec<PlayerSnapshot>,
    /// Outfield players waiting to come on, first in first out.
    pub queue: Vec<PlayerSnapshot>,
    /// Goalkeepers waiting to come on, first in first out.
    #[serde(default)]
    pub goalie_queue: Vec<PlayerSnapshot>,
    /// Goals scored by Team A.
    pub score_a: u32,
    /// Goals scored by Team B.
    pub score_b: u32,
    /// Current match phase.
    pub phase: MatchPhase,
    /// Remaining seconds as last displayed by the publishing client.
    pub timer: u32,
    /// Match rules.
    pub settings: MatchSettings,
    /// Prior snapshots for undo.
    #[serde(default)]
    pub history: History,
    /// Optional display name for Team A.
    #[serde(default)]
    pub team_a_name: Option<String>,
    /// Optional display name for Team B.
    #[serde(default)]
    pub team_b_name: Option<String>,
    /// Optional color for Team A.
    #[serde(default)]
    pub team_a_color: Option<String>,
    /// Optional color for Team B.
    #[serde(default)]
    pub team_b_color: Option<String>,
}

impl LiveMatchState {
    /// Empty `setup` state using `settings`, with the clock at full match length.
    pub fn new(settings: MatchSettings) -> Self {
        Self {
            team_a: Vec::new(),
            team_b: Vec::new(),
            queue: Vec::new(),
            goalie_queue: Vec::new(),
            score_a: 0,
            score_b: 0,
            phase: MatchPhase::Setup,
            timer: settings.match_duration_secs(),
            settings,
            history: History::default(),
            team_a_name: None,
            team_b_name: None,
            team_a_color: None,
            team_b_color: None,
        }
    }

    /// Roster of `side`.
    pub fn team(&self, side: Side) -> &[PlayerSnapshot] {
        match side {
            Side::A => &self.team_a,
            Side::B => &self.team_b,
        }
    }

    /// Score of `side`.
    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::A => self.score_a,
            Side::B => self.score_b,
        }
    }

    /// Add `delta` to the score of `side`, clamping at zero.
    pub fn adjust_score(&mut self, side: Side, delta: i32) {
        let score = match side {
            Side::A => &mut self.score_a,
            Side::B => &mut self.score_b,
        };
        *score = score.saturating_add_signed(delta);
    }

    /// Every player id placed on a team or in a queue.
    pub fn player_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.team_a
            .iter()
            .chain(&self.team_b)
            .chain(&self.queue)
            .chain(&self.goalie_queue)
            .map(|player| player.id)
    }

    /// Whether `id` is placed anywhere in the live state.
    pub fn contains_player(&self, id: Uuid) -> bool {
        self.player_ids().any(|candidate| candidate == id)
    }

    /// Remove `id` from every roster and queue, returning whether anything changed.
    pub fn remove_player(&mut self, id: Uuid) -> bool {
        let before = self.player_ids().count();
        for roster in [
            &mut self.team_a,
            &mut self.team_b,
            &mut self.queue,
            &mut self.goalie_queue,
        ] {
            roster.retain(|player| player.id != id);
        }
        before != self.player_ids().count()
    }
}

impl Default for LiveMatchState {
    fn default() -> Self {
        Self::new(MatchSettings::default())
    }
}
