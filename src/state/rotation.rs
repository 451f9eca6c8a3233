//! Winner-stays rotation and the initial team draw.

use std::collections::VecDeque;

use rand::{Rng, seq::SliceRandom};

use crate::state::live::{LiveMatchState, MatchPhase, Outcome, PlayerSnapshot, Side};

/// Rosters produced by [`draw_teams`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineup {
    /// First team on the pitch.
    pub team_a: Vec<PlayerSnapshot>,
    /// Second team on the pitch.
    pub team_b: Vec<PlayerSnapshot>,
    /// Outfield players left waiting.
    pub queue: Vec<PlayerSnapshot>,
    /// Goalkeepers left waiting.
    pub goalie_queue: Vec<PlayerSnapshot>,
}

/// Compute the state for the next match once `outcome` is confirmed.
///
/// The staying team becomes Team A untouched. The losing goalkeeper swaps with
/// the head of the goalkeeper queue when there is one, otherwise keeps the
/// gloves. Open outfield slots are filled from the queue first, then from the
/// losing outfielders in their original order; whoever is left joins the back
/// of the queue. A losing team without a goalkeeper never pulls one from the
/// goalkeeper queue. Short rosters are valid results.
pub fn rotate(state: &LiveMatchState, outcome: Outcome) -> LiveMatchState {
    let capacity = state.settings.players_per_team;
    let (staying, losing) = match outcome.staying_side() {
        Side::A => (&state.team_a, &state.team_b),
        Side::B => (&state.team_b, &state.team_a),
    };

    let losing_keeper_index = losing.iter().position(|player| player.is_goalkeeper);
    let mut losing_outfield: VecDeque<PlayerSnapshot> = losing
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != losing_keeper_index)
        .map(|(_, player)| player.clone())
        .collect();

    let mut goalie_queue: VecDeque<PlayerSnapshot> = state.goalie_queue.iter().cloned().collect();
    let mut team_b = Vec::with_capacity(capacity);

    if let Some(keeper) = losing_keeper_index.map(|index| losing[index].clone()) {
        if capacity == 0 {
            goalie_queue.push_back(keeper);
        } else if let Some(incoming) = goalie_queue.pop_front() {
            team_b.push(incoming);
            goalie_queue.push_back(keeper);
        } else {
            team_b.push(keeper);
        }
    }

    let mut queue: VecDeque<PlayerSnapshot> = state.queue.iter().cloned().collect();
    while team_b.len() < capacity {
        match queue.pop_front().or_else(|| losing_outfield.pop_front()) {
            Some(player) => team_b.push(player),
            None => break,
        }
    }
    queue.extend(losing_outfield);

    LiveMatchState {
        team_a: staying.clone(),
        team_b,
        queue: queue.into(),
        goalie_queue: goalie_queue.into(),
        score_a: 0,
        score_b: 0,
        phase: MatchPhase::Paused,
        timer: state.settings.match_duration_secs(),
        ..state.clone()
    }
}

/// Randomly split registered players into two teams and the waiting queues.
///
/// Each team gets at most one goalkeeper; surplus goalkeepers wait in the
/// goalkeeper queue. Outfield slots are filled Team A first.
pub fn draw_teams<R: Rng + ?Sized>(
    players: &[PlayerSnapshot],
    players_per_team: usize,
    rng: &mut R,
) -> Lineup {
    let (mut keepers, mut outfield): (Vec<_>, Vec<_>) = players
        .iter()
        .cloned()
        .partition(|player| player.is_goalkeeper);
    keepers.shuffle(rng);
    outfield.shuffle(rng);

    let mut keepers = VecDeque::from(keepers);
    let mut outfield = VecDeque::from(outfield);
    let mut lineup = Lineup::default();

    for team in [&mut lineup.team_a, &mut lineup.team_b] {
        if players_per_team > 0 {
            if let Some(keeper) = keepers.pop_front() {
                team.push(keeper);
            }
        }
    }
    for team in [&mut lineup.team_a, &mut lineup.team_b] {
        while team.len() < players_per_team {
            match outfield.pop_front() {
                Some(player) => team.push(player),
                None => break,
            }
        }
    }

    lineup.queue = outfield.into();
    lineup.goalie_queue = keepers.into();
    lineup
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};
    use uuid::Uuid;

    use super::*;
    use crate::state::live::MatchSettings;

    fn outfielder(name: &str) -> PlayerSnapshot {
        PlayerSnapshot {
            id: Uuid::new_v4(),
            name: name.into(),
            is_goalkeeper: false,
        }
    }

    fn keeper(name: &str) -> PlayerSnapshot {
        PlayerSnapshot {
            is_goalkeeper: true,
            ..outfielder(name)
        }
    }

    fn squad(prefix: &str, count: usize) -> Vec<PlayerSnapshot> {
        (0..count)
            .map(|index| outfielder(&format!("{prefix}{index}")))
            .collect()
    }

    fn state_with(
        team_a: Vec<PlayerSnapshot>,
        team_b: Vec<PlayerSnapshot>,
        queue: Vec<PlayerSnapshot>,
        goalie_queue: Vec<PlayerSnapshot>,
    ) -> LiveMatchState {
        LiveMatchState {
            team_a,
            team_b,
            queue,
            goalie_queue,
            score_a: 3,
            score_b: 1,
            phase: MatchPhase::Playing,
            timer: 42,
            ..LiveMatchState::default()
        }
    }

    fn id_counts(state: &LiveMatchState) -> HashMap<Uuid, usize> {
        let mut counts = HashMap::new();
        for id in state.player_ids() {
            *counts.entry(id).or_default() += 1;
        }
        counts
    }

    #[test]
    fn queue_first_then_losers_in_order() {
        let winners = squad("a", 5);
        let losers = squad("b", 5);
        let queue = vec![outfielder("p7"), outfielder("p8"), outfielder("p9")];
        let state = state_with(winners.clone(), losers.clone(), queue.clone(), vec![]);

        let next = rotate(&state, Outcome::A);

        assert_eq!(next.team_a, winners);
        let mut expected_b = queue.clone();
        expected_b.extend_from_slice(&losers[..2]);
        assert_eq!(next.team_b, expected_b);
        assert_eq!(next.queue, losers[2..].to_vec());
        assert!(next.goalie_queue.is_empty());
    }

    #[test]
    fn winner_b_moves_to_team_a() {
        let team_a = squad("a", 5);
        let team_b = squad("b", 5);
        let queue = squad("q", 6);
        let state = state_with(team_a.clone(), team_b.clone(), queue.clone(), vec![]);

        let next = rotate(&state, Outcome::B);

        assert_eq!(next.team_a, team_b);
        assert_eq!(next.team_b, queue[..5].to_vec());
        let mut expected_queue = vec![queue[5].clone()];
        expected_queue.extend(team_a);
        assert_eq!(next.queue, expected_queue);
    }

    #[test]
    fn draw_keeps_team_a() {
        let team_a = squad("a", 5);
        let state = state_with(team_a.clone(), squad("b", 5), squad("q", 5), vec![]);
        assert_eq!(rotate(&state, Outcome::Draw).team_a, team_a);
    }

    #[test]
    fn losing_keeper_swaps_with_goalie_queue() {
        let mut losers = vec![keeper("gk-b")];
        losers.extend(squad("b", 4));
        let waiting_keeper = keeper("gk-q");
        let state = state_with(
            squad("a", 5),
            losers.clone(),
            squad("q", 2),
            vec![waiting_keeper.clone()],
        );

        let next = rotate(&state, Outcome::A);

        assert_eq!(next.team_b[0], waiting_keeper);
        assert_eq!(next.team_b.len(), 5);
        assert_eq!(next.goalie_queue, vec![losers[0].clone()]);
        assert_eq!(next.team_b[1..3], state.queue[..]);
        assert_eq!(next.team_b[3..5], losers[1..3]);
        assert_eq!(next.queue, losers[3..].to_vec());
    }

    #[test]
    fn losing_keeper_stays_without_replacement() {
        let mut losers = squad("b", 2);
        losers.insert(1, keeper("gk-b"));
        let state = state_with(squad("a", 5), losers.clone(), squad("q", 4), vec![]);

        let next = rotate(&state, Outcome::A);

        assert_eq!(next.team_b[0], losers[1]);
        assert_eq!(next.team_b[1..], state.queue[..]);
        assert!(next.goalie_queue.is_empty());
        assert_eq!(next.queue, vec![losers[0].clone(), losers[2].clone()]);
    }

    #[test]
    fn no_losing_keeper_leaves_goalie_queue_alone() {
        let waiting_keeper = keeper("gk-q");
        let state = state_with(
            squad("a", 5),
            squad("b", 5),
            squad("q", 1),
            vec![waiting_keeper.clone()],
        );

        let next = rotate(&state, Outcome::A);

        assert!(next.team_b.iter().all(|player| !player.is_goalkeeper));
        assert_eq!(next.goalie_queue, vec![waiting_keeper]);
    }

    #[test]
    fn under_supply_yields_short_roster() {
        let state = LiveMatchState {
            settings: MatchSettings {
                players_per_team: 6,
                ..MatchSettings::default()
            },
            ..state_with(squad("a", 6), squad("b", 3), squad("q", 1), vec![])
        };

        let next = rotate(&state, Outcome::A);

        assert_eq!(next.team_b.len(), 4);
        assert!(next.queue.is_empty());
    }

    #[test]
    fn rotation_resets_match_fields() {
        let state = state_with(squad("a", 5), squad("b", 5), vec![], vec![]);
        let next = rotate(&state, Outcome::A);

        assert_eq!((next.score_a, next.score_b), (0, 0));
        assert_eq!(next.phase, MatchPhase::Paused);
        assert_eq!(next.timer, 600);
        assert_eq!(next.settings, state.settings);
    }

    #[test]
    fn draw_twelve_outfielders_into_five_a_side() {
        let players = squad("p", 12);
        let mut rng = StdRng::seed_from_u64(12);

        let lineup = draw_teams(&players, 5, &mut rng);

        assert_eq!(lineup.team_a.len() + lineup.team_b.len(), 10);
        assert_eq!(lineup.queue.len(), 2);
        assert!(lineup.goalie_queue.is_empty());
    }

    #[test]
    fn draw_spreads_goalkeepers() {
        let mut players = squad("p", 8);
        players.extend([keeper("g1"), keeper("g2"), keeper("g3")]);
        let mut rng = StdRng::seed_from_u64(3);

        let lineup = draw_teams(&players, 5, &mut rng);

        for team in [&lineup.team_a, &lineup.team_b] {
            assert_eq!(team.len(), 5);
            assert_eq!(team.iter().filter(|p| p.is_goalkeeper).count(), 1);
        }
        assert_eq!(lineup.goalie_queue.len(), 1);
        assert!(lineup.queue.is_empty());
    }

    fn arb_state() -> impl Strategy<Value = LiveMatchState> {
        (1usize..8, 0usize..10, 0usize..10, 0usize..12, 0usize..4, any::<bool>(), any::<bool>())
            .prop_map(|(per_team, a, b, queued, keepers, keeper_a, keeper_b)| {
                let per_team_a = a.min(per_team);
                let per_team_b = b.min(per_team);
                let mut team_a = squad("a", per_team_a);
                let mut team_b = squad("b", per_team_b);
                if keeper_a && !team_a.is_empty() {
                    team_a[0].is_goalkeeper = true;
                }
                if keeper_b && !team_b.is_empty() {
                    let last = team_b.len() - 1;
                    team_b[last].is_goalkeeper = true;
                }
                LiveMatchState {
                    settings: MatchSettings {
                        players_per_team: per_team,
                        ..MatchSettings::default()
                    },
                    ..state_with(
                        team_a,
                        team_b,
                        squad("q", queued),
                        (0..keepers).map(|i| keeper(&format!("g{i}"))).collect(),
                    )
                }
            })
    }

    proptest! {
        #[test]
        fn rotation_conserves_players(state in arb_state(), outcome in prop_oneof![Just(Outcome::A), Just(Outcome::B), Just(Outcome::Draw)]) {
            let next = rotate(&state, outcome);
            prop_assert_eq!(id_counts(&state), id_counts(&next));
        }

        #[test]
        fn rotation_respects_capacity(state in arb_state(), outcome in prop_oneof![Just(Outcome::A), Just(Outcome::B), Just(Outcome::Draw)]) {
            let capacity = state.settings.players_per_team;
            let losing = match outcome.staying_side() {
                Side::A => &state.team_b,
                Side::B => &state.team_a,
            };
            let keeper_slots = usize::from(losing.iter().any(|p| p.is_goalkeeper));
            let losing_outfield = losing.len() - keeper_slots;

            let next = rotate(&state, outcome);

            prop_assert!(next.team_a.len() <= capacity);
            prop_assert!(next.team_b.len() <= capacity);
            if state.queue.len() + losing_outfield >= capacity - keeper_slots {
                prop_assert_eq!(next.team_b.len(), capacity);
            }
        }
    }
}
