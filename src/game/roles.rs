use rand::Rng;
use rand::seq::SliceRandom;

use super::error::{GameError, Result};
use super::model::{GameState, Phase, Role, RoleCounts};

pub const MIN_PLAYERS: usize = 3;

/// Deals roles to every player in a lobby and moves the game to `Playing`.
///
/// Player indices are shuffled once; the first `mr_white` shuffled slots become Mr. White,
/// the next `undercover` slots Undercover, then Jesters and Bodyguards, and everyone left
/// over is a Civilian. The game must already carry a word pair.
pub fn assign_roles<R: Rng + ?Sized>(
    state: &mut GameState,
    counts: RoleCounts,
    rng: &mut R,
) -> Result<()> {
    if state.phase != Phase::Lobby {
        return Err(GameError::WrongPhase {
            expected: "Lobby",
            actual: state.phase,
        });
    }

    let total = state.players.len();
    if total < MIN_PLAYERS {
        return Err(GameError::validation(format!(
            "Minimum {} players required",
            MIN_PLAYERS
        )));
    }
    if counts.special_total().is_none_or(|special| special >= total) {
        return Err(GameError::validation(
            "Too many special roles for player count",
        ));
    }

    let pair = state
        .word_pair
        .clone()
        .ok_or_else(|| GameError::WordSource("game has no word pair".to_string()))?;

    let mut order: Vec<usize> = (0..total).collect();
    order.shuffle(rng);

    let plan = role_plan(&counts, total);
    for (role, &idx) in plan.into_iter().zip(order.iter()) {
        let player = &mut state.players[idx];
        player.role = Some(role);
        player.word = role.word_from(&pair);
        player.is_alive = true;
        player.reset_round();
    }

    state.phase = Phase::Playing;
    state.role_counts = counts;
    state.winner = None;
    state.finished_at = None;
    state.protections.clear();
    state.current_turn_player_id = state.next_alive_after(None);

    tracing::debug!(
        game.id = %state.public_id,
        players = total,
        undercover = counts.undercover,
        mr_white = counts.mr_white,
        jester = counts.jester,
        bodyguard = counts.bodyguard,
        "Roles assigned"
    );
    Ok(())
}

fn role_plan(counts: &RoleCounts, total: usize) -> Vec<Role> {
    let mut plan = Vec::with_capacity(total);
    plan.extend(std::iter::repeat_n(Role::MrWhite, counts.mr_white));
    plan.extend(std::iter::repeat_n(Role::Undercover, counts.undercover));
    plan.extend(std::iter::repeat_n(Role::Jester, counts.jester));
    plan.extend(std::iter::repeat_n(Role::Bodyguard, counts.bodyguard));
    plan.resize(total, Role::Civilian);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::model::{Player, WordPair};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn animals_pair() -> WordPair {
        WordPair {
            pair_id: "animals_1".to_string(),
            theme_id: "animals".to_string(),
            civilian_word: "Cat".to_string(),
            undercover_word: "Dog".to_string(),
        }
    }

    fn lobby(players: usize) -> GameState {
        let mut state = GameState::new("ROLES1".to_string(), Some(animals_pair()));
        for i in 0..players {
            state.players.push(Player::new(format!("player{}", i)));
        }
        state
    }

    fn count_role(state: &GameState, role: Role) -> usize {
        state
            .players
            .iter()
            .filter(|p| p.role == Some(role))
            .count()
    }

    #[test]
    fn test_five_players_one_undercover_one_mr_white() {
        let mut state = lobby(5);
        let mut rng = StdRng::seed_from_u64(7);

        assign_roles(&mut state, RoleCounts::new(1, 1), &mut rng).unwrap();

        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(count_role(&state, Role::MrWhite), 1);
        assert_eq!(count_role(&state, Role::Undercover), 1);
        assert_eq!(count_role(&state, Role::Civilian), 3);
        for player in &state.players {
            match player.role {
                Some(Role::MrWhite) => assert!(player.word.is_none()),
                Some(Role::Undercover) => assert_eq!(player.word.as_deref(), Some("Dog")),
                Some(Role::Civilian) => assert_eq!(player.word.as_deref(), Some("Cat")),
                other => panic!("unexpected role {:?}", other),
            }
        }
        assert_eq!(state.role_counts, RoleCounts::new(1, 1));
        assert_eq!(state.current_turn_player_id, Some(state.players[0].id));
    }

    #[test]
    fn test_extension_roles_partition_the_roster() {
        let mut state = lobby(8);
        let mut rng = StdRng::seed_from_u64(99);
        let counts = RoleCounts {
            undercover: 2,
            mr_white: 1,
            jester: 1,
            bodyguard: 1,
        };

        assign_roles(&mut state, counts, &mut rng).unwrap();

        assert_eq!(count_role(&state, Role::Undercover), 2);
        assert_eq!(count_role(&state, Role::MrWhite), 1);
        assert_eq!(count_role(&state, Role::Jester), 1);
        assert_eq!(count_role(&state, Role::Bodyguard), 1);
        assert_eq!(count_role(&state, Role::Civilian), 3);
        assert!(state.players.iter().all(|p| p.role.is_some()));
    }

    #[test]
    fn test_too_many_special_roles_is_rejected() {
        let mut state = lobby(3);
        let mut rng = StdRng::seed_from_u64(1);

        let err = assign_roles(&mut state, RoleCounts::new(1, 1), &mut rng).unwrap_err();

        assert!(matches!(err, GameError::Validation(_)));
        assert_eq!(state.phase, Phase::Lobby);
        assert!(state.players.iter().all(|p| p.role.is_none()));
    }

    #[test]
    fn test_overflowing_counts_are_rejected() {
        let mut state = lobby(4);
        let mut rng = StdRng::seed_from_u64(1);
        let counts = RoleCounts {
            undercover: usize::MAX,
            mr_white: 1,
            ..RoleCounts::default()
        };

        let err = assign_roles(&mut state, counts, &mut rng).unwrap_err();

        assert!(matches!(err, GameError::Validation(_)));
        assert_eq!(state.phase, Phase::Lobby);
    }

    #[test]
    fn test_minimum_players() {
        let mut state = lobby(2);
        let mut rng = StdRng::seed_from_u64(1);

        let err = assign_roles(&mut state, RoleCounts::new(0, 0), &mut rng).unwrap_err();
        assert!(err.to_string().contains("Minimum 3 players"));
    }

    #[test]
    fn test_only_from_lobby() {
        let mut state = lobby(4);
        let mut rng = StdRng::seed_from_u64(1);
        assign_roles(&mut state, RoleCounts::new(1, 0), &mut rng).unwrap();

        let err = assign_roles(&mut state, RoleCounts::new(1, 0), &mut rng).unwrap_err();
        assert!(matches!(err, GameError::WrongPhase { .. }));
    }

    #[test]
    fn test_same_seed_same_deal() {
        let mut first = lobby(6);
        let mut second = first.clone();

        assign_roles(&mut first, RoleCounts::new(2, 1), &mut StdRng::seed_from_u64(42)).unwrap();
        assign_roles(&mut second, RoleCounts::new(2, 1), &mut StdRng::seed_from_u64(42)).unwrap();

        let roles = |s: &GameState| s.players.iter().map(|p| p.role).collect::<Vec<_>>();
        assert_eq!(roles(&first), roles(&second));
    }

    #[test]
    fn test_every_seat_can_draw_mr_white() {
        let mut seen = [false; 4];
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..200 {
            let mut state = lobby(4);
            assign_roles(&mut state, RoleCounts::new(0, 1), &mut rng).unwrap();
            let seat = state
                .players
                .iter()
                .position(|p| p.role == Some(Role::MrWhite))
                .unwrap();
            seen[seat] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
