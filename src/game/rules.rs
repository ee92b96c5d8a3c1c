use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use super::error::{GameError, Result};
use super::model::{
    GameState, MAX_NAME_CHARS, Phase, Player, PlayerId, Protection, Role, Winner, WordPair,
};
use super::{roles, victory};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EliminationResult {
    pub eliminated_player_id: PlayerId,
    pub game_over: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteOutcome {
    /// Votes on the target after this vote, before any end-of-round reset.
    pub target_votes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<EliminationResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DropOutcome {
    pub removed: bool,
    pub winner: Option<Winner>,
}

fn require_phase(state: &GameState, allowed: &[Phase], expected: &'static str) -> Result<()> {
    if allowed.contains(&state.phase) {
        Ok(())
    } else {
        Err(GameError::WrongPhase {
            expected,
            actual: state.phase,
        })
    }
}

pub fn validate_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(GameError::validation("Player name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(GameError::validation(format!(
            "Player name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(GameError::validation(
            "Player name must only contain printable characters",
        ));
    }
    Ok(name.to_string())
}

pub fn add_player(state: &mut GameState, name: &str) -> Result<Player> {
    require_phase(state, &[Phase::Lobby], "Lobby")?;
    let player = Player::new(validate_name(name)?);
    if state.players.is_empty() {
        state.host_player_id = Some(player.id);
    }
    state.players.push(player.clone());
    Ok(player)
}

fn remove_from_roster(state: &mut GameState, player_id: PlayerId) -> bool {
    let Some(idx) = state.players.iter().position(|p| p.id == player_id) else {
        return false;
    };
    state.players.remove(idx);
    if state.host_player_id == Some(player_id) {
        state.host_player_id = state.players.first().map(|p| p.id);
    }
    true
}

/// Lobby-only removal requested by the host.
pub fn kick_player(state: &mut GameState, player_id: PlayerId) -> Result<bool> {
    require_phase(state, &[Phase::Lobby], "Lobby")?;
    Ok(remove_from_roster(state, player_id))
}

/// Phase-agnostic removal used by disconnect cleanup.
///
/// Mid-match, the current round's votes are discarded (they may involve the departed
/// player) and victory is re-evaluated since the departure alone can end the game.
pub fn drop_player(state: &mut GameState, player_id: PlayerId, now: DateTime<Utc>) -> DropOutcome {
    if !remove_from_roster(state, player_id) {
        return DropOutcome::default();
    }

    let mut outcome = DropOutcome {
        removed: true,
        winner: None,
    };
    if !state.phase.is_in_match() {
        return outcome;
    }

    state.reset_round();
    if state.current_turn_player_id == Some(player_id) {
        state.current_turn_player_id = state.next_alive_after(None);
    }
    if let Some(winner) = victory::evaluate(state, false) {
        state.finish(winner, now);
        outcome.winner = Some(winner);
    }
    outcome
}

pub fn open_voting(state: &mut GameState) -> Result<()> {
    require_phase(state, &[Phase::Playing], "Playing")?;
    state.phase = Phase::Voting;
    Ok(())
}

pub fn advance_turn(state: &mut GameState) -> Result<Option<PlayerId>> {
    require_phase(state, &[Phase::Playing, Phase::Voting], "Playing or Voting")?;
    state.current_turn_player_id = state.next_alive_after(state.current_turn_player_id);
    Ok(state.current_turn_player_id)
}

pub fn protect(state: &mut GameState, bodyguard_id: PlayerId, target_id: PlayerId) -> Result<()> {
    require_phase(state, &[Phase::Playing, Phase::Voting], "Playing or Voting")?;

    let bodyguard = state
        .player(bodyguard_id)
        .ok_or_else(|| GameError::validation("Bodyguard not found"))?;
    if bodyguard.role != Some(Role::Bodyguard) {
        return Err(GameError::validation("Only a bodyguard can protect"));
    }
    if !bodyguard.is_alive {
        return Err(GameError::validation("Bodyguard is eliminated"));
    }
    if bodyguard_id == target_id {
        return Err(GameError::validation("Bodyguard cannot protect themselves"));
    }
    match state.player(target_id) {
        Some(target) if target.is_alive => {}
        Some(_) => return Err(GameError::validation("Target is already eliminated")),
        None => return Err(GameError::validation("Target not found")),
    }
    if state
        .protections
        .iter()
        .any(|p| p.bodyguard_id == bodyguard_id)
    {
        return Err(GameError::validation(
            "Bodyguard has already protected someone this round",
        ));
    }

    state.protections.push(Protection {
        bodyguard_id,
        target_id,
    });
    Ok(())
}

/// Records one vote. Once every alive player has voted the round resolves: the most-voted
/// alive player is eliminated, ties broken uniformly at random.
pub fn cast_vote<R: Rng + ?Sized>(
    state: &mut GameState,
    voter_id: PlayerId,
    target_id: PlayerId,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<VoteOutcome> {
    if !state.phase.is_in_match() {
        return Err(GameError::validation("Game is not accepting votes"));
    }
    match state.player(voter_id) {
        None => return Err(GameError::validation("Voter not found")),
        Some(voter) if !voter.is_alive => {
            return Err(GameError::validation("Eliminated players cannot vote"));
        }
        Some(voter) if voter.has_voted => {
            return Err(GameError::validation("Player has already voted this round"));
        }
        Some(_) => {}
    }
    match state.player(target_id) {
        None => return Err(GameError::validation("Target not found")),
        Some(target) if !target.is_alive => {
            return Err(GameError::validation("Target is already eliminated"));
        }
        Some(_) => {}
    }

    let target_votes = {
        let target = state
            .player_mut(target_id)
            .ok_or_else(|| GameError::validation("Target not found"))?;
        target.votes_received += 1;
        target.votes_received
    };
    if let Some(voter) = state.player_mut(voter_id) {
        voter.has_voted = true;
    }

    let round = if state.alive_players().all(|p| p.has_voted) {
        resolve_round(state, rng, now)
    } else {
        None
    };

    Ok(VoteOutcome {
        target_votes,
        round,
    })
}

fn resolve_round<R: Rng + ?Sized>(
    state: &mut GameState,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Option<EliminationResult> {
    let top = state
        .alive_players()
        .map(|p| p.votes_received)
        .max()
        .unwrap_or(0);
    let tied: Vec<PlayerId> = state
        .alive_players()
        .filter(|p| p.votes_received == top)
        .map(|p| p.id)
        .collect();
    let chosen = *tied.choose(rng)?;

    let eliminated = match state.protector_of(chosen) {
        Some(bodyguard_id) => {
            tracing::debug!(
                game.id = %state.public_id,
                protected = %chosen,
                bodyguard = %bodyguard_id,
                "Bodyguard takes the elimination"
            );
            bodyguard_id
        }
        None => chosen,
    };

    tracing::debug!(
        game.id = %state.public_id,
        eliminated = %eliminated,
        votes = top,
        tied = tied.len(),
        "Voting round resolved"
    );
    Some(apply_elimination(state, eliminated, false, now))
}

/// Marks `target_id` eliminated, starts a fresh round and evaluates victory.
fn apply_elimination(
    state: &mut GameState,
    target_id: PlayerId,
    instant_win: bool,
    now: DateTime<Utc>,
) -> EliminationResult {
    let role = state.player_mut(target_id).and_then(|target| {
        target.is_alive = false;
        target.role
    });

    state.reset_round();
    if state.phase == Phase::Voting {
        state.phase = Phase::Playing;
    }
    if state.current_turn_player_id == Some(target_id) {
        state.current_turn_player_id = state.next_alive_after(Some(target_id));
    }

    let winner = victory::evaluate_elimination(state, role, instant_win);
    if let Some(winner) = winner {
        state.finish(winner, now);
    }

    EliminationResult {
        eliminated_player_id: target_id,
        game_over: winner.is_some(),
        winner,
    }
}

fn guess_matches(guess: &str, word: &str) -> bool {
    guess.trim().to_lowercase() == word.trim().to_lowercase()
}

/// Direct elimination outside the voting flow. Returns `None` when the game or target is
/// not in a state that allows it.
pub fn eliminate(
    state: &mut GameState,
    target_id: PlayerId,
    guess: Option<&str>,
    now: DateTime<Utc>,
) -> Option<EliminationResult> {
    if !state.phase.is_in_match() {
        return None;
    }
    let target = state.player(target_id).filter(|p| p.is_alive)?;

    let instant_win = target.role == Some(Role::MrWhite)
        && match (guess.map(str::trim), state.word_pair.as_ref()) {
            (Some(guess), Some(pair)) if !guess.is_empty() => {
                guess_matches(guess, &pair.civilian_word)
            }
            _ => false,
        };

    Some(apply_elimination(state, target_id, instant_win, now))
}

/// Redeals a match with the roster and role counts it already had, dealing `fresh_pair` when
/// given. Runs on a scratch copy so a failed redeal leaves `state` untouched.
pub fn restart<R: Rng + ?Sized>(
    state: &mut GameState,
    fresh_pair: Option<WordPair>,
    rng: &mut R,
) -> Result<()> {
    let counts = state.role_counts;
    let mut next = state.clone();
    next.reset_to_lobby();
    if fresh_pair.is_some() {
        next.word_pair = fresh_pair;
    }
    roles::assign_roles(&mut next, counts, rng)?;
    *state = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::model::RoleCounts;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pair() -> WordPair {
        WordPair {
            pair_id: "animals_1".to_string(),
            theme_id: "animals".to_string(),
            civilian_word: "Cat".to_string(),
            undercover_word: "Dog".to_string(),
        }
    }

    /// A started game with the given roles in join order.
    fn started(roles: &[Role]) -> (GameState, Vec<PlayerId>) {
        let mut state = GameState::new("RULES1".to_string(), Some(pair()));
        for (i, role) in roles.iter().enumerate() {
            let mut player = Player::new(format!("p{}", i));
            player.role = Some(*role);
            player.word = role.word_from(&pair());
            state.players.push(player);
        }
        state.host_player_id = state.players.first().map(|p| p.id);
        state.phase = Phase::Playing;
        state.role_counts = RoleCounts::new(
            roles.iter().filter(|r| **r == Role::Undercover).count(),
            roles.iter().filter(|r| **r == Role::MrWhite).count(),
        );
        let ids = state.players.iter().map(|p| p.id).collect();
        (state, ids)
    }

    fn vote_sum_within_voters(state: &GameState) -> bool {
        let votes: u32 = state.players.iter().map(|p| p.votes_received).sum();
        let voters = state.alive_players().filter(|p| p.has_voted).count() as u32;
        votes <= voters
    }

    #[test]
    fn test_add_player_sets_host_once() {
        let mut state = GameState::new("JOIN01".to_string(), None);
        let alice = add_player(&mut state, "  Alice ").unwrap();
        let bob = add_player(&mut state, "Bob").unwrap();

        assert_eq!(alice.name, "Alice");
        assert_eq!(state.host_player_id, Some(alice.id));
        assert_ne!(alice.id, bob.id);
    }

    #[test]
    fn test_add_player_rejects_bad_names() {
        let mut state = GameState::new("JOIN02".to_string(), None);
        assert!(matches!(
            add_player(&mut state, "   "),
            Err(GameError::Validation(_))
        ));
        assert!(add_player(&mut state, &"x".repeat(51)).is_err());
        assert!(add_player(&mut state, "tab\there").is_err());
        assert!(add_player(&mut state, &"é".repeat(50)).is_ok());
    }

    #[test]
    fn test_add_player_only_in_lobby() {
        let (mut state, _) = started(&[Role::Civilian, Role::Civilian, Role::Undercover]);
        assert!(matches!(
            add_player(&mut state, "Late"),
            Err(GameError::WrongPhase { .. })
        ));
    }

    #[test]
    fn test_kick_only_in_lobby_and_host_moves_on() {
        let mut state = GameState::new("KICK01".to_string(), None);
        let alice = add_player(&mut state, "Alice").unwrap();
        let bob = add_player(&mut state, "Bob").unwrap();

        assert!(kick_player(&mut state, alice.id).unwrap());
        assert_eq!(state.host_player_id, Some(bob.id));
        assert!(!kick_player(&mut state, alice.id).unwrap());

        let (mut playing, ids) = started(&[Role::Civilian, Role::Civilian, Role::Undercover]);
        assert!(kick_player(&mut playing, ids[0]).is_err());
    }

    #[test]
    fn test_votes_resolve_to_clear_leader() {
        let (mut state, ids) = started(&[
            Role::Undercover,
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::MrWhite,
        ]);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let mut rng = StdRng::seed_from_u64(3);
        let now = Utc::now();

        // A:3, B:1, C:1
        let plan = [(ids[1], a), (ids[2], a), (ids[3], b), (ids[4], c), (ids[0], a)];
        let mut last = None;
        for (voter, target) in plan {
            assert!(vote_sum_within_voters(&state));
            last = Some(cast_vote(&mut state, voter, target, &mut rng, now).unwrap());
        }

        let last = last.unwrap();
        assert_eq!(last.target_votes, 3);
        let round = last.round.expect("round should resolve");
        assert_eq!(round.eliminated_player_id, a);
        assert!(!state.player(a).unwrap().is_alive);
        assert!(state.players.iter().all(|p| !p.has_voted && p.votes_received == 0));
        // Undercover gone, Mr. White alive with 3 civilians
        assert!(!round.game_over);
        assert_eq!(state.phase, Phase::Playing);
    }

    #[test]
    fn test_round_waits_for_every_alive_voter() {
        let (mut state, ids) = started(&[Role::Civilian, Role::Civilian, Role::Undercover]);
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = cast_vote(&mut state, ids[0], ids[2], &mut rng, Utc::now()).unwrap();
        assert_eq!(outcome.target_votes, 1);
        assert!(outcome.round.is_none());
        assert!(state.player(ids[0]).unwrap().has_voted);
    }

    #[test]
    fn test_double_vote_rejected() {
        let (mut state, ids) = started(&[Role::Civilian, Role::Civilian, Role::Undercover]);
        let mut rng = StdRng::seed_from_u64(1);
        cast_vote(&mut state, ids[0], ids[2], &mut rng, Utc::now()).unwrap();

        let err = cast_vote(&mut state, ids[0], ids[1], &mut rng, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("already voted"));
        assert_eq!(state.player(ids[1]).unwrap().votes_received, 0);
    }

    #[test]
    fn test_dead_or_unknown_players_cannot_vote_or_be_voted() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Undercover,
        ]);
        state.players[0].is_alive = false;
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        let stranger = uuid::Uuid::new_v4();

        assert!(cast_vote(&mut state, ids[0], ids[1], &mut rng, now).is_err());
        assert!(cast_vote(&mut state, ids[1], ids[0], &mut rng, now).is_err());
        assert!(cast_vote(&mut state, stranger, ids[1], &mut rng, now).is_err());
        assert!(cast_vote(&mut state, ids[1], stranger, &mut rng, now).is_err());
        assert!(state.players.iter().all(|p| p.votes_received == 0 && !p.has_voted));
    }

    #[test]
    fn test_votes_rejected_outside_match() {
        let mut state = GameState::new("LOBBY1".to_string(), None);
        let a = add_player(&mut state, "a").unwrap();
        let b = add_player(&mut state, "b").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            cast_vote(&mut state, a.id, b.id, &mut rng, Utc::now()),
            Err(GameError::Validation(_))
        ));
    }

    #[test]
    fn test_tie_break_picks_among_tied_only() {
        let mut eliminated = std::collections::HashSet::new();
        for seed in 0..64 {
            let (mut state, ids) = started(&[
                Role::Civilian,
                Role::Civilian,
                Role::Civilian,
                Role::Civilian,
                Role::Undercover,
                Role::Undercover,
            ]);
            let mut rng = StdRng::seed_from_u64(seed);
            let now = Utc::now();
            // ids[0] and ids[4] get 2 each, ids[1] and ids[2] get 1 each
            let plan = [
                (ids[0], ids[4]),
                (ids[1], ids[4]),
                (ids[2], ids[0]),
                (ids[3], ids[0]),
                (ids[4], ids[1]),
                (ids[5], ids[2]),
            ];
            let mut round = None;
            for (voter, target) in plan {
                round = cast_vote(&mut state, voter, target, &mut rng, now)
                    .unwrap()
                    .round;
            }
            let out = round.unwrap().eliminated_player_id;
            assert!(out == ids[0] || out == ids[4]);
            eliminated.insert(out);
        }
        assert_eq!(eliminated.len(), 2, "both tied players should be picked across seeds");
    }

    #[test]
    fn test_voting_phase_returns_to_playing_after_round() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Undercover,
        ]);
        open_voting(&mut state).unwrap();
        assert_eq!(state.phase, Phase::Voting);
        assert!(open_voting(&mut state).is_err());

        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();
        for voter in &ids {
            let target = if *voter == ids[0] { ids[1] } else { ids[0] };
            cast_vote(&mut state, *voter, target, &mut rng, now).unwrap();
        }
        assert!(!state.player(ids[0]).unwrap().is_alive);
        assert_eq!(state.phase, Phase::Playing);
    }

    #[test]
    fn test_mr_white_correct_guess_wins_outright() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Undercover,
            Role::MrWhite,
        ]);

        let result = eliminate(&mut state, ids[4], Some("  cAT "), Utc::now()).unwrap();

        assert!(result.game_over);
        assert_eq!(result.winner, Some(Winner::MrWhite));
        assert_eq!(state.phase, Phase::Finished);
        assert_eq!(state.winner, Some(Winner::MrWhite));
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn test_mr_white_wrong_or_empty_guess() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Undercover,
            Role::MrWhite,
        ]);
        let result = eliminate(&mut state, ids[4], Some("Dog"), Utc::now()).unwrap();
        assert!(!result.game_over);

        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::MrWhite,
        ]);
        let result = eliminate(&mut state, ids[3], Some("   "), Utc::now()).unwrap();
        assert_eq!(result.winner, Some(Winner::Civilians));
    }

    #[test]
    fn test_guess_from_non_mr_white_is_ignored() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Undercover,
            Role::MrWhite,
        ]);
        let result = eliminate(&mut state, ids[0], Some("Cat"), Utc::now()).unwrap();
        assert!(!result.game_over);
    }

    #[test]
    fn test_eliminate_invalid_targets_return_none() {
        let (mut state, ids) = started(&[Role::Civilian, Role::Civilian, Role::Undercover]);
        state.players[0].is_alive = false;
        assert!(eliminate(&mut state, ids[0], None, Utc::now()).is_none());
        assert!(eliminate(&mut state, uuid::Uuid::new_v4(), None, Utc::now()).is_none());

        state.phase = Phase::Finished;
        assert!(eliminate(&mut state, ids[1], None, Utc::now()).is_none());
    }

    #[test]
    fn test_mr_white_last_two_standing() {
        let (mut state, ids) = started(&[Role::Civilian, Role::Civilian, Role::MrWhite]);
        let result = eliminate(&mut state, ids[0], None, Utc::now()).unwrap();
        assert_eq!(result.winner, Some(Winner::MrWhite));
        assert_eq!(state.alive_count(), 2);
    }

    #[test]
    fn test_jester_wins_when_voted_out() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Undercover,
            Role::Jester,
        ]);
        let mut rng = StdRng::seed_from_u64(11);
        let now = Utc::now();
        let mut round = None;
        for voter in &ids {
            let target = if *voter == ids[3] { ids[0] } else { ids[3] };
            round = cast_vote(&mut state, *voter, target, &mut rng, now)
                .unwrap()
                .round;
        }
        assert_eq!(round.unwrap().winner, Some(Winner::Jester));
        assert_eq!(state.winner, Some(Winner::Jester));
    }

    #[test]
    fn test_bodyguard_takes_the_hit() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Bodyguard,
            Role::Undercover,
        ]);
        let bodyguard = ids[3];
        protect(&mut state, bodyguard, ids[0]).unwrap();
        assert!(protect(&mut state, bodyguard, ids[1]).is_err());

        let mut rng = StdRng::seed_from_u64(8);
        let now = Utc::now();
        let mut round = None;
        for voter in &ids {
            let target = if *voter == ids[0] { ids[1] } else { ids[0] };
            round = cast_vote(&mut state, *voter, target, &mut rng, now)
                .unwrap()
                .round;
        }

        assert_eq!(round.unwrap().eliminated_player_id, bodyguard);
        assert!(state.player(ids[0]).unwrap().is_alive);
        assert!(!state.player(bodyguard).unwrap().is_alive);
        assert!(state.protections.is_empty());
    }

    #[test]
    fn test_each_bodyguard_protects_once_per_round() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Bodyguard,
            Role::Bodyguard,
            Role::Undercover,
        ]);
        let (first_guard, second_guard) = (ids[4], ids[5]);

        protect(&mut state, first_guard, ids[0]).unwrap();
        protect(&mut state, second_guard, ids[1]).unwrap();
        assert!(matches!(
            protect(&mut state, second_guard, ids[2]),
            Err(GameError::Validation(_))
        ));
        assert_eq!(state.protections.len(), 2);

        // Everyone piles onto ids[1]; the second bodyguard takes the hit.
        let mut rng = StdRng::seed_from_u64(4);
        let now = Utc::now();
        let mut round = None;
        for voter in &ids {
            let target = if *voter == ids[1] { ids[0] } else { ids[1] };
            round = cast_vote(&mut state, *voter, target, &mut rng, now)
                .unwrap()
                .round;
        }

        assert_eq!(round.unwrap().eliminated_player_id, second_guard);
        assert!(state.player(ids[1]).unwrap().is_alive);
        assert!(state.player(first_guard).unwrap().is_alive);
        assert!(state.protections.is_empty());
        protect(&mut state, first_guard, ids[2]).unwrap();
    }

    #[test]
    fn test_dead_bodyguard_protection_lapses() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Bodyguard,
            Role::Undercover,
        ]);
        protect(&mut state, ids[3], ids[0]).unwrap();
        state.players[3].is_alive = false;
        assert_eq!(state.protector_of(ids[0]), None);
    }

    #[test]
    fn test_protect_validation() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Bodyguard,
            Role::Undercover,
        ]);
        assert!(protect(&mut state, ids[0], ids[1]).is_err());
        assert!(protect(&mut state, ids[2], ids[2]).is_err());
        state.players[1].is_alive = false;
        assert!(protect(&mut state, ids[2], ids[1]).is_err());
        assert!(protect(&mut state, ids[2], ids[0]).is_ok());
    }

    #[test]
    fn test_drop_mid_match_discards_round_and_can_end_game() {
        let (mut state, ids) = started(&[Role::Civilian, Role::Civilian, Role::Undercover]);
        let mut rng = StdRng::seed_from_u64(1);
        cast_vote(&mut state, ids[0], ids[1], &mut rng, Utc::now()).unwrap();

        let outcome = drop_player(&mut state, ids[2], Utc::now());

        assert!(outcome.removed);
        assert_eq!(outcome.winner, Some(Winner::Civilians));
        assert_eq!(state.phase, Phase::Finished);
        assert!(state.players.iter().all(|p| p.votes_received == 0 && !p.has_voted));
    }

    #[test]
    fn test_drop_unknown_player_is_noop() {
        let (mut state, _) = started(&[Role::Civilian, Role::Civilian, Role::Undercover]);
        let before = state.clone();
        let outcome = drop_player(&mut state, uuid::Uuid::new_v4(), Utc::now());
        assert!(!outcome.removed);
        assert_eq!(state, before);
    }

    #[test]
    fn test_drop_in_lobby_passes_host() {
        let mut state = GameState::new("DROP01".to_string(), None);
        let alice = add_player(&mut state, "Alice").unwrap();
        let bob = add_player(&mut state, "Bob").unwrap();
        let outcome = drop_player(&mut state, alice.id, Utc::now());
        assert_eq!(
            outcome,
            DropOutcome {
                removed: true,
                winner: None
            }
        );
        assert_eq!(state.host_player_id, Some(bob.id));
    }

    #[test]
    fn test_advance_turn_skips_eliminated() {
        let (mut state, ids) = started(&[
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Undercover,
        ]);
        state.current_turn_player_id = Some(ids[0]);
        state.players[1].is_alive = false;

        assert_eq!(advance_turn(&mut state).unwrap(), Some(ids[2]));
        assert_eq!(advance_turn(&mut state).unwrap(), Some(ids[3]));
        assert_eq!(advance_turn(&mut state).unwrap(), Some(ids[0]));
    }

    #[test]
    fn test_restart_redeals_same_counts() {
        let mut state = GameState::new("RSTRT1".to_string(), Some(pair()));
        for i in 0..5 {
            add_player(&mut state, &format!("p{}", i)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(8);
        roles::assign_roles(&mut state, RoleCounts::new(1, 1), &mut rng).unwrap();
        let target = state.players[0].id;
        eliminate(&mut state, target, None, Utc::now()).unwrap();

        restart(&mut state, None, &mut rng).unwrap();

        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.role_counts, RoleCounts::new(1, 1));
        assert!(state.winner.is_none() && state.finished_at.is_none());
        assert!(state.players.iter().all(|p| p.is_alive && p.role.is_some()));
        assert_eq!(state.alive_with_role(Role::MrWhite), 1);
        assert_eq!(state.alive_with_role(Role::Undercover), 1);
    }

    #[test]
    fn test_failed_restart_leaves_state_alone() {
        let (mut state, ids) = started(&[Role::Civilian, Role::Civilian, Role::Undercover]);
        state.role_counts = RoleCounts::new(2, 1);
        state.player_mut(ids[0]).unwrap().has_voted = true;
        let before = state.clone();

        let err = restart(&mut state, None, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_restart_deals_the_fresh_pair() {
        let (mut state, ids) = started(&[Role::Civilian, Role::Civilian, Role::Undercover]);
        eliminate(&mut state, ids[2], None, Utc::now()).unwrap();
        assert_eq!(state.phase, Phase::Finished);

        let fresh = WordPair {
            pair_id: "animals_2".to_string(),
            theme_id: "animals".to_string(),
            civilian_word: "Lion".to_string(),
            undercover_word: "Tiger".to_string(),
        };
        restart(&mut state, Some(fresh.clone()), &mut StdRng::seed_from_u64(2)).unwrap();

        assert_eq!(state.word_pair, Some(fresh));
        for player in &state.players {
            let word = player.word.as_deref();
            assert!(word == Some("Lion") || word == Some("Tiger"));
        }
    }
}
