use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{GameState, Phase, Player, PlayerId, Role, Winner};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_alive: bool,
    pub has_voted: bool,
    pub votes_received: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub total_players: usize,
    pub undercover_count: usize,
    pub mr_white_count: usize,
    pub jester_count: usize,
    pub bodyguard_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub civilian_word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undercover_word: Option<String>,
}

/// What one viewer is allowed to know about a game.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicView {
    pub game_id: String,
    pub phase: Phase,
    pub players: Vec<PlayerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsView>,
    pub winner: Option<Winner>,
    pub host_player_id: Option<PlayerId>,
    pub current_turn_player_id: Option<PlayerId>,
}

fn player_view(player: &Player, reveal: bool) -> PlayerView {
    let (role, word) = if reveal {
        let word = match player.role {
            Some(Role::MrWhite) => None,
            _ => player.word.clone(),
        };
        (player.role, word)
    } else {
        (None, None)
    };
    PlayerView {
        id: player.id,
        name: player.name.clone(),
        is_alive: player.is_alive,
        has_voted: player.has_voted,
        votes_received: player.votes_received,
        role,
        word,
    }
}

/// One finished game in the history listing. Carries no roles or words.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub game_id: String,
    pub player_count: usize,
    pub winner: Option<Winner>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&GameState> for HistoryEntry {
    fn from(state: &GameState) -> Self {
        Self {
            game_id: state.public_id.clone(),
            player_count: state.players.len(),
            winner: state.winner,
            created_at: state.created_at,
            finished_at: state.finished_at,
        }
    }
}

/// Projects `state` for `viewer`. Roles and words are only shown for the viewer's own
/// player, or for everyone once the game is finished.
pub fn filter(state: &GameState, viewer: Option<PlayerId>) -> PublicView {
    let finished = state.phase == Phase::Finished;

    let players = state
        .players
        .iter()
        .map(|player| player_view(player, finished || viewer == Some(player.id)))
        .collect();

    let settings = (state.phase != Phase::Lobby).then(|| {
        let (civilian_word, undercover_word) = match (&state.word_pair, finished) {
            (Some(pair), true) => (
                Some(pair.civilian_word.clone()),
                Some(pair.undercover_word.clone()),
            ),
            _ => (None, None),
        };
        SettingsView {
            total_players: state.players.len(),
            undercover_count: state.role_counts.undercover,
            mr_white_count: state.role_counts.mr_white,
            jester_count: state.role_counts.jester,
            bodyguard_count: state.role_counts.bodyguard,
            civilian_word,
            undercover_word,
        }
    });

    PublicView {
        game_id: state.public_id.clone(),
        phase: state.phase,
        players,
        settings,
        winner: state.winner,
        host_player_id: state.host_player_id,
        current_turn_player_id: state.current_turn_player_id,
    }
}
