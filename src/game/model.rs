use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PlayerId = Uuid;

pub const MAX_NAME_CHARS: usize = 50;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Majority side, holds the civilian word.
    Civilian,
    /// Minority side, holds the undercover word.
    Undercover,
    /// Holds no word at all.
    MrWhite,
    /// Holds the civilian word, wins by getting eliminated.
    Jester,
    /// Civilian-side protector.
    Bodyguard,
}

impl Role {
    pub fn word_from(self, pair: &WordPair) -> Option<String> {
        match self {
            Role::MrWhite => None,
            Role::Undercover => Some(pair.undercover_word.clone()),
            Role::Civilian | Role::Jester | Role::Bodyguard => Some(pair.civilian_word.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Lobby,
    Playing,
    Voting,
    Finished,
}

impl Phase {
    pub fn is_in_match(self) -> bool {
        matches!(self, Phase::Playing | Phase::Voting)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Winner {
    Civilians,
    Undercover,
    MrWhite,
    Jester,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WordPair {
    pub pair_id: String,
    pub theme_id: String,
    pub civilian_word: String,
    pub undercover_word: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    pub is_alive: bool,
    pub has_voted: bool,
    pub votes_received: u32,
}

impl Player {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            role: None,
            word: None,
            is_alive: true,
            has_voted: false,
            votes_received: 0,
        }
    }

    pub fn reset_round(&mut self) {
        self.has_voted = false;
        self.votes_received = 0;
    }

    fn reset_for_new_match(&mut self) {
        self.reset_round();
        self.is_alive = true;
        self.role = None;
        self.word = None;
    }
}

/// How many of each special role a match was dealt. Everyone else is a civilian.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleCounts {
    pub undercover: usize,
    pub mr_white: usize,
    #[serde(default)]
    pub jester: usize,
    #[serde(default)]
    pub bodyguard: usize,
}

impl RoleCounts {
    pub fn new(undercover: usize, mr_white: usize) -> Self {
        Self {
            undercover,
            mr_white,
            ..Self::default()
        }
    }

    /// `None` when the counts do not fit in a `usize`.
    pub fn special_total(&self) -> Option<usize> {
        [self.mr_white, self.jester, self.bodyguard]
            .into_iter()
            .try_fold(self.undercover, usize::checked_add)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protection {
    pub bodyguard_id: PlayerId,
    pub target_id: PlayerId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GameState {
    pub public_id: String,
    pub phase: Phase,
    pub players: Vec<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_pair: Option<WordPair>,
    #[serde(default)]
    pub role_counts: RoleCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_player_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn_player_id: Option<PlayerId>,
    /// At most one entry per bodyguard for the current round.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protections: Vec<Protection>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl GameState {
    pub fn new(public_id: String, word_pair: Option<WordPair>) -> Self {
        Self {
            public_id,
            phase: Phase::Lobby,
            players: Vec::new(),
            word_pair,
            role_counts: RoleCounts::default(),
            winner: None,
            host_player_id: None,
            current_turn_player_id: None,
            protections: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive)
    }

    pub fn alive_count(&self) -> usize {
        self.alive_players().count()
    }

    pub fn alive_with_role(&self, role: Role) -> usize {
        self.alive_players()
            .filter(|p| p.role == Some(role))
            .count()
    }

    /// Clears per-round vote bookkeeping and any pending protection.
    pub fn reset_round(&mut self) {
        for player in &mut self.players {
            player.reset_round();
        }
        self.protections.clear();
    }

    /// The alive bodyguard covering `target_id` this round, if any.
    pub fn protector_of(&self, target_id: PlayerId) -> Option<PlayerId> {
        self.protections
            .iter()
            .filter(|p| p.target_id == target_id)
            .map(|p| p.bodyguard_id)
            .find(|id| self.player(*id).is_some_and(|b| b.is_alive))
    }

    /// Puts the roster back to a pre-deal lobby, keeping players and the word pair.
    pub fn reset_to_lobby(&mut self) {
        for player in &mut self.players {
            player.reset_for_new_match();
        }
        self.phase = Phase::Lobby;
        self.winner = None;
        self.finished_at = None;
        self.current_turn_player_id = None;
        self.protections.clear();
    }

    pub fn finish(&mut self, winner: Winner, at: DateTime<Utc>) {
        self.phase = Phase::Finished;
        self.winner = Some(winner);
        self.finished_at = Some(at);
        self.current_turn_player_id = None;
        self.protections.clear();
    }

    /// The next alive player after `after` in join order, wrapping around.
    pub fn next_alive_after(&self, after: Option<PlayerId>) -> Option<PlayerId> {
        let start = after
            .and_then(|id| self.players.iter().position(|p| p.id == id))
            .map(|idx| idx + 1)
            .unwrap_or(0);
        let len = self.players.len();
        (0..len)
            .map(|offset| &self.players[(start + offset) % len])
            .find(|p| p.is_alive)
            .map(|p| p.id)
    }
}
