use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::error::{GameError, Result};
use super::model::{GameState, Phase, Player, PlayerId, RoleCounts, WordPair};
use super::rules::{self, DropOutcome, EliminationResult, VoteOutcome};
use super::roles;
use super::view::{self, HistoryEntry, PublicView};
use crate::content::WordSource;
use crate::error::ContentError;
use crate::store::GameStore;

const PUBLIC_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_ID_ATTEMPTS: usize = 16;

/// One async mutex per game id. Entries nobody holds are pruned on the next acquire.
#[derive(Default)]
struct GameLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl GameLocks {
    async fn acquire(&self, game_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.retain(|id, lock| id == game_id || Arc::strong_count(lock) > 1);
            locks
                .entry(game_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    fn forget(&self, game_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        if locks
            .get(game_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(game_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// A game's state read under its lock. Mutations on the same game wait until it is dropped.
pub struct LockedGame {
    _guard: OwnedMutexGuard<()>,
    pub state: GameState,
}

/// Entry point for every game operation. Each call on a game id runs load, mutate and
/// persist under that game's lock; calls on different games never wait on each other.
pub struct GameEngine {
    store: Arc<dyn GameStore>,
    words: Arc<dyn WordSource>,
    locks: GameLocks,
    rng: Mutex<StdRng>,
    public_id_length: usize,
}

impl GameEngine {
    pub fn new(
        store: Arc<dyn GameStore>,
        words: Arc<dyn WordSource>,
        public_id_length: usize,
    ) -> Self {
        Self::with_rng(store, words, public_id_length, StdRng::from_entropy())
    }

    pub fn with_seed(
        store: Arc<dyn GameStore>,
        words: Arc<dyn WordSource>,
        public_id_length: usize,
        seed: u64,
    ) -> Self {
        Self::with_rng(store, words, public_id_length, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        store: Arc<dyn GameStore>,
        words: Arc<dyn WordSource>,
        public_id_length: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            words,
            locks: GameLocks::default(),
            rng: Mutex::new(rng),
            public_id_length,
        }
    }

    fn with_rng_mut<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut rng)
    }

    fn new_public_id(&self) -> String {
        self.with_rng_mut(|rng| {
            (0..self.public_id_length)
                .map(|_| PUBLIC_ID_ALPHABET[rng.gen_range(0..PUBLIC_ID_ALPHABET.len())] as char)
                .collect()
        })
    }

    async fn load(&self, game_id: &str) -> Result<GameState> {
        self.store
            .get(game_id)
            .await?
            .ok_or_else(|| GameError::game_not_found(game_id))
    }

    /// Runs `f` against the stored game under its lock and persists the result only when
    /// `f` succeeds.
    async fn mutate<T>(
        &self,
        game_id: &str,
        f: impl FnOnce(&mut GameState, &mut StdRng) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.locks.acquire(game_id).await;
        let mut state = self.load(game_id).await?;
        let out = self.with_rng_mut(|rng| f(&mut state, rng))?;
        self.store.put(&state).await?;
        Ok(out)
    }

    /// Draws a pair from `theme`, or from every theme when none is given.
    pub async fn draw_pair(&self, theme: Option<&str>) -> Result<WordPair> {
        let catalog = self.words.catalog().await;
        Ok(self.with_rng_mut(|rng| catalog.pick_pair(theme, rng))?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_game(&self, theme: Option<&str>) -> Result<String> {
        let pair = self.draw_pair(theme).await?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let public_id = self.new_public_id();
            let _guard = self.locks.acquire(&public_id).await;
            if self.store.exists(&public_id).await? {
                tracing::debug!(game.id = %public_id, "Public id collision, retrying");
                continue;
            }
            let state = GameState::new(public_id.clone(), Some(pair.clone()));
            self.store.put(&state).await?;
            tracing::info!(game.id = %public_id, theme.id = %pair.theme_id, "Game created");
            return Ok(public_id);
        }
        Err(GameError::validation("Could not allocate a game id"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_player(&self, game_id: &str, name: &str) -> Result<Player> {
        let player = self
            .mutate(game_id, |state, _| rules::add_player(state, name))
            .await?;
        tracing::info!(game.id = %game_id, player.id = %player.id, "Player joined");
        Ok(player)
    }

    /// Host-initiated removal; only allowed in the lobby.
    #[tracing::instrument(skip(self))]
    pub async fn kick_player(&self, game_id: &str, player_id: PlayerId) -> Result<bool> {
        self.mutate(game_id, |state, _| rules::kick_player(state, player_id))
            .await
    }

    /// Phase-agnostic removal, gated by `allow` on the phase observed under the lock.
    #[tracing::instrument(skip(self, allow))]
    pub async fn drop_player_if(
        &self,
        game_id: &str,
        player_id: PlayerId,
        allow: impl FnOnce(Phase) -> bool,
    ) -> Result<DropOutcome> {
        let outcome = self
            .mutate(game_id, |state, _| {
                if !allow(state.phase) {
                    return Ok(DropOutcome::default());
                }
                Ok(rules::drop_player(state, player_id, Utc::now()))
            })
            .await?;
        if outcome.removed {
            tracing::info!(game.id = %game_id, player.id = %player_id, winner = ?outcome.winner, "Player dropped");
        }
        Ok(outcome)
    }

    #[tracing::instrument(skip(self))]
    pub async fn assign_roles(&self, game_id: &str, counts: RoleCounts) -> Result<()> {
        let needs_pair = self.load(game_id).await?.word_pair.is_none();
        let fallback = if needs_pair {
            Some(self.draw_pair(None).await?)
        } else {
            None
        };

        self.mutate(game_id, |state, rng| {
            if state.word_pair.is_none() {
                state.word_pair = fallback;
            }
            roles::assign_roles(state, counts, rng)
        })
        .await
    }

    /// Returns `false` when the game does not exist. The redeal uses a pair from the same
    /// theme other than the one just played.
    #[tracing::instrument(skip(self))]
    pub async fn restart_game(&self, game_id: &str) -> Result<bool> {
        let previous = match self.load(game_id).await {
            Ok(state) => state.word_pair,
            Err(GameError::NotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        let catalog = self.words.catalog().await;
        let used = previous.as_ref().map(|pair| pair.pair_id.as_str());
        let theme = previous.as_ref().map(|pair| pair.theme_id.as_str());
        let fresh = self.with_rng_mut(|rng| {
            match catalog.pick_pair_except(theme, used, rng) {
                Err(ContentError::UnknownTheme(missing)) => {
                    tracing::warn!(game.id = %game_id, theme.id = %missing, "Theme gone, drawing from all themes");
                    catalog.pick_pair_except(None, used, rng)
                }
                other => other,
            }
        })?;

        match self
            .mutate(game_id, |state, rng| rules::restart(state, Some(fresh), rng))
            .await
        {
            Ok(()) => Ok(true),
            Err(GameError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// A vote against a game that does not exist is reported as a validation failure.
    #[tracing::instrument(skip(self))]
    pub async fn cast_vote(
        &self,
        game_id: &str,
        voter_id: PlayerId,
        target_id: PlayerId,
    ) -> Result<VoteOutcome> {
        let outcome = self
            .mutate(game_id, |state, rng| {
                rules::cast_vote(state, voter_id, target_id, rng, Utc::now())
            })
            .await
            .map_err(|err| match err {
                GameError::NotFound(msg) => GameError::Validation(msg),
                other => other,
            })?;
        if let Some(round) = &outcome.round {
            tracing::info!(
                game.id = %game_id,
                eliminated = %round.eliminated_player_id,
                winner = ?round.winner,
                "Voting round complete"
            );
        }
        Ok(outcome)
    }

    /// `Ok(None)` when the game, phase or target does not allow an elimination.
    #[tracing::instrument(skip(self, guess))]
    pub async fn eliminate_player(
        &self,
        game_id: &str,
        target_id: PlayerId,
        guess: Option<&str>,
    ) -> Result<Option<EliminationResult>> {
        let _guard = self.locks.acquire(game_id).await;
        let Some(mut state) = self.store.get(game_id).await? else {
            return Ok(None);
        };
        let Some(result) = rules::eliminate(&mut state, target_id, guess, Utc::now()) else {
            return Ok(None);
        };
        self.store.put(&state).await?;
        tracing::info!(game.id = %game_id, eliminated = %target_id, winner = ?result.winner, "Player eliminated");
        Ok(Some(result))
    }

    #[tracing::instrument(skip(self))]
    pub async fn protect_player(
        &self,
        game_id: &str,
        bodyguard_id: PlayerId,
        target_id: PlayerId,
    ) -> Result<()> {
        self.mutate(game_id, |state, _| {
            rules::protect(state, bodyguard_id, target_id)
        })
        .await
    }

    pub async fn open_voting(&self, game_id: &str) -> Result<()> {
        self.mutate(game_id, |state, _| rules::open_voting(state))
            .await
    }

    pub async fn advance_turn(&self, game_id: &str) -> Result<Option<PlayerId>> {
        self.mutate(game_id, |state, _| rules::advance_turn(state))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_game(&self, game_id: &str) -> Result<bool> {
        let removed = {
            let _guard = self.locks.acquire(game_id).await;
            self.store.delete(game_id).await?
        };
        self.locks.forget(game_id);
        if removed {
            tracing::info!(game.id = %game_id, "Game deleted");
        }
        Ok(removed)
    }

    pub async fn get_state(&self, game_id: &str) -> Result<GameState> {
        self.load(game_id).await
    }

    /// Loads `game_id` and keeps its lock held for as long as the returned value lives.
    pub async fn lock_state(&self, game_id: &str) -> Result<LockedGame> {
        let guard = self.locks.acquire(game_id).await;
        let state = self.load(game_id).await?;
        Ok(LockedGame {
            _guard: guard,
            state,
        })
    }

    /// Finished games, most recently finished first.
    #[tracing::instrument(skip(self))]
    pub async fn finished_games(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut finished: Vec<GameState> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|state| state.phase == Phase::Finished)
            .collect();
        finished.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(finished.iter().take(limit).map(HistoryEntry::from).collect())
    }

    pub async fn view(&self, game_id: &str, viewer: Option<PlayerId>) -> Result<PublicView> {
        let state = self.get_state(game_id).await?;
        Ok(view::filter(&state, viewer))
    }
}
