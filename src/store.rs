use crate::game::GameState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to (de)serialize game {game_id}: {source}")]
    Serialization {
        game_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid game id: {0}")]
    InvalidId(String),
}

/// Owns every `GameState` between engine operations.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn get(&self, game_id: &str) -> Result<Option<GameState>, StoreError>;
    async fn put(&self, state: &GameState) -> Result<(), StoreError>;
    /// Returns whether a game was actually removed.
    async fn delete(&self, game_id: &str) -> Result<bool, StoreError>;
    /// Every stored game, in no particular order.
    async fn list(&self) -> Result<Vec<GameState>, StoreError>;
    async fn exists(&self, game_id: &str) -> Result<bool, StoreError> {
        Ok(self.get(game_id).await?.is_some())
    }
}

#[derive(Default)]
pub struct InMemoryGameStore {
    games: RwLock<HashMap<String, GameState>>,
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn get(&self, game_id: &str) -> Result<Option<GameState>, StoreError> {
        Ok(self.games.read().await.get(game_id).cloned())
    }

    async fn put(&self, state: &GameState) -> Result<(), StoreError> {
        self.games
            .write()
            .await
            .insert(state.public_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, game_id: &str) -> Result<bool, StoreError> {
        Ok(self.games.write().await.remove(game_id).is_some())
    }

    async fn list(&self) -> Result<Vec<GameState>, StoreError> {
        Ok(self.games.read().await.values().cloned().collect())
    }

    async fn exists(&self, game_id: &str) -> Result<bool, StoreError> {
        Ok(self.games.read().await.contains_key(game_id))
    }
}

/// One pretty-printed JSON document per game under `data_dir`.
pub struct JsonFileGameStore {
    data_dir: PathBuf,
}

impl JsonFileGameStore {
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| io_error(&data_dir, e))?;
        tracing::info!(store.dir = %data_dir.display(), "JSON file game store ready");
        Ok(Self { data_dir })
    }

    /// `None` for ids that could never have been stored, which keeps lookups inside `data_dir`.
    fn path_for(&self, game_id: &str) -> Option<PathBuf> {
        let valid = !game_id.is_empty()
            && game_id.len() <= 32
            && game_id.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| self.data_dir.join(format!("{}.json", game_id)))
    }

    async fn read_game(&self, path: &Path, game_id: &str) -> Result<Option<GameState>, StoreError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                game_id: game_id.to_string(),
                source,
            })
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl GameStore for JsonFileGameStore {
    async fn get(&self, game_id: &str) -> Result<Option<GameState>, StoreError> {
        match self.path_for(game_id) {
            Some(path) => self.read_game(&path, game_id).await,
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, state), fields(game.id = %state.public_id))]
    async fn put(&self, state: &GameState) -> Result<(), StoreError> {
        let path = self
            .path_for(&state.public_id)
            .ok_or_else(|| StoreError::InvalidId(state.public_id.clone()))?;
        let body =
            serde_json::to_vec_pretty(state).map_err(|source| StoreError::Serialization {
                game_id: state.public_id.clone(),
                source,
            })?;

        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(&path, e));
        }
        Ok(())
    }

    async fn delete(&self, game_id: &str) -> Result<bool, StoreError> {
        let Some(path) = self.path_for(game_id) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn list(&self) -> Result<Vec<GameState>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.data_dir)
            .await
            .map_err(|e| io_error(&self.data_dir, e))?;
        let mut games = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.data_dir, e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(game_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match self.read_game(&path, game_id).await {
                Ok(Some(state)) => games.push(state),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(file.path = %path.display(), error = %err, "Skipping unreadable game file");
                }
            }
        }
        Ok(games)
    }
}
