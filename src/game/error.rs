use thiserror::Error;

use crate::error::ContentError;
use crate::game::model::Phase;
use crate::store::StoreError;

/// Per-request failures. None of these leave a partially applied mutation behind.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("{0}")]
    NotFound(String),
    #[error("Operation not allowed in {actual:?} phase (expected {expected})")]
    WrongPhase {
        expected: &'static str,
        actual: Phase,
    },
    #[error("{0}")]
    Validation(String),
    #[error("Unknown theme: {0}")]
    UnknownTheme(String),
    #[error("Word source unavailable: {0}")]
    WordSource(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl GameError {
    pub fn game_not_found(game_id: &str) -> Self {
        GameError::NotFound(format!("Game {} not found", game_id))
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        GameError::Validation(reason.into())
    }
}

impl From<ContentError> for GameError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::UnknownTheme(theme) => GameError::UnknownTheme(theme),
            other => GameError::WordSource(other.to_string()),
        }
    }
}

pub type Result<T, E = GameError> = std::result::Result<T, E>;
