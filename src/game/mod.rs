pub mod engine;
pub mod error;
pub mod model;
pub mod roles;
pub mod rules;
pub mod victory;
pub mod view;

pub use engine::GameEngine;
pub use error::{GameError, Result};
pub use model::{
    GameState, Phase, Player, PlayerId, Protection, Role, RoleCounts, Winner, WordPair,
};
pub use rules::{EliminationResult, VoteOutcome};
pub use view::{HistoryEntry, PublicView};
