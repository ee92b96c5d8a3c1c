use std::collections::{HashMap, HashSet};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use super::messages::ServerMessage;
use crate::game::PlayerId;

pub type ConnectionId = Uuid;

#[derive(Debug, Clone)]
pub struct Connection {
    pub game_id: String,
    pub player_id: PlayerId,
    pub sender: mpsc::Sender<ServerMessage>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Connection>,
    by_game: HashMap<String, HashSet<ConnectionId>>,
}

impl Inner {
    fn detach(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&connection_id)?;
        if let Some(ids) = self.by_game.get_mut(&connection.game_id) {
            ids.remove(&connection_id);
            if ids.is_empty() {
                self.by_game.remove(&connection.game_id);
            }
        }
        Some(connection)
    }
}

/// Which live connection belongs to which `(game, player)`. Owned by the server and shared
/// with whoever needs to push to clients.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a connection with `(game_id, player_id)`. Re-registering the same mapping
    /// is a no-op and returns `false`; registering under a different game or player moves it.
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        game_id: &str,
        player_id: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.connections.get(&connection_id)
            && existing.game_id == game_id
            && existing.player_id == player_id
        {
            return false;
        }
        inner.detach(connection_id);
        inner.connections.insert(
            connection_id,
            Connection {
                game_id: game_id.to_string(),
                player_id,
                sender,
            },
        );
        inner
            .by_game
            .entry(game_id.to_string())
            .or_default()
            .insert(connection_id);
        tracing::debug!(connection.id = %connection_id, game.id = %game_id, player.id = %player_id, "Connection registered");
        true
    }

    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<Connection> {
        let removed = self.inner.write().await.detach(connection_id);
        if let Some(connection) = &removed {
            tracing::debug!(connection.id = %connection_id, game.id = %connection.game_id, "Connection unregistered");
        }
        removed
    }

    pub async fn lookup(&self, connection_id: ConnectionId) -> Option<Connection> {
        self.inner.read().await.connections.get(&connection_id).cloned()
    }

    /// Every connection currently attached to `game_id`.
    pub async fn recipients(&self, game_id: &str) -> Vec<(ConnectionId, Connection)> {
        let inner = self.inner.read().await;
        inner
            .by_game
            .get(game_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.connections.get(id).map(|c| (*id, c.clone())))
            .collect()
    }

    pub async fn player_connection_count(&self, game_id: &str, player_id: PlayerId) -> usize {
        let inner = self.inner.read().await;
        inner
            .by_game
            .get(game_id)
            .into_iter()
            .flatten()
            .filter(|id| {
                inner
                    .connections
                    .get(id)
                    .is_some_and(|c| c.player_id == player_id)
            })
            .count()
    }

    /// Detaches every connection `player_id` holds on `game_id` and returns them.
    pub async fn remove_player(&self, game_id: &str, player_id: PlayerId) -> Vec<Connection> {
        let mut inner = self.inner.write().await;
        let ids: Vec<ConnectionId> = inner
            .by_game
            .get(game_id)
            .into_iter()
            .flatten()
            .filter(|id| {
                inner
                    .connections
                    .get(id)
                    .is_some_and(|c| c.player_id == player_id)
            })
            .copied()
            .collect();
        ids.into_iter()
            .filter_map(|id| inner.detach(id))
            .collect()
    }

    /// Detaches every connection of `game_id` and returns them.
    pub async fn remove_game(&self, game_id: &str) -> Vec<Connection> {
        let mut inner = self.inner.write().await;
        let ids = inner.by_game.remove(game_id).unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| inner.connections.remove(&id))
            .collect()
    }
}
