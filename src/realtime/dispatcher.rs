use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::messages::ServerMessage;
use super::registry::{Connection, ConnectionId, ConnectionRegistry};
use crate::config::DisconnectPolicy;
use crate::game::{GameEngine, GameError, PlayerId, view};

/// Pushes each connected player their own filtered view after a state change. Delivery is
/// fire-and-forget; a slow or gone client never fails the caller.
pub struct BroadcastDispatcher {
    engine: Arc<GameEngine>,
    registry: Arc<ConnectionRegistry>,
    policy: DisconnectPolicy,
}

fn deliver(connection_id: ConnectionId, connection: &Connection, message: ServerMessage) -> bool {
    match connection.sender.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(
                connection.id = %connection_id,
                game.id = %connection.game_id,
                player.id = %connection.player_id,
                "Outbound queue full, dropping message"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::warn!(
                connection.id = %connection_id,
                game.id = %connection.game_id,
                player.id = %connection.player_id,
                "Connection closed, dropping message"
            );
            false
        }
    }
}

impl BroadcastDispatcher {
    pub fn new(
        engine: Arc<GameEngine>,
        registry: Arc<ConnectionRegistry>,
        policy: DisconnectPolicy,
    ) -> Self {
        Self {
            engine,
            registry,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Sends every connection of `game_id` its viewer-specific state. Returns how many
    /// messages were queued.
    ///
    /// The snapshot and the fan-out both happen under the game's lock, so updates reach
    /// clients in the order the mutations were applied. `try_send` never waits on a client.
    #[tracing::instrument(skip(self))]
    pub async fn broadcast(&self, game_id: &str) -> usize {
        let locked = match self.engine.lock_state(game_id).await {
            Ok(locked) => locked,
            Err(err) => {
                tracing::warn!(game.id = %game_id, error = %err, "Skipping broadcast, game unavailable");
                return 0;
            }
        };
        let recipients = self.registry.recipients(game_id).await;

        let delivered = recipients
            .iter()
            .map(|(connection_id, connection)| {
                let update = view::filter(&locked.state, Some(connection.player_id));
                deliver(*connection_id, connection, ServerMessage::StateUpdate(update))
            })
            .filter(|queued| *queued)
            .count();
        tracing::debug!(
            game.id = %game_id,
            recipients = recipients.len(),
            delivered,
            "Broadcast state"
        );
        delivered
    }

    /// Attaches a connection for a player seated in `game_id` and queues their first state.
    /// Runs under the game's lock, so it is ordered against kicks and drops.
    #[tracing::instrument(skip(self, sender))]
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        game_id: &str,
        player_id: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(), GameError> {
        let locked = self.engine.lock_state(game_id).await?;
        if locked.state.player(player_id).is_none() {
            return Err(GameError::validation(format!(
                "Player {} is not part of game {}",
                player_id, game_id
            )));
        }
        let connection = Connection {
            game_id: game_id.to_string(),
            player_id,
            sender,
        };
        let update = view::filter(&locked.state, Some(player_id));
        deliver(connection_id, &connection, ServerMessage::StateUpdate(update));
        self.registry
            .register(connection_id, game_id, player_id, connection.sender)
            .await;
        Ok(())
    }

    /// Sends the current state to one connection only.
    pub async fn send_state_to(&self, connection_id: ConnectionId) -> bool {
        let Some(connection) = self.registry.lookup(connection_id).await else {
            return false;
        };
        let message = match self.engine.lock_state(&connection.game_id).await {
            Ok(locked) => {
                ServerMessage::StateUpdate(view::filter(&locked.state, Some(connection.player_id)))
            }
            Err(err) => ServerMessage::error(err.to_string()),
        };
        deliver(connection_id, &connection, message)
    }

    /// Detaches the connections of a player who left the roster. Dropping their senders ends
    /// the sockets once the farewell is flushed.
    pub async fn player_removed(&self, game_id: &str, player_id: PlayerId) -> usize {
        let connections = self.registry.remove_player(game_id, player_id).await;
        for connection in &connections {
            let _ = connection.sender.try_send(ServerMessage::error(format!(
                "You were removed from game {}",
                game_id
            )));
        }
        if !connections.is_empty() {
            tracing::info!(game.id = %game_id, player.id = %player_id, connections = connections.len(), "Detached removed player");
        }
        connections.len()
    }

    pub async fn send_error_to(&self, connection_id: ConnectionId, message: impl Into<String>) {
        if let Some(connection) = self.registry.lookup(connection_id).await {
            deliver(connection_id, &connection, ServerMessage::error(message));
        }
    }

    /// Tells every client of a deleted game and forgets their connections.
    pub async fn game_deleted(&self, game_id: &str) {
        for connection in self.registry.remove_game(game_id).await {
            let _ = connection
                .sender
                .try_send(ServerMessage::error(format!("Game {} was deleted", game_id)));
        }
    }

    /// Cleans up after a closed connection. The player is dropped only when this was their
    /// last connection to the game and the disconnect policy allows it in the current phase.
    #[tracing::instrument(skip(self))]
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) {
        let Some(connection) = self.registry.unregister(connection_id).await else {
            return;
        };
        let remaining = self
            .registry
            .player_connection_count(&connection.game_id, connection.player_id)
            .await;
        if remaining > 0 {
            tracing::debug!(
                game.id = %connection.game_id,
                player.id = %connection.player_id,
                remaining,
                "Player still connected elsewhere"
            );
            return;
        }

        let policy = self.policy;
        match self
            .engine
            .drop_player_if(&connection.game_id, connection.player_id, move |phase| {
                policy.allows_drop(phase)
            })
            .await
        {
            Ok(outcome) if outcome.removed => {
                self.player_removed(&connection.game_id, connection.player_id)
                    .await;
                self.broadcast(&connection.game_id).await;
            }
            Ok(_) => {}
            Err(GameError::NotFound(_)) => {}
            Err(err) => {
                tracing::warn!(
                    game.id = %connection.game_id,
                    player.id = %connection.player_id,
                    error = %err,
                    "Failed to drop disconnected player"
                );
            }
        }
    }
}
