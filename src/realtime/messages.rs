use serde::{Deserialize, Serialize};

use crate::game::{PlayerId, PublicView};

/// Frames a realtime client may send. The first frame on a connection must be `JoinRoom`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "messageType", content = "payload")]
pub enum ClientMessage {
    JoinRoom {
        game_id: String,
        player_id: PlayerId,
    },
    CastVote {
        target_player_id: PlayerId,
    },
    Protect {
        target_player_id: PlayerId,
    },
    RequestState,
    LeaveRoom,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "messageType", content = "payload")]
pub enum ServerMessage {
    /// The receiving player's own view of the game.
    StateUpdate(PublicView),
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_ws_text(&self) -> Result<axum::extract::ws::Message, serde_json::Error> {
        serde_json::to_string(self)
            .map(|json_string| axum::extract::ws::Message::Text(json_string.into()))
    }
}

pub fn client_message_from_ws_text(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}
