pub mod dispatcher;
pub mod messages;
pub mod registry;

pub use dispatcher::BroadcastDispatcher;
pub use messages::{ClientMessage, ServerMessage, client_message_from_ws_text};
pub use registry::{ConnectionId, ConnectionRegistry};
