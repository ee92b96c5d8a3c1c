use std::sync::Arc;

use crate::content::WordCatalogCache;
use crate::game::GameEngine;
use crate::realtime::BroadcastDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<GameEngine>,
    pub dispatcher: Arc<BroadcastDispatcher>,
    pub words: Arc<WordCatalogCache>,
    pub client_buffer: usize,
}
