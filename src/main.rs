use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod content;
mod error;
mod game;
mod realtime;
mod state;
mod store;
mod web;

use crate::config::{StorageBackend, load_settings};
use crate::content::WordCatalogCache;
use crate::error::Result as AppResult;
use crate::game::GameEngine;
use crate::realtime::{BroadcastDispatcher, ConnectionRegistry};
use crate::state::AppState;
use crate::store::{GameStore, InMemoryGameStore, JsonFileGameStore};
use crate::web::run_server;

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=debug,tower_http=debug", env!("CARGO_PKG_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_settings = load_settings()?;
    tracing::info!(settings = ?app_settings, "Configuration loaded");

    let words = Arc::new(WordCatalogCache::new(app_settings.words.clone()).await?);

    let store: Arc<dyn GameStore> = match app_settings.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory game store");
            Arc::new(InMemoryGameStore::new())
        }
        StorageBackend::JsonFile => {
            Arc::new(JsonFileGameStore::new(&app_settings.storage.data_dir).await?)
        }
    };

    let engine = Arc::new(GameEngine::new(
        store,
        words.clone(),
        app_settings.games.public_id_length,
    ));
    let dispatcher = Arc::new(BroadcastDispatcher::new(
        Arc::clone(&engine),
        Arc::new(ConnectionRegistry::new()),
        app_settings.games.disconnect_policy,
    ));

    let app_state = AppState {
        engine,
        dispatcher,
        words,
        client_buffer: app_settings.games.client_buffer,
    };

    run_server(app_state, app_settings.server).await?;

    Ok(())
}
