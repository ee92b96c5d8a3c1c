use axum::{
    Router,
    routing::{any, delete, get, post},
};
use http::HeaderValue;
use std::{net::SocketAddr, sync::Arc};
use tokio::time::Duration as TokioDuration;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::compression::CompressionLevel;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::error::{ConfigError, Result as AppResult};
use crate::state::AppState;

pub mod error;
pub mod handlers;
pub mod ws;

pub use self::error::WebError;

const RATE_LIMIT_PER_MS: u64 = 500;
const RATE_LIMIT_BURST: u32 = 30;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/game/create", post(handlers::create_game_handler))
        .route("/api/game/history/all", get(handlers::game_history_handler))
        .route(
            "/api/game/{id}",
            get(handlers::get_game_handler).delete(handlers::delete_game_handler),
        )
        .route("/api/game/{id}/players", post(handlers::add_player_handler))
        .route(
            "/api/game/{id}/players/{player_id}",
            delete(handlers::kick_player_handler),
        )
        .route(
            "/api/game/{id}/assign-roles",
            post(handlers::assign_roles_handler),
        )
        .route("/api/game/{id}/restart", post(handlers::restart_game_handler))
        .route("/api/game/{id}/voting", post(handlers::open_voting_handler))
        .route("/api/game/{id}/turn", post(handlers::advance_turn_handler))
        .route("/api/game/{id}/vote", post(handlers::cast_vote_handler))
        .route("/api/game/{id}/protect", post(handlers::protect_handler))
        .route("/api/game/{id}/eliminate", post(handlers::eliminate_handler))
        .route("/api/words/themes", get(handlers::list_themes_handler))
        .route("/api/words/generate", post(handlers::generate_word_handler))
        .route("/api/words/refresh", post(handlers::refresh_words_handler))
        .route("/ws", any(ws::ws_handler))
        .with_state(app_state)
}

fn cors_layer(server_config: &ServerConfig) -> CorsLayer {
    let cors_origins_result: Result<Vec<HeaderValue>, _> = server_config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse()
                .map_err(|e| format!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect();

    let cors_origins = cors_origins_result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "CORS config error. Defaulting to restrictive");
        vec![]
    });

    if cors_origins.is_empty() {
        tracing::info!("Restrictive CORS policy applied (no origins configured)");
        return CorsLayer::new();
    }

    tracing::info!(
        cors.origins.count = cors_origins.len(),
        "CORS configured with allowed origins"
    );
    CorsLayer::new()
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::DELETE,
        ])
        .allow_origin(cors_origins)
        .allow_credentials(true)
        .allow_headers(vec![
            http::header::CONTENT_TYPE,
            http::header::ACCEPT,
            http::HeaderName::from_static(handlers::PLAYER_ID_HEADER),
        ])
}

#[tracing::instrument(skip(app_state, server_config), fields(
    server.port = server_config.port,
    cors.origins.count = server_config.cors_origins.len()
))]
pub async fn run_server(app_state: AppState, server_config: ServerConfig) -> AppResult<()> {
    let cors = cors_layer(&server_config);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(RATE_LIMIT_PER_MS)
            .burst_size(RATE_LIMIT_BURST)
            .finish()
            .ok_or_else(|| ConfigError::InvalidValue("rate limiter settings".to_string()))?,
    );
    tracing::info!(
        rate_limit.per_ms = RATE_LIMIT_PER_MS,
        rate_limit.burst_size = RATE_LIMIT_BURST,
        "Rate limiter configured"
    );

    let governor_limiter = governor_conf.limiter().clone();

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(TokioDuration::from_secs(60)).await;
            let limiter_size = governor_limiter.len();
            if limiter_size > 1_000_000 {
                tracing::warn!(
                    rate_limiter.storage_size = limiter_size,
                    "Rate limiting storage size is large"
                );
            }
            governor_limiter.retain_recent();
        }
    });

    let app = router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CompressionLayer::new()
                .quality(CompressionLevel::Default)
                .gzip(true),
        )
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!(server.address = %addr, "HTTP server starting");

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(Into::into)
}
