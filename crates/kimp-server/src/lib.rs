pub mod api;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod health;
pub mod rate_limit;
pub mod room_manager;
pub mod state;
pub mod ws;

use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::X_CONTENT_TYPE_OPTIONS;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use config::ServerConfig;
use state::AppState;

const API_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);
    (router(state.clone()), state)
}

/// Router over an existing state.
pub fn router(state: AppState) -> Router<()> {
    let web_root = state.config.web_root.clone();
    let index = ServeFile::new(Path::new(&web_root).join("index.html"));

    let api_routes = Router::new()
        .route("/create-room", post(api::create_room))
        .route("/room/{room_id}", get(api::room_info))
        .layer(TimeoutLayer::new(API_TIMEOUT));

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .route_service("/", index.clone())
        .route_service("/play/{room_id}", index)
        .fallback_service(ServeDir::new(&web_root))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::if_not_present(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                )),
        )
        .with_state(state)
}

/// Start the tick loop and the idle-room sweeper.
pub fn spawn_background_tasks(state: &AppState) {
    game_loop::spawn_tick_loop(state.clone());
    game_loop::spawn_room_sweeper(state.clone());
}
