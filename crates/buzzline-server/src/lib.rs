pub mod api;
pub mod commands;
pub mod config;
pub mod connections;
pub mod error;
pub mod questions;
pub mod registry;
pub mod state;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use questions::QuestionSource;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router, AppState) {
    let state = AppState::new(config);
    (router(state.clone()), state)
}

/// Same as `build_app`, with an injected question source (tests).
pub fn build_app_with_source(
    config: ServerConfig,
    questions: Arc<dyn QuestionSource>,
) -> (Router, AppState) {
    let state = AppState::with_question_source(config, questions);
    (router(state.clone()), state)
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/session", post(api::create_session))
        .route("/rooms", get(api::list_rooms))
        .route("/session/{code}", get(api::get_session))
        .route("/session/{code}/join", post(api::join_session))
        .route("/session/{code}/leave", post(api::leave_session))
        .route("/session/{code}/destroy", post(api::destroy_session))
        .route("/session/{code}/share", post(api::share_session))
        .route("/share/claim", post(api::claim_share))
        .route("/session/{code}/turn", post(api::set_turn))
        .route("/session/{code}/question/activate", post(api::activate_question))
        .route("/session/{code}/question/open", post(api::open_buzzers))
        .route("/session/{code}/question/mark", post(api::mark_question))
        .route("/session/{code}/question/cancel", post(api::cancel_question))
        .layer(ServiceBuilder::new().layer(TimeoutLayer::new(Duration::from_secs(30))));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/{code}", get(ws::ws_handler))
        .route("/health", get(api::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
