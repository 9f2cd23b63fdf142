use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::QuizError;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/v1/quiz", quiz_routes())
        .nest("/api/v1", history_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn quiz_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/solo", post(handlers::quiz::create_solo))
        .route("/rooms", post(handlers::quiz::create_room))
        .route("/rooms/join", post(handlers::quiz::join_room))
        .route("/sessions/{id}", get(handlers::quiz::get_session))
        .route("/sessions/{id}/start", post(handlers::quiz::start_session))
        .route("/sessions/{id}/answers", post(handlers::quiz::submit_answer))
        .route("/sessions/{id}/exit", post(handlers::quiz::exit_session))
        .route("/sessions/{id}/stream", get(handlers::sse::session_stream))
}

fn history_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/history",
            get(handlers::history::get_history).delete(handlers::history::clear_history),
        )
        .route("/history/stats", get(handlers::history::get_stats))
        .route(
            "/audit",
            get(handlers::history::get_audit_logs).delete(handlers::history::clear_audit_logs),
        )
        .route(
            "/preferences",
            get(handlers::history::get_preferences).put(handlers::history::update_preferences),
        )
}
