pub mod assets;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod object_id;
pub mod server;
pub mod service;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::{middleware, routing::get, routing::put, Router};
use tower_http::services::ServeDir;

use service::TodoService;

#[derive(Clone)]
pub struct AppState {
    pub todos: TodoService,
    pub base_path: Arc<String>,
    pub static_dir: Arc<PathBuf>,
    pub request_timeout: Duration,
}

pub fn create_app(state: AppState) -> Router {
    let base_path = state.base_path.clone();
    let static_files = ServeDir::new(state.static_dir.as_path());

    let app_routes = Router::new()
        .route("/", get(handlers::web::index))
        .route(
            "/todo",
            get(handlers::api::list_todos).post(handlers::api::create_todo),
        )
        .route(
            "/todo/{id}",
            put(handlers::api::update_todo).delete(handlers::api::delete_todo),
        )
        .nest_service("/static", static_files)
        .layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(middleware::map_response(error::timeout_envelope))
                .layer(tower_http::timeout::TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    state.request_timeout,
                ))
                .layer(tower_http::compression::CompressionLayer::new()),
        )
        .with_state(state);

    tracing::info!("base_path: {base_path:?}");

    if base_path.is_empty() {
        app_routes
    } else {
        Router::new().nest(&*base_path, app_routes)
    }
}
