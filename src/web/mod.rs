use axum::{
    Router,
    middleware as axum_middleware,
    response::Redirect,
    routing::get,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tera::Tera;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::config::ServerConfig;
use crate::services::identity_service::IdentityProvider;
use crate::sheets::fetcher::MetadataFetcher;
use crate::web::routes::{auth_routes, dashboard_routes, sheet_routes};

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::AppError;

pub struct AppState {
    pub db: DatabaseConnection,
    pub identity: Arc<dyn IdentityProvider>,
    pub fetcher: Arc<MetadataFetcher>,
    pub templates: Tera,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    let dashboard = dashboard_routes::create_router().merge(sheet_routes::create_router());

    let protected = Router::new()
        .nest("/dashboard", dashboard)
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth,
        ));

    Router::new()
        .route("/", get(|| async { Redirect::to("/dashboard") }))
        .route("/health", get(health_check_handler))
        .nest("/auth", auth_routes::create_router())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
