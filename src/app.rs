use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, SecurityConfig};
use crate::handlers;
use crate::services::ServiceContext;

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub services: ServiceContext,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(services: ServiceContext, config: AppConfig) -> Self {
        Self { services, config: Arc::new(config) }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);

    let router = Router::new()
        // Public
        .route("/", get(handlers::system::root))
        .route("/healthz", get(handlers::system::healthz))
        .route("/echo/:content/:resp_type", get(handlers::system::echo))
        // Resources
        .merge(database_routes())
        .merge(record_routes())
        .merge(file_routes())
        .with_state(state);

    let router = router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));
    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn database_routes() -> Router<AppState> {
    use handlers::{config, databases};

    Router::new()
        .route("/databases", get(databases::list).post(databases::create))
        .route(
            "/databases/:database_id",
            get(databases::get)
                .patch(databases::update)
                .delete(databases::delete),
        )
        .route("/databases/:database_id/config", get(config::get).patch(config::update))
}

fn record_routes() -> Router<AppState> {
    use handlers::records;

    Router::new()
        .route("/databases/:database_id/records", get(records::list).post(records::create))
        .route(
            "/databases/:database_id/records/:record_id",
            get(records::get).patch(records::update).delete(records::delete),
        )
}

fn file_routes() -> Router<AppState> {
    use handlers::files;

    Router::new()
        .route("/databases/:database_id/files", get(files::list).post(files::create))
        .route(
            "/databases/:database_id/files/:uuid",
            get(files::get).patch(files::update).delete(files::delete),
        )
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() {
        return Some(CorsLayer::permissive());
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}
