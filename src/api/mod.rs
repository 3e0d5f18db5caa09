use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::clients::VoiceProvider;
use crate::config::Config;
use crate::history::GenerationHistory;
use crate::services::{AuthService, GenerationService, UserDirectoryService};
use crate::state::SharedState;

mod admin;
pub mod auth;
mod error;
mod generate;
mod history;
mod observability;
pub mod session;
mod types;
mod validation;
mod voices;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn directory_service(&self) -> &Arc<dyn UserDirectoryService> {
        &self.shared.directory_service
    }

    #[must_use]
    pub fn generation_service(&self) -> &Arc<GenerationService> {
        &self.shared.generation_service
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn VoiceProvider> {
        &self.shared.provider
    }

    #[must_use]
    pub fn history(&self) -> &Arc<GenerationHistory> {
        &self.shared.history
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let server = &state.config().server;
    let cors_origins = server.cors_allowed_origins.clone();
    let upload_limit = server.max_upload_mb.saturating_mul(1024 * 1024);

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_idle_minutes,
        )));

    let protected_routes = create_protected_router(state.clone(), upload_limit);

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::current_session))
        .layer(session_layer)
        .with_state(state.clone());

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>, upload_limit: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/voices", get(voices::list_voices))
        .route("/models", get(voices::list_models))
        .route("/generate/speech", post(generate::generate_speech))
        .route(
            "/generate/conversion",
            post(generate::generate_conversion).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/history", get(history::list_history))
        .route("/history/{id}/audio", get(history::download_audio))
        .route("/admin/open", post(admin::open_directory))
        .route("/admin/close", post(admin::return_to_main))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users", post(admin::create_user))
        .route("/admin/users/{username}", delete(admin::delete_user))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
