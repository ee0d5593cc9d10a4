use crate::config::Config;
use admission::RateLimiter;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use registry::catalog::Catalog;
use registry::instance::ServiceInstance;
use registry::resolution::{ResolveError, Resolver};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Route id under which instance lookups are admission-controlled.
const INSTANCES_ROUTE_ID: &str = "instances";
/// Header carrying the caller identity used as the admission bucket key.
const CLIENT_KEY_HEADER: &str = "x-client-id";

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("service '{0}' not found")]
    NotFound(String),

    #[error("connection limit exceeded for service '{0}'")]
    LimitExceeded(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::LimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Resolve(ResolveError::RegistryUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ApiErrorResponse {
            error_message: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    resolver: Arc<Resolver>,
    limiter: Arc<RateLimiter>,
}

pub async fn serve(config: Config) -> Result<(), ApiError> {
    let limiter = Arc::new(RateLimiter::default());
    if let Some(settings) = &config.rate_limiter {
        limiter.set_parameters(settings.capacity, settings.tokens, settings.refill_duration);
    }

    let state = AppState {
        resolver: Arc::new(Resolver::new(config.registry)),
        limiter,
    };
    let app = router(state);

    let addr = format!("{}:{}", config.listener.host, config.listener.port);
    tracing::info!(%addr, "starting lookup api");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/instances/{service_id}", get(instance_handler))
        .route("/catalog", get(catalog_handler))
        .route("/health", get(|| async { "ok\n" }))
        .route("/ready", get(ready_handler))
        .with_state(state)
}

async fn instance_handler(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ServiceInstance>, ApiError> {
    // Callers without an identity bypass admission, as anonymous probes are
    // keyed nowhere.
    if let Some(client_key) = client_key(&headers) {
        let decision = state.limiter.is_allowed(INSTANCES_ROUTE_ID, client_key);
        if !decision.allowed {
            tracing::warn!(service_id, "connection limit exceeded");
            return Err(ApiError::LimitExceeded(service_id));
        }
    }

    match state.resolver.resolve(&service_id).await? {
        Some(instance) => Ok(Json(instance)),
        None => Err(ApiError::NotFound(service_id)),
    }
}

#[derive(Deserialize)]
struct CatalogParams {
    #[serde(default)]
    delta: bool,
}

async fn catalog_handler(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> Result<Json<Catalog>, ApiError> {
    Ok(Json(state.resolver.resolve_catalog(params.delta).await?))
}

async fn ready_handler(State(state): State<AppState>) -> Response {
    match state.resolver.resolve_catalog(false).await {
        Ok(_) => (StatusCode::OK, "ok\n").into_response(),
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

fn client_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CLIENT_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|key| !key.is_empty())
}
