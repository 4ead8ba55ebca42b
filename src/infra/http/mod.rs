pub mod api;
mod middleware;

pub use api::{ApiState, build_api_router};
pub use middleware::RequestContext;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware as axum_middleware};
use tower_http::cors::CorsLayer;

use crate::application::error::ErrorReport;
use crate::application::repos::{ArticlesRepo, RepoError};

use self::middleware::{log_responses, set_request_context};

/// State for the routes outside `/api`.
#[derive(Clone)]
pub struct HttpState {
    pub db: Arc<dyn ArticlesRepo>,
    pub max_request_bytes: usize,
}

#[derive(Clone)]
pub struct RouterState {
    pub http: HttpState,
    pub api: ApiState,
}

impl FromRef<RouterState> for HttpState {
    fn from_ref(state: &RouterState) -> Self {
        state.http.clone()
    }
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}

pub fn build_router(state: RouterState) -> Router {
    let body_limit = state.http.max_request_bytes;

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .nest("/api", build_api_router(state.clone()))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn welcome() -> Html<&'static str> {
    Html("<h1> Welcome to the blog API </h1>")
}

async fn health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
