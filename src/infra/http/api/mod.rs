pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod multipart;
pub mod state;

pub use middleware::AuthUser;
pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::infra::http::RouterState;

/// Routes served under `/api`. Writes and account changes require a bearer token.
pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let protected = Router::new()
        .route("/user", put(handlers::update_user))
        .route("/article", post(handlers::create_article))
        .route(
            "/article/{id}",
            put(handlers::update_article).delete(handlers::delete_article),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.api.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/login", post(handlers::login))
        .route("/article", get(handlers::list_articles))
        .route("/recent-articles", get(handlers::recent_articles))
        .route("/article/{id}", get(handlers::get_article))
        .merge(protected)
}
