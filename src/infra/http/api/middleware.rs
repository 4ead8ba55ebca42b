use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::application::auth::AuthError;

use super::error::ApiError;
use super::state::ApiState;

const SOURCE: &str = "infra::http::api::middleware";

/// The user name carried by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_name: String,
}

pub async fn require_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match extract_token(request.headers().get(AUTHORIZATION)) {
        Some(value) => value,
        None => return ApiError::unauthorized("Access denied, token missing").into_response(),
    };

    let claims = match state.users.tokens().verify(&token) {
        Ok(claims) => claims,
        Err(err) => {
            let reason = match err {
                AuthError::Expired => "expired",
                _ => "invalid",
            };
            debug!(target = SOURCE, reason, "rejected access token");
            return ApiError::unauthorized("Token is not valid").into_response();
        }
    };

    request.extensions_mut().insert(AuthUser {
        user_name: claims.name,
    });

    next.run(request).await
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?.trim();
    (!bearer.is_empty()).then(|| bearer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_extracted() {
        let header = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(extract_token(Some(&header)).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn other_schemes_and_blank_tokens_are_ignored() {
        let basic = HeaderValue::from_static("Basic dXNlcjpwYXNz");
        let blank = HeaderValue::from_static("Bearer ");
        assert_eq!(extract_token(Some(&basic)), None);
        assert_eq!(extract_token(Some(&blank)), None);
        assert_eq!(extract_token(None), None);
    }
}
