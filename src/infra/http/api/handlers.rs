use axum::Json;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::articles::{CreateArticleCommand, PageQuery, UpdateArticleCommand};
use crate::application::users::UpdateUserCommand;
use crate::domain::entities::ArticleId;

use super::error::{ApiError, codes};
use super::middleware::AuthUser;
use super::models::*;
use super::multipart::{ArticleForm, read_article_form};
use super::state::ApiState;

/// -------- Users --------
pub async fn login(
    State(state): State<ApiState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .users
        .login(&request.user_name, &request.pass_hash)
        .await?;

    Ok(Json(SessionResponse::from(session)))
}

pub async fn update_user(
    State(state): State<ApiState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateUserCommand {
        user_name: request.user_name,
        password: request.pass_hash,
        new_password: request.new_password,
    };

    let session = state.users.update_user(&user.user_name, command).await?;
    Ok(Json(SessionResponse::from(session)))
}

/// -------- Articles --------
pub async fn create_article(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let ArticleForm { payload, cover } = read_article_form(multipart).await?;
    if cover.is_none() {
        return Err(ApiError::bad_request("No file uploaded", None));
    }

    let command = CreateArticleCommand {
        title: payload.title,
        author: payload.author,
        description: payload.description,
        content: payload.content,
        tags: payload.tags.unwrap_or_default(),
        cover,
    };

    state.articles.create(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            code: StatusCode::CREATED.as_u16(),
            message: "Article created successfully",
        }),
    ))
}

pub async fn list_articles(
    State(state): State<ApiState>,
    Query(query): Query<ArticleListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .articles
        .list(PageQuery {
            page: query.page,
            items_per_page: query.items_per_page,
        })
        .await?;

    Ok(Json(ArticleListResponse::from_page(page, &state.articles)))
}

pub async fn recent_articles(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.articles.recent().await.ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::UNAVAILABLE,
            "Recent articles are not available yet",
            None,
        )
    })?;

    Ok(Json(recent_views(&snapshot, &state.articles)))
}

pub async fn get_article(
    State(state): State<ApiState>,
    Path(id): Path<ArticleId>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.articles.get(id).await?;
    Ok(Json(ArticleResponse::from_detail(detail, &state.articles)))
}

pub async fn update_article(
    State(state): State<ApiState>,
    Path(id): Path<ArticleId>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let ArticleForm { payload, cover } = read_article_form(multipart).await?;

    let command = UpdateArticleCommand {
        title: payload.title,
        author: payload.author,
        description: payload.description,
        content: payload.content,
        tags: payload.tags,
        cover,
    };

    state.articles.update(id, command).await?;

    Ok(Json(MessageResponse {
        code: StatusCode::OK.as_u16(),
        message: "Article updated successfully",
    }))
}

pub async fn delete_article(
    State(state): State<ApiState>,
    Path(id): Path<ArticleId>,
) -> Result<impl IntoResponse, ApiError> {
    state.articles.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
