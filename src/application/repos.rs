//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::cover::CoverRef;
use crate::domain::entities::{
    ArticleId, ArticleRecord, ArticleSummary, RecentArticle, TagRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Window over the "all articles" listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListWindow {
    pub limit: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleListing {
    pub articles: Vec<ArticleSummary>,
    pub total_items: u64,
}

#[derive(Debug, Clone)]
pub struct CreateArticleParams {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub content: String,
    pub cover: Option<CoverRef>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateArticleParams {
    pub id: ArticleId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub content: String,
    /// `None` keeps the stored cover.
    pub cover: Option<CoverRef>,
    /// `None` keeps the stored tags; `Some` replaces them.
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct UpdateUserParams {
    pub id: i64,
    pub user_name: String,
    /// `None` keeps the stored hash.
    pub hashed_password: Option<String>,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    /// The hottest of the five most recent articles followed by up to two more
    /// recent ones, in that order.
    async fn recent_listing(&self) -> Result<Vec<RecentArticle>, RepoError>;

    async fn list_articles(
        &self,
        exclude: &[ArticleId],
        window: Option<ListWindow>,
    ) -> Result<ArticleListing, RepoError>;

    async fn find_by_id(&self, id: ArticleId) -> Result<Option<ArticleRecord>, RepoError>;

    async fn increment_views(&self, id: ArticleId) -> Result<(), RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ArticlesWriteRepo: Send + Sync {
    /// Insert the article and its tags atomically.
    async fn create_article(&self, params: CreateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    async fn update_article(&self, params: UpdateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    /// Delete the article together with its tags.
    async fn delete_article(&self, id: ArticleId) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn list_for_article(&self, article_id: ArticleId) -> Result<Vec<TagRecord>, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_user_name(&self, user_name: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(
        &self,
        user_name: &str,
        hashed_password: &str,
    ) -> Result<UserRecord, RepoError>;

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError>;
}
