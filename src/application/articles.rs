use std::sync::Arc;

use futures::future::try_join_all;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::media::{MediaError, MediaStore};
use crate::application::repos::{
    ArticlesRepo, ArticlesWriteRepo, CreateArticleParams, ListWindow, RepoError, TagsRepo,
    UpdateArticleParams,
};
use crate::cache::{RecentArticlesCache, RecentSnapshot};
use crate::domain::cover::{CoverRef, PendingCover};
use crate::domain::entities::{ArticleId, ArticleRecord, ArticleSummary, TagRecord};

const SOURCE: &str = "application::articles";

#[derive(Debug, Error)]
pub enum ArticleError {
    #[error("`{0}` must not be empty")]
    ConstraintViolation(&'static str),
    #[error("no cover image was uploaded")]
    MissingCover,
    #[error("article not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

#[derive(Debug, Clone)]
pub struct CreateArticleCommand {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub cover: Option<PendingCover>,
}

#[derive(Debug, Clone)]
pub struct UpdateArticleCommand {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub content: String,
    /// `None` leaves the current tags in place.
    pub tags: Option<Vec<String>>,
    /// `None` keeps the current cover.
    pub cover: Option<PendingCover>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub items_per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListedArticle {
    pub article: ArticleSummary,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticlePage {
    pub articles: Vec<ListedArticle>,
    pub total_items: u64,
    pub current_page: u32,
    pub items_per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleWithTags {
    pub article: ArticleRecord,
    pub tags: Vec<TagRecord>,
}

#[derive(Clone)]
pub struct ArticleService {
    reader: Arc<dyn ArticlesRepo>,
    writer: Arc<dyn ArticlesWriteRepo>,
    tags: Arc<dyn TagsRepo>,
    media: Arc<dyn MediaStore>,
    recent: Arc<RecentArticlesCache>,
}

impl ArticleService {
    pub fn new(
        reader: Arc<dyn ArticlesRepo>,
        writer: Arc<dyn ArticlesWriteRepo>,
        tags: Arc<dyn TagsRepo>,
        media: Arc<dyn MediaStore>,
        recent: Arc<RecentArticlesCache>,
    ) -> Self {
        Self {
            reader,
            writer,
            tags,
            media,
            recent,
        }
    }

    pub async fn create(
        &self,
        command: CreateArticleCommand,
    ) -> Result<ArticleRecord, ArticleError> {
        let CreateArticleCommand {
            title,
            author,
            description,
            content,
            tags,
            cover,
        } = command;

        let title = required(title, "title")?;
        let author = required(author, "author")?;
        let content = required(content, "content")?;
        let cover = cover
            .filter(|pending| !pending.is_empty())
            .ok_or(ArticleError::MissingCover)?;

        let cover = self.media.upload(cover, None).await?;
        let params = CreateArticleParams {
            title,
            author,
            description: optional(description),
            content,
            cover: Some(cover),
            tags: normalize_tags(tags),
        };

        let article = self.writer.create_article(params).await?;
        info!(target = SOURCE, article_id = article.id, "article created");
        self.recent.spawn_refresh();
        Ok(article)
    }

    /// Every article outside the recent snapshot, newest id first.
    pub async fn list(&self, query: PageQuery) -> Result<ArticlePage, ArticleError> {
        let current_page = query.page.unwrap_or(1);
        if current_page == 0 {
            return Err(ArticleError::ConstraintViolation("page"));
        }
        let items_per_page = query.items_per_page.filter(|items| *items > 0);
        let window = items_per_page.map(|limit| ListWindow {
            limit,
            offset: u64::from(current_page - 1) * u64::from(limit),
        });

        let exclude = self
            .recent
            .recent_articles()
            .await
            .map(|snapshot| snapshot.article_ids())
            .unwrap_or_default();

        let listing = self.reader.list_articles(&exclude, window).await?;
        let tag_lists = try_join_all(
            listing
                .articles
                .iter()
                .map(|article| self.tags.list_for_article(article.id)),
        )
        .await?;

        let articles = listing
            .articles
            .into_iter()
            .zip(tag_lists)
            .map(|(article, tags)| ListedArticle { article, tags })
            .collect();

        Ok(ArticlePage {
            articles,
            total_items: listing.total_items,
            current_page,
            items_per_page,
        })
    }

    pub async fn recent(&self) -> Option<Arc<RecentSnapshot>> {
        self.recent.recent_articles().await
    }

    /// Load one article and count the visit.
    pub async fn get(&self, id: ArticleId) -> Result<ArticleWithTags, ArticleError> {
        let article = self
            .reader
            .find_by_id(id)
            .await?
            .ok_or(ArticleError::NotFound)?;

        self.reader.increment_views(id).await?;
        let tags = self.tags.list_for_article(id).await?;

        Ok(ArticleWithTags { article, tags })
    }

    pub async fn update(
        &self,
        id: ArticleId,
        command: UpdateArticleCommand,
    ) -> Result<ArticleRecord, ArticleError> {
        let UpdateArticleCommand {
            title,
            author,
            description,
            content,
            tags,
            cover,
        } = command;

        let existing = self
            .reader
            .find_by_id(id)
            .await?
            .ok_or(ArticleError::NotFound)?;

        let title = required(title, "title")?;
        let author = required(author, "author")?;
        let content = required(content, "content")?;

        let cover = match cover.filter(|pending| !pending.is_empty()) {
            Some(pending) => Some(self.media.upload(pending, existing.cover.as_ref()).await?),
            None => None,
        };

        let params = UpdateArticleParams {
            id,
            title,
            author,
            description: optional(description),
            content,
            cover,
            tags: tags.map(normalize_tags),
        };

        let article = self.writer.update_article(params).await?;
        info!(target = SOURCE, article_id = id, "article updated");
        self.recent.spawn_refresh();
        Ok(article)
    }

    pub async fn delete(&self, id: ArticleId) -> Result<(), ArticleError> {
        let existing = self
            .reader
            .find_by_id(id)
            .await?
            .ok_or(ArticleError::NotFound)?;

        if let Some(cover) = existing.cover.as_ref() {
            self.media.destroy(cover).await?;
            debug!(
                target = SOURCE,
                article_id = id,
                public_id = cover.public_id(),
                "cover destroyed"
            );
        }

        self.writer.delete_article(id).await?;
        info!(target = SOURCE, article_id = id, "article deleted");
        self.recent.spawn_refresh();
        Ok(())
    }

    pub fn cover_url(&self, cover: &CoverRef) -> String {
        self.media.delivery_url(cover)
    }
}

fn required(value: String, field: &'static str) -> Result<String, ArticleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ArticleError::ConstraintViolation(field));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}
