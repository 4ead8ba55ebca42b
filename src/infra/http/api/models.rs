use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::application::articles::{ArticlePage, ArticleService, ArticleWithTags, ListedArticle};
use crate::application::users::Session;
use crate::cache::RecentSnapshot;
use crate::domain::entities::{ArticleId, EnrichedArticle, TagRecord};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_name: String,
    pub pass_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub user_name: String,
    pub pass_hash: String,
    #[serde(rename = "newPassword", default)]
    pub new_password: Option<String>,
}

/// The JSON document sent in the `data` field of article uploads.
#[derive(Debug, Deserialize)]
pub struct ArticlePayload {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArticleListQuery {
    pub page: Option<u32>,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_name: String,
    pub access_token: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            user_name: session.user_name,
            access_token: session.access_token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub code: u16,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub id: i64,
    pub tag: String,
    pub article_id: ArticleId,
}

impl From<TagRecord> for TagResponse {
    fn from(tag: TagRecord) -> Self {
        Self {
            id: tag.id,
            tag: tag.tag,
            article_id: tag.article_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub id: ArticleId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub views: i32,
    pub cover: Option<String>,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hottest: Option<bool>,
    pub tags: Vec<TagResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleListResponse {
    pub data: Vec<ArticleResponse>,
    pub total_items: u64,
    pub current_page: u32,
    pub items_per_page: Option<u32>,
}

fn format_date(date: OffsetDateTime) -> String {
    date.format(&Rfc3339).unwrap_or_else(|_| date.to_string())
}

fn tag_views(tags: Vec<TagRecord>) -> Vec<TagResponse> {
    tags.into_iter().map(TagResponse::from).collect()
}

impl ArticleResponse {
    pub fn from_listed(listed: ListedArticle, service: &ArticleService) -> Self {
        let ListedArticle { article, tags } = listed;
        Self {
            cover: article.cover.as_ref().map(|cover| service.cover_url(cover)),
            id: article.id,
            title: article.title,
            author: article.author,
            description: article.description,
            content: None,
            views: article.views,
            date: format_date(article.date),
            hottest: None,
            tags: tag_views(tags),
        }
    }

    pub fn from_recent(entry: &EnrichedArticle, service: &ArticleService) -> Self {
        let article = &entry.article;
        Self {
            id: article.id,
            title: article.title.clone(),
            author: article.author.clone(),
            description: article.description.clone(),
            content: None,
            views: article.views,
            cover: article.cover.as_ref().map(|cover| service.cover_url(cover)),
            date: format_date(article.date),
            hottest: Some(entry.hottest),
            tags: tag_views(entry.tags.clone()),
        }
    }

    pub fn from_detail(detail: ArticleWithTags, service: &ArticleService) -> Self {
        let ArticleWithTags { article, tags } = detail;
        Self {
            cover: article.cover.as_ref().map(|cover| service.cover_url(cover)),
            id: article.id,
            title: article.title,
            author: article.author,
            description: article.description,
            content: Some(article.content),
            views: article.views,
            date: format_date(article.date),
            hottest: None,
            tags: tag_views(tags),
        }
    }
}

impl ArticleListResponse {
    pub fn from_page(page: ArticlePage, service: &ArticleService) -> Self {
        Self {
            data: page
                .articles
                .into_iter()
                .map(|listed| ArticleResponse::from_listed(listed, service))
                .collect(),
            total_items: page.total_items,
            current_page: page.current_page,
            items_per_page: page.items_per_page,
        }
    }
}

pub fn recent_views(snapshot: &RecentSnapshot, service: &ArticleService) -> Vec<ArticleResponse> {
    snapshot
        .articles()
        .iter()
        .map(|entry| ArticleResponse::from_recent(entry, service))
        .collect()
}
