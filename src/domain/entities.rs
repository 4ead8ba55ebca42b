//! Domain entities mirrored from persistent storage.

use time::OffsetDateTime;

use super::cover::CoverRef;

pub type ArticleId = i64;

/// A full article row, including its body.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub id: ArticleId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub content: String,
    pub views: i32,
    pub cover: Option<CoverRef>,
    pub date: OffsetDateTime,
}

/// Article columns used by listings; the body is left out.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub views: i32,
    pub cover: Option<CoverRef>,
    pub date: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub id: i64,
    pub tag: String,
    pub article_id: ArticleId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub user_name: String,
    pub hashed_password: String,
}

/// One entry of the recent listing, before tag enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentArticle {
    pub article: ArticleSummary,
    pub hottest: bool,
}

/// A recent article together with its tags.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedArticle {
    pub article: ArticleSummary,
    pub hottest: bool,
    pub tags: Vec<TagRecord>,
}

impl ArticleRecord {
    pub fn summary(&self) -> ArticleSummary {
        ArticleSummary {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            views: self.views,
            cover: self.cover.clone(),
            date: self.date,
        }
    }
}
