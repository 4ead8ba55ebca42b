use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::warn;

use crate::{
    application::repos::{
        ArticleListing, ArticlesRepo, ArticlesWriteRepo, CreateArticleParams, ListWindow,
        RepoError, UpdateArticleParams,
    },
    domain::{
        cover::CoverRef,
        entities::{ArticleId, ArticleRecord, ArticleSummary, RecentArticle},
    },
};

use super::{PostgresRepositories, map_sqlx_error, tags};

const SOURCE: &str = "infra::db::articles";
const RECENT_POOL: i64 = 5;
const RECENT_FOLLOWERS: i64 = 2;

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    author: String,
    description: Option<String>,
    content: String,
    views: i32,
    cover: Option<String>,
    date: OffsetDateTime,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        Self {
            cover: stored_cover(row.id, row.cover.as_deref()),
            id: row.id,
            title: row.title,
            author: row.author,
            description: row.description,
            content: row.content,
            views: row.views,
            date: row.date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    title: String,
    author: String,
    description: Option<String>,
    views: i32,
    cover: Option<String>,
    date: OffsetDateTime,
}

impl From<SummaryRow> for ArticleSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            cover: stored_cover(row.id, row.cover.as_deref()),
            id: row.id,
            title: row.title,
            author: row.author,
            description: row.description,
            views: row.views,
            date: row.date,
        }
    }
}

/// A cover value that does not parse is served as "no cover" so one bad row
/// cannot fail a whole listing.
fn stored_cover(article_id: ArticleId, raw: Option<&str>) -> Option<CoverRef> {
    match CoverRef::parse_stored(raw) {
        Ok(cover) => cover,
        Err(err) => {
            warn!(
                target = SOURCE,
                article_id,
                error = %err,
                "ignoring malformed stored cover"
            );
            None
        }
    }
}

#[async_trait]
impl ArticlesRepo for PostgresRepositories {
    async fn recent_listing(&self) -> Result<Vec<RecentArticle>, RepoError> {
        let hottest = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT id, title, author, description, views, cover, date
            FROM (
                SELECT id, title, author, description, views, cover, date
                FROM articles
                ORDER BY date DESC, id DESC
                LIMIT $1
            ) AS recent
            ORDER BY views DESC, date DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(RECENT_POOL)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let Some(hottest) = hottest else {
            return Ok(Vec::new());
        };
        let hottest = ArticleSummary::from(hottest);

        let followers = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT id, title, author, description, views, cover, date
            FROM articles
            WHERE id <> $1
            ORDER BY date DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(hottest.id)
        .bind(RECENT_FOLLOWERS)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut listing = Vec::with_capacity(followers.len() + 1);
        listing.push(RecentArticle {
            article: hottest,
            hottest: true,
        });
        for row in followers {
            listing.push(RecentArticle {
                article: ArticleSummary::from(row),
                hottest: false,
            });
        }
        Ok(listing)
    }

    async fn list_articles(
        &self,
        exclude: &[ArticleId],
        window: Option<ListWindow>,
    ) -> Result<ArticleListing, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, title, author, description, views, cover, date FROM articles WHERE id <> ALL(",
        );
        qb.push_bind(exclude.to_vec());
        qb.push(") ORDER BY id DESC");

        if let Some(window) = window {
            let offset = i64::try_from(window.offset).map_err(|_| RepoError::InvalidInput {
                message: format!("offset {} is out of range", window.offset),
            })?;
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(window.limit));
            qb.push(" OFFSET ");
            qb.push_bind(offset);
        }

        let rows = qb
            .build_query_as::<SummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let articles = rows.into_iter().map(ArticleSummary::from).collect();

        Ok(ArticleListing {
            articles,
            total_items: Self::convert_count(total)?,
        })
    }

    async fn find_by_id(&self, id: ArticleId) -> Result<Option<ArticleRecord>, RepoError> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, title, author, description, content, views, cover, date
            FROM articles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ArticleRecord::from))
    }

    async fn increment_views(&self, id: ArticleId) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE articles SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl ArticlesWriteRepo for PostgresRepositories {
    async fn create_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            INSERT INTO articles (title, author, description, content, cover)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, author, description, content, views, cover, date
            "#,
        )
        .bind(&params.title)
        .bind(&params.author)
        .bind(params.description.as_deref())
        .bind(&params.content)
        .bind(params.cover.as_ref().map(CoverRef::to_string))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tags::insert_tags(&mut tx, row.id, &params.tags).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(ArticleRecord::from(row))
    }

    async fn update_article(
        &self,
        params: UpdateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            UPDATE articles
            SET title = $1,
                author = $2,
                description = $3,
                content = $4,
                cover = COALESCE($5, cover)
            WHERE id = $6
            RETURNING id, title, author, description, content, views, cover, date
            "#,
        )
        .bind(&params.title)
        .bind(&params.author)
        .bind(params.description.as_deref())
        .bind(&params.content)
        .bind(params.cover.as_ref().map(CoverRef::to_string))
        .bind(params.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        if let Some(tag_names) = params.tags.as_ref() {
            tags::delete_for_article(&mut tx, params.id).await?;
            tags::insert_tags(&mut tx, params.id, tag_names).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(ArticleRecord::from(row))
    }

    async fn delete_article(&self, id: ArticleId) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        tags::delete_for_article(&mut tx, id).await?;
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx_error)
    }
}
