use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use crate::{
    application::repos::{RepoError, TagsRepo},
    domain::entities::{ArticleId, TagRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i64,
    tag: String,
    article_id: i64,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            tag: row.tag,
            article_id: row.article_id,
        }
    }
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn list_for_article(&self, article_id: ArticleId) -> Result<Vec<TagRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TagRow>(
            r#"
            SELECT id, tag, article_id
            FROM tags
            WHERE article_id = $1
            ORDER BY id
            "#,
        )
        .bind(article_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }
}

pub(super) async fn insert_tags(
    tx: &mut Transaction<'_, Postgres>,
    article_id: ArticleId,
    names: &[String],
) -> Result<(), RepoError> {
    if names.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO tags (tag, article_id)
        SELECT name, $2 FROM UNNEST($1::text[]) WITH ORDINALITY AS t(name, position)
        ORDER BY position
        "#,
    )
    .bind(names)
    .bind(article_id)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

pub(super) async fn delete_for_article(
    tx: &mut Transaction<'_, Postgres>,
    article_id: ArticleId,
) -> Result<u64, RepoError> {
    let result = sqlx::query("DELETE FROM tags WHERE article_id = $1")
        .bind(article_id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

    Ok(result.rows_affected())
}
