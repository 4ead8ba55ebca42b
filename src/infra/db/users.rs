use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, UpdateUserParams, UsersRepo},
    domain::entities::UserRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    user_name: String,
    hashed_password: String,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            user_name: row.user_name,
            hashed_password: row.hashed_password,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_by_user_name(&self, user_name: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, user_name, hashed_password FROM users WHERE user_name = $1",
        )
        .bind(user_name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn create_user(
        &self,
        user_name: &str,
        hashed_password: &str,
    ) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (user_name, hashed_password)
            VALUES ($1, $2)
            RETURNING id, user_name, hashed_password
            "#,
        )
        .bind(user_name)
        .bind(hashed_password)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET user_name = $2,
                hashed_password = COALESCE($3, hashed_password)
            WHERE id = $1
            RETURNING id, user_name, hashed_password
            "#,
        )
        .bind(params.id)
        .bind(&params.user_name)
        .bind(params.hashed_password.as_deref())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }
}
