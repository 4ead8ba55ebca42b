use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::auth::{AuthError, PasswordHasher, TokenService};
use crate::application::repos::{RepoError, UpdateUserParams, UsersRepo};

const SOURCE: &str = "application::users";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("can't find the user `{0}`")]
    UnknownUser(String),
    #[error("user `{0}` not found")]
    NotFound(String),
    #[error("password is wrong")]
    WrongPassword,
    #[error("`{0}` must not be empty")]
    ConstraintViolation(&'static str),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_name: String,
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct UpdateUserCommand {
    pub user_name: String,
    /// Current password, checked before anything changes.
    pub password: String,
    pub new_password: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UsersRepo>,
    tokens: TokenService,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(users: Arc<dyn UsersRepo>, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self {
            users,
            tokens,
            hasher,
        }
    }

    pub async fn login(&self, user_name: &str, password: &str) -> Result<Session, UserError> {
        let user = self
            .users
            .find_by_user_name(user_name)
            .await?
            .ok_or_else(|| UserError::UnknownUser(user_name.to_string()))?;

        if !self.hasher.verify(password, &user.hashed_password).await? {
            return Err(UserError::WrongPassword);
        }

        Ok(Session {
            access_token: self.tokens.issue(&user.user_name)?,
            user_name: user.user_name,
        })
    }

    /// Rename the authenticated user and optionally rotate the password.
    pub async fn update_user(
        &self,
        current_name: &str,
        command: UpdateUserCommand,
    ) -> Result<Session, UserError> {
        let user = self
            .users
            .find_by_user_name(current_name)
            .await?
            .ok_or_else(|| UserError::NotFound(current_name.to_string()))?;

        if !self
            .hasher
            .verify(&command.password, &user.hashed_password)
            .await?
        {
            return Err(UserError::WrongPassword);
        }

        let user_name = command.user_name.trim().to_string();
        if user_name.is_empty() {
            return Err(UserError::ConstraintViolation("user_name"));
        }

        let hashed_password = match command.new_password.filter(|value| !value.is_empty()) {
            Some(password) => Some(self.hasher.hash(&password).await?),
            None => None,
        };

        let updated = self
            .users
            .update_user(UpdateUserParams {
                id: user.id,
                user_name,
                hashed_password,
            })
            .await?;

        info!(target = SOURCE, user_id = updated.id, "user updated");
        Ok(Session {
            access_token: self.tokens.issue(&updated.user_name)?,
            user_name: updated.user_name,
        })
    }

    /// Create the administrator account if it does not exist yet.
    pub async fn ensure_admin(&self, user_name: &str, password: &str) -> Result<bool, UserError> {
        if user_name.trim().is_empty() {
            return Err(UserError::ConstraintViolation("admin.name"));
        }
        if password.is_empty() {
            return Err(UserError::ConstraintViolation("admin.password"));
        }

        if self.users.find_by_user_name(user_name).await?.is_some() {
            return Ok(false);
        }

        let hashed = self.hasher.hash(password).await?;
        match self.users.create_user(user_name, &hashed).await {
            Ok(user) => {
                info!(target = SOURCE, user_id = user.id, "admin user created");
                Ok(true)
            }
            Err(RepoError::Duplicate { constraint }) => {
                warn!(
                    target = SOURCE,
                    constraint = %constraint,
                    "admin user was created concurrently"
                );
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}
