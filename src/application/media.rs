//! Port to the external image host that stores article covers.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::cover::{CoverRef, PendingCover};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media service request failed: {0}")]
    Transport(String),
    #[error("media service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("media service returned an unexpected payload: {0}")]
    InvalidResponse(String),
}

impl MediaError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Push the image to the host. With `replace` set the stored asset is
    /// overwritten in place; otherwise a new asset is created in the upload
    /// folder.
    async fn upload(
        &self,
        cover: PendingCover,
        replace: Option<&CoverRef>,
    ) -> Result<CoverRef, MediaError>;

    async fn destroy(&self, cover: &CoverRef) -> Result<(), MediaError>;

    /// Public delivery URL for a stored cover.
    fn delivery_url(&self, cover: &CoverRef) -> String;
}
