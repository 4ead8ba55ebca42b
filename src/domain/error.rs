use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("malformed cover reference `{raw}`")]
    MalformedCover { raw: String },
}

impl DomainError {
    pub fn malformed_cover(raw: impl Into<String>) -> Self {
        Self::MalformedCover { raw: raw.into() }
    }
}
