//! Cover image references as stored alongside articles.
//!
//! A cover lives on the external media service. The article row keeps only the
//! media identifier and the version returned by the last upload, serialized as
//! `"<public_id> <version>"`.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use super::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverRef {
    public_id: String,
    version: String,
}

impl CoverRef {
    pub fn new(
        public_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let public_id = public_id.into();
        let version = version.into();
        if public_id.trim().is_empty() || public_id.contains(' ') {
            return Err(DomainError::malformed_cover(public_id));
        }
        if version.trim().is_empty() || version.contains(' ') {
            return Err(DomainError::malformed_cover(version));
        }
        Ok(Self { public_id, version })
    }

    pub fn public_id(&self) -> &str {
        &self.public_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Parse the stored column value, treating blank values as "no cover".
    pub fn parse_stored(raw: Option<&str>) -> Result<Option<Self>, DomainError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value.parse().map(Some),
        }
    }
}

impl FromStr for CoverRef {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.trim().split(' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(public_id), Some(version), None) => Self::new(public_id, version),
            _ => Err(DomainError::malformed_cover(value)),
        }
    }
}

impl fmt::Display for CoverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.public_id, self.version)
    }
}

/// Raw image bytes received from a client, not yet pushed to the media service.
#[derive(Debug, Clone)]
pub struct PendingCover {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl PendingCover {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_public_id_and_version() {
        let cover: CoverRef = "my-blog-uploads/abc123 1712000000".parse().unwrap();
        assert_eq!(cover.public_id(), "my-blog-uploads/abc123");
        assert_eq!(cover.version(), "1712000000");
        assert_eq!(cover.to_string(), "my-blog-uploads/abc123 1712000000");
    }

    #[test]
    fn rejects_missing_version() {
        let err = "my-blog-uploads/abc123".parse::<CoverRef>().unwrap_err();
        assert!(matches!(err, DomainError::MalformedCover { .. }));
    }

    #[test]
    fn malformed_cover_error_names_the_raw_value() {
        let err = "abc".parse::<CoverRef>().unwrap_err();
        assert_eq!(err, DomainError::MalformedCover { raw: "abc".into() });
        assert_eq!(err.to_string(), "malformed cover reference `abc`");
    }

    #[test]
    fn rejects_extra_segments() {
        assert!("a 1 2".parse::<CoverRef>().is_err());
    }

    #[test]
    fn blank_stored_value_means_no_cover() {
        assert_eq!(CoverRef::parse_stored(None).unwrap(), None);
        assert_eq!(CoverRef::parse_stored(Some("  ")).unwrap(), None);
        assert!(CoverRef::parse_stored(Some("id 7")).unwrap().is_some());
    }
}
