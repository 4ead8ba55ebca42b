//! Article upload forms: a `data` field holding the article JSON and an
//! optional `cover` file.

use axum::extract::Multipart;

use crate::domain::cover::PendingCover;

use super::error::ApiError;
use super::models::ArticlePayload;

const DATA_FIELD: &str = "data";
const COVER_FIELD: &str = "cover";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug)]
pub struct ArticleForm {
    pub payload: ArticlePayload,
    pub cover: Option<PendingCover>,
}

pub async fn read_article_form(mut multipart: Multipart) -> Result<ArticleForm, ApiError> {
    let mut payload = None;
    let mut cover = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request("Failed to upload file", Some(err.to_string())))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(DATA_FIELD) => {
                let raw = field.bytes().await.map_err(|err| {
                    ApiError::bad_request("Failed to read article data", Some(err.to_string()))
                })?;
                payload = Some(parse_payload(&raw)?);
            }
            Some(COVER_FIELD) => {
                let file_name = field.file_name().unwrap_or(COVER_FIELD).to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(FALLBACK_CONTENT_TYPE)
                    .to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    ApiError::bad_request("Failed to upload file", Some(err.to_string()))
                })?;
                cover = Some(PendingCover {
                    file_name,
                    content_type,
                    bytes,
                })
                .filter(|pending| !pending.is_empty());
            }
            _ => {}
        }
    }

    let payload =
        payload.ok_or_else(|| ApiError::bad_request("Missing article data", None))?;

    Ok(ArticleForm { payload, cover })
}

fn parse_payload(raw: &[u8]) -> Result<ArticlePayload, ApiError> {
    serde_json::from_slice(raw)
        .map_err(|err| ApiError::bad_request("Invalid article data", Some(err.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accepts_missing_optional_fields() {
        let payload =
            parse_payload(br#"{"title":"T","author":"A","content":"C"}"#).expect("payload");
        assert_eq!(payload.title, "T");
        assert!(payload.description.is_none());
        assert!(payload.tags.is_none());
    }

    #[test]
    fn malformed_payload_is_a_bad_request() {
        let err = parse_payload(b"{not json").expect_err("invalid");
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
