//! Cloudinary client backing [`MediaStore`].
//!
//! Uploads and deletions go through the signed REST API. Signatures are the
//! SHA-256 of the sorted `key=value` parameter string followed by the API
//! secret, hex encoded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use crate::application::media::{MediaError, MediaStore};
use crate::cache::Clock;
use crate::domain::cover::{CoverRef, PendingCover};

use super::error::InfraError;

const SOURCE: &str = "infra::media";

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub api_base: Url,
    pub delivery_base: Url,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct CloudinaryMediaStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    version: u64,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryMediaStore {
    pub fn new(config: CloudinaryConfig, clock: Arc<dyn Clock>) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| InfraError::media(err.to_string()))?;

        Ok(Self {
            client,
            config,
            clock,
        })
    }

    fn endpoint(&self, action: &str) -> Result<Url, MediaError> {
        let path = format!("{}/image/{action}", self.config.cloud_name);
        join_url(&self.config.api_base, &path)
            .map_err(|err| MediaError::transport(format!("invalid media endpoint: {err}")))
    }

    /// Build the signed multipart form for `params`.
    fn signed_form(&self, params: Vec<(&'static str, String)>) -> Form {
        let timestamp = self.clock.now().unix_timestamp().to_string();
        let mut signed = params;
        signed.push(("timestamp", timestamp));
        let signature = sign_params(&signed, &self.config.api_secret);

        let mut form = Form::new();
        for (key, value) in signed {
            form = form.text(key, value);
        }
        form.text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
    }

    async fn send<T>(&self, action: &str, form: Form) -> Result<T, MediaError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.endpoint(action)?;
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                counter!("chronicle_media_failure_total").increment(1);
                MediaError::transport(err)
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(MediaError::transport)?;

        if !status.is_success() {
            counter!("chronicle_media_failure_total").increment(1);
            let message = serde_json::from_slice::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|err| MediaError::invalid_response(err.to_string()))
    }
}

#[async_trait]
impl MediaStore for CloudinaryMediaStore {
    async fn upload(
        &self,
        cover: PendingCover,
        replace: Option<&CoverRef>,
    ) -> Result<CoverRef, MediaError> {
        let params = match replace {
            Some(existing) => vec![
                ("invalidate", "true".to_string()),
                ("overwrite", "true".to_string()),
                ("public_id", existing.public_id().to_string()),
            ],
            None => vec![("folder", self.config.folder.clone())],
        };

        let size = cover.bytes.len();
        let part = Part::bytes(cover.bytes.to_vec())
            .file_name(cover.file_name)
            .mime_str(&cover.content_type)
            .map_err(|err| MediaError::transport(format!("invalid content type: {err}")))?;
        let form = self.signed_form(params).part("file", part);

        let uploaded: UploadResponse = self.send("upload", form).await?;
        counter!("chronicle_media_upload_total").increment(1);
        debug!(
            target = SOURCE,
            public_id = %uploaded.public_id,
            version = uploaded.version,
            bytes = size,
            "cover uploaded"
        );

        CoverRef::new(uploaded.public_id, uploaded.version.to_string())
            .map_err(|err| MediaError::invalid_response(err.to_string()))
    }

    async fn destroy(&self, cover: &CoverRef) -> Result<(), MediaError> {
        let form = self.signed_form(vec![("public_id", cover.public_id().to_string())]);
        let destroyed: DestroyResponse = self.send("destroy", form).await?;

        match destroyed.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                warn!(
                    target = SOURCE,
                    public_id = cover.public_id(),
                    "cover was already gone from the media service"
                );
                Ok(())
            }
            other => Err(MediaError::invalid_response(format!(
                "unexpected destroy result `{other}`"
            ))),
        }
    }

    fn delivery_url(&self, cover: &CoverRef) -> String {
        delivery_url(&self.config.delivery_base, &self.config.cloud_name, cover)
    }
}

/// Sign request parameters the way the upload API expects.
///
/// Empty values are left out; keys are sorted before joining.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> =
        params.iter().filter(|(_, value)| !value.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn delivery_url(base: &Url, cloud_name: &str, cover: &CoverRef) -> String {
    format!(
        "{}/{cloud_name}/image/upload/v{}/{}.jpg",
        base.as_str().trim_end_matches('/'),
        cover.version(),
        cover.public_id()
    )
}

fn join_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_reference_digest() {
        let params = vec![
            ("timestamp", "1709294400".to_string()),
            ("folder", "my-blog-uploads".to_string()),
        ];
        assert_eq!(
            sign_params(&params, "secret"),
            "3287e61be3ac20e2217a122b237942e3a581dc43987f5603cf0055a207668cd0"
        );
    }

    #[test]
    fn signature_skips_empty_values() {
        let with_empty = vec![
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_string()),
            ("public_id", "sample_image".to_string()),
            ("tags", String::new()),
            ("timestamp", "1315060510".to_string()),
        ];
        assert_eq!(
            sign_params(&with_empty, "abcd"),
            "cc927e1290f9e3ae4c1a741eda21a4630b4ce80f9ce0bc0296337d25cf40f91e"
        );
    }

    #[test]
    fn delivery_url_pins_version_and_jpg_format() {
        let base = Url::parse("https://res.cloudinary.com/").unwrap();
        let cover: CoverRef = "my-blog-uploads/abc 1712000000".parse().unwrap();

        assert_eq!(
            delivery_url(&base, "demo", &cover),
            "https://res.cloudinary.com/demo/image/upload/v1712000000/my-blog-uploads/abc.jpg"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let base = Url::parse("https://api.cloudinary.com/v1_1").unwrap();
        let url = join_url(&base, "demo/image/upload").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }
}
