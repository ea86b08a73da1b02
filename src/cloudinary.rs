//! [`ImageHost`] backed by Cloudinary's upload and destroy endpoints.

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::config::CloudinaryConfig;
use crate::error::{ConfigError, ImageHostError};
use crate::image_host::{ImageHost, UploadedImage};

const UPLOAD_FILE_NAME: &str = "photo.jpg";
const UPLOAD_MIME: &str = "image/jpeg";
const GENERIC_UPLOAD_FAILURE: &str = "Failed to upload image";

/// Signature for a destroy request.
///
/// Hex SHA-1 of `public_id=<id>&timestamp=<ts><secret>`. The parameters are
/// already in the alphabetical order the host expects.
///
/// # Examples
///
/// ```
/// let sig = gventos::destroy_signature("sample", 1315060510, "abcd");
/// assert_eq!(sig, "c3470533147774275dd37996cc4d0e68fd03cd4f");
/// ```
pub fn destroy_signature(public_id: &str, timestamp: i64, secret: &str) -> String {
    let payload = format!("public_id={public_id}&timestamp={timestamp}{secret}");
    hex::encode(Sha1::digest(payload.as_bytes()))
}

/// HTTP client for one Cloudinary cloud.
#[derive(Debug)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    upload_preset: String,
}

impl CloudinaryClient {
    /// Build a client from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, ConfigError> {
        let http = crate::config::http_client(crate::config::DEFAULT_REQUEST_TIMEOUT)?;
        Ok(Self::with_http(http, config))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_http(http: reqwest::Client, config: &CloudinaryConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: SecretString::from(config.api_secret.expose_secret().to_owned()),
            upload_preset: config.upload_preset.clone(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", self.base_url, self.cloud_name, action)
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, path: &Path) -> Result<UploadedImage, ImageHostError> {
        let bytes = tokio::fs::read(path).await?;
        let file = reqwest::multipart::Part::bytes(bytes)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(UPLOAD_MIME)?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("upload_preset", self.upload_preset.clone())
            .text("cloud_name", self.cloud_name.clone());

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        let success = response.status().is_success();
        let body = response.text().await?;
        let uploaded = parse_upload_response(success, &body)?;
        tracing::debug!(public_id = %uploaded.public_id, "image uploaded");
        Ok(uploaded)
    }

    async fn destroy(&self, public_id: &str) -> Result<(), ImageHostError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = destroy_signature(public_id, timestamp, self.api_secret.expose_secret());
        let timestamp = timestamp.to_string();
        let params = [
            ("public_id", public_id),
            ("api_key", self.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature", signature.as_str()),
        ];

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await?;
        let body = response.text().await?;
        parse_destroy_response(&body)?;
        tracing::debug!(%public_id, "image destroyed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
    error: Option<HostError>,
}

#[derive(Debug, Deserialize)]
struct HostError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: Option<String>,
    error: Option<HostError>,
}

/// Interpret an upload response body.
pub(crate) fn parse_upload_response(
    success: bool,
    body: &str,
) -> Result<UploadedImage, ImageHostError> {
    let parsed: Option<UploadResponse> = serde_json::from_str(body).ok();
    if !success {
        let message = parsed
            .and_then(|r| r.error)
            .map(|e| e.message)
            .unwrap_or_else(|| GENERIC_UPLOAD_FAILURE.to_owned());
        return Err(ImageHostError::Upload { message });
    }
    let parsed = parsed.ok_or_else(|| ImageHostError::Parse(body.to_owned()))?;
    match (parsed.secure_url, parsed.public_id) {
        (Some(secure_url), Some(public_id)) => Ok(UploadedImage {
            secure_url,
            public_id,
        }),
        _ => Err(ImageHostError::Parse(
            "upload response lacks secure_url or public_id".into(),
        )),
    }
}

/// Interpret a destroy response body. Only `result == "ok"` is success.
pub(crate) fn parse_destroy_response(body: &str) -> Result<(), ImageHostError> {
    let parsed: DestroyResponse = serde_json::from_str(body)?;
    match (parsed.result, parsed.error) {
        (Some(result), _) if result == "ok" => Ok(()),
        (Some(result), _) => Err(ImageHostError::Rejected { result }),
        (None, Some(error)) => Err(ImageHostError::Rejected {
            result: error.message,
        }),
        (None, None) => Err(ImageHostError::Parse(
            "destroy response lacks result".into(),
        )),
    }
}
