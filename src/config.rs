//! Backend configuration read from environment-style variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Root of the Cloud Firestore REST API.
pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
/// Database used when `FIREBASE_DATABASE_ID` is unset.
pub const DEFAULT_DATABASE_ID: &str = "(default)";
/// Root of the Cloudinary upload/destroy API.
pub const DEFAULT_CLOUDINARY_BASE_URL: &str = "https://api.cloudinary.com/v1_1";
/// Unsigned upload preset used when `CLOUDINARY_UPLOAD_PRESET` is unset.
pub const DEFAULT_UPLOAD_PRESET: &str = "wpfg2025app";
/// Per-request timeout applied to both HTTP clients.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client shared by the remote backends.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Connection settings for the remote document database.
#[derive(Debug)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database_id: String,
    /// Web API key, sent as the `key` query parameter.
    pub api_key: Option<String>,
    /// Initial bearer token for authenticated access.
    pub auth_token: Option<SecretString>,
    pub base_url: String,
}

impl FirestoreConfig {
    /// Settings for `project_id` with every optional value defaulted.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: DEFAULT_DATABASE_ID.to_owned(),
            api_key: None,
            auth_token: None,
            base_url: DEFAULT_FIRESTORE_BASE_URL.to_owned(),
        }
    }
}

/// Connection settings for the remote image host.
#[derive(Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    /// Shared secret used to sign destroy requests. Never sent on the wire.
    pub api_secret: SecretString,
    pub upload_preset: String,
    pub base_url: String,
}

impl CloudinaryConfig {
    /// Settings for a cloud with the default upload preset and API root.
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
            upload_preset: DEFAULT_UPLOAD_PRESET.to_owned(),
            base_url: DEFAULT_CLOUDINARY_BASE_URL.to_owned(),
        }
    }
}

/// Everything needed to talk to both remote services.
#[derive(Debug)]
pub struct PlannerConfig {
    pub firestore: FirestoreConfig,
    pub cloudinary: CloudinaryConfig,
    pub request_timeout: Duration,
}

impl PlannerConfig {
    /// Read configuration from the process environment.
    ///
    /// Required: `FIREBASE_PROJECT_ID`, `CLOUDINARY_CLOUD_NAME`,
    /// `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET`.
    /// Optional: `FIREBASE_API_KEY`, `FIREBASE_DATABASE_ID`,
    /// `FIREBASE_AUTH_TOKEN`, `CLOUDINARY_UPLOAD_PRESET`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing or blank required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    ///
    /// Blank optional variables are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing or blank required variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            let value = lookup(name).ok_or(ConfigError::Missing(name))?;
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
            Ok(value)
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut firestore = FirestoreConfig::new(required("FIREBASE_PROJECT_ID")?);
        firestore.api_key = optional("FIREBASE_API_KEY");
        firestore.auth_token = optional("FIREBASE_AUTH_TOKEN").map(SecretString::from);
        if let Some(database_id) = optional("FIREBASE_DATABASE_ID") {
            firestore.database_id = database_id;
        }

        let mut cloudinary = CloudinaryConfig::new(
            required("CLOUDINARY_CLOUD_NAME")?,
            required("CLOUDINARY_API_KEY")?,
            required("CLOUDINARY_API_SECRET")?,
        );
        if let Some(preset) = optional("CLOUDINARY_UPLOAD_PRESET") {
            cloudinary.upload_preset = preset;
        }

        Ok(Self {
            firestore,
            cloudinary,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }
}
