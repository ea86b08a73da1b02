//! Crate-level error types for remote reads, remote writes, and cascades.

use crate::cascade::CascadeStep;

/// Error returned by a [`DocumentStore`](crate::DocumentStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("document store transport error: {0}")]
    Transport(String),

    /// The remote store answered with a non-success status.
    #[error("document store API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the store.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// An update targeted a document that does not exist.
    #[error("document not found: {collection}/{id}")]
    NotFound {
        /// Collection name (e.g. `"events"`).
        collection: String,
        /// Document key.
        id: String,
    },

    /// A document was read but lacks a field the entity requires.
    #[error("malformed document {id}: missing or invalid field '{field}'")]
    Malformed {
        /// Document key.
        id: String,
        /// Name of the offending field.
        field: String,
    },

    /// A response body could not be decoded.
    #[error("document store decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Error returned by an [`ImageHost`](crate::ImageHost) backend.
#[derive(Debug, thiserror::Error)]
pub enum ImageHostError {
    /// The request never produced a response.
    #[error("image host transport error: {0}")]
    Transport(String),

    /// The upload endpoint rejected the image. Carries the host's own message.
    #[error("image upload failed: {message}")]
    Upload {
        /// Message reported by the host, or a generic fallback.
        message: String,
    },

    /// The signed destroy endpoint answered with a `result` other than `"ok"`.
    #[error("image deletion rejected by host: {result}")]
    Rejected {
        /// The `result` field reported by the host (e.g. `"not found"`).
        result: String,
    },

    /// The local image could not be read.
    #[error("failed to read local image: {0}")]
    Io(#[from] std::io::Error),

    /// The host's response body could not be decoded.
    #[error("image host response could not be parsed: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ImageHostError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for ImageHostError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Error returned while resolving [`PlannerConfig`](crate::PlannerConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing configuration variable {0}")]
    Missing(&'static str),

    /// A required variable is set but blank.
    #[error("configuration variable {0} must not be empty")]
    Empty(&'static str),

    /// The builder was asked to open without a backend for this concern.
    #[error("no {0} backend configured")]
    NoBackend(&'static str),

    /// An HTTP client could not be initialized.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    /// A base URL override was set but no backend is built from configuration
    /// for that concern.
    #[error("{0} base URL override has no configured backend to apply to")]
    UnusedOverride(&'static str),
}

/// A cascade delete stopped partway through.
///
/// Steps in `completed` have already taken effect remotely; `pending` were
/// never attempted. Retrying the parent deletion re-plans from a fresh tree,
/// so completed children are simply absent the second time around.
#[derive(Debug, thiserror::Error)]
#[error(
    "cascade delete of {target} failed at {failed} after {} completed step(s): {source}",
    .completed.len()
)]
pub struct CascadeError {
    /// The parent whose deletion was requested.
    pub target: CascadeStep,
    /// Steps that succeeded before the failure, in execution order.
    pub completed: Vec<CascadeStep>,
    /// The step that failed.
    pub failed: CascadeStep,
    /// Steps that were never attempted.
    pub pending: Vec<CascadeStep>,
    /// Why `failed` failed.
    pub source: Box<PlannerError>,
}

/// Error returned by [`PlannerStore`](crate::PlannerStore) operations.
///
/// The `Display` output is the single human-readable message handed to the
/// presentation layer; structured detail lives in the variants for callers
/// that want it and in the `tracing` events emitted at the failure site.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// Reading or writing the document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Uploading or deleting an image failed.
    #[error(transparent)]
    ImageHost(#[from] ImageHostError),

    /// A cascade delete stopped partway through.
    #[error(transparent)]
    Cascade(#[from] CascadeError),

    /// Configuration was incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
