//! The remote image host seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ImageHostError;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Public HTTPS URL of the stored image.
    pub secure_url: String,
    /// Host identifier needed to delete the image later.
    pub public_id: String,
}

/// A remote store for image bytes.
///
/// Uploads are unauthenticated (preset-based); deletions are signed with a
/// shared secret that never leaves the implementation.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageHostError::Io`] if the file cannot be read, or
    /// [`ImageHostError::Upload`] carrying the host's message if the upload
    /// is rejected.
    async fn upload(&self, path: &Path) -> Result<UploadedImage, ImageHostError>;

    /// Delete the image identified by `public_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageHostError::Rejected`] if the host does not report
    /// success, or a transport error if the request fails.
    async fn destroy(&self, public_id: &str) -> Result<(), ImageHostError>;
}

/// Resolve a local image reference to a filesystem path.
///
/// Accepts a plain path or a `file://` URI, as produced by device image
/// pickers.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use gventos::local_image_path;
///
/// assert_eq!(local_image_path("file:///tmp/a.jpg"), Path::new("/tmp/a.jpg"));
/// assert_eq!(local_image_path("/tmp/a.jpg"), Path::new("/tmp/a.jpg"));
/// ```
pub fn local_image_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}
