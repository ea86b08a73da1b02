//! Bearer token attached to outgoing document-store requests.

use std::sync::{Arc, RwLock};

use secrecy::{ExposeSecret, SecretString};

/// Shared, refreshable bearer token.
///
/// The token is read on every outgoing request, so writing a new value
/// through [`set`](BearerToken::set) rotates credentials without rebuilding
/// the client. An empty token means "no `Authorization` header"; requests
/// then rely on the API key alone.
///
/// # Panics
///
/// Panics if the inner [`RwLock`] is poisoned (a writer panicked while
/// holding the lock). This is treated as an invariant violation.
#[derive(Clone)]
pub struct BearerToken {
    token: Arc<RwLock<SecretString>>,
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("present", &!self.is_empty())
            .finish()
    }
}

impl Default for BearerToken {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl BearerToken {
    /// Create a token holder with an initial value.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(SecretString::from(token.into()))),
        }
    }

    /// Replace the token. Visible to the next request from every clone.
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().expect("token RwLock poisoned") = SecretString::from(token.into());
    }

    /// Whether no token is configured.
    pub fn is_empty(&self) -> bool {
        self.token
            .read()
            .expect("token RwLock poisoned")
            .expose_secret()
            .is_empty()
    }

    /// Attach `Authorization: Bearer <token>` unless the token is empty.
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.token.read().expect("token RwLock poisoned");
        let token = token.expose_secret();
        if token.is_empty() {
            request
        } else {
            request.bearer_auth(token)
        }
    }
}
