//! Error types for the shared instance cache.
//!
//! All failures of a `find` are terminal for that call. None of them are
//! cached, so a later call for the same URI fetches again.

use thiserror::Error;

/// Result type alias using `InstanceCacheError`.
pub type Result<T> = std::result::Result<T, InstanceCacheError>;

/// Main error type for all cache operations.
#[derive(Debug, Error)]
pub enum InstanceCacheError {
    // ═══════════════════════════════════════════════════════════════════════════
    // SOURCE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The source URI could not be parsed as a URL.
    #[error("Malformed source URI '{uri}': {reason}")]
    MalformedSource { uri: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════════
    // FETCH ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The origin answered with a status other than 200, or the transport
    /// failed before a status was received (`status` is `None`).
    #[error("Fetch of '{uri}' failed: {reason}")]
    FetchFailed {
        uri: String,
        status: Option<u16>,
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // PARSE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The response body could not be read or parsed as XML.
    #[error("Failed to parse XML from '{uri}': {reason}")]
    ParseFailed { uri: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl InstanceCacheError {
    /// Builds a `FetchFailed` for a non-200 response.
    pub fn bad_status(uri: impl Into<String>, status: u16) -> Self {
        InstanceCacheError::FetchFailed {
            uri: uri.into(),
            status: Some(status),
            reason: format!("got invalid return code {}", status),
        }
    }

    /// Builds a `FetchFailed` for a transport failure (no status received).
    pub fn transport(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        InstanceCacheError::FetchFailed {
            uri: uri.into(),
            status: None,
            reason: reason.into(),
        }
    }

    /// Returns the HTTP status carried by a `FetchFailed`, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            InstanceCacheError::FetchFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            InstanceCacheError::FetchFailed { status: None, .. } => true,
            InstanceCacheError::FetchFailed {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if the failure was caused by the caller's input or the
    /// document it points at, rather than by the network.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InstanceCacheError::MalformedSource { .. } | InstanceCacheError::ParseFailed { .. }
        ) || matches!(self.status(), Some(400..=499))
    }
}
