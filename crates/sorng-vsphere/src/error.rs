//! Error types for the vSphere SOAP client.

use thiserror::Error;

/// Crate error type.
///
/// Missing or odd properties in an otherwise valid response are never
/// reported here; inventory assembly degrades them to empty values.
#[derive(Debug, Error)]
pub enum VsphereError {
    /// Network / HTTP-layer failure. Not retried by this crate.
    #[error("transport error: {0}")]
    Transport(String),

    /// The `Login` exchange failed, or the server kept rejecting the
    /// session after a fresh login.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Authentication is required but no credentials are configured.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The response body could not be parsed as XML at all.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Non-authentication SOAP fault or non-2xx status on a data request.
    #[error("SOAP fault (HTTP {status}): {message}")]
    Fault { status: u16, message: String },

    /// `ManagedObjectNotFound`: a MOID that no longer (or never) existed.
    #[error("managed object not found: {0}")]
    NotFound(String),
}

impl VsphereError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn fault(status: u16, msg: impl Into<String>) -> Self {
        Self::Fault {
            status,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error came from the login exchange or a rejected replay.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

impl From<VsphereError> for String {
    fn from(e: VsphereError) -> String {
        e.to_string()
    }
}

impl From<reqwest::Error> for VsphereError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::transport(format!("HTTP timeout: {e}"))
        } else if e.is_connect() {
            Self::transport(format!("Connection failed: {e}"))
        } else {
            Self::transport(format!("HTTP error: {e}"))
        }
    }
}

impl From<quick_xml::Error> for VsphereError {
    fn from(e: quick_xml::Error) -> Self {
        Self::malformed(format!("XML parse error: {e}"))
    }
}

/// Convenience alias.
pub type VsphereResult<T> = Result<T, VsphereError>;
