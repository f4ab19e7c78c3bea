//! Crate-wide error type.
//!
//! Network and auth failures propagate unchanged from [`Session`] to the
//! endpoint methods and on to the caller; local contract violations
//! (bad index, unknown filter key) are raised at the offending call and
//! never hit the network.
//!
//! [`Session`]: crate::session::Session

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the portal client.
#[derive(Debug, Error)]
pub enum Error {
    /// The login retry schedule was exhausted without a successful login.
    #[error("login failed after exhausting the retry schedule")]
    LoginFailed,

    /// An authenticated call detected logout and the session could not be
    /// renewed (renewal disabled, renewal ineffective, or no credentials).
    #[error("session expired{}", if *.renewable { "" } else { " and no credentials are available to renew it" })]
    SessionExpired {
        /// Whether credentials were available when expiry was detected.
        renewable: bool,
    },

    /// An explicitly assigned cookie set failed validation; the previous
    /// cookies were restored.
    #[error("the assigned cookies do not contain a valid session")]
    InvalidSession,

    /// The portal reported maintenance (HTTP 503).
    #[error("the portal is down or under maintenance")]
    ServiceUnavailable,

    /// The server reported a GPA calculation failure or missing authorization.
    #[error("GPA calculation failed: {reason}")]
    GpaCalculationFailed { reason: String },

    /// The portal is not currently in a course selection phase.
    #[error("course selection is not available at this time")]
    SelectionNotAvailable,

    /// A selection class's deferred detail could not be located in the
    /// server response.
    #[error("unable to fetch selection class information for class `{class_id}`")]
    ClassFetchFailed { class_id: String },

    /// The selected class has no remaining capacity.
    #[error("the selected class is full")]
    FullCapacity,

    /// The selected class conflicts with an already registered class.
    #[error("the selected class conflicts with another registered class")]
    TimeConflict,

    /// The registration endpoint rejected the request.
    #[error("class registration failed: {reason}")]
    Registration { reason: String },

    /// The deregistration endpoint rejected the request.
    #[error("class deregistration failed: {reason}")]
    Deregistration { reason: String },

    /// Index outside `[0, len)` after negative-index resolution.
    #[error("index {index} out of range for query result of length {len}")]
    IndexOutOfRange { index: isize, len: usize },

    /// A filter criterion referenced a field the record type does not have.
    #[error("invalid filter key `{key}`")]
    InvalidFilterKey { key: String },

    /// The captcha recognizer failed.
    #[error("captcha recognition failed: {message}")]
    Recognizer { message: String },

    /// A portal payload did not match the expected shape.
    #[error("failed to decode portal payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A portal string field did not match its expected format.
    #[error("failed to parse portal field `{field}`: got `{value}`")]
    Parse { field: &'static str, value: String },

    /// The server answered with an unexpected HTTP status.
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Network-level failure (DNS, connect, timeout, body read).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A relative endpoint path could not be resolved against the base URL.
    #[error("invalid URL `{url}`")]
    InvalidUrl { url: String },

    /// I/O failure reading or writing a persisted session file.
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn recognizer(message: impl Into<String>) -> Self {
        Self::Recognizer {
            message: message.into(),
        }
    }

    pub(crate) fn parse(field: &'static str, value: impl Into<String>) -> Self {
        Self::Parse {
            field,
            value: value.into(),
        }
    }

    /// True for conditions a caller may reasonably recover from by
    /// re-authenticating.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::LoginFailed | Self::SessionExpired { .. } | Self::InvalidSession
        )
    }
}
