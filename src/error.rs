/// Errors surfaced by the Linkstash client.
///
/// Every variant owns its data so a single refresh outcome can be handed to
/// any number of waiting requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The session could not be recovered by a refresh. Local session state
    /// has already been cleared when this is returned.
    #[error("Session expired, please sign in again")]
    SessionExpired,

    /// Any other non-success response, with a normalized message.
    #[error("{message}")]
    RequestFailed { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Durable session storage could not be written.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

#[cfg(feature = "http-transport")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_displays_server_message() {
        let err = Error::RequestFailed {
            status: 404,
            message: "Collection not found".into(),
        };
        assert_eq!(err.to_string(), "Collection not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn session_expired_has_no_status() {
        assert!(Error::SessionExpired.is_session_expired());
        assert_eq!(Error::SessionExpired.status(), None);
        assert!(!Error::Timeout.is_session_expired());
    }
}
