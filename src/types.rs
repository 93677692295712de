use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Linkstash user identifier (numeric primary key on the server).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// The access/refresh token pair identifying an authenticated session.
///
/// The login endpoint only issues an access token, so `refresh_token` is
/// optional. Without one the next refresh cycle fails with
/// [`Error::SessionExpired`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Credential {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Cached profile of the signed-in user. Display only; the access token is
/// what the server authorizes against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Identity {
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            is_active: true,
            is_superuser: false,
            created_at: None,
        }
    }
}

/// Envelope wrapping every Linkstash API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Unwraps `data`, failing if the envelope carried none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when `data` is absent.
    pub fn into_data(self) -> Result<T, Error> {
        self.data
            .ok_or_else(|| Error::Decode(format!("response has no data: {}", self.message)))
    }
}

/// Token response from `/login` and `/refresh`.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Response body that may or may not be wrapped in an [`ApiEnvelope`].
///
/// Some endpoints (`/refresh`, `/users/me`, the collection listing) answer
/// with the bare resource, the rest with the envelope.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum Payload<T> {
    Envelope(ApiEnvelope<T>),
    Bare(T),
}

impl<T> Payload<T> {
    pub(crate) fn into_data(self) -> Result<T, Error> {
        match self {
            Self::Envelope(envelope) => envelope.into_data(),
            Self::Bare(data) => Ok(data),
        }
    }

    /// Like [`into_data`](Self::into_data), but an envelope without `data`
    /// yields `T::default()`. For listings.
    pub(crate) fn into_data_or_default(self) -> T
    where
        T: Default,
    {
        match self {
            Self::Envelope(envelope) => envelope.data.unwrap_or_default(),
            Self::Bare(data) => data,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub(crate) refresh_token: &'a str,
}
