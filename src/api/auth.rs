use http::Method;
use serde::Serialize;

use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;
use crate::types::{Credential, Identity, TokenResponse};

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// New account details for [`Auth::register`].
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Profile fields to change. Unset fields are left as they are.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Sign-in, registration and the current user's profile.
#[derive(Debug, Clone, Copy)]
pub struct Auth<'a> {
    client: &'a ApiClient,
}

impl<'a> Auth<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Exchange username and password for a session, then load the profile.
    ///
    /// A bad password is an ordinary [`Error::RequestFailed`] with status
    /// 401, never [`Error::SessionExpired`]. If the profile cannot be loaded
    /// the new session is dropped again.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, Error> {
        let token: TokenResponse = self
            .client
            .submit(
                Method::POST,
                "/login",
                &LoginRequest { username, password },
                RequestOptions::new().anonymous(),
            )
            .await?;

        let credential = Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        };
        if let Err(e) = self.client.session().set_credential(credential) {
            return Err(self.client.report(e));
        }

        match self.current_user().await {
            Ok(identity) => {
                tracing::info!(user = %identity.username, "Signed in");
                Ok(identity)
            }
            Err(e) => {
                self.client.session().clear();
                Err(e)
            }
        }
    }

    /// Create an account. Does not sign in; returns the server's message.
    pub async fn register(&self, registration: &Registration) -> Result<String, Error> {
        let envelope: crate::types::ApiEnvelope<serde_json::Value> = self
            .client
            .request_with_body(
                Method::POST,
                "/register",
                registration,
                RequestOptions::new().anonymous(),
            )
            .await?;
        Ok(envelope.message)
    }

    /// Fetch the signed-in user and replace the cached identity.
    pub async fn current_user(&self) -> Result<Identity, Error> {
        let identity: Identity = self
            .client
            .fetch(Method::GET, "/users/me", RequestOptions::default())
            .await?;
        Ok(self.cache(identity))
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Identity, Error> {
        let identity: Identity = self
            .client
            .submit(Method::PUT, "/users/me", update, RequestOptions::default())
            .await?;
        Ok(self.cache(identity))
    }

    /// Tell the server, then drop the local session. Server failures are
    /// ignored and never reach the notifier; calling this while signed out
    /// does nothing.
    pub async fn logout(&self) {
        if self.client.session().credential().is_none() {
            return;
        }
        let outcome = self
            .client
            .dispatch::<serde_json::Value>(
                Method::POST,
                "/logout",
                None,
                RequestOptions::default(),
            )
            .await;
        if let Err(e) = outcome {
            tracing::debug!(error = %e, "Server-side logout failed");
        }
        self.client.session().clear();
    }

    fn cache(&self, identity: Identity) -> Identity {
        if let Err(e) = self.client.session().set_identity(identity.clone()) {
            tracing::warn!(error = %e, "Failed to persist user profile");
        }
        identity
    }
}
