use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::notify::{Notifier, TracingNotifier};
use crate::refresh::RefreshState;
use crate::retry::{RequestAttempt, RetryPolicy};
use crate::session::SessionStore;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Per-call adjustments.
///
/// Headers set here override the client defaults and the bearer credential.
/// A retry after a refresh always carries the refreshed bearer.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) anonymous: bool,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Send without the stored credential, and treat a 401 as an ordinary
    /// failure instead of an expired session. For sign-in and registration.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// Entry point for every Linkstash API call.
///
/// Cloning is cheap; clones share the session and the refresh coordinator,
/// so concurrent calls through any clone still trigger at most one refresh.
///
/// ```rust,ignore
/// let client = ApiClient::from_config(&ClientConfig::from_env()?)?
///     .with_notifier(my_toasts);
/// let categories: ApiEnvelope<Vec<Category>> = client.get("/categories").await?;
/// ```
#[derive(Clone)]
pub struct ApiClient {
    session: SessionStore,
    policy: Arc<RetryPolicy>,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient {
    /// Compose a client from a transport and a session.
    #[must_use]
    pub fn new(transport: impl Transport, session: SessionStore) -> Self {
        Self {
            policy: Arc::new(RetryPolicy::new(Arc::new(transport), session.clone())),
            session,
            notifier: Arc::new(TracingNotifier),
        }
    }

    /// reqwest transport plus a session persisted under the configured
    /// session directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] or [`Error::Storage`] if the HTTP client or
    /// the session directory cannot be set up.
    #[cfg(feature = "http-transport")]
    pub fn from_config(config: &crate::config::ClientConfig) -> Result<Self, Error> {
        let transport = crate::transport::HttpTransport::new(config)?;
        let storage = crate::storage::FileStore::open(config.session_dir()?)?;
        Ok(Self::new(transport, SessionStore::new(storage)))
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: impl Notifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub fn refresh_state(&self) -> RefreshState {
        self.policy.coordinator().state()
    }

    /// Drop the local session without contacting the server.
    pub fn sign_out(&self) {
        self.session.clear();
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(Method::GET, path, None, RequestOptions::default())
            .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_with_body(Method::POST, path, body, RequestOptions::default())
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_with_body(Method::PUT, path, body, RequestOptions::default())
            .await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_with_body(Method::PATCH, path, body, RequestOptions::default())
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    /// Like [`request`](Self::request), serializing `body` first.
    pub async fn request_with_body<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = match serde_json::to_value(body) {
            Ok(body) => body,
            Err(e) => return Err(self.report(Error::Decode(format!("request body: {e}")))),
        };
        self.request(method, path, Some(body), options).await
    }

    /// Send one logical request and decode its body as `T`.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionExpired`] when the session could not be recovered;
    ///   the session is already cleared.
    /// - [`Error::RequestFailed`] for any other non-success response,
    ///   including a 2xx envelope with `success: false`.
    /// - [`Error::Network`] / [`Error::Timeout`] from the transport.
    /// - [`Error::Decode`] if the body is not a `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        options: RequestOptions,
    ) -> Result<T, Error> {
        self.dispatch(method, path, body, options)
            .await
            .map_err(|e| self.report(e))
    }

    /// [`ApiClient::request`] without notifying on failure.
    pub(crate) async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        options: RequestOptions,
    ) -> Result<T, Error> {
        let request = ApiRequest {
            method,
            path: path.to_owned(),
            query: options.query,
            headers: options.headers,
            body,
        };

        self.policy
            .execute(RequestAttempt::new(request, options.anonymous))
            .await
            .and_then(|response| accept(&response))
    }

    pub(crate) fn report(&self, error: Error) -> Error {
        self.notifier.request_failed(&error);
        if error.is_session_expired() {
            self.notifier.session_expired();
        }
        error
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("session", &self.session)
            .field("refresh_state", &self.refresh_state())
            .finish_non_exhaustive()
    }
}

/// Rejects `success: false` envelopes, then decodes.
fn accept<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, Error> {
    let rejected = response
        .json_body()
        .filter(|body| body.get("success").and_then(JsonValue::as_bool) == Some(false));
    if let Some(body) = rejected {
        let message = body
            .get("message")
            .and_then(JsonValue::as_str)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Request failed")
            .to_owned();
        return Err(Error::RequestFailed {
            status: response.status.as_u16(),
            message,
        });
    }
    response.decode()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::StatusCode;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::testing::FakeServer;
    use crate::types::{ApiEnvelope, Credential};

    #[derive(Default)]
    struct Recorded {
        failures: Vec<Error>,
        logouts: usize,
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier(Arc<Mutex<Recorded>>);

    impl Notifier for RecordingNotifier {
        fn request_failed(&self, error: &Error) {
            self.0.lock().failures.push(error.clone());
        }

        fn session_expired(&self) {
            self.0.lock().logouts += 1;
        }
    }

    fn signed_in() -> SessionStore {
        let session = SessionStore::in_memory();
        session
            .set_credential(Credential::new("tok1").with_refresh_token("r1"))
            .unwrap();
        session
    }

    fn client(server: FakeServer) -> (ApiClient, Arc<FakeServer>, RecordingNotifier) {
        let server = Arc::new(server);
        let notifier = RecordingNotifier::default();
        let client = ApiClient::new(server.clone(), signed_in()).with_notifier(notifier.clone());
        (client, server, notifier)
    }

    #[tokio::test]
    async fn get_decodes_envelope() {
        let (client, _, notifier) = client(FakeServer::new("tok1"));

        let envelope: ApiEnvelope<JsonValue> = client.get("/categories").await.unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap()["path"], "/categories");
        assert!(notifier.0.lock().failures.is_empty());
    }

    #[tokio::test]
    async fn recovered_request_is_silent() {
        let (client, server, notifier) = client(FakeServer::expired());

        let _: ApiEnvelope<JsonValue> = client.get("/collections").await.unwrap();

        assert_eq!(server.refresh_calls(), 1);
        assert!(notifier.0.lock().failures.is_empty());
    }

    #[tokio::test]
    async fn session_expiry_notifies_once_and_forces_logout() {
        let (client, server, notifier) = client(FakeServer::new("tok1").always_unauthorized());

        let err = client.get::<JsonValue>("/collections").await.unwrap_err();

        assert_eq!(err, Error::SessionExpired);
        assert_eq!(server.requests_to("/collections").len(), 2);
        let recorded = notifier.0.lock();
        assert_eq!(recorded.failures, vec![Error::SessionExpired]);
        assert_eq!(recorded.logouts, 1);
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn concurrent_expiry_notifies_each_request_once() {
        let (client, server, notifier) = client(
            FakeServer::expired()
                .with_rejection_gate(3)
                .with_refresh_delay(Duration::from_millis(10))
                .with_refresh_status(StatusCode::UNAUTHORIZED),
        );
        let other = client.clone();

        let (a, b, c) = tokio::join!(
            client.get::<JsonValue>("/a"),
            other.get::<JsonValue>("/b"),
            client.get::<JsonValue>("/c"),
        );

        assert!(a.is_err() && b.is_err() && c.is_err());
        assert_eq!(server.refresh_calls(), 1);
        let recorded = notifier.0.lock();
        assert_eq!(recorded.failures.len(), 3);
        assert_eq!(recorded.logouts, 3);
    }

    #[tokio::test]
    async fn server_message_is_surfaced() {
        let (client, _, notifier) = client(FakeServer::new("tok1").with_route(
            Method::DELETE,
            "/categories/9",
            |_| ApiResponse::json(StatusCode::NOT_FOUND, &json!({"detail": "Category not found"})),
        ));

        let err = client.delete::<JsonValue>("/categories/9").await.unwrap_err();

        assert_eq!(
            err,
            Error::RequestFailed {
                status: 404,
                message: "Category not found".into(),
            }
        );
        assert_eq!(notifier.0.lock().failures, vec![err]);
        assert_eq!(notifier.0.lock().logouts, 0);
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_a_failure() {
        let (client, _, _) = client(FakeServer::new("tok1").with_route(
            Method::POST,
            "/bot/parse",
            |_| {
                ApiResponse::json(
                    StatusCode::OK,
                    &json!({"success": false, "message": "No valid URL found"}),
                )
            },
        ));

        let err = client
            .post::<_, JsonValue>("/bot/parse", &json!({"message": "hello"}))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::RequestFailed {
                status: 200,
                message: "No valid URL found".into(),
            }
        );
    }

    #[tokio::test]
    async fn options_add_headers_and_query() {
        let (client, server, _) = client(FakeServer::new("tok1"));
        let options = RequestOptions::new()
            .with_header(
                HeaderName::from_static("x-message-source"),
                HeaderValue::from_static("web-test"),
            )
            .with_query("limit", 20);

        let _: JsonValue = client
            .request(Method::GET, "/bot/messages", None, options)
            .await
            .unwrap();

        let sent = &server.requests_to("/bot/messages")[0];
        assert_eq!(sent.headers["x-message-source"], "web-test");
        assert_eq!(sent.headers[http::header::CONTENT_TYPE], "application/json");
        assert_eq!(sent.bearer_token(), Some("tok1"));
        assert_eq!(sent.path_and_query(), "/bot/messages?limit=20");
    }

    #[tokio::test]
    async fn rejected_authorization_override_retries_with_refreshed_token() {
        let (client, server, notifier) = client(FakeServer::new("tok1"));
        let options = RequestOptions::new().with_header(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer bot-key"),
        );

        let result: Result<JsonValue, Error> = client
            .request(Method::POST, "/bot/parse", None, options)
            .await;

        assert!(result.is_ok());
        assert_eq!(server.refresh_calls(), 1);
        assert_eq!(
            server.tokens_sent_to("/bot/parse"),
            vec![Some("bot-key".to_owned()), Some("tok2".to_owned())]
        );
        assert_eq!(client.session().credential().unwrap().access_token, "tok2");
        assert!(notifier.0.lock().failures.is_empty());
    }

    #[tokio::test]
    async fn put_and_patch_send_json_bodies() {
        let (client, server, _) = client(FakeServer::new("tok1"));

        let _: JsonValue = client
            .put("/categories/1", &json!({"name": "Reading"}))
            .await
            .unwrap();
        let _: JsonValue = client
            .patch("/users/me", &json!({"email": "new@example.com"}))
            .await
            .unwrap();

        let put = &server.requests_to("/categories/1")[0];
        assert_eq!(put.method, Method::PUT);
        assert_eq!(put.body.as_ref().unwrap()["name"], "Reading");
        assert_eq!(server.requests_to("/users/me")[0].method, Method::PATCH);
    }

    #[tokio::test]
    async fn sign_out_clears_session() {
        let (client, _, _) = client(FakeServer::new("tok1"));
        client.sign_out();
        client.sign_out();
        assert!(client.session().credential().is_none());
        assert_eq!(client.refresh_state(), RefreshState::Idle);
    }
}
