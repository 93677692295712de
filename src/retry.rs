//! Expired-session recovery: refresh once, retry once, never loop.

use std::sync::Arc;

use http::StatusCode;

use crate::error::Error;
use crate::interceptor;
use crate::refresh::RefreshCoordinator;
use crate::session::SessionStore;
use crate::transport::{ApiRequest, ApiResponse, TransportDyn};
use crate::types::Credential;

/// One logical request and how much of its retry budget is spent.
#[derive(Debug, Clone)]
pub(crate) struct RequestAttempt {
    request: ApiRequest,
    anonymous: bool,
    retried: bool,
}

impl RequestAttempt {
    pub(crate) fn new(request: ApiRequest, anonymous: bool) -> Self {
        Self {
            request,
            anonymous,
            retried: false,
        }
    }

    /// The same logical request with its single retry consumed.
    fn into_retry(self) -> Self {
        debug_assert!(!self.retried, "a request is retried at most once");
        Self {
            retried: true,
            ..self
        }
    }
}

/// What to do with the outcome of one physical attempt.
#[derive(Debug, PartialEq)]
pub(crate) enum Decision {
    Deliver(ApiResponse),
    Refresh,
    Expire,
    Fail(Error),
}

/// Classify one attempt's outcome. Pure: no I/O, no session access.
pub(crate) fn decide(attempt: &RequestAttempt, outcome: Result<ApiResponse, Error>) -> Decision {
    let response = match outcome {
        Ok(response) => response,
        Err(e) => return Decision::Fail(e),
    };

    if response.status.is_success() {
        return Decision::Deliver(response);
    }
    if response.status == StatusCode::UNAUTHORIZED && !attempt.anonymous {
        return if attempt.retried {
            Decision::Expire
        } else {
            Decision::Refresh
        };
    }
    Decision::Fail(normalize(&response))
}

/// Turns a non-success response into [`Error::RequestFailed`] with the most
/// specific message the body offers.
pub(crate) fn normalize(response: &ApiResponse) -> Error {
    let status = response.status.as_u16();
    let body = response.json_body();
    let message = body
        .as_ref()
        .and_then(|b| {
            b.get("message")
                .or_else(|| b.get("detail"))
                .and_then(|m| m.as_str())
        })
        .filter(|m| !m.trim().is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Request failed with status code {status}"));
    Error::RequestFailed { status, message }
}

/// Runs requests through the transport and applies the refresh-then-retry
/// budget.
pub(crate) struct RetryPolicy {
    transport: Arc<dyn TransportDyn>,
    session: SessionStore,
    refresh: RefreshCoordinator,
}

impl RetryPolicy {
    pub(crate) fn new(transport: Arc<dyn TransportDyn>, session: SessionStore) -> Self {
        let refresh = RefreshCoordinator::new(Arc::clone(&transport), session.clone());
        Self {
            transport,
            session,
            refresh,
        }
    }

    pub(crate) fn coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Send `attempt`, recovering from one expired-session response.
    ///
    /// Order is strict: original attempt, then at most one refresh, then at
    /// most one retry, then the terminal result.
    pub(crate) async fn execute(&self, mut attempt: RequestAttempt) -> Result<ApiResponse, Error> {
        let mut credential = if attempt.anonymous {
            None
        } else {
            self.session.credential()
        };

        loop {
            let outgoing =
                interceptor::prepare(&attempt.request, credential.as_ref(), attempt.retried);
            tracing::debug!(
                method = %outgoing.method,
                path = %outgoing.path,
                retried = attempt.retried,
                "Sending request"
            );
            let outcome = self.transport.send_dyn(outgoing).await;

            match decide(&attempt, outcome) {
                Decision::Deliver(response) => return Ok(response),
                Decision::Fail(e) => return Err(e),
                Decision::Expire => {
                    tracing::warn!(
                        path = %attempt.request.path,
                        "Still unauthorized after refresh, ending session"
                    );
                    self.session.clear();
                    return Err(Error::SessionExpired);
                }
                Decision::Refresh => {
                    credential = Some(self.recover(credential.as_ref()).await?);
                    attempt = attempt.into_retry();
                }
            }
        }
    }

    /// The credential to retry with after a 401 on `used`.
    ///
    /// If another request already replaced the credential while this one was
    /// in flight, the stored one is reused instead of starting a new cycle.
    async fn recover(&self, used: Option<&Credential>) -> Result<Credential, Error> {
        if let Some(current) = self.session.credential() {
            let stale = used.is_none_or(|u| u.access_token != current.access_token);
            if stale {
                tracing::debug!("Retrying with credential refreshed by another request");
                return Ok(current);
            }
        }
        self.refresh.refresh().await
    }
}
