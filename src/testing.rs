//! Scripted in-process server for exercising the client without a network.

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Barrier;

use crate::error::Error;
use crate::refresh::REFRESH_PATH;
use crate::transport::{ApiRequest, ApiResponse, Transport};

type Handler = Box<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    public: bool,
    handler: Handler,
}

struct ServerState {
    valid_token: String,
    issued: u32,
    refresh_calls: usize,
    requests: Vec<ApiRequest>,
    gated_remaining: usize,
}

/// Accepts exactly one access token at a time. Each successful `/refresh`
/// rotates it: `tok1` → `tok2` → `tok3` ...
///
/// Unknown authenticated paths answer `200` with an envelope echoing the
/// path, so every request has a distinguishable success body.
pub(crate) struct FakeServer {
    state: Mutex<ServerState>,
    routes: Vec<Route>,
    refresh_status: StatusCode,
    refresh_delay: Option<Duration>,
    refresh_timeout: bool,
    always_unauthorized: bool,
    gate: Option<Arc<Barrier>>,
}

impl FakeServer {
    pub(crate) fn new(valid_token: &str) -> Self {
        let issued = valid_token
            .strip_prefix("tok")
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);
        Self {
            state: Mutex::new(ServerState {
                valid_token: valid_token.to_owned(),
                issued,
                refresh_calls: 0,
                requests: Vec::new(),
                gated_remaining: 0,
            }),
            routes: Vec::new(),
            refresh_status: StatusCode::OK,
            refresh_delay: None,
            refresh_timeout: false,
            always_unauthorized: false,
            gate: None,
        }
    }

    /// Nothing is valid until the first refresh, which issues `tok2`.
    pub(crate) fn expired() -> Self {
        let server = Self::new("tok1");
        server.state.lock().valid_token.clear();
        server
    }

    pub(crate) fn with_refresh_status(mut self, status: StatusCode) -> Self {
        self.refresh_status = status;
        self
    }

    pub(crate) fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub(crate) fn with_refresh_timeout(mut self) -> Self {
        self.refresh_timeout = true;
        self
    }

    /// Reject every authenticated request, even with a freshly issued token.
    pub(crate) fn always_unauthorized(mut self) -> Self {
        self.always_unauthorized = true;
        self
    }

    /// Hold the first `n` rejections until all `n` have arrived, so they
    /// reach their callers in the same turn.
    pub(crate) fn with_rejection_gate(mut self, n: usize) -> Self {
        self.gate = Some(Arc::new(Barrier::new(n)));
        self.state.get_mut().gated_remaining = n;
        self
    }

    /// Later routes for the same method and path shadow earlier ones.
    pub(crate) fn with_route(
        mut self,
        method: Method,
        path: &str,
        handler: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    ) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_owned(),
            public: false,
            handler: Box::new(handler),
        });
        self
    }

    /// A route that needs no credential (login, register).
    pub(crate) fn with_public_route(
        mut self,
        method: Method,
        path: &str,
        handler: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    ) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_owned(),
            public: true,
            handler: Box::new(handler),
        });
        self
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.state.lock().refresh_calls
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().requests.clone()
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Bearer tokens carried by requests to `path`, in arrival order.
    pub(crate) fn tokens_sent_to(&self, path: &str) -> Vec<Option<String>> {
        self.requests_to(path)
            .iter()
            .map(|r| r.bearer_token().map(str::to_owned))
            .collect()
    }

    async fn refresh(&self) -> Result<ApiResponse, Error> {
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        if self.refresh_timeout {
            return Err(Error::Timeout);
        }
        if !self.refresh_status.is_success() {
            return Ok(ApiResponse::json(
                self.refresh_status,
                &json!({"detail": "Invalid refresh token"}),
            ));
        }
        let token = {
            let mut state = self.state.lock();
            state.issued += 1;
            state.valid_token = format!("tok{}", state.issued);
            state.valid_token.clone()
        };
        Ok(ApiResponse::json(
            StatusCode::OK,
            &json!({"access_token": token, "token_type": "bearer"}),
        ))
    }

    async fn reject(&self) -> Result<ApiResponse, Error> {
        let gated = {
            let mut state = self.state.lock();
            if state.gated_remaining > 0 {
                state.gated_remaining -= 1;
                true
            } else {
                false
            }
        };
        if let (true, Some(gate)) = (gated, &self.gate) {
            gate.wait().await;
        }
        Ok(ApiResponse::json(
            StatusCode::UNAUTHORIZED,
            &json!({"detail": "Could not validate credentials"}),
        ))
    }
}

impl Transport for FakeServer {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let authorized = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());
            !self.always_unauthorized && request.bearer_token() == Some(state.valid_token.as_str())
        };

        if request.path == REFRESH_PATH {
            {
                self.state.lock().refresh_calls += 1;
            }
            return self.refresh().await;
        }

        let route = self
            .routes
            .iter()
            .rev()
            .find(|r| r.method == request.method && r.path == request.path);

        match route {
            Some(route) if route.public || authorized => Ok((route.handler)(&request)),
            _ if !authorized => self.reject().await,
            _ => Ok(ApiResponse::json(
                StatusCode::OK,
                &json!({"success": true, "message": "ok", "data": {"path": request.path}}),
            )),
        }
    }
}
