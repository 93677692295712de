//! Single-flight token refresh.
//!
//! The first caller that needs a new credential starts a refresh cycle: one
//! `POST /refresh` through the transport, wrapped in a [`Shared`] future and
//! parked in the coordinator's slot. Every caller arriving while the slot is
//! occupied awaits that same future, so a cycle issues exactly one network
//! call and all of its waiters observe the same outcome.
//!
//! The cycle writes its outcome to the [`SessionStore`] (new credential, or a
//! cleared session) and empties the slot *before* its future resolves. A
//! request issued after the cycle settles therefore sees the new token on its
//! first attempt, and the next expired-session event starts a fresh cycle.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use parking_lot::Mutex;

use crate::error::Error;
use crate::session::SessionStore;
use crate::transport::{ApiRequest, TransportDyn};
use crate::types::{Credential, Payload, RefreshRequest, TokenResponse};

pub(crate) const REFRESH_PATH: &str = "/refresh";

type RefreshOutcome = Shared<BoxFuture<'static, Result<Credential, Error>>>;

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

struct PendingRefresh {
    cycle: u64,
    outcome: RefreshOutcome,
}

#[derive(Default)]
struct Slot {
    cycles_started: u64,
    pending: Option<PendingRefresh>,
}

pub(crate) struct RefreshCoordinator {
    transport: Arc<dyn TransportDyn>,
    session: SessionStore,
    slot: Arc<Mutex<Slot>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(transport: Arc<dyn TransportDyn>, session: SessionStore) -> Self {
        Self {
            transport,
            session,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Obtain a fresh credential, joining the in-flight cycle if there is one.
    ///
    /// Any failure (no refresh token, rejected refresh, transport error or
    /// timeout) clears the session and yields [`Error::SessionExpired`] to
    /// every waiter of the cycle.
    pub(crate) async fn refresh(&self) -> Result<Credential, Error> {
        let outcome = {
            let mut slot = self.slot.lock();
            let joined = slot
                .pending
                .as_ref()
                .map(|pending| (pending.cycle, pending.outcome.clone()));
            match joined {
                Some((cycle, outcome)) => {
                    tracing::debug!(cycle, "Joining in-flight token refresh");
                    outcome
                }
                None => {
                    slot.cycles_started += 1;
                    let cycle = slot.cycles_started;
                    tracing::debug!(cycle, "Starting token refresh");
                    let outcome = run_cycle(
                        cycle,
                        Arc::clone(&self.transport),
                        self.session.clone(),
                        Arc::clone(&self.slot),
                    )
                    .boxed()
                    .shared();
                    slot.pending = Some(PendingRefresh {
                        cycle,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };
        outcome.await
    }

    pub(crate) fn state(&self) -> RefreshState {
        if self.slot.lock().pending.is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Number of refresh cycles started so far.
    pub(crate) fn cycles_started(&self) -> u64 {
        self.slot.lock().cycles_started
    }
}

async fn run_cycle(
    cycle: u64,
    transport: Arc<dyn TransportDyn>,
    session: SessionStore,
    slot: Arc<Mutex<Slot>>,
) -> Result<Credential, Error> {
    let outcome = exchange(&*transport, &session).await;

    match &outcome {
        Ok(credential) => {
            if let Err(e) = session.set_credential(credential.clone()) {
                tracing::warn!(cycle, error = %e, "Refreshed credential kept in memory only");
            }
            tracing::info!(cycle, "Access token refreshed");
        }
        Err(e) => {
            tracing::warn!(cycle, error = %e, "Token refresh failed, clearing session");
            session.clear();
        }
    }

    let mut slot = slot.lock();
    if slot.pending.as_ref().is_some_and(|p| p.cycle == cycle) {
        slot.pending = None;
    }
    drop(slot);

    outcome.map_err(|_| Error::SessionExpired)
}

/// Trades the stored refresh token for a new credential.
async fn exchange(transport: &dyn TransportDyn, session: &SessionStore) -> Result<Credential, Error> {
    let refresh_token = session
        .credential()
        .and_then(|c| c.refresh_token)
        .ok_or(Error::SessionExpired)?;

    let body = serde_json::to_value(RefreshRequest {
        refresh_token: &refresh_token,
    })?;
    let request = ApiRequest::new(Method::POST, REFRESH_PATH)
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_body(body);

    let response = transport.send_dyn(request).await?;
    if !response.status.is_success() {
        return Err(Error::RequestFailed {
            status: response.status.as_u16(),
            message: "refresh rejected".into(),
        });
    }

    let token = response.decode::<Payload<TokenResponse>>()?.into_data()?;
    Ok(Credential {
        access_token: token.access_token,
        refresh_token: token.refresh_token.or(Some(refresh_token)),
    })
}
