//! Outbound decoration: default headers, the bearer credential, then caller
//! overrides, in that order of precedence.

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};

use crate::transport::ApiRequest;
use crate::types::Credential;

/// Builds the physical request for one attempt.
///
/// `request.headers` holds only the caller's overrides. On a first attempt
/// they are applied last, so they win over both the defaults and the
/// credential. On a retry after a refresh the refreshed credential is applied
/// after them, so the retry always carries the new bearer token.
pub(crate) fn prepare(
    request: &ApiRequest,
    credential: Option<&Credential>,
    retried: bool,
) -> ApiRequest {
    let mut headers = HeaderMap::with_capacity(request.headers.len() + 3);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let bearer = credential.and_then(bearer_header);
    if !retried {
        if let Some(value) = &bearer {
            headers.insert(AUTHORIZATION, value.clone());
        }
    }

    for name in request.headers.keys() {
        headers.remove(name);
    }
    for (name, value) in &request.headers {
        headers.append(name.clone(), value.clone());
    }

    if retried {
        if let Some(value) = bearer {
            headers.insert(AUTHORIZATION, value);
        }
    }

    ApiRequest {
        headers,
        ..request.clone()
    }
}

fn bearer_header(credential: &Credential) -> Option<HeaderValue> {
    match HeaderValue::from_str(&credential.bearer()) {
        Ok(mut value) => {
            value.set_sensitive(true);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Stored access token is not a valid header value, sending unauthenticated");
            None
        }
    }
}
