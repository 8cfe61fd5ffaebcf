//! Federation authentication filter: the HTTP boundary.
//!
//! An axum middleware layer that runs [`evaluate`](super::evaluate) against
//! each request. Admitted requests continue down the chain exactly once with
//! their [`SecurityContext`](super::SecurityContext) attached as a request
//! extension; rejected requests get one generic `401` and the chain never
//! runs. Rejection reasons are logged, never sent to the caller.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

use super::{Admission, TokenAuthority, evaluate};

/// Shared state for the federation middleware.
pub struct FederationState {
    authority: Arc<dyn TokenAuthority>,
}

impl FederationState {
    /// Wrap the authority the filter delegates signature checks to.
    #[must_use]
    pub fn new(authority: Arc<dyn TokenAuthority>) -> Self {
        Self { authority }
    }
}

/// Per-request federation gate.
///
/// Mount with `axum::middleware::from_fn_with_state`.
pub async fn federation_middleware(
    State(state): State<Arc<FederationState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let target_url = request_target_url(&request);

    match evaluate(
        authorization.as_deref(),
        &target_url,
        state.authority.as_ref(),
        now_millis(),
    )
    .await
    {
        Admission::Admitted(context) => {
            debug!(principal = %context.primary(), target = %target_url, "Request admitted");
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Admission::Rejected(reason) => {
            warn!(reason = reason.as_str(), target = %target_url, "Request rejected");
            unauthorized_response()
        }
    }
}

/// Reconstruct the request's full target URL for audience matching.
///
/// Clients normally send an origin-form request target, so the authority
/// comes from the `Host` header; an absolute-form target is kept as-is.
fn request_target_url(request: &Request<Body>) -> String {
    let uri = request.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    format!("http://{host}{uri}")
}

fn now_millis() -> i64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}

/// The one response every rejection collapses into.
fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "error": "unauthorized" })),
    )
        .into_response()
}
