//! Guest session start and the sign-in merge hook.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use cart_store::CartStore;
use common::GuestToken;
use domain::MergeResult;
use engine::{CartError, ErrorKind, SessionContext};
use serde::Serialize;

use super::{WarningBody, warning_bodies};
use crate::AppState;
use crate::error::ApiError;
use crate::session::apply_cookie;

#[derive(Debug, Serialize)]
pub struct GuestSessionResponse {
    pub success: bool,
    pub guest_token: GuestToken,
}

#[derive(Debug, Serialize)]
pub struct MergeResponse {
    pub success: bool,
    /// `merged`, `skipped`, `failed` or `timed_out`.
    pub merge: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MergeResult>,
    pub warnings: Vec<WarningBody>,
}

/// POST /session/guest — mints a guest token for a client that has none.
///
/// A client that already holds a valid token gets it back unchanged; a
/// malformed one is replaced.
pub async fn start_guest<S: CartStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = match state.session(&headers).await {
        Ok(session) if session.guest_token().is_some() => session,
        Ok(_) | Err(ApiError::Cart(CartError::AuthRequired)) => {
            metrics::counter!("guest_sessions_started_total").increment(1);
            SessionContext::start_guest()
        }
        Err(ApiError::Cart(e)) if e.kind() == ErrorKind::Validation => {
            tracing::debug!(error = %e, "replacing malformed guest token");
            metrics::counter!("guest_sessions_started_total").increment(1);
            SessionContext::start_guest()
        }
        Err(e) => return Err(e),
    };
    let Some(guest_token) = session.guest_token().cloned() else {
        return Err(CartError::Internal("guest session without token".to_string()).into());
    };

    let body = GuestSessionResponse {
        success: true,
        guest_token,
    };
    Ok(apply_cookie(
        (StatusCode::OK, Json(body)).into_response(),
        &session,
        &state.guest_cookie,
    ))
}

/// POST /session/merge — run once after sign-in.
///
/// Always succeeds for an authenticated caller: merge problems are reported
/// in the body and never fail the sign-in.
#[tracing::instrument(skip_all)]
pub async fn merge<S: CartStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let mut session = state.session(&headers).await?;
    let user_id = session
        .identity()
        .user_id()
        .ok_or(ApiError::Cart(CartError::AuthRequired))?;

    let outcome = state.merger.on_sign_in(&mut session, user_id).await;
    let body = MergeResponse {
        success: true,
        merge: outcome.as_str(),
        result: outcome.result(),
        warnings: warning_bodies(outcome.warnings()),
    };

    Ok(apply_cookie(
        (StatusCode::OK, Json(body)).into_response(),
        &session,
        &state.guest_cookie,
    ))
}
