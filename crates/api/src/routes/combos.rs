//! Combo creation and availability.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use cart_store::CartStore;
use common::ComboId;
use domain::{Combo, ComboAvailability, ComboDraft};
use engine::CartError;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ComboCreatedResponse {
    pub success: bool,
    pub combo: Combo,
    pub savings_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub success: bool,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub availability: ComboAvailability,
}

/// POST /combos — creates a combo; signed-in callers only.
#[tracing::instrument(skip_all)]
pub async fn create<S: CartStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<ComboDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<ComboCreatedResponse>), ApiError> {
    let Json(draft) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let session = state.session(&headers).await?;
    if !session.identity().is_authenticated() {
        return Err(CartError::AuthRequired.into());
    }

    let combo = state.client.create_combo(&draft).await?;
    tracing::info!(combo_id = %combo.id, savings = %combo.savings(), "combo created");
    Ok((
        StatusCode::CREATED,
        Json(ComboCreatedResponse {
            success: true,
            savings_cents: combo.savings().cents(),
            combo,
        }),
    ))
}

/// GET /combos/{id}/availability
#[tracing::instrument(skip(state))]
pub async fn availability<S: CartStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let combo_id =
        ComboId::parse(&id).map_err(|e| ApiError::BadRequest(format!("Invalid combo id: {e}")))?;

    let availability = state.client.combo_availability(combo_id).await?;
    let reason = availability.evaluate().err().map(|r| r.to_string());
    Ok(Json(AvailabilityResponse {
        success: true,
        available: reason.is_none(),
        reason,
        availability,
    }))
}
