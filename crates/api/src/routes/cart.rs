//! The action-dispatched cart endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use cart_store::CartStore;
use common::{CartItemId, ComboGroupId, ComboId, VariantId};
use domain::{CartSnapshot, SessionIdentity};
use engine::{CartError, CartOutcome};
use serde::{Deserialize, Serialize};

use super::{WarningBody, warning_bodies};
use crate::AppState;
use crate::error::ApiError;
use crate::session::apply_cookie;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartAction {
    Get,
    Add,
    Update,
    Remove,
    Clear,
    AddCombo,
    RemoveCombo,
    UpdateCombo,
}

impl CartAction {
    fn is_write(self) -> bool {
        self != CartAction::Get
    }
}

#[derive(Debug, Deserialize)]
pub struct CartRequest {
    pub action: CartAction,
    pub variant_id: Option<VariantId>,
    /// Alternative to `variant_id` for `update` and `remove`.
    pub item_id: Option<CartItemId>,
    pub quantity: Option<u32>,
    pub combo_id: Option<ComboId>,
    pub combo_group_id: Option<ComboGroupId>,
    /// Folds the request's guest cart into the signed-in cart first.
    #[serde(default)]
    pub merge_guest_cart: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct CartResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart: Option<CartSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<WarningBody>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub partial_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combo_group_id: Option<ComboGroupId>,
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, CartError> {
    value.ok_or_else(|| CartError::validation(format!("{field} is required for this action")))
}

async fn perform<S: CartStore + Clone + 'static>(
    state: &AppState<S>,
    owner: &SessionIdentity,
    req: &CartRequest,
) -> Result<(CartOutcome, Option<ComboGroupId>), CartError> {
    let client = &state.client;
    let outcome = match req.action {
        CartAction::Get => CartOutcome::Confirmed(client.get(owner).await?),
        CartAction::Clear => CartOutcome::Confirmed(client.clear(owner).await?),
        CartAction::Add => {
            let variant_id = require(req.variant_id, "variant_id")?;
            let quantity = require(req.quantity, "quantity")?;
            client.add(owner, variant_id, quantity).await?
        }
        CartAction::Update => {
            let quantity = require(req.quantity, "quantity")?;
            match (req.variant_id, req.item_id) {
                (Some(variant_id), _) => client.update(owner, variant_id, quantity).await?,
                (None, Some(item_id)) => client.update_by_item_id(owner, item_id, quantity).await?,
                (None, None) => {
                    return Err(CartError::validation("variant_id or item_id is required"));
                }
            }
        }
        CartAction::Remove => match (req.variant_id, req.item_id) {
            (Some(variant_id), _) => client.remove(owner, variant_id).await?,
            (None, Some(item_id)) => client.remove_by_item_id(owner, item_id).await?,
            (None, None) => {
                return Err(CartError::validation("variant_id or item_id is required"));
            }
        },
        CartAction::AddCombo => {
            let combo_id = require(req.combo_id, "combo_id")?;
            let (group_id, outcome) = client.add_bundle(owner, combo_id).await?;
            return Ok((outcome, Some(group_id)));
        }
        CartAction::RemoveCombo => {
            let group_id = require(req.combo_group_id, "combo_group_id")?;
            client.remove_bundle(owner, group_id).await?
        }
        CartAction::UpdateCombo => {
            let group_id = require(req.combo_group_id, "combo_group_id")?;
            let quantity = require(req.quantity, "quantity")?;
            client
                .update_bundle_quantity(owner, group_id, quantity)
                .await?
        }
    };
    Ok((outcome, None))
}

/// POST /cart — runs one cart action for the request's identity.
#[tracing::instrument(skip_all)]
pub async fn dispatch<S: CartStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<CartRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut session = state.session(&headers).await?;
    tracing::debug!(action = ?req.action, identity = session.identity().kind(), "cart request");

    let mut warnings = Vec::new();
    if req.merge_guest_cart
        && let Some(user_id) = session.identity().user_id()
    {
        let merged = state.merger.on_sign_in(&mut session, user_id).await;
        warnings.extend(merged.warnings());
    }

    let owner = session.identity().clone();
    let (outcome, combo_group_id) = match perform(&state, &owner, &req).await {
        Ok(done) => done,
        // A merge that already ran still owes the client its cookie update.
        Err(e) => {
            return Ok(apply_cookie(
                ApiError::from(e).into_response(),
                &session,
                &state.guest_cookie,
            ));
        }
    };
    if req.action.is_write() {
        session.touch();
    }

    let (status, body) = match outcome {
        CartOutcome::Confirmed(view) => {
            warnings.extend(view.warnings);
            (
                StatusCode::OK,
                CartResponse {
                    success: true,
                    cart: Some(view.cart),
                    warnings: warning_bodies(warnings),
                    combo_group_id,
                    ..CartResponse::default()
                },
            )
        }
        CartOutcome::PartialSuccess { message } => (
            StatusCode::ACCEPTED,
            CartResponse {
                success: true,
                message: Some(message),
                warnings: warning_bodies(warnings),
                partial_success: true,
                combo_group_id,
                ..CartResponse::default()
            },
        ),
    };

    Ok(apply_cookie(
        (status, Json(body)).into_response(),
        &session,
        &state.guest_cookie,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_snake_case_actions() {
        let req: CartRequest =
            serde_json::from_str(r#"{"action":"update_combo","quantity":2}"#).unwrap();
        assert_eq!(req.action, CartAction::UpdateCombo);
        assert_eq!(req.quantity, Some(2));
        assert!(req.combo_group_id.is_none());
        assert!(!req.merge_guest_cart);
    }

    #[test]
    fn empty_fields_are_omitted_from_response() {
        let body = serde_json::to_value(CartResponse {
            success: true,
            ..CartResponse::default()
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "success": true }));
    }
}
