//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart_store::RejectionCode;
use engine::{CartError, ErrorKind};

const TRY_AGAIN: &str = "Something went wrong, please try again";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request body or path.
    BadRequest(String),
    /// Cart operation error.
    Cart(CartError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Cart(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::AuthRequired => StatusCode::UNAUTHORIZED,
                ErrorKind::Rejected => rejection_status(err),
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

fn rejection_status(err: &CartError) -> StatusCode {
    match err {
        CartError::Rejected { code, .. } if code.is_not_found() => StatusCode::NOT_FOUND,
        CartError::Rejected {
            code: RejectionCode::InvalidCombo,
            ..
        } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            ApiError::BadRequest(msg) => (RejectionCode::ValidationFailed.as_str(), msg.clone()),
            ApiError::Cart(err) => match err.kind() {
                // Infrastructure details stay in the logs.
                ErrorKind::Unavailable | ErrorKind::Internal => {
                    tracing::error!(error = %err, "cart operation failed");
                    (err.code(), TRY_AGAIN.to_string())
                }
                _ => (err.code(), err.to_string()),
            },
        };

        let body = serde_json::json!({
            "success": false,
            "code": code,
            "message": message,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (CartError::validation("missing variant_id"), StatusCode::BAD_REQUEST),
            (CartError::AuthRequired, StatusCode::UNAUTHORIZED),
            (
                CartError::rejected(RejectionCode::ItemNotFound, "gone"),
                StatusCode::NOT_FOUND,
            ),
            (
                CartError::rejected(RejectionCode::InsufficientStock, "only 2"),
                StatusCode::CONFLICT,
            ),
            (
                CartError::rejected(RejectionCode::InvalidCombo, "no savings"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CartError::Unavailable("reset".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
