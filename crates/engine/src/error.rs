//! Cart error taxonomy.

use cart_store::{RejectionCode, StoreError};
use domain::{ComboError, UnavailableReason};
use thiserror::Error;

/// Broad class of a [`CartError`], used for HTTP mapping and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    AuthRequired,
    Rejected,
    Unavailable,
    Internal,
}

/// Errors surfaced by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// No identity could be resolved for the request.
    #[error("Authentication required")]
    AuthRequired,

    /// The store refused the request on business grounds.
    #[error("{message}")]
    Rejected {
        code: RejectionCode,
        message: String,
    },

    /// The store could not be reached, even after retries.
    #[error("Cart service unavailable: {0}")]
    Unavailable(String),

    /// Anything else: contract violations, decoding failures.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CartError {
    pub fn validation(message: impl Into<String>) -> Self {
        CartError::Validation(message.into())
    }

    pub fn rejected(code: RejectionCode, message: impl Into<String>) -> Self {
        CartError::Rejected {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::Validation(_) => ErrorKind::Validation,
            CartError::AuthRequired => ErrorKind::AuthRequired,
            CartError::Rejected { .. } => ErrorKind::Rejected,
            CartError::Unavailable(_) => ErrorKind::Unavailable,
            CartError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only infrastructure failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// Machine-readable code for responses.
    pub fn code(&self) -> &str {
        match self {
            CartError::Validation(_) => RejectionCode::ValidationFailed.as_str(),
            CartError::AuthRequired => RejectionCode::AuthRequired.as_str(),
            CartError::Rejected { code, .. } => code.as_str(),
            CartError::Unavailable(_) => "UNAVAILABLE",
            CartError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<StoreError> for CartError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            return CartError::Unavailable(err.to_string());
        }
        match err {
            StoreError::Rejected {
                code: RejectionCode::AuthRequired,
                ..
            } => CartError::AuthRequired,
            StoreError::Rejected {
                code: RejectionCode::ValidationFailed,
                message,
            } => CartError::Validation(message),
            StoreError::Rejected { code, message } => CartError::Rejected { code, message },
            other => CartError::Internal(other.to_string()),
        }
    }
}

impl From<ComboError> for CartError {
    fn from(err: ComboError) -> Self {
        CartError::rejected(RejectionCode::InvalidCombo, err.to_string())
    }
}

impl From<UnavailableReason> for CartError {
    fn from(reason: UnavailableReason) -> Self {
        CartError::rejected(RejectionCode::from(&reason), reason.to_string())
    }
}

/// Convenience type alias for cart results.
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_store_errors_become_unavailable() {
        let err = CartError::from(StoreError::Transport("reset".into()));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn business_rejections_keep_their_code() {
        let err = CartError::from(StoreError::rejected(
            RejectionCode::InsufficientStock,
            "Only 2 left",
        ));
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert_eq!(err.to_string(), "Only 2 left");
        assert!(!err.is_retryable());
    }

    #[test]
    fn store_validation_and_auth_codes_map_to_their_kinds() {
        let err = CartError::from(StoreError::rejected(RejectionCode::ValidationFailed, "bad"));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = CartError::from(StoreError::rejected(RejectionCode::AuthRequired, "who?"));
        assert_eq!(err.kind(), ErrorKind::AuthRequired);
    }

    #[test]
    fn malformed_envelope_is_internal() {
        let err = CartError::from(StoreError::MalformedEnvelope {
            procedure: "get_cart",
            reason: "success without data".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn sold_out_reason_maps_to_code() {
        let err = CartError::from(UnavailableReason::SoldOut { sold: 5, limit: 5 });
        assert_eq!(err.code(), "COMBO_SOLD_OUT");
    }
}
