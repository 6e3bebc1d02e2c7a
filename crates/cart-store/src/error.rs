use domain::UnavailableReason;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable reason a store procedure rejected a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RejectionCode {
    AuthRequired,
    ValidationFailed,
    VariantNotFound,
    ItemNotFound,
    InsufficientStock,
    ComboNotFound,
    ComboInactive,
    ComboSoldOut,
    ComboOutOfStock,
    InvalidCombo,
    /// A code this crate does not know about yet.
    Other(String),
}

impl RejectionCode {
    pub fn as_str(&self) -> &str {
        match self {
            RejectionCode::AuthRequired => "AUTH_REQUIRED",
            RejectionCode::ValidationFailed => "VALIDATION_FAILED",
            RejectionCode::VariantNotFound => "VARIANT_NOT_FOUND",
            RejectionCode::ItemNotFound => "ITEM_NOT_FOUND",
            RejectionCode::InsufficientStock => "INSUFFICIENT_STOCK",
            RejectionCode::ComboNotFound => "COMBO_NOT_FOUND",
            RejectionCode::ComboInactive => "COMBO_INACTIVE",
            RejectionCode::ComboSoldOut => "COMBO_SOLD_OUT",
            RejectionCode::ComboOutOfStock => "COMBO_OUT_OF_STOCK",
            RejectionCode::InvalidCombo => "INVALID_COMBO",
            RejectionCode::Other(code) => code,
        }
    }

    /// True for codes meaning the referenced thing does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RejectionCode::VariantNotFound
                | RejectionCode::ItemNotFound
                | RejectionCode::ComboNotFound
        )
    }
}

impl From<&str> for RejectionCode {
    fn from(code: &str) -> Self {
        match code {
            "AUTH_REQUIRED" => RejectionCode::AuthRequired,
            "VALIDATION_FAILED" => RejectionCode::ValidationFailed,
            "VARIANT_NOT_FOUND" => RejectionCode::VariantNotFound,
            "ITEM_NOT_FOUND" => RejectionCode::ItemNotFound,
            "INSUFFICIENT_STOCK" => RejectionCode::InsufficientStock,
            "COMBO_NOT_FOUND" => RejectionCode::ComboNotFound,
            "COMBO_INACTIVE" => RejectionCode::ComboInactive,
            "COMBO_SOLD_OUT" => RejectionCode::ComboSoldOut,
            "COMBO_OUT_OF_STOCK" => RejectionCode::ComboOutOfStock,
            "INVALID_COMBO" => RejectionCode::InvalidCombo,
            other => RejectionCode::Other(other.to_string()),
        }
    }
}

impl From<String> for RejectionCode {
    fn from(code: String) -> Self {
        RejectionCode::from(code.as_str())
    }
}

impl From<RejectionCode> for String {
    fn from(code: RejectionCode) -> Self {
        code.as_str().to_string()
    }
}

impl From<&UnavailableReason> for RejectionCode {
    fn from(reason: &UnavailableReason) -> Self {
        match reason {
            UnavailableReason::Inactive => RejectionCode::ComboInactive,
            UnavailableReason::SoldOut { .. } => RejectionCode::ComboSoldOut,
            UnavailableReason::OutOfStock { .. } => RejectionCode::ComboOutOfStock,
        }
    }
}

impl std::fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur when calling the cart store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store unreachable: {0}")]
    Transport(String),

    /// A call did not complete in time.
    #[error("Store call '{procedure}' timed out")]
    Timeout { procedure: &'static str },

    /// The procedure ran and refused the request.
    #[error("{code}: {message}")]
    Rejected {
        code: RejectionCode,
        message: String,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The procedure answered with an envelope that breaks the contract.
    #[error("Malformed envelope from '{procedure}': {reason}")]
    MalformedEnvelope {
        procedure: &'static str,
        reason: String,
    },
}

impl StoreError {
    pub fn rejected(code: RejectionCode, message: impl Into<String>) -> Self {
        StoreError::Rejected {
            code,
            message: message.into(),
        }
    }

    /// True for network-level failures that are safe to retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(_) | StoreError::Timeout { .. } => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            StoreError::Rejected { .. }
            | StoreError::Serialization(_)
            | StoreError::MalformedEnvelope { .. } => false,
        }
    }

    pub fn rejection_code(&self) -> Option<&RejectionCode> {
        match self {
            StoreError::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Result type for cart store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips_known_and_unknown_values() {
        assert_eq!(
            RejectionCode::from("INSUFFICIENT_STOCK"),
            RejectionCode::InsufficientStock
        );
        let other = RejectionCode::from("CART_LOCKED");
        assert_eq!(other, RejectionCode::Other("CART_LOCKED".to_string()));
        assert_eq!(other.as_str(), "CART_LOCKED");
    }

    #[test]
    fn code_serializes_as_string() {
        let json = serde_json::to_string(&RejectionCode::ComboSoldOut).unwrap();
        assert_eq!(json, "\"COMBO_SOLD_OUT\"");
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::Transport("connection reset".into()).is_transient());
        assert!(StoreError::Timeout { procedure: "get_cart" }.is_transient());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!StoreError::rejected(RejectionCode::ItemNotFound, "gone").is_transient());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_transient());
    }
}
