use domain::{CartSnapshot, CartWarning};
use serde::Serialize;

/// A confirmed cart state plus the notices to show alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub cart: CartSnapshot,
    pub warnings: Vec<CartWarning>,
}

impl CartView {
    pub fn new(cart: CartSnapshot) -> Self {
        Self {
            cart,
            warnings: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(CartSnapshot::empty())
    }

    pub fn with_warning(mut self, warning: CartWarning) -> Self {
        self.warnings.push(warning);
        self
    }
}

/// Result of a cart write.
///
/// `PartialSuccess` means the mutation was accepted but the confirming
/// re-read failed: callers should re-fetch, not repeat the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOutcome {
    Confirmed(CartView),
    PartialSuccess { message: String },
}

impl CartOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, CartOutcome::Confirmed(_))
    }

    pub fn view(&self) -> Option<&CartView> {
        match self {
            CartOutcome::Confirmed(view) => Some(view),
            CartOutcome::PartialSuccess { .. } => None,
        }
    }
}
