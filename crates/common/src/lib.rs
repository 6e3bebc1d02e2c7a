//! Shared types for the cart engine crates.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{
    CartId, CartItemId, ComboGroupId, ComboId, GuestToken, GuestTokenError, UserId, VariantId,
};
