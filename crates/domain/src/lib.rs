//! Domain model for the cart engine.
//!
//! This crate provides the pure, I/O-free parts of the engine:
//! - Session identity (authenticated user or guest token)
//! - Cart rows, cart snapshots and price-drift warnings
//! - Merge results reported when a guest cart is folded into a user cart
//! - Combo (bundle) definitions, creation-time validation, proportional
//!   pricing, availability and expansion into cart rows

pub mod cart;
pub mod combo;
pub mod error;
pub mod identity;

pub use cart::{CartItem, CartSnapshot, CartWarning, ComboMembership, MergeResult};
pub use combo::{
    Combo, ComboAvailability, ComboConstituent, ComboDraft, ConstituentPrice, ConstituentStock,
    ExpandedLine, UnavailableReason, expand_combo, split_combo_price,
};
pub use error::ComboError;
pub use identity::SessionIdentity;

pub use common::{
    CartId, CartItemId, ComboGroupId, ComboId, GuestToken, GuestTokenError, Money, UserId,
    VariantId,
};
