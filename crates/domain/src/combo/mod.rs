//! Combo (bundle) products and the logic that turns them into cart rows.
//!
//! A combo is a virtual product made of 2 to 10 constituent variants sold
//! at a strict discount. Adding one to a cart materializes one row per
//! constituent, all sharing a fresh [`ComboGroupId`](common::ComboGroupId).

mod availability;
mod definition;
mod expansion;
mod pricing;

pub use availability::{ComboAvailability, ConstituentStock, UnavailableReason};
pub use definition::{Combo, ComboConstituent, ComboDraft};
pub use expansion::{ExpandedLine, expand_combo};
pub use pricing::{ConstituentPrice, split_combo_price};

/// Minimum number of constituent variants in a combo.
pub const MIN_CONSTITUENTS: usize = 2;

/// Maximum number of constituent variants in a combo.
pub const MAX_CONSTITUENTS: usize = 10;
