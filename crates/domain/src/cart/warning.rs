use common::{ComboGroupId, Money, VariantId};
use serde::{Deserialize, Serialize};

/// A user-facing notice attached to a successful cart result.
///
/// Warnings never turn a success into a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartWarning {
    /// Live price differs from the price captured at add-time.
    PriceChanged {
        variant_id: VariantId,
        product_name: String,
        was: Money,
        now: Money,
    },

    /// Guest lines folded into the signed-in cart.
    ItemsMerged { count: u32 },

    /// Merged lines whose quantity was reduced to available stock.
    ItemsClamped { count: u32 },

    /// Guest lines dropped during a merge because they were out of stock.
    ItemsDropped { count: u32 },

    /// Reread after adding a combo did not show one row per constituent.
    BundleIncomplete {
        combo_group_id: ComboGroupId,
        expected: usize,
        found: usize,
    },
}

impl std::fmt::Display for CartWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartWarning::PriceChanged {
                product_name,
                was,
                now,
                ..
            } => write!(f, "Price of {product_name} changed from {was} to {now}"),
            CartWarning::ItemsMerged { count } => write!(f, "{count} items merged"),
            CartWarning::ItemsClamped { count } => write!(
                f,
                "{count} items quantity-adjusted due to stock limits"
            ),
            CartWarning::ItemsDropped { count } => {
                write!(f, "{count} items removed because they are out of stock")
            }
            CartWarning::BundleIncomplete {
                expected, found, ..
            } => write!(
                f,
                "Bundle was added with {found} of {expected} items, please review your cart"
            ),
        }
    }
}
