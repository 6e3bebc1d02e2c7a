use chrono::{DateTime, Utc};
use common::{CartItemId, ComboGroupId, ComboId, Money, VariantId};
use serde::{Deserialize, Serialize};

/// Links a cart row to the combo instance that produced it.
///
/// Present if and only if the row came from bundle expansion, so the
/// combo id and group id can never appear one without the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComboMembership {
    pub combo_id: ComboId,
    pub combo_group_id: ComboGroupId,
}

/// A single row in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Store-assigned row id.
    pub id: CartItemId,

    /// The purchasable variant this row references.
    pub variant_id: VariantId,

    /// Display name of the product.
    pub product_name: String,

    /// Units of the variant in this row.
    pub quantity: u32,

    /// Unit price captured when the row was added.
    #[serde(rename = "price_snapshot_cents")]
    pub price_snapshot: Money,

    /// Live unit price at the time the cart was read.
    #[serde(rename = "current_price_cents")]
    pub current_price: Money,

    #[serde(flatten)]
    pub combo: Option<ComboMembership>,

    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Creates a plain (non-combo) row priced at `price`.
    pub fn new(
        variant_id: VariantId,
        product_name: impl Into<String>,
        quantity: u32,
        price: Money,
    ) -> Self {
        Self {
            id: CartItemId::new(),
            variant_id,
            product_name: product_name.into(),
            quantity,
            price_snapshot: price,
            current_price: price,
            combo: None,
            added_at: Utc::now(),
        }
    }

    /// Marks the row as belonging to a combo group.
    pub fn with_combo(mut self, membership: ComboMembership) -> Self {
        self.combo = Some(membership);
        self
    }

    /// Returns the line total at the snapshot price.
    pub fn line_total(&self) -> Money {
        self.price_snapshot.multiply(self.quantity)
    }

    /// Returns true when the live price differs from the snapshot.
    pub fn has_price_drift(&self) -> bool {
        self.price_snapshot != self.current_price
    }

    pub fn is_combo_row(&self) -> bool {
        self.combo.is_some()
    }

    pub fn combo_group_id(&self) -> Option<ComboGroupId> {
        self.combo.map(|c| c.combo_group_id)
    }

    pub fn combo_id(&self) -> Option<ComboId> {
        self.combo.map(|c| c.combo_id)
    }
}
