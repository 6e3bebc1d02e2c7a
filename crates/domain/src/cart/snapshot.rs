use std::collections::BTreeMap;

use common::{CartId, CartItemId, ComboGroupId, Money, VariantId};
use serde::{Deserialize, Serialize};

use super::{CartItem, CartWarning};

/// Full state of a cart as reported by the store.
///
/// Derived fields (`item_count`, `subtotal`) are authoritative as read and are
/// never recomputed by callers; [`CartSnapshot::from_items`] exists for
/// producers of snapshots such as the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Absent until the first item is added.
    #[serde(default)]
    pub cart_id: Option<CartId>,

    #[serde(default)]
    pub items: Vec<CartItem>,

    /// Total units across all rows.
    #[serde(default)]
    pub item_count: u32,

    #[serde(rename = "subtotal_cents", default)]
    pub subtotal: Money,
}

impl CartSnapshot {
    /// An empty cart with no store-side identity.
    pub fn empty() -> Self {
        Self {
            cart_id: None,
            items: Vec::new(),
            item_count: 0,
            subtotal: Money::zero(),
        }
    }

    /// Builds a snapshot and computes its derived totals from the rows.
    pub fn from_items(cart_id: Option<CartId>, items: Vec<CartItem>) -> Self {
        let item_count = items.iter().map(|i| i.quantity).sum();
        let subtotal = items.iter().map(CartItem::line_total).sum();
        Self {
            cart_id,
            items,
            item_count,
            subtotal,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of rows (not units) in the cart.
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    pub fn find_item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Finds the plain (non-combo) row for a variant.
    pub fn find_variant_line(&self, variant_id: VariantId) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|i| i.variant_id == variant_id && !i.is_combo_row())
    }

    /// Returns the rows belonging to one combo group.
    pub fn group_items(&self, group_id: ComboGroupId) -> Vec<&CartItem> {
        self.items
            .iter()
            .filter(|i| i.combo_group_id() == Some(group_id))
            .collect()
    }

    /// Rows grouped by combo group id, in id order.
    pub fn combo_groups(&self) -> BTreeMap<ComboGroupId, Vec<&CartItem>> {
        let mut groups: BTreeMap<ComboGroupId, Vec<&CartItem>> = BTreeMap::new();
        for item in &self.items {
            if let Some(group_id) = item.combo_group_id() {
                groups.entry(group_id).or_default().push(item);
            }
        }
        groups
    }

    /// One warning per row whose live price differs from its snapshot price.
    pub fn price_drift_warnings(&self) -> Vec<CartWarning> {
        self.items
            .iter()
            .filter(|i| i.has_price_drift())
            .map(|i| CartWarning::PriceChanged {
                variant_id: i.variant_id,
                product_name: i.product_name.clone(),
                was: i.price_snapshot,
                now: i.current_price,
            })
            .collect()
    }
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
