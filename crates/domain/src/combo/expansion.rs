use common::{ComboGroupId, Money, VariantId};

use super::{Combo, split_combo_price};
use crate::cart::{CartItem, ComboMembership};
use crate::error::ComboError;

/// One cart row to be materialized for a combo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedLine {
    pub variant_id: VariantId,
    pub product_name: String,
    pub quantity: u32,
    /// Discounted unit price.
    pub unit_price: Money,
    pub membership: ComboMembership,
}

impl ExpandedLine {
    pub fn into_cart_item(self) -> CartItem {
        CartItem::new(
            self.variant_id,
            self.product_name,
            self.quantity,
            self.unit_price,
        )
        .with_combo(self.membership)
    }
}

/// Expands `bundles` copies of a combo into one line per constituent.
///
/// All lines share `group_id` and the combo's id. Quantities are the
/// constituent quantity times `bundles`; prices come from
/// [`split_combo_price`].
pub fn expand_combo(
    combo: &Combo,
    group_id: ComboGroupId,
    bundles: u32,
) -> Result<Vec<ExpandedLine>, ComboError> {
    if bundles == 0 {
        return Err(ComboError::InvalidBundleQuantity);
    }

    let membership = ComboMembership {
        combo_id: combo.id,
        combo_group_id: group_id,
    };

    Ok(split_combo_price(&combo.constituents, combo.price)?
        .into_iter()
        .map(|p| ExpandedLine {
            variant_id: p.variant_id,
            product_name: p.product_name,
            quantity: p.quantity.saturating_mul(bundles),
            unit_price: p.unit_price,
            membership,
        })
        .collect())
}
