use common::{Money, VariantId};
use serde::{Deserialize, Serialize};

use super::ComboConstituent;
use crate::error::ComboError;

/// Discounted price of one constituent inside a combo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituentPrice {
    pub variant_id: VariantId,
    pub product_name: String,
    pub quantity: u32,
    /// Normal unit price before the combo discount.
    pub normal_price: Money,
    /// Unit price after scaling by the combo ratio.
    pub unit_price: Money,
}

impl ConstituentPrice {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Splits `combo_price` across constituents in proportion to their normal prices.
///
/// Every unit price is scaled by the single ratio
/// `combo_price / Σ(unit_price × quantity)` and rounded half-up on its own,
/// so the relative proportion between constituents is preserved and the sum
/// of the discounted lines lands within one cent per constituent unit of
/// `combo_price`.
pub fn split_combo_price(
    constituents: &[ComboConstituent],
    combo_price: Money,
) -> Result<Vec<ConstituentPrice>, ComboError> {
    if constituents.is_empty() {
        return Err(ComboError::ConstituentCount { count: 0 });
    }
    if !combo_price.is_positive() {
        return Err(ComboError::InvalidComboPrice { price: combo_price });
    }
    if let Some(bad) = constituents.iter().find(|c| !c.unit_price.is_positive()) {
        return Err(ComboError::InvalidConstituentPrice {
            variant_id: bad.variant_id,
            price: bad.unit_price,
        });
    }
    if let Some(bad) = constituents.iter().find(|c| c.quantity == 0) {
        return Err(ComboError::InvalidConstituentQuantity {
            variant_id: bad.variant_id,
        });
    }

    let original_total: Money = constituents.iter().map(ComboConstituent::line_total).sum();

    constituents
        .iter()
        .map(|c| {
            let unit_price = c
                .unit_price
                .scale(combo_price.cents(), original_total.cents())
                .ok_or(ComboError::InvalidComboPrice { price: combo_price })?;
            Ok(ConstituentPrice {
                variant_id: c.variant_id,
                product_name: c.product_name.clone(),
                quantity: c.quantity,
                normal_price: c.unit_price,
                unit_price,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constituent(price: i64, quantity: u32) -> ComboConstituent {
        ComboConstituent::new(VariantId::new(), "Item", Money::from_cents(price), quantity)
    }

    fn total(split: &[ConstituentPrice]) -> i64 {
        split.iter().map(|p| p.line_total().cents()).sum()
    }

    #[test]
    fn splits_proportionally() {
        let split = split_combo_price(
            &[constituent(300, 1), constituent(700, 1)],
            Money::from_cents(800),
        )
        .unwrap();

        assert_eq!(split[0].unit_price.cents(), 240);
        assert_eq!(split[1].unit_price.cents(), 560);
        assert_eq!(total(&split), 800);
    }

    #[test]
    fn rounding_stays_within_one_cent_per_constituent() {
        let constituents = [constituent(333, 1), constituent(333, 1), constituent(334, 1)];
        let split = split_combo_price(&constituents, Money::from_cents(500)).unwrap();

        let diff = (total(&split) - 500).abs();
        assert!(diff <= constituents.len() as i64, "diff {diff} too large");
    }

    #[test]
    fn preserves_price_ratio_between_constituents() {
        let split = split_combo_price(
            &[constituent(1000, 1), constituent(2000, 1), constituent(4000, 1)],
            Money::from_cents(5600),
        )
        .unwrap();

        assert_eq!(split[0].unit_price.cents(), 800);
        assert_eq!(split[1].unit_price.cents(), 1600);
        assert_eq!(split[2].unit_price.cents(), 3200);
    }

    #[test]
    fn quantities_weight_the_ratio() {
        // Σ = 2×250 + 1×500 = 1000, ratio 0.9
        let split = split_combo_price(
            &[constituent(250, 2), constituent(500, 1)],
            Money::from_cents(900),
        )
        .unwrap();

        assert_eq!(split[0].unit_price.cents(), 225);
        assert_eq!(split[1].unit_price.cents(), 450);
        assert_eq!(total(&split), 900);
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert_eq!(
            split_combo_price(&[], Money::from_cents(100)),
            Err(ComboError::ConstituentCount { count: 0 })
        );
        assert!(matches!(
            split_combo_price(&[constituent(100, 1)], Money::zero()),
            Err(ComboError::InvalidComboPrice { .. })
        ));
        assert!(matches!(
            split_combo_price(&[constituent(0, 1)], Money::from_cents(10)),
            Err(ComboError::InvalidConstituentPrice { .. })
        ));
    }
}
