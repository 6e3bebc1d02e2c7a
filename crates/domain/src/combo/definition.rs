use std::collections::HashSet;

use common::{ComboId, Money, VariantId};
use serde::{Deserialize, Serialize};

use super::{MAX_CONSTITUENTS, MIN_CONSTITUENTS};
use crate::error::ComboError;

/// One variant inside a combo, priced at its normal (non-discounted) price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboConstituent {
    pub variant_id: VariantId,
    pub product_name: String,
    #[serde(rename = "unit_price_cents")]
    pub unit_price: Money,
    pub quantity: u32,
}

impl ComboConstituent {
    pub fn new(
        variant_id: VariantId,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            variant_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
        }
    }

    /// Normal price of this constituent at its combo quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

fn original_total(constituents: &[ComboConstituent]) -> Money {
    constituents.iter().map(ComboConstituent::line_total).sum()
}

/// A combo proposed for creation, validated before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboDraft {
    pub name: String,
    #[serde(rename = "combo_price_cents")]
    pub price: Money,
    pub constituents: Vec<ComboConstituent>,
    /// Optional ceiling on the number of combos that may be sold.
    #[serde(default)]
    pub sale_limit: Option<u32>,
}

impl ComboDraft {
    pub fn new(name: impl Into<String>, price: Money, constituents: Vec<ComboConstituent>) -> Self {
        Self {
            name: name.into(),
            price,
            constituents,
            sale_limit: None,
        }
    }

    pub fn with_sale_limit(mut self, limit: u32) -> Self {
        self.sale_limit = Some(limit);
        self
    }

    /// Sum of constituent price × quantity.
    pub fn original_total(&self) -> Money {
        original_total(&self.constituents)
    }

    /// `original_total - price`. Negative for a combo that would cost more than its parts.
    pub fn savings(&self) -> Money {
        self.original_total() - self.price
    }

    /// Checks every creation-time invariant of a combo.
    ///
    /// A combo that does not strictly discount its constituents is rejected
    /// here so that it can never reach a cart.
    pub fn validate(&self) -> Result<(), ComboError> {
        if self.name.trim().is_empty() {
            return Err(ComboError::NameRequired);
        }

        let count = self.constituents.len();
        if !(MIN_CONSTITUENTS..=MAX_CONSTITUENTS).contains(&count) {
            return Err(ComboError::ConstituentCount { count });
        }

        let mut seen = HashSet::with_capacity(count);
        for constituent in &self.constituents {
            if !seen.insert(constituent.variant_id) {
                return Err(ComboError::DuplicateConstituent {
                    variant_id: constituent.variant_id,
                });
            }
            if constituent.quantity == 0 {
                return Err(ComboError::InvalidConstituentQuantity {
                    variant_id: constituent.variant_id,
                });
            }
            if !constituent.unit_price.is_positive() {
                return Err(ComboError::InvalidConstituentPrice {
                    variant_id: constituent.variant_id,
                    price: constituent.unit_price,
                });
            }
        }

        if !self.price.is_positive() {
            return Err(ComboError::InvalidComboPrice { price: self.price });
        }

        if self.sale_limit == Some(0) {
            return Err(ComboError::InvalidSaleLimit);
        }

        if !self.savings().is_positive() {
            return Err(ComboError::NoSavings {
                combo_price: self.price,
                original_total: self.original_total(),
            });
        }

        Ok(())
    }

    /// Validates and turns the draft into a combo with the given id.
    pub fn into_combo(self, id: ComboId) -> Result<Combo, ComboError> {
        self.validate()?;
        Ok(Combo {
            id,
            name: self.name,
            price: self.price,
            constituents: self.constituents,
            sale_limit: self.sale_limit,
            sold: 0,
            active: true,
        })
    }
}

/// A combo product as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    pub id: ComboId,
    pub name: String,
    #[serde(rename = "combo_price_cents")]
    pub price: Money,
    pub constituents: Vec<ComboConstituent>,
    #[serde(default)]
    pub sale_limit: Option<u32>,
    #[serde(default)]
    pub sold: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Combo {
    /// Sum of constituent price × quantity.
    pub fn original_total(&self) -> Money {
        original_total(&self.constituents)
    }

    /// `combo_savings_cents`: always equal to `original_total - price`.
    pub fn savings(&self) -> Money {
        self.original_total() - self.price
    }

    /// True when a sale limit exists and has been reached.
    pub fn sale_ceiling_reached(&self) -> bool {
        self.sale_limit.is_some_and(|limit| self.sold >= limit)
    }
}
