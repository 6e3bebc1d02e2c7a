//! Domain error types.

use common::{Money, VariantId};
use thiserror::Error;

use crate::combo::{MAX_CONSTITUENTS, MIN_CONSTITUENTS};

/// Errors raised while validating or pricing a combo.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComboError {
    /// Combo has a blank name.
    #[error("Combo name is required")]
    NameRequired,

    /// Wrong number of constituent variants.
    #[error(
        "Combo must have between {MIN_CONSTITUENTS} and {MAX_CONSTITUENTS} constituents, got {count}"
    )]
    ConstituentCount { count: usize },

    /// The same variant is listed twice.
    #[error("Variant {variant_id} appears more than once in the combo")]
    DuplicateConstituent { variant_id: VariantId },

    /// A constituent has zero quantity.
    #[error("Constituent {variant_id} must have a quantity greater than 0")]
    InvalidConstituentQuantity { variant_id: VariantId },

    /// A constituent has a non-positive price.
    #[error("Constituent {variant_id} has invalid price {price}")]
    InvalidConstituentPrice { variant_id: VariantId, price: Money },

    /// Combo price is zero or negative.
    #[error("Combo price must be greater than 0, got {price}")]
    InvalidComboPrice { price: Money },

    /// Combo does not discount its constituents.
    #[error("Combo price {combo_price} must be lower than the constituent total {original_total}")]
    NoSavings {
        combo_price: Money,
        original_total: Money,
    },

    /// Sale limit of zero would make the combo permanently unavailable.
    #[error("Combo sale limit must be greater than 0")]
    InvalidSaleLimit,

    /// Bundle count of zero passed where at least one is needed.
    #[error("Bundle quantity must be greater than 0")]
    InvalidBundleQuantity,
}
