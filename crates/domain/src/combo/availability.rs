use common::{ComboId, VariantId};
use serde::{Deserialize, Serialize};

use super::Combo;

/// Stock position of one constituent against what the combo needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituentStock {
    pub variant_id: VariantId,
    /// Units needed for the requested number of bundles.
    pub required: u32,
    pub in_stock: u32,
}

impl ConstituentStock {
    pub fn is_sufficient(&self) -> bool {
        self.in_stock >= self.required
    }
}

/// Why a combo cannot be added right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnavailableReason {
    Inactive,
    SoldOut { sold: u32, limit: u32 },
    OutOfStock {
        variant_id: VariantId,
        required: u32,
        in_stock: u32,
    },
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableReason::Inactive => write!(f, "Combo is no longer offered"),
            UnavailableReason::SoldOut { sold, limit } => {
                write!(f, "Combo is sold out ({sold} of {limit} sold)")
            }
            UnavailableReason::OutOfStock {
                variant_id,
                required,
                in_stock,
            } => write!(
                f,
                "Variant {variant_id} has {in_stock} in stock but the combo needs {required}"
            ),
        }
    }
}

/// Point-in-time availability report for a combo.
///
/// Availability is the conjunction of: the combo is active, the sale ceiling
/// (if any) has not been reached, and every constituent has enough stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboAvailability {
    pub combo_id: ComboId,
    #[serde(default = "default_active")]
    pub active: bool,
    pub sold: u32,
    #[serde(default)]
    pub sale_limit: Option<u32>,
    pub constituents: Vec<ConstituentStock>,
}

fn default_active() -> bool {
    true
}

impl ComboAvailability {
    /// Builds a report for `bundles` copies of `combo`, reading stock through `stock_of`.
    pub fn for_combo(combo: &Combo, bundles: u32, stock_of: impl Fn(VariantId) -> u32) -> Self {
        Self {
            combo_id: combo.id,
            active: combo.active,
            sold: combo.sold,
            sale_limit: combo.sale_limit,
            constituents: combo
                .constituents
                .iter()
                .map(|c| ConstituentStock {
                    variant_id: c.variant_id,
                    required: c.quantity.saturating_mul(bundles),
                    in_stock: stock_of(c.variant_id),
                })
                .collect(),
        }
    }

    /// Returns the first reason the combo is unavailable, checking the
    /// combo-level conditions before constituent stock.
    pub fn evaluate(&self) -> Result<(), UnavailableReason> {
        if !self.active {
            return Err(UnavailableReason::Inactive);
        }
        if let Some(limit) = self.sale_limit
            && self.sold >= limit
        {
            return Err(UnavailableReason::SoldOut {
                sold: self.sold,
                limit,
            });
        }
        if let Some(short) = self.constituents.iter().find(|c| !c.is_sufficient()) {
            return Err(UnavailableReason::OutOfStock {
                variant_id: short.variant_id,
                required: short.required,
                in_stock: short.in_stock,
            });
        }
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        self.evaluate().is_ok()
    }
}
