use serde::{Deserialize, Serialize};

use super::CartWarning;

/// Outcome of folding a guest cart into an authenticated cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeResult {
    /// Guest lines folded into the authenticated cart.
    pub merged_items: u32,

    /// Merged lines whose quantity was reduced to fit available stock.
    pub clamped_items: u32,

    /// Guest lines dropped because the variant had no stock at all.
    #[serde(default)]
    pub dropped_items: u32,
}

impl MergeResult {
    /// Number of guest lines this result accounts for.
    pub fn guest_lines_accounted(&self) -> u32 {
        self.merged_items + self.dropped_items
    }

    /// Human-readable notices for the caller to surface.
    pub fn warnings(&self) -> Vec<CartWarning> {
        let mut warnings = Vec::new();
        if self.merged_items > 0 {
            warnings.push(CartWarning::ItemsMerged {
                count: self.merged_items,
            });
        }
        if self.clamped_items > 0 {
            warnings.push(CartWarning::ItemsClamped {
                count: self.clamped_items,
            });
        }
        if self.dropped_items > 0 {
            warnings.push(CartWarning::ItemsDropped {
                count: self.dropped_items,
            });
        }
        warnings
    }
}
