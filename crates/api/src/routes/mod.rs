pub mod cart;
pub mod combos;
pub mod ops;
pub mod session;

use serde::Serialize;

use domain::CartWarning;

/// A warning with its human-readable message alongside its fields.
#[derive(Debug, Serialize)]
pub struct WarningBody {
    #[serde(flatten)]
    pub warning: CartWarning,
    pub message: String,
}

impl From<CartWarning> for WarningBody {
    fn from(warning: CartWarning) -> Self {
        Self {
            message: warning.to_string(),
            warning,
        }
    }
}

pub fn warning_bodies(warnings: Vec<CartWarning>) -> Vec<WarningBody> {
    warnings.into_iter().map(WarningBody::from).collect()
}
