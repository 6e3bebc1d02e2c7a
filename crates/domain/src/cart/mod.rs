//! Cart rows, snapshots, warnings and merge results.

mod item;
mod merge;
mod snapshot;
mod warning;

pub use item::{CartItem, ComboMembership};
pub use merge::MergeResult;
pub use snapshot::CartSnapshot;
pub use warning::CartWarning;
