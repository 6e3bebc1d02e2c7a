use async_trait::async_trait;
use common::{ComboGroupId, ComboId, GuestToken, UserId, VariantId};
use domain::{CartSnapshot, Combo, ComboAvailability, ComboDraft, MergeResult, SessionIdentity};

use crate::Result;

/// Names of the remote store procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    GetCart,
    AddToCart,
    UpdateCartItem,
    RemoveItem,
    ClearCart,
    MergeCarts,
    AddComboToCart,
    RemoveComboFromCart,
    UpdateComboQuantity,
    CreateComboProduct,
    GetComboAvailability,
    IncrementComboSold,
}

impl Procedure {
    /// The procedure name as known by the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Procedure::GetCart => "get_cart",
            Procedure::AddToCart => "add_to_cart",
            Procedure::UpdateCartItem => "update_cart_item",
            Procedure::RemoveItem => "remove_item",
            Procedure::ClearCart => "clear_cart",
            Procedure::MergeCarts => "merge_carts",
            Procedure::AddComboToCart => "add_combo_to_cart",
            Procedure::RemoveComboFromCart => "remove_combo_from_cart",
            Procedure::UpdateComboQuantity => "update_combo_quantity",
            Procedure::CreateComboProduct => "create_combo_product",
            Procedure::GetComboAvailability => "get_combo_availability",
            Procedure::IncrementComboSold => "increment_combo_sold",
        }
    }
}

impl std::fmt::Display for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The remote transactional cart store.
///
/// Each method is one atomic, authoritative procedure call. Implementations
/// never enforce cart invariants themselves beyond what the store reports;
/// they only transport the request and interpret the response envelope.
/// Write procedures return no cart state: callers re-read with
/// [`get_cart`](CartStore::get_cart) because derived fields (subtotal, live
/// price) belong to the store.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Reads the owner's cart. Never mutates.
    async fn get_cart(&self, owner: &SessionIdentity) -> Result<CartSnapshot>;

    /// Adds `quantity` units of a variant, creating the cart on first add.
    async fn add_to_cart(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<()>;

    /// Sets the quantity of a variant's plain row. Zero removes the row.
    async fn update_cart_item(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<()>;

    /// Removes a variant's row.
    async fn remove_item(&self, owner: &SessionIdentity, variant_id: VariantId) -> Result<()>;

    /// Empties the owner's cart.
    async fn clear_cart(&self, owner: &SessionIdentity) -> Result<()>;

    /// Folds the guest cart into the user's cart and discards the guest cart.
    async fn merge_carts(&self, user_id: UserId, guest_token: &GuestToken) -> Result<MergeResult>;

    /// Expands a combo into cart rows under a fresh group id, which is returned.
    async fn add_combo_to_cart(
        &self,
        owner: &SessionIdentity,
        combo_id: ComboId,
    ) -> Result<ComboGroupId>;

    /// Removes every row of a combo group.
    async fn remove_combo_from_cart(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
    ) -> Result<()>;

    /// Sets the number of bundles in a combo group. Zero removes the group.
    async fn update_combo_quantity(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
        quantity: u32,
    ) -> Result<()>;

    /// Creates a combo product from a draft.
    async fn create_combo_product(&self, draft: &ComboDraft) -> Result<Combo>;

    /// Reports the sale counter and constituent stock for one bundle.
    async fn get_combo_availability(&self, combo_id: ComboId) -> Result<ComboAvailability>;

    /// Records `quantity` combos sold. Returns the new sold count.
    async fn increment_combo_sold(&self, combo_id: ComboId, quantity: u32) -> Result<u32>;
}
