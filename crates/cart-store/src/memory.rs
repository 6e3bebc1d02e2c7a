use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{CartId, ComboGroupId, ComboId, GuestToken, Money, UserId, VariantId};
use domain::{
    CartItem, CartSnapshot, Combo, ComboAvailability, ComboConstituent, ComboDraft, MergeResult,
    SessionIdentity, expand_combo, split_combo_price,
};
use tokio::sync::RwLock;

use crate::{
    RejectionCode, Result, StoreError,
    store::{CartStore, Procedure},
};

#[derive(Debug, Clone)]
struct CatalogVariant {
    product_name: String,
    price: Money,
    stock: u32,
}

#[derive(Debug, Clone)]
struct StoredCart {
    id: CartId,
    items: Vec<CartItem>,
}

impl StoredCart {
    fn new() -> Self {
        Self {
            id: CartId::new(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    transient: HashMap<Procedure, u32>,
    merge_delay: Option<Duration>,
    merge_commit_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct State {
    variants: HashMap<VariantId, CatalogVariant>,
    combos: HashMap<ComboId, Combo>,
    carts: HashMap<SessionIdentity, StoredCart>,
    faults: Faults,
    calls: HashMap<Procedure, u32>,
}

impl State {
    fn stock_of(&self, variant_id: VariantId) -> u32 {
        self.variants.get(&variant_id).map_or(0, |v| v.stock)
    }

    fn variant(&self, variant_id: VariantId) -> Result<&CatalogVariant> {
        self.variants.get(&variant_id).ok_or_else(|| {
            StoreError::rejected(
                RejectionCode::VariantNotFound,
                format!("Variant {variant_id} does not exist"),
            )
        })
    }

    fn combo(&self, combo_id: ComboId) -> Result<&Combo> {
        self.combos.get(&combo_id).ok_or_else(|| {
            StoreError::rejected(
                RejectionCode::ComboNotFound,
                format!("Combo {combo_id} does not exist"),
            )
        })
    }

    /// Live unit price of a row: catalog price for plain rows, the combo split
    /// recomputed from live constituent prices for combo rows.
    fn live_price(&self, item: &CartItem) -> Money {
        match item.combo {
            None => self
                .variants
                .get(&item.variant_id)
                .map_or(item.price_snapshot, |v| v.price),
            Some(membership) => self
                .combos
                .get(&membership.combo_id)
                .and_then(|combo| {
                    let live: Vec<ComboConstituent> = combo
                        .constituents
                        .iter()
                        .map(|c| {
                            let mut c = c.clone();
                            if let Some(v) = self.variants.get(&c.variant_id) {
                                c.unit_price = v.price;
                            }
                            c
                        })
                        .collect();
                    split_combo_price(&live, combo.price)
                        .ok()?
                        .into_iter()
                        .find(|p| p.variant_id == item.variant_id)
                        .map(|p| p.unit_price)
                })
                .unwrap_or(item.price_snapshot),
        }
    }

    fn snapshot(&self, owner: &SessionIdentity) -> CartSnapshot {
        match self.carts.get(owner) {
            None => CartSnapshot::empty(),
            Some(cart) => {
                let items = cart
                    .items
                    .iter()
                    .map(|item| {
                        let mut item = item.clone();
                        item.current_price = self.live_price(&item);
                        item
                    })
                    .collect();
                CartSnapshot::from_items(Some(cart.id), items)
            }
        }
    }

    fn availability(&self, combo: &Combo, bundles: u32) -> Result<()> {
        ComboAvailability::for_combo(combo, bundles, |v| self.stock_of(v))
            .evaluate()
            .map_err(|reason| StoreError::rejected(RejectionCode::from(&reason), reason.to_string()))
    }

    fn merge(&mut self, user_id: UserId, guest_token: &GuestToken) -> MergeResult {
        let mut result = MergeResult::default();
        let Some(guest_cart) = self.carts.remove(&SessionIdentity::guest(guest_token.clone()))
        else {
            return result;
        };

        let user = SessionIdentity::authenticated(user_id);
        let mut target = self.carts.remove(&user).unwrap_or_else(StoredCart::new);

        let (plain, combo_rows): (Vec<CartItem>, Vec<CartItem>) = guest_cart
            .items
            .into_iter()
            .partition(|i| !i.is_combo_row());

        for mut line in plain {
            let stock = self.stock_of(line.variant_id);
            if stock == 0 {
                result.dropped_items += 1;
                continue;
            }
            result.merged_items += 1;

            let existing = target
                .items
                .iter_mut()
                .find(|i| i.variant_id == line.variant_id && !i.is_combo_row());
            match existing {
                Some(existing) => {
                    let wanted = existing.quantity.saturating_add(line.quantity);
                    if wanted > stock {
                        existing.quantity = stock;
                        result.clamped_items += 1;
                    } else {
                        existing.quantity = wanted;
                    }
                }
                None => {
                    if line.quantity > stock {
                        line.quantity = stock;
                        result.clamped_items += 1;
                    }
                    target.items.push(line);
                }
            }
        }

        // Combo groups move whole or not at all.
        let mut groups: BTreeMap<ComboGroupId, Vec<CartItem>> = BTreeMap::new();
        for row in combo_rows {
            if let Some(group_id) = row.combo_group_id() {
                groups.entry(group_id).or_default().push(row);
            }
        }
        for rows in groups.into_values() {
            let lines = rows.len() as u32;
            if rows.iter().all(|r| self.stock_of(r.variant_id) >= r.quantity) {
                result.merged_items += lines;
                target.items.extend(rows);
            } else {
                result.dropped_items += lines;
            }
        }

        self.carts.insert(user, target);
        result
    }
}

/// In-memory cart store for testing and local development.
///
/// Implements the store procedures with the same observable semantics the
/// remote store documents, plus fault injection so the orchestration layer
/// can be exercised against transport failures, failed re-reads and slow
/// merges.
#[derive(Clone, Default)]
pub struct InMemoryCartStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryCartStore {
    /// Creates a new empty store with no catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a purchasable variant to the catalog and returns its id.
    pub async fn add_variant(&self, product_name: &str, price: Money, stock: u32) -> VariantId {
        let id = VariantId::new();
        self.state.write().await.variants.insert(
            id,
            CatalogVariant {
                product_name: product_name.to_string(),
                price,
                stock,
            },
        );
        id
    }

    /// Changes the live price of a variant.
    pub async fn set_price(&self, variant_id: VariantId, price: Money) {
        if let Some(v) = self.state.write().await.variants.get_mut(&variant_id) {
            v.price = price;
        }
    }

    /// Changes the stock level of a variant.
    pub async fn set_stock(&self, variant_id: VariantId, stock: u32) {
        if let Some(v) = self.state.write().await.variants.get_mut(&variant_id) {
            v.stock = stock;
        }
    }

    /// Inserts a combo directly, bypassing creation-time validation.
    pub async fn insert_combo(&self, combo: Combo) {
        self.state.write().await.combos.insert(combo.id, combo);
    }

    /// Returns a stored combo.
    pub async fn combo(&self, combo_id: ComboId) -> Option<Combo> {
        self.state.read().await.combos.get(&combo_id).cloned()
    }

    /// Makes the next `times` calls to `procedure` fail with a transport error.
    pub async fn fail_next(&self, procedure: Procedure, times: u32) {
        self.state
            .write()
            .await
            .faults
            .transient
            .insert(procedure, times);
    }

    /// Delays `merge_carts` before it commits anything.
    pub async fn set_merge_delay(&self, delay: Duration) {
        self.state.write().await.faults.merge_delay = Some(delay);
    }

    /// Delays the `merge_carts` response after the merge has been committed.
    pub async fn set_merge_commit_delay(&self, delay: Duration) {
        self.state.write().await.faults.merge_commit_delay = Some(delay);
    }

    /// Number of times `procedure` has been called, including injected failures.
    pub async fn call_count(&self, procedure: Procedure) -> u32 {
        self.state
            .read()
            .await
            .calls
            .get(&procedure)
            .copied()
            .unwrap_or(0)
    }

    /// Reads a cart without counting a call or triggering faults.
    pub async fn peek_cart(&self, owner: &SessionIdentity) -> CartSnapshot {
        self.state.read().await.snapshot(owner)
    }

    /// Number of carts currently held.
    pub async fn cart_count(&self) -> usize {
        self.state.read().await.carts.len()
    }

    /// Seeds a small catalog with a breakfast combo, for local development.
    pub async fn seed_demo_catalog(&self) -> Result<Combo> {
        let coffee = self.add_variant("Coffee beans", Money::from_cents(1_200), 50).await;
        let mug = self.add_variant("Ceramic mug", Money::from_cents(800), 30).await;
        self.add_variant("Tea sampler", Money::from_cents(1_500), 20).await;

        let draft = ComboDraft::new(
            "Morning set",
            Money::from_cents(1_700),
            vec![
                ComboConstituent::new(coffee, "Coffee beans", Money::from_cents(1_200), 1),
                ComboConstituent::new(mug, "Ceramic mug", Money::from_cents(800), 1),
            ],
        )
        .with_sale_limit(100);
        self.create_combo_product(&draft).await
    }

    /// Records the call and applies any injected transport failure.
    async fn enter(&self, procedure: Procedure) -> Result<()> {
        let mut state = self.state.write().await;
        *state.calls.entry(procedure).or_default() += 1;
        if let Some(remaining) = state.faults.transient.get_mut(&procedure)
            && *remaining > 0
        {
            *remaining -= 1;
            tracing::debug!(%procedure, "injected transport failure");
            return Err(StoreError::Transport(format!(
                "injected transport failure on {procedure}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get_cart(&self, owner: &SessionIdentity) -> Result<CartSnapshot> {
        self.enter(Procedure::GetCart).await?;
        Ok(self.state.read().await.snapshot(owner))
    }

    async fn add_to_cart(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<()> {
        self.enter(Procedure::AddToCart).await?;
        if quantity == 0 {
            return Err(StoreError::rejected(
                RejectionCode::ValidationFailed,
                "Quantity must be greater than 0",
            ));
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let variant = state.variant(variant_id)?.clone();

        let cart = state
            .carts
            .entry(owner.clone())
            .or_insert_with(StoredCart::new);
        let existing = cart
            .items
            .iter_mut()
            .find(|i| i.variant_id == variant_id && !i.is_combo_row());
        let already = existing.as_ref().map_or(0, |i| i.quantity);
        let wanted = already.saturating_add(quantity);
        if wanted > variant.stock {
            return Err(StoreError::rejected(
                RejectionCode::InsufficientStock,
                format!(
                    "Only {} of {} available",
                    variant.stock, variant.product_name
                ),
            ));
        }

        match existing {
            Some(item) => item.quantity = wanted,
            None => cart.items.push(CartItem::new(
                variant_id,
                variant.product_name,
                quantity,
                variant.price,
            )),
        }
        Ok(())
    }

    async fn update_cart_item(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<()> {
        self.enter(Procedure::UpdateCartItem).await?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let stock = state.stock_of(variant_id);
        let not_found = || {
            StoreError::rejected(
                RejectionCode::ItemNotFound,
                format!("Variant {variant_id} is not in the cart"),
            )
        };

        let cart = state.carts.get_mut(owner).ok_or_else(not_found)?;
        let position = cart
            .items
            .iter()
            .position(|i| i.variant_id == variant_id && !i.is_combo_row())
            .ok_or_else(not_found)?;

        if quantity == 0 {
            cart.items.remove(position);
            return Ok(());
        }
        if quantity > stock {
            return Err(StoreError::rejected(
                RejectionCode::InsufficientStock,
                format!("Only {stock} available"),
            ));
        }
        if let Some(item) = cart.items.get_mut(position) {
            item.quantity = quantity;
        }
        Ok(())
    }

    async fn remove_item(&self, owner: &SessionIdentity, variant_id: VariantId) -> Result<()> {
        self.enter(Procedure::RemoveItem).await?;

        let mut state = self.state.write().await;
        let not_found = || {
            StoreError::rejected(
                RejectionCode::ItemNotFound,
                format!("Variant {variant_id} is not in the cart"),
            )
        };
        let cart = state.carts.get_mut(owner).ok_or_else(not_found)?;

        if let Some(position) = cart
            .items
            .iter()
            .position(|i| i.variant_id == variant_id && !i.is_combo_row())
        {
            cart.items.remove(position);
            return Ok(());
        }

        // A combo row takes its whole group with it.
        let group = cart
            .items
            .iter()
            .find(|i| i.variant_id == variant_id)
            .and_then(CartItem::combo_group_id)
            .ok_or_else(not_found)?;
        cart.items.retain(|i| i.combo_group_id() != Some(group));
        Ok(())
    }

    async fn clear_cart(&self, owner: &SessionIdentity) -> Result<()> {
        self.enter(Procedure::ClearCart).await?;
        self.state.write().await.carts.remove(owner);
        Ok(())
    }

    async fn merge_carts(&self, user_id: UserId, guest_token: &GuestToken) -> Result<MergeResult> {
        self.enter(Procedure::MergeCarts).await?;

        let (before, after) = {
            let state = self.state.read().await;
            (state.faults.merge_delay, state.faults.merge_commit_delay)
        };
        if let Some(delay) = before {
            tokio::time::sleep(delay).await;
        }
        let result = self.state.write().await.merge(user_id, guest_token);
        if let Some(delay) = after {
            tokio::time::sleep(delay).await;
        }
        Ok(result)
    }

    async fn add_combo_to_cart(
        &self,
        owner: &SessionIdentity,
        combo_id: ComboId,
    ) -> Result<ComboGroupId> {
        self.enter(Procedure::AddComboToCart).await?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let combo = state.combo(combo_id)?.clone();
        state.availability(&combo, 1)?;

        let group_id = ComboGroupId::new();
        let rows = expand_combo(&combo, group_id, 1)
            .map_err(|e| StoreError::rejected(RejectionCode::InvalidCombo, e.to_string()))?;
        state
            .carts
            .entry(owner.clone())
            .or_insert_with(StoredCart::new)
            .items
            .extend(rows.into_iter().map(|line| line.into_cart_item()));
        Ok(group_id)
    }

    async fn remove_combo_from_cart(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
    ) -> Result<()> {
        self.enter(Procedure::RemoveComboFromCart).await?;

        let mut state = self.state.write().await;
        let cart = state
            .carts
            .get_mut(owner)
            .filter(|c| c.items.iter().any(|i| i.combo_group_id() == Some(combo_group_id)))
            .ok_or_else(|| {
                StoreError::rejected(
                    RejectionCode::ItemNotFound,
                    format!("Combo group {combo_group_id} is not in the cart"),
                )
            })?;
        cart.items
            .retain(|i| i.combo_group_id() != Some(combo_group_id));
        Ok(())
    }

    async fn update_combo_quantity(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
        quantity: u32,
    ) -> Result<()> {
        self.enter(Procedure::UpdateComboQuantity).await?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let not_found = || {
            StoreError::rejected(
                RejectionCode::ItemNotFound,
                format!("Combo group {combo_group_id} is not in the cart"),
            )
        };

        let combo_id = state
            .carts
            .get(owner)
            .and_then(|c| {
                c.items
                    .iter()
                    .find(|i| i.combo_group_id() == Some(combo_group_id))
            })
            .and_then(CartItem::combo_id)
            .ok_or_else(not_found)?;

        if quantity == 0 {
            if let Some(cart) = state.carts.get_mut(owner) {
                cart.items
                    .retain(|i| i.combo_group_id() != Some(combo_group_id));
            }
            return Ok(());
        }

        let combo = state.combo(combo_id)?.clone();
        state.availability(&combo, quantity)?;

        let cart = state.carts.get_mut(owner).ok_or_else(not_found)?;
        for item in cart
            .items
            .iter_mut()
            .filter(|i| i.combo_group_id() == Some(combo_group_id))
        {
            if let Some(c) = combo
                .constituents
                .iter()
                .find(|c| c.variant_id == item.variant_id)
            {
                item.quantity = c.quantity.saturating_mul(quantity);
            }
        }
        Ok(())
    }

    async fn create_combo_product(&self, draft: &ComboDraft) -> Result<Combo> {
        self.enter(Procedure::CreateComboProduct).await?;

        let mut state = self.state.write().await;
        let mut draft = draft.clone();
        for constituent in &mut draft.constituents {
            let variant = state.variant(constituent.variant_id)?;
            constituent.unit_price = variant.price;
            constituent.product_name = variant.product_name.clone();
        }

        let combo = draft
            .into_combo(ComboId::new())
            .map_err(|e| StoreError::rejected(RejectionCode::InvalidCombo, e.to_string()))?;
        state.combos.insert(combo.id, combo.clone());
        Ok(combo)
    }

    async fn get_combo_availability(&self, combo_id: ComboId) -> Result<ComboAvailability> {
        self.enter(Procedure::GetComboAvailability).await?;

        let state = self.state.read().await;
        let combo = state.combo(combo_id)?;
        Ok(ComboAvailability::for_combo(combo, 1, |v| {
            state.stock_of(v)
        }))
    }

    async fn increment_combo_sold(&self, combo_id: ComboId, quantity: u32) -> Result<u32> {
        self.enter(Procedure::IncrementComboSold).await?;

        let mut state = self.state.write().await;
        let combo = state.combos.get_mut(&combo_id).ok_or_else(|| {
            StoreError::rejected(
                RejectionCode::ComboNotFound,
                format!("Combo {combo_id} does not exist"),
            )
        })?;
        let sold = combo.sold.saturating_add(quantity);
        if let Some(limit) = combo.sale_limit
            && sold > limit
        {
            return Err(StoreError::rejected(
                RejectionCode::ComboSoldOut,
                format!("Only {} of {limit} combos left", limit.saturating_sub(combo.sold)),
            ));
        }
        combo.sold = sold;
        Ok(sold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest() -> SessionIdentity {
        SessionIdentity::guest(GuestToken::generate())
    }

    async fn duo(store: &InMemoryCartStore) -> (Combo, VariantId, VariantId) {
        let a = store.add_variant("Tea", Money::from_cents(300), 10).await;
        let b = store.add_variant("Pot", Money::from_cents(700), 10).await;
        let combo = store
            .create_combo_product(&ComboDraft::new(
                "Tea set",
                Money::from_cents(800),
                vec![
                    ComboConstituent::new(a, "Tea", Money::from_cents(300), 1),
                    ComboConstituent::new(b, "Pot", Money::from_cents(700), 1),
                ],
            ))
            .await
            .unwrap();
        (combo, a, b)
    }

    #[tokio::test]
    async fn test_empty_cart_has_no_id() {
        let store = InMemoryCartStore::new();
        let snapshot = store.get_cart(&guest()).await.unwrap();
        assert!(snapshot.cart_id.is_none());
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_add_accumulates_and_respects_stock() {
        let store = InMemoryCartStore::new();
        let owner = guest();
        let v = store.add_variant("Mug", Money::from_cents(500), 3).await;

        store.add_to_cart(&owner, v, 2).await.unwrap();
        store.add_to_cart(&owner, v, 1).await.unwrap();
        let err = store.add_to_cart(&owner, v, 1).await.unwrap_err();
        assert_eq!(err.rejection_code(), Some(&RejectionCode::InsufficientStock));

        let snapshot = store.get_cart(&owner).await.unwrap();
        assert_eq!(snapshot.line_count(), 1);
        assert_eq!(snapshot.item_count, 3);
        assert!(snapshot.cart_id.is_some());
    }

    #[tokio::test]
    async fn test_unknown_variant_rejected() {
        let store = InMemoryCartStore::new();
        let err = store
            .add_to_cart(&guest(), VariantId::new(), 1)
            .await
            .unwrap_err();
        assert_eq!(err.rejection_code(), Some(&RejectionCode::VariantNotFound));
    }

    #[tokio::test]
    async fn test_live_price_reported_separately() {
        let store = InMemoryCartStore::new();
        let owner = guest();
        let v = store.add_variant("Mug", Money::from_cents(500), 3).await;
        store.add_to_cart(&owner, v, 1).await.unwrap();
        store.set_price(v, Money::from_cents(550)).await;

        let snapshot = store.get_cart(&owner).await.unwrap();
        assert_eq!(snapshot.items[0].price_snapshot.cents(), 500);
        assert_eq!(snapshot.items[0].current_price.cents(), 550);
        assert_eq!(snapshot.subtotal.cents(), 500);
    }

    #[tokio::test]
    async fn test_combo_rows_share_group_and_remove_together() {
        let store = InMemoryCartStore::new();
        let owner = guest();
        let (combo, a, _) = duo(&store).await;

        let group = store.add_combo_to_cart(&owner, combo.id).await.unwrap();
        let snapshot = store.get_cart(&owner).await.unwrap();
        assert_eq!(snapshot.group_items(group).len(), 2);
        assert_eq!(snapshot.subtotal.cents(), 800);

        // Removing one constituent row removes the whole group.
        store.remove_item(&owner, a).await.unwrap();
        assert!(store.get_cart(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_combo_quantity_scales_rows() {
        let store = InMemoryCartStore::new();
        let owner = guest();
        let (combo, _, _) = duo(&store).await;
        let group = store.add_combo_to_cart(&owner, combo.id).await.unwrap();

        store.update_combo_quantity(&owner, group, 3).await.unwrap();
        let snapshot = store.get_cart(&owner).await.unwrap();
        assert!(snapshot.group_items(group).iter().all(|i| i.quantity == 3));

        let err = store
            .update_combo_quantity(&owner, group, 11)
            .await
            .unwrap_err();
        assert_eq!(err.rejection_code(), Some(&RejectionCode::ComboOutOfStock));

        store.update_combo_quantity(&owner, group, 0).await.unwrap();
        assert!(store.get_cart(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_combo_uses_catalog_prices() {
        let store = InMemoryCartStore::new();
        let a = store.add_variant("Tea", Money::from_cents(300), 10).await;
        let b = store.add_variant("Pot", Money::from_cents(700), 10).await;

        // Draft claims higher prices than the catalog; the store re-prices and rejects.
        let err = store
            .create_combo_product(&ComboDraft::new(
                "Overpriced",
                Money::from_cents(1_100),
                vec![
                    ComboConstituent::new(a, "Tea", Money::from_cents(500), 1),
                    ComboConstituent::new(b, "Pot", Money::from_cents(900), 1),
                ],
            ))
            .await
            .unwrap_err();
        assert_eq!(err.rejection_code(), Some(&RejectionCode::InvalidCombo));
    }

    #[tokio::test]
    async fn test_sale_ceiling() {
        let store = InMemoryCartStore::new();
        let (mut combo, _, _) = duo(&store).await;
        combo.sale_limit = Some(2);
        store.insert_combo(combo.clone()).await;

        assert_eq!(store.increment_combo_sold(combo.id, 2).await.unwrap(), 2);
        let err = store.increment_combo_sold(combo.id, 1).await.unwrap_err();
        assert_eq!(err.rejection_code(), Some(&RejectionCode::ComboSoldOut));

        let err = store.add_combo_to_cart(&guest(), combo.id).await.unwrap_err();
        assert_eq!(err.rejection_code(), Some(&RejectionCode::ComboSoldOut));
    }

    #[tokio::test]
    async fn test_merge_clamps_to_stock() {
        let store = InMemoryCartStore::new();
        let token = GuestToken::generate();
        let user = UserId::new();
        let b = store.add_variant("Bowl", Money::from_cents(400), 10).await;

        store
            .add_to_cart(&SessionIdentity::guest(token.clone()), b, 5)
            .await
            .unwrap();
        store.set_stock(b, 2).await;

        let result = store.merge_carts(user, &token).await.unwrap();
        assert_eq!(result.merged_items, 1);
        assert_eq!(result.clamped_items, 1);

        let cart = store.peek_cart(&SessionIdentity::authenticated(user)).await;
        assert_eq!(cart.find_variant_line(b).map(|i| i.quantity), Some(2));
        assert!(
            store
                .peek_cart(&SessionIdentity::guest(token))
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_merge_accounts_for_every_guest_line() {
        let store = InMemoryCartStore::new();
        let token = GuestToken::generate();
        let guest = SessionIdentity::guest(token.clone());
        let a = store.add_variant("A", Money::from_cents(100), 5).await;
        let b = store.add_variant("B", Money::from_cents(100), 5).await;
        let (combo, _, _) = duo(&store).await;

        store.add_to_cart(&guest, a, 1).await.unwrap();
        store.add_to_cart(&guest, b, 1).await.unwrap();
        store.add_combo_to_cart(&guest, combo.id).await.unwrap();
        store.set_stock(b, 0).await;

        let lines = store.peek_cart(&guest).await.line_count() as u32;
        let result = store.merge_carts(UserId::new(), &token).await.unwrap();
        assert_eq!(result.dropped_items, 1);
        assert_eq!(result.guest_lines_accounted(), lines);
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient_and_counted() {
        let store = InMemoryCartStore::new();
        store.fail_next(Procedure::GetCart, 2).await;

        assert!(store.get_cart(&guest()).await.unwrap_err().is_transient());
        assert!(store.get_cart(&guest()).await.is_err());
        assert!(store.get_cart(&guest()).await.is_ok());
        assert_eq!(store.call_count(Procedure::GetCart).await, 3);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = InMemoryCartStore::new();
        let owner = guest();
        store.clear_cart(&owner).await.unwrap();
        store.clear_cart(&owner).await.unwrap();
        assert_eq!(store.cart_count().await, 0);
    }
}
