//! Cart Store Gateway: one store procedure per business operation, each
//! write followed by an authoritative re-read.

use std::time::Instant;

use async_trait::async_trait;
use cart_store::CartStore;
use common::{ComboGroupId, ComboId, GuestToken, UserId, VariantId};
use domain::{
    CartSnapshot, CartWarning, Combo, ComboAvailability, ComboDraft, MergeResult, SessionIdentity,
};

use crate::error::{CartError, Result};
use crate::outcome::{CartOutcome, CartView};

/// The cart operations offered to callers.
#[async_trait]
pub trait CartOperations: Send + Sync {
    async fn get(&self, owner: &SessionIdentity) -> Result<CartView>;

    async fn add(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<CartOutcome>;

    /// Sets a plain row's quantity. Zero behaves as [`remove`](Self::remove).
    async fn update(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<CartOutcome>;

    async fn remove(&self, owner: &SessionIdentity, variant_id: VariantId) -> Result<CartOutcome>;

    /// Empties the cart. Always confirmed: a failed re-read reports an empty cart.
    async fn clear(&self, owner: &SessionIdentity) -> Result<CartView>;

    /// Adds one bundle of a combo and returns its new group id.
    async fn add_bundle(
        &self,
        owner: &SessionIdentity,
        combo_id: ComboId,
    ) -> Result<(ComboGroupId, CartOutcome)>;

    async fn remove_bundle(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
    ) -> Result<CartOutcome>;

    /// Sets how many bundles a group holds. Zero removes the group.
    async fn update_bundle_quantity(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
        quantity: u32,
    ) -> Result<CartOutcome>;

    async fn merge(&self, user_id: UserId, guest_token: &GuestToken) -> Result<MergeResult>;

    async fn create_combo(&self, draft: &ComboDraft) -> Result<Combo>;

    async fn combo_availability(&self, combo_id: ComboId) -> Result<ComboAvailability>;

    /// Records `quantity` bundles sold and returns the new sold count.
    async fn record_combo_sale(&self, combo_id: ComboId, quantity: u32) -> Result<u32>;
}

/// Gateway over a [`CartStore`].
#[derive(Debug, Clone)]
pub struct CartGateway<S> {
    store: S,
}

fn observe<T>(op: &'static str, started: Instant, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) if e.is_retryable() => "unavailable",
        Err(_) => "rejected",
    };
    metrics::counter!("cart_operations_total", "op" => op, "outcome" => outcome).increment(1);
    metrics::histogram!("cart_operation_duration_seconds", "op" => op)
        .record(started.elapsed().as_secs_f64());
}

fn with_drift_warnings(cart: CartSnapshot) -> CartView {
    let warnings = cart.price_drift_warnings();
    if !warnings.is_empty() {
        metrics::counter!("cart_price_drift_warnings_total").increment(warnings.len() as u64);
        tracing::info!(count = warnings.len(), "price drift detected");
    }
    CartView { cart, warnings }
}

impl<S: CartStore> CartGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Re-reads after a write. A failed re-read is a partial success.
    async fn confirm(&self, op: &'static str, owner: &SessionIdentity) -> CartOutcome {
        match self.store.get_cart(owner).await {
            Ok(cart) => CartOutcome::Confirmed(with_drift_warnings(cart)),
            Err(e) => {
                tracing::warn!(op, error = %e, "write applied but re-read failed");
                metrics::counter!("cart_partial_success_total", "op" => op).increment(1);
                CartOutcome::PartialSuccess {
                    message: "Your cart was updated but could not be refreshed".to_string(),
                }
            }
        }
    }

    async fn write<F>(
        &self,
        op: &'static str,
        owner: &SessionIdentity,
        mutate: F,
    ) -> Result<CartOutcome>
    where
        F: Future<Output = cart_store::Result<()>> + Send,
    {
        let started = Instant::now();
        let result = match mutate.await {
            Ok(()) => Ok(self.confirm(op, owner).await),
            Err(e) => Err(CartError::from(e)),
        };
        observe(op, started, &result);
        result
    }
}

#[async_trait]
impl<S: CartStore> CartOperations for CartGateway<S> {
    #[tracing::instrument(skip(self), fields(op = "get", identity = owner.kind()))]
    async fn get(&self, owner: &SessionIdentity) -> Result<CartView> {
        let started = Instant::now();
        let result = self
            .store
            .get_cart(owner)
            .await
            .map(with_drift_warnings)
            .map_err(CartError::from);
        observe("get", started, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(op = "add", identity = owner.kind()))]
    async fn add(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<CartOutcome> {
        if quantity == 0 {
            return Err(CartError::validation("Quantity must be greater than 0"));
        }
        self.write(
            "add",
            owner,
            self.store.add_to_cart(owner, variant_id, quantity),
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(op = "update", identity = owner.kind()))]
    async fn update(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<CartOutcome> {
        if quantity == 0 {
            return self.remove(owner, variant_id).await;
        }
        self.write(
            "update",
            owner,
            self.store.update_cart_item(owner, variant_id, quantity),
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(op = "remove", identity = owner.kind()))]
    async fn remove(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
    ) -> Result<CartOutcome> {
        self.write("remove", owner, self.store.remove_item(owner, variant_id))
            .await
    }

    #[tracing::instrument(skip(self), fields(op = "clear", identity = owner.kind()))]
    async fn clear(&self, owner: &SessionIdentity) -> Result<CartView> {
        let started = Instant::now();
        let result = match self.store.clear_cart(owner).await {
            Ok(()) => Ok(match self.store.get_cart(owner).await {
                Ok(cart) => with_drift_warnings(cart),
                Err(e) => {
                    tracing::debug!(error = %e, "re-read after clear failed, reporting empty cart");
                    CartView::empty()
                }
            }),
            Err(e) => Err(CartError::from(e)),
        };
        observe("clear", started, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(op = "add_bundle", identity = owner.kind()))]
    async fn add_bundle(
        &self,
        owner: &SessionIdentity,
        combo_id: ComboId,
    ) -> Result<(ComboGroupId, CartOutcome)> {
        let started = Instant::now();
        let result: Result<(ComboGroupId, CartOutcome)> = async {
            // Stock and sale counters move between page load and cart action.
            let availability = self.store.get_combo_availability(combo_id).await?;
            availability.evaluate()?;

            let group_id = self.store.add_combo_to_cart(owner, combo_id).await?;
            let outcome = match self.confirm("add_bundle", owner).await {
                CartOutcome::Confirmed(view) => CartOutcome::Confirmed(check_group(
                    view,
                    group_id,
                    availability.constituents.len(),
                )),
                partial => partial,
            };
            Ok((group_id, outcome))
        }
        .await;
        observe("add_bundle", started, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(op = "remove_bundle", identity = owner.kind()))]
    async fn remove_bundle(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
    ) -> Result<CartOutcome> {
        self.write(
            "remove_bundle",
            owner,
            self.store.remove_combo_from_cart(owner, combo_group_id),
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(op = "update_bundle", identity = owner.kind()))]
    async fn update_bundle_quantity(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
        quantity: u32,
    ) -> Result<CartOutcome> {
        if quantity == 0 {
            return self.remove_bundle(owner, combo_group_id).await;
        }
        self.write(
            "update_bundle",
            owner,
            self.store
                .update_combo_quantity(owner, combo_group_id, quantity),
        )
        .await
    }

    #[tracing::instrument(skip(self, guest_token), fields(op = "merge"))]
    async fn merge(&self, user_id: UserId, guest_token: &GuestToken) -> Result<MergeResult> {
        let started = Instant::now();
        let result = self
            .store
            .merge_carts(user_id, guest_token)
            .await
            .map_err(CartError::from);
        observe("merge", started, &result);
        result
    }

    #[tracing::instrument(skip(self, draft), fields(op = "create_combo", name = %draft.name))]
    async fn create_combo(&self, draft: &ComboDraft) -> Result<Combo> {
        let started = Instant::now();
        let result: Result<Combo> = async {
            draft.validate()?;
            Ok(self.store.create_combo_product(draft).await?)
        }
        .await;
        observe("create_combo", started, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(op = "combo_availability"))]
    async fn combo_availability(&self, combo_id: ComboId) -> Result<ComboAvailability> {
        let started = Instant::now();
        let result = self
            .store
            .get_combo_availability(combo_id)
            .await
            .map_err(CartError::from);
        observe("combo_availability", started, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(op = "record_combo_sale"))]
    async fn record_combo_sale(&self, combo_id: ComboId, quantity: u32) -> Result<u32> {
        if quantity == 0 {
            return Err(CartError::validation("Quantity must be greater than 0"));
        }
        let started = Instant::now();
        let result = self
            .store
            .increment_combo_sold(combo_id, quantity)
            .await
            .map_err(CartError::from);
        observe("record_combo_sale", started, &result);
        result
    }
}

/// Checks that a freshly added group shows one row per constituent.
fn check_group(view: CartView, group_id: ComboGroupId, expected: usize) -> CartView {
    let found = view.cart.group_items(group_id).len();
    if found == expected {
        return view;
    }
    tracing::warn!(%group_id, expected, found, "combo group incomplete after add");
    view.with_warning(CartWarning::BundleIncomplete {
        combo_group_id: group_id,
        expected,
        found,
    })
}
