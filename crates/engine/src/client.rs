//! Cart Client Façade: retries transient failures and resolves cart rows by id.

use std::time::Duration;

use cart_store::RejectionCode;
use common::{CartItemId, ComboGroupId, ComboId, VariantId};
use domain::{CartItem, Combo, ComboAvailability, ComboDraft, SessionIdentity};

use crate::error::{CartError, Result};
use crate::gateway::CartOperations;
use crate::outcome::{CartOutcome, CartView};

/// How often and how patiently to retry transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Calling-side cart API.
///
/// Business rejections are returned as-is; only [`CartError::Unavailable`]
/// is retried, up to [`RetryPolicy::max_attempts`].
#[derive(Debug, Clone)]
pub struct CartClient<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: CartOperations> CartClient<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(op, attempt, ?delay, error = %e, "transient failure, retrying");
                    metrics::counter!("cart_retries_total", "op" => op).increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    pub async fn get(&self, owner: &SessionIdentity) -> Result<CartView> {
        self.with_retry("get", || self.inner.get(owner)).await
    }

    pub async fn add(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<CartOutcome> {
        self.with_retry("add", || self.inner.add(owner, variant_id, quantity))
            .await
    }

    pub async fn update(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<CartOutcome> {
        self.with_retry("update", || self.inner.update(owner, variant_id, quantity))
            .await
    }

    pub async fn remove(&self, owner: &SessionIdentity, variant_id: VariantId) -> Result<CartOutcome> {
        self.with_retry("remove", || self.inner.remove(owner, variant_id))
            .await
    }

    pub async fn clear(&self, owner: &SessionIdentity) -> Result<CartView> {
        self.with_retry("clear", || self.inner.clear(owner)).await
    }

    pub async fn add_bundle(
        &self,
        owner: &SessionIdentity,
        combo_id: ComboId,
    ) -> Result<(ComboGroupId, CartOutcome)> {
        self.with_retry("add_bundle", || self.inner.add_bundle(owner, combo_id))
            .await
    }

    pub async fn remove_bundle(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
    ) -> Result<CartOutcome> {
        self.with_retry("remove_bundle", || {
            self.inner.remove_bundle(owner, combo_group_id)
        })
        .await
    }

    pub async fn update_bundle_quantity(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
        quantity: u32,
    ) -> Result<CartOutcome> {
        self.with_retry("update_bundle", || {
            self.inner
                .update_bundle_quantity(owner, combo_group_id, quantity)
        })
        .await
    }

    pub async fn create_combo(&self, draft: &ComboDraft) -> Result<Combo> {
        self.with_retry("create_combo", || self.inner.create_combo(draft))
            .await
    }

    pub async fn combo_availability(&self, combo_id: ComboId) -> Result<ComboAvailability> {
        self.with_retry("combo_availability", || {
            self.inner.combo_availability(combo_id)
        })
        .await
    }

    pub async fn record_combo_sale(&self, combo_id: ComboId, quantity: u32) -> Result<u32> {
        self.with_retry("record_combo_sale", || {
            self.inner.record_combo_sale(combo_id, quantity)
        })
        .await
    }

    /// Finds the row a caller refers to by its cart item id.
    async fn resolve_item(&self, owner: &SessionIdentity, item_id: CartItemId) -> Result<CartItem> {
        self.get(owner)
            .await?
            .cart
            .find_item(item_id)
            .cloned()
            .ok_or_else(|| {
                CartError::rejected(
                    RejectionCode::ItemNotFound,
                    format!("Cart item {item_id} not found"),
                )
            })
    }

    /// Updates a row known only by its id.
    ///
    /// For a combo row `quantity` is the number of bundles, and the whole
    /// group is updated. The row can disappear between the read and the
    /// write, in which case the store reports it as not found.
    #[tracing::instrument(skip(self), fields(identity = owner.kind()))]
    pub async fn update_by_item_id(
        &self,
        owner: &SessionIdentity,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartOutcome> {
        let item = self.resolve_item(owner, item_id).await?;
        match item.combo_group_id() {
            Some(group) => self.update_bundle_quantity(owner, group, quantity).await,
            None => self.update(owner, item.variant_id, quantity).await,
        }
    }

    /// Removes a row known only by its id. A combo row takes its group with it.
    #[tracing::instrument(skip(self), fields(identity = owner.kind()))]
    pub async fn remove_by_item_id(
        &self,
        owner: &SessionIdentity,
        item_id: CartItemId,
    ) -> Result<CartOutcome> {
        let item = self.resolve_item(owner, item_id).await?;
        match item.combo_group_id() {
            Some(group) => self.remove_bundle(owner, group).await,
            None => self.remove(owner, item.variant_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_three_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }
}
