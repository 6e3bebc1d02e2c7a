use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{ComboGroupId, ComboId, GuestToken, UserId, VariantId};
use domain::{CartSnapshot, Combo, ComboAvailability, ComboDraft, MergeResult, SessionIdentity};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    Result, StoreEnvelope, StoreError,
    store::{CartStore, Procedure},
};

/// Deadline for a single procedure call unless configured otherwise.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Cart store backed by stored procedures in PostgreSQL.
///
/// Every procedure takes a single `jsonb` argument and returns a `jsonb`
/// envelope of the form `{success, data|error, code}`.
#[derive(Clone)]
pub struct PostgresCartStore {
    pool: PgPool,
    call_timeout: Duration,
}

#[derive(Deserialize)]
struct AddedCombo {
    combo_group_id: ComboGroupId,
}

#[derive(Deserialize)]
struct SoldCount {
    sold: u32,
}

impl PostgresCartStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Sets the deadline applied to every procedure call.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Connects a new pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn owner_params(owner: &SessionIdentity) -> Value {
        match owner {
            SessionIdentity::Authenticated { user_id } => json!({ "user_id": user_id }),
            SessionIdentity::Guest { token } => json!({ "guest_token": token }),
        }
    }

    fn with_owner(owner: &SessionIdentity, extra: Value) -> Value {
        let mut params = Self::owner_params(owner);
        if let (Value::Object(params), Value::Object(extra)) = (&mut params, extra) {
            params.extend(extra);
        }
        params
    }

    /// Invokes a procedure and decodes its envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        procedure: Procedure,
        params: Value,
    ) -> Result<StoreEnvelope<T>> {
        // Procedure names are a closed set of static identifiers.
        let sql = format!("SELECT {}($1::jsonb)", procedure.as_str());
        let started = Instant::now();

        let query = sqlx::query_scalar::<_, Value>(&sql)
            .bind(params)
            .fetch_one(&self.pool);
        let raw = within(procedure, self.call_timeout, query).await?;

        metrics::histogram!(
            "cart_store_call_duration_seconds",
            "procedure" => procedure.as_str()
        )
        .record(started.elapsed().as_secs_f64());
        tracing::debug!(%procedure, "store procedure returned");

        Ok(serde_json::from_value(raw)?)
    }

    /// Calls a procedure whose payload is ignored on success.
    async fn execute(&self, procedure: Procedure, params: Value) -> Result<()> {
        self.call::<Value>(procedure, params)
            .await?
            .into_result(procedure)?;
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(&self, procedure: Procedure, params: Value) -> Result<T> {
        self.call::<T>(procedure, params)
            .await?
            .into_data(procedure)
    }
}

/// Bounds a store round trip by `limit`.
async fn within<T>(
    procedure: Procedure,
    limit: Duration,
    call: impl Future<Output = std::result::Result<T, sqlx::Error>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::warn!(%procedure, timeout_ms = limit.as_millis() as u64, "store call timed out");
            Err(StoreError::Timeout {
                procedure: procedure.as_str(),
            })
        }
    }
}

#[async_trait]
impl CartStore for PostgresCartStore {
    async fn get_cart(&self, owner: &SessionIdentity) -> Result<CartSnapshot> {
        // A missing cart comes back as success with no data.
        Ok(self
            .call::<CartSnapshot>(Procedure::GetCart, Self::owner_params(owner))
            .await?
            .into_result(Procedure::GetCart)?
            .unwrap_or_default())
    }

    async fn add_to_cart(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<()> {
        self.execute(
            Procedure::AddToCart,
            Self::with_owner(owner, json!({ "variant_id": variant_id, "quantity": quantity })),
        )
        .await
    }

    async fn update_cart_item(
        &self,
        owner: &SessionIdentity,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<()> {
        self.execute(
            Procedure::UpdateCartItem,
            Self::with_owner(owner, json!({ "variant_id": variant_id, "quantity": quantity })),
        )
        .await
    }

    async fn remove_item(&self, owner: &SessionIdentity, variant_id: VariantId) -> Result<()> {
        self.execute(
            Procedure::RemoveItem,
            Self::with_owner(owner, json!({ "variant_id": variant_id })),
        )
        .await
    }

    async fn clear_cart(&self, owner: &SessionIdentity) -> Result<()> {
        self.execute(Procedure::ClearCart, Self::owner_params(owner))
            .await
    }

    async fn merge_carts(&self, user_id: UserId, guest_token: &GuestToken) -> Result<MergeResult> {
        self.fetch(
            Procedure::MergeCarts,
            json!({ "user_id": user_id, "guest_token": guest_token }),
        )
        .await
    }

    async fn add_combo_to_cart(
        &self,
        owner: &SessionIdentity,
        combo_id: ComboId,
    ) -> Result<ComboGroupId> {
        let added: AddedCombo = self
            .fetch(
                Procedure::AddComboToCart,
                Self::with_owner(owner, json!({ "combo_id": combo_id })),
            )
            .await?;
        Ok(added.combo_group_id)
    }

    async fn remove_combo_from_cart(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
    ) -> Result<()> {
        self.execute(
            Procedure::RemoveComboFromCart,
            Self::with_owner(owner, json!({ "combo_group_id": combo_group_id })),
        )
        .await
    }

    async fn update_combo_quantity(
        &self,
        owner: &SessionIdentity,
        combo_group_id: ComboGroupId,
        quantity: u32,
    ) -> Result<()> {
        self.execute(
            Procedure::UpdateComboQuantity,
            Self::with_owner(
                owner,
                json!({ "combo_group_id": combo_group_id, "quantity": quantity }),
            ),
        )
        .await
    }

    async fn create_combo_product(&self, draft: &ComboDraft) -> Result<Combo> {
        self.fetch(Procedure::CreateComboProduct, serde_json::to_value(draft)?)
            .await
    }

    async fn get_combo_availability(&self, combo_id: ComboId) -> Result<ComboAvailability> {
        self.fetch(
            Procedure::GetComboAvailability,
            json!({ "combo_id": combo_id }),
        )
        .await
    }

    async fn increment_combo_sold(&self, combo_id: ComboId, quantity: u32) -> Result<u32> {
        let count: SoldCount = self
            .fetch(
                Procedure::IncrementComboSold,
                json!({ "combo_id": combo_id, "quantity": quantity }),
            )
            .await?;
        Ok(count.sold)
    }
}
