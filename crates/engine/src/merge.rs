//! Guest→identity merge run once at sign-in.

use std::time::{Duration, Instant};

use common::UserId;
use domain::{CartWarning, MergeResult};

use crate::gateway::CartOperations;
use crate::session::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSettings {
    /// Hard deadline for the store's merge call.
    pub timeout: Duration,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

/// What happened to the guest cart at sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The store confirmed the merge; the guest token was retired.
    Merged(MergeResult),
    /// The session carried no guest token.
    Skipped,
    /// The store call failed; the guest token is kept for a later retry.
    Failed { reason: String },
    /// The deadline fired; the guest token is kept.
    TimedOut,
}

impl MergeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeOutcome::Merged(_) => "merged",
            MergeOutcome::Skipped => "skipped",
            MergeOutcome::Failed { .. } => "failed",
            MergeOutcome::TimedOut => "timed_out",
        }
    }

    pub fn result(&self) -> Option<MergeResult> {
        match self {
            MergeOutcome::Merged(result) => Some(*result),
            _ => None,
        }
    }

    pub fn warnings(&self) -> Vec<CartWarning> {
        self.result()
            .map(|result| result.warnings())
            .unwrap_or_default()
    }
}

/// Folds a guest cart into the user's cart when they sign in.
///
/// Never fails: sign-in proceeds whatever the store does.
#[derive(Debug, Clone)]
pub struct MergeOrchestrator<G> {
    carts: G,
    settings: MergeSettings,
}

impl<G: CartOperations> MergeOrchestrator<G> {
    pub fn new(carts: G, settings: MergeSettings) -> Self {
        Self { carts, settings }
    }

    /// Switches `session` to `user_id` and merges its guest cart, if any.
    ///
    /// The guest token is cleared only after the store confirms the merge.
    #[tracing::instrument(skip(self, session))]
    pub async fn on_sign_in(&self, session: &mut SessionContext, user_id: UserId) -> MergeOutcome {
        session.authenticate(user_id);

        let Some(token) = session.guest_token().cloned() else {
            return self.finish(MergeOutcome::Skipped, None);
        };

        let started = Instant::now();
        let outcome =
            match tokio::time::timeout(self.settings.timeout, self.carts.merge(user_id, &token))
                .await
            {
                Ok(Ok(result)) => {
                    session.confirm_merge();
                    MergeOutcome::Merged(result)
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "guest cart merge failed, keeping guest token");
                    MergeOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.settings.timeout.as_millis() as u64,
                        "guest cart merge timed out, keeping guest token"
                    );
                    MergeOutcome::TimedOut
                }
            };
        self.finish(outcome, Some(started))
    }

    fn finish(&self, outcome: MergeOutcome, started: Option<Instant>) -> MergeOutcome {
        metrics::counter!("cart_merge_total", "outcome" => outcome.as_str()).increment(1);
        if let Some(started) = started {
            metrics::histogram!("cart_merge_duration_seconds")
                .record(started.elapsed().as_secs_f64());
        }
        if let Some(result) = outcome.result() {
            tracing::info!(
                merge_outcome = outcome.as_str(),
                merged = result.merged_items,
                clamped = result.clamped_items,
                dropped = result.dropped_items,
                "guest cart merged"
            );
        } else {
            tracing::info!(merge_outcome = outcome.as_str(), "sign-in merge finished");
        }
        outcome
    }
}
