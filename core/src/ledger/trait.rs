use async_trait::async_trait;

use crate::errors::LedgerError;
use crate::operators::OperatorId;

use super::types::QuotaProfile;

/// Durable per-operator submission counters.
///
/// The counters are the sole source of truth shared between operator
/// sessions; every operation here is atomic on its own, so callers need no
/// in-process lock across operators.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Full profile snapshot; `None` when the operator has no quota row.
    async fn profile(&self, id: OperatorId) -> Result<Option<QuotaProfile>, LedgerError>;

    /// Read-only pre-submission check: units left today.
    async fn reserve_check(&self, id: OperatorId) -> Result<u32, LedgerError>;

    /// Debit `amount` units, floored at zero.
    async fn commit_decrement(&self, id: OperatorId, amount: u32) -> Result<(), LedgerError>;

    /// Credit the lifetime submission counter.
    async fn increment_lifetime(&self, id: OperatorId, amount: u32) -> Result<(), LedgerError>;

    /// Settle a successful submission: one unit off today's allowance, one
    /// onto the lifetime total.
    ///
    /// The default is two independent calls; the counters may momentarily
    /// diverge if the row is deleted in between, which is acceptable because
    /// deletion already revokes access. Stores able to update both counters
    /// in one transaction should override this.
    async fn record_submission(&self, id: OperatorId) -> Result<(), LedgerError> {
        self.commit_decrement(id, 1).await?;
        self.increment_lifetime(id, 1).await?;
        Ok(())
    }

    async fn create_profile(&self, profile: &QuotaProfile) -> Result<(), LedgerError>;

    /// Restore `remaining_units = max_daily_units` for every row. Runs once
    /// per daily boundary; the scheduler owns failure isolation.
    async fn daily_reset(&self) -> Result<(), LedgerError>;
}
