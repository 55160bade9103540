use async_trait::async_trait;

use super::types::{OperatorId, OperatorRecord};

/// Point operations over the operator identity rows.
///
/// Management conversations (listing, banning from a chat UI) belong to the
/// hosting application; the core only needs these primitives for the access
/// guard and for provisioning.
#[async_trait]
pub trait OperatorDirectory: Send + Sync {
    async fn lookup(&self, id: OperatorId) -> anyhow::Result<Option<OperatorRecord>>;

    async fn insert(&self, record: &OperatorRecord) -> anyhow::Result<()>;

    async fn set_blocked(&self, id: OperatorId, blocked: bool) -> anyhow::Result<()>;

    /// Remove the operator. Implementations remove the quota row together
    /// with the identity row so no orphaned counters survive.
    async fn delete(&self, id: OperatorId) -> anyhow::Result<()>;
}
