use thiserror::Error;

use crate::operators::OperatorId;

/// Failures raised by the quota ledger.
///
/// `OperatorNotFound` is not transient: a missing row means the operator was
/// deleted, and the session must treat it as access revocation.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no quota row for operator {0}")]
    OperatorNotFound(OperatorId),

    #[error("quota storage error")]
    Storage(#[source] anyhow::Error),
}

impl LedgerError {
    pub fn is_revocation(&self) -> bool {
        matches!(self, LedgerError::OperatorNotFound(_))
    }
}
