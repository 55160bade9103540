use crate::gateway::{RemoteJobId, ScanTarget, TargetKind};
use crate::operators::OperatorId;
use crate::poll::PollGate;

use super::stage::Stage;

/// Everything one operator conversation carries between events.
///
/// The context is an explicit value threaded through every engine call, so
/// operator isolation needs no shared mutable state: two contexts never
/// touch the same memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub operator_id: OperatorId,
    pub stage: Stage,
    pub pending: Option<PendingRequest>,
    pub handle: Option<JobHandle>,
    pub quota: Option<QuotaSnapshot>,
    pub poll: PollGate,
}

/// A submission being assembled; exists only within the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub kind: TargetKind,
    pub target: Option<ScanTarget>,
    /// Unlock candidates, at most five, in operator order.
    pub passwords: Vec<String>,
}

impl PendingRequest {
    pub fn new(kind: TargetKind) -> Self {
        Self {
            kind,
            target: None,
            passwords: Vec::new(),
        }
    }
}

/// Handle of a job created on the scanning service, held until polling
/// concludes or the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub remote_job_id: RemoteJobId,
    pub owning_operator: OperatorId,
}

/// Quota fields captured when a submission attempt is approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub priority_tier: u8,
    pub link_disclosure_allowed: bool,
}

impl SessionContext {
    pub fn new(operator_id: OperatorId) -> Self {
        Self {
            operator_id,
            stage: Stage::Unauthenticated,
            pending: None,
            handle: None,
            quota: None,
            poll: PollGate::new(),
        }
    }

    /// Discard any in-flight work and land on the sandbox menu.
    pub fn reset_to_sandbox(&mut self) {
        self.discard_work();
        self.stage = Stage::MenuSandbox;
    }

    /// Access lost mid-conversation: drop everything, wait for approval.
    pub fn revoke(&mut self) {
        self.discard_work();
        self.stage = Stage::AwaitingApproval;
    }

    /// Row vanished during settlement: treat the session as never
    /// authenticated at all.
    pub fn force_unauthenticated(&mut self) {
        self.discard_work();
        self.stage = Stage::Unauthenticated;
    }

    fn discard_work(&mut self) {
        self.pending = None;
        self.handle = None;
        self.quota = None;
        self.poll.clear();
    }
}
