use crate::gateway::TargetKind;

/// A node in the conversation. One value per operator session; every
/// transition goes through the engine's single exhaustive dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No access has been established for this session yet.
    Unauthenticated,
    /// Access is missing or revoked; the operator loops here until granted.
    AwaitingApproval,
    MenuRoot,
    MenuSandbox,
    CollectingTarget(TargetKind),
    CollectingPasswords,
    /// Transient: a gateway submission is in flight.
    Submitting,
    /// A job handle is stored; the operator polls for the verdict.
    AwaitingOutcome,
}
