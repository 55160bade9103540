mod r#trait;
mod types;

pub use r#trait::ScanGateway;
pub use types::{
    RemoteJobId, ScanFailure, ScanOutcome, ScanState, ScanTarget, StatusReply, TargetKind, Verdict,
};
