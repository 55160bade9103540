//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `sandgate_core::api` instead of reaching into
//! internal modules.

pub use crate::config::{
    load_default, load_from, AppConfig, BootstrapConfig, GatewayConfig, LoggingConfig, StoreConfig,
};
pub use crate::errors::{GatewayError, LedgerError};
pub use crate::gateway::{
    RemoteJobId, ScanFailure, ScanGateway, ScanOutcome, ScanState, ScanTarget, StatusReply,
    TargetKind, Verdict,
};
pub use crate::ledger::{QuotaLedger, QuotaProfile};
pub use crate::operators::{OperatorDirectory, OperatorId, OperatorRecord, OperatorRole};
pub use crate::poll::{PollGate, RefreshDecision, REFRESH_WAIT_SECS};
pub use crate::session::{
    ButtonPress, IncomingFile, JobHandle, OperatorEvent, PendingRequest, QuotaSnapshot, Reply,
    ReplyButton, SessionContext, SessionEngine, Stage,
};
