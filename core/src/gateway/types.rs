//! Submission targets and the verdict vocabulary of the scanning service.

use std::path::PathBuf;

/// Opaque identifier of a job created on the scanning service.
pub type RemoteJobId = String;

/// What an operator wants scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    File { path: PathBuf, file_name: String },
    Link { url: String },
}

impl ScanTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            ScanTarget::File { .. } => TargetKind::File,
            ScanTarget::Link { .. } => TargetKind::Link,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Link,
}

impl TargetKind {
    pub fn noun(&self) -> &'static str {
        match self {
            TargetKind::File => "file",
            TargetKind::Link => "link",
        }
    }
}

/// Reply to a status query. The service reports results only once the job
/// is ready; until then the payload carries no result block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReply {
    Pending,
    Ready(ScanOutcome),
}

/// Final result of a ready job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub state: ScanState,
    pub verdict: Verdict,
    /// Threat family reported by the service; `benign` when it reports none.
    pub threat_label: String,
    pub failure: Option<ScanFailure>,
}

/// How much of the job the service managed to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Full,
    Partial,
    Unscanned,
}

impl ScanState {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "FULL" => Some(ScanState::Full),
            "PARTIAL" => Some(ScanState::Partial),
            "UNSCANNED" => Some(ScanState::Unscanned),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ScanState::Full => "scan completed in full",
            ScanState::Partial => "scan completed partially",
            ScanState::Unscanned => "the scan could not be performed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Unwanted,
    Dangerous,
}

impl Verdict {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "CLEAN" => Some(Verdict::Clean),
            "UNWANTED" => Some(Verdict::Unwanted),
            "DANGEROUS" => Some(Verdict::Dangerous),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Verdict::Clean => "no threats detected",
            Verdict::Unwanted => "potentially unwanted object",
            Verdict::Dangerous => "dangerous object",
        }
    }
}

/// Per-job processing faults the service attaches to a ready result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFailure {
    Corrupted,
    Encrypted,
    Internal,
    MaxDepthExceeded,
    SandboxRunSample,
}

impl ScanFailure {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "corrupted" => Some(ScanFailure::Corrupted),
            "encrypted" => Some(ScanFailure::Encrypted),
            "internal" => Some(ScanFailure::Internal),
            "max_depth_exceeded" => Some(ScanFailure::MaxDepthExceeded),
            "sandbox_run_sample" => Some(ScanFailure::SandboxRunSample),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ScanFailure::Corrupted => "the job contained a corrupted object (for example a broken archive)",
            ScanFailure::Encrypted => "an encrypted object; no supplied password could unlock it",
            ScanFailure::Internal => "internal error of the scanning engine",
            ScanFailure::MaxDepthExceeded => "archive nesting exceeded the unpacking depth limit",
            ScanFailure::SandboxRunSample => "the behavioural analysis run failed to start",
        }
    }
}
