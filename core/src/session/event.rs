use std::path::PathBuf;

/// A discrete operator action delivered by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorEvent {
    /// Conversation opener (the transport's `/start` equivalent).
    Start,
    Text(String),
    /// A file the transport has already materialised on local storage.
    File(IncomingFile),
    Button(ButtonPress),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub file_name: String,
    pub local_path: PathBuf,
}

/// Buttons the engine may offer. Captions and layout belong to the
/// transport; the engine only deals in these identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPress {
    /// Re-check whether access has been granted.
    CheckAccess,
    OpenSandbox,
    SubmitFile,
    SubmitLink,
    ShowStats,
    /// Query the scanning service health (offered to admins).
    ServiceHealth,
    /// Submit without supplying unlock passwords.
    SubmitNow,
    RefreshOutcome,
    ReturnToMenu,
}
