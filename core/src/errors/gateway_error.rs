use thiserror::Error;

/// Closed taxonomy for every failed call against the scanning service.
///
/// The classifier at the transport boundary produces exactly one variant per
/// failure; downstream code renders the `Display` text and never looks at
/// raw status codes or transport messages again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("certificate verification failed; the service certificate may be untrusted or an intercepting proxy sits between this host and the service")]
    Certificate,

    #[error("could not connect to the scanning service; it may be unavailable")]
    Unavailable,

    #[error("connection timed out before the scanning service answered")]
    Timeout,

    #[error("authorization with the configured access token failed")]
    Unauthorized,

    #[error("the access token is not permitted to submit scans with source parameters")]
    Forbidden,

    #[error("scan job not found; jobs created more than three hours ago that ended in error are dropped by the service")]
    JobNotFound,

    #[error("request method not accepted by the scanning service")]
    MethodNotAllowed,

    #[error("the submission exceeds the size limit of the scanning service")]
    PayloadTooLarge,

    #[error("the scanning service rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected gateway failure: {0}")]
    Unknown(String),
}

impl GatewayError {
    /// Faults worth re-triggering by hand once the service recovers.
    /// The engine itself never retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable | GatewayError::Timeout)
    }
}
