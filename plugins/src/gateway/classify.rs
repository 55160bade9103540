//! The single classification pass at the transport boundary.
//!
//! Every failure of a remote call resolves here to exactly one
//! [`GatewayError`] variant; nothing downstream re-parses status codes or
//! exception text.

use sandgate_core::api::GatewayError;
use serde::Deserialize;

/// Classify a transport-level failure (nothing came back from the service).
///
/// Precedence: certificate verification, then timeout, then any other
/// connection-establishment failure. A connect timeout is a timeout, not an
/// unavailability signal.
pub(crate) fn classify_transport(err: &reqwest::Error) -> GatewayError {
    if source_chain_mentions_certificate(err) {
        return GatewayError::Certificate;
    }
    if err.is_timeout() {
        return GatewayError::Timeout;
    }
    if err.is_connect() {
        return GatewayError::Unavailable;
    }
    GatewayError::Unknown(err.to_string())
}

/// rustls surfaces verification failures deep in the source chain and the
/// exact message text varies between versions, so match the chain loosely.
fn source_chain_mentions_certificate(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("unknownissuer") {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Classify a non-2xx HTTP status.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: &str) -> GatewayError {
    match status.as_u16() {
        401 => GatewayError::Unauthorized,
        403 => GatewayError::Forbidden,
        404 => GatewayError::JobNotFound,
        405 => GatewayError::MethodNotAllowed,
        413 => GatewayError::PayloadTooLarge,
        other => GatewayError::Unknown(format!("http {other}: {body}")),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    message: Option<String>,
}

/// A 2xx reply may still carry an application-level error envelope; that is
/// a failure. Returns `None` when the body carries no such envelope.
pub(crate) fn envelope_error(body: &str) -> Option<GatewayError> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let first = envelope.errors.first()?;
    let message = match &first.message {
        Some(message) => message.clone(),
        None => format!("cause unknown; raw response: {body}"),
    };
    Some(GatewayError::Rejected(message))
}
