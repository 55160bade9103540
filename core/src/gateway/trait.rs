use async_trait::async_trait;

use crate::errors::GatewayError;

use super::types::{RemoteJobId, ScanTarget, StatusReply};

/// Uniform contract over the four remote operations of the scanning service.
///
/// Implementations attach the access token and honor the TLS-verification
/// toggle on every call; each call carries its own timeout and never blocks
/// the host indefinitely.
#[async_trait]
pub trait ScanGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Submit a file or link for scanning. `passwords` are unlock candidates
    /// for encrypted content, at most five, in operator order.
    async fn submit(
        &self,
        target: &ScanTarget,
        priority: u8,
        passwords: &[String],
    ) -> Result<RemoteJobId, GatewayError>;

    /// One status query. `Pending` until the remote job reports ready.
    async fn get_status(&self, job_id: &str) -> Result<StatusReply, GatewayError>;

    async fn healthcheck(&self) -> Result<(), GatewayError>;

    /// Task page URL for operators with link disclosure enabled.
    fn job_link(&self, job_id: &str) -> String;
}
