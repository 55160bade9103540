use std::sync::Arc;

use anyhow::Result;

use sandgate_core::api::{AppConfig, ScanGateway};

use crate::gateway::HttpScanGateway;
use crate::store::SqliteStore;

pub fn build_gateway(cfg: &AppConfig) -> Result<Arc<dyn ScanGateway>> {
    Ok(Arc::new(HttpScanGateway::new(
        cfg.gateway.base_url.clone(),
        cfg.gateway.api_token.clone(),
        cfg.gateway.verify_tls,
    )?))
}

/// The store implements both `QuotaLedger` and `OperatorDirectory`; callers
/// hand out the same `Arc` under either trait.
pub async fn build_store(cfg: &AppConfig) -> Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::connect(&cfg.store.path).await?))
}
