use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use sandgate_core::api::{
    AppConfig, OperatorDirectory, OperatorRecord, OperatorRole, QuotaLedger, QuotaProfile,
    SessionEngine,
};
use sandgate_plugins::factory;
use sandgate_plugins::store::SqliteStore;

use crate::commands::cli::ServeArgs;
use crate::{console, scheduler};

pub async fn run(cfg: AppConfig, args: ServeArgs) -> anyhow::Result<()> {
    let store = factory::build_store(&cfg).await?;
    let gateway = factory::build_gateway(&cfg)?;

    bootstrap(&cfg, store.as_ref()).await?;

    let ledger: Arc<dyn QuotaLedger> = store.clone();
    let directory: Arc<dyn OperatorDirectory> = store.clone();

    // The reset task runs independently of operator sessions and isolates
    // its own failures.
    let _reset_task = scheduler::spawn_daily_reset(ledger.clone());

    let engine = SessionEngine::new(gateway, ledger, directory);

    let operator = args
        .operator
        .or(cfg.bootstrap.as_ref().map(|boot| boot.operator_id))
        .context("no operator id: pass --operator or configure [bootstrap]")?;
    info!(operator, "starting console session");
    console::drive(engine, operator).await
}

/// Provision the first administrator before any event is accepted, the same
/// way an empty deployment would otherwise have nobody able to log in.
async fn bootstrap(cfg: &AppConfig, store: &SqliteStore) -> anyhow::Result<()> {
    let Some(boot) = &cfg.bootstrap else {
        return Ok(());
    };
    if store.lookup(boot.operator_id).await?.is_some() {
        return Ok(());
    }

    info!(
        operator = boot.operator_id,
        "provisioning bootstrap administrator"
    );
    store
        .insert(&OperatorRecord::new(
            boot.operator_id,
            OperatorRole::Admin,
            "bootstrap administrator",
            boot.operator_id,
            Utc::now(),
        ))
        .await?;
    store
        .create_profile(&QuotaProfile::new(
            boot.operator_id,
            boot.max_daily_units,
            boot.priority_tier,
            boot.link_disclosure_allowed,
        ))
        .await?;
    Ok(())
}
