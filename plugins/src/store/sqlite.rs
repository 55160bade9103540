use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use sandgate_core::api::{
    LedgerError, OperatorDirectory, OperatorId, OperatorRecord, OperatorRole, QuotaLedger,
    QuotaProfile,
};

/// sqlite-backed implementation of both row sets: operator identities and
/// quota counters. Every trait operation is a single statement or a single
/// transaction, so concurrent sessions need no further coordination.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .with_context(|| format!("invalid sqlite path: {path}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("could not open sqlite database at {path}"))?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Ephemeral store for tests and dry runs. The pool is pinned to one
    /// connection because each sqlite `:memory:` connection is its own
    /// database.
    pub async fn connect_in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS operators (
                operator_id INTEGER PRIMARY KEY,
                role        TEXT    NOT NULL,
                comment     TEXT    NOT NULL DEFAULT '',
                created_by  INTEGER NOT NULL,
                created_at  TEXT    NOT NULL,
                updated_at  TEXT    NOT NULL,
                blocked     INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quota_profiles (
                operator_id            INTEGER PRIMARY KEY,
                max_daily_units        INTEGER NOT NULL,
                remaining_units        INTEGER NOT NULL,
                lifetime_total_units   INTEGER NOT NULL DEFAULT 0,
                priority_tier          INTEGER NOT NULL,
                link_disclosure_allowed INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn storage(err: sqlx::Error) -> LedgerError {
    LedgerError::Storage(err.into())
}

#[derive(sqlx::FromRow)]
struct QuotaRow {
    operator_id: i64,
    max_daily_units: i64,
    remaining_units: i64,
    lifetime_total_units: i64,
    priority_tier: i64,
    link_disclosure_allowed: i64,
}

impl From<QuotaRow> for QuotaProfile {
    fn from(row: QuotaRow) -> Self {
        QuotaProfile {
            operator_id: row.operator_id,
            max_daily_units: row.max_daily_units as u32,
            remaining_units: row.remaining_units as u32,
            lifetime_total_units: row.lifetime_total_units as u64,
            priority_tier: row.priority_tier as u8,
            link_disclosure_allowed: row.link_disclosure_allowed != 0,
        }
    }
}

#[async_trait]
impl QuotaLedger for SqliteStore {
    async fn profile(&self, id: OperatorId) -> Result<Option<QuotaProfile>, LedgerError> {
        let row = sqlx::query_as::<_, QuotaRow>(
            "SELECT operator_id, max_daily_units, remaining_units, lifetime_total_units, \
             priority_tier, link_disclosure_allowed FROM quota_profiles WHERE operator_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(QuotaProfile::from))
    }

    async fn reserve_check(&self, id: OperatorId) -> Result<u32, LedgerError> {
        let row = sqlx::query("SELECT remaining_units FROM quota_profiles WHERE operator_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => Ok(row.get::<i64, _>(0) as u32),
            None => Err(LedgerError::OperatorNotFound(id)),
        }
    }

    async fn commit_decrement(&self, id: OperatorId, amount: u32) -> Result<(), LedgerError> {
        // One statement keeps the zero floor atomic under concurrent debits.
        let result = sqlx::query(
            "UPDATE quota_profiles SET remaining_units = MAX(remaining_units - ?, 0) \
             WHERE operator_id = ?",
        )
        .bind(i64::from(amount))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::OperatorNotFound(id));
        }
        Ok(())
    }

    async fn increment_lifetime(&self, id: OperatorId, amount: u32) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE quota_profiles SET lifetime_total_units = lifetime_total_units + ? \
             WHERE operator_id = ?",
        )
        .bind(i64::from(amount))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::OperatorNotFound(id));
        }
        Ok(())
    }

    /// Overrides the trait's best-effort pair: both counters settle in one
    /// statement, so they can never diverge.
    async fn record_submission(&self, id: OperatorId) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE quota_profiles SET remaining_units = MAX(remaining_units - 1, 0), \
             lifetime_total_units = lifetime_total_units + 1 WHERE operator_id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::OperatorNotFound(id));
        }
        Ok(())
    }

    async fn create_profile(&self, profile: &QuotaProfile) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO quota_profiles (operator_id, max_daily_units, remaining_units, \
             lifetime_total_units, priority_tier, link_disclosure_allowed) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(profile.operator_id)
        .bind(i64::from(profile.max_daily_units))
        .bind(i64::from(profile.remaining_units))
        .bind(profile.lifetime_total_units as i64)
        .bind(i64::from(profile.priority_tier))
        .bind(i64::from(profile.link_disclosure_allowed))
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn daily_reset(&self) -> Result<(), LedgerError> {
        let result = sqlx::query("UPDATE quota_profiles SET remaining_units = max_daily_units")
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        info!(rows = result.rows_affected(), "daily quota reset applied");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct OperatorRow {
    operator_id: i64,
    role: String,
    comment: String,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    blocked: i64,
}

impl OperatorRow {
    fn into_record(self) -> anyhow::Result<OperatorRecord> {
        let role = OperatorRole::parse(&self.role)
            .with_context(|| format!("unknown operator role in store: {}", self.role))?;
        Ok(OperatorRecord {
            operator_id: self.operator_id,
            role,
            comment: self.comment,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            blocked: self.blocked != 0,
        })
    }
}

#[async_trait]
impl OperatorDirectory for SqliteStore {
    async fn lookup(&self, id: OperatorId) -> anyhow::Result<Option<OperatorRecord>> {
        let row = sqlx::query_as::<_, OperatorRow>(
            "SELECT operator_id, role, comment, created_by, created_at, updated_at, blocked \
             FROM operators WHERE operator_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(OperatorRow::into_record).transpose()
    }

    async fn insert(&self, record: &OperatorRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO operators (operator_id, role, comment, created_by, created_at, \
             updated_at, blocked) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.operator_id)
        .bind(record.role.as_str())
        .bind(&record.comment)
        .bind(record.created_by)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(i64::from(record.blocked))
        .execute(&self.pool)
        .await?;
        info!(operator = record.operator_id, role = record.role.as_str(), "operator created");
        Ok(())
    }

    async fn set_blocked(&self, id: OperatorId, blocked: bool) -> anyhow::Result<()> {
        sqlx::query("UPDATE operators SET blocked = ?, updated_at = ? WHERE operator_id = ?")
            .bind(i64::from(blocked))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Identity and quota rows go together; deletion revokes access.
    async fn delete(&self, id: OperatorId) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM quota_profiles WHERE operator_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM operators WHERE operator_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(operator = id, "operator deleted");
        Ok(())
    }
}
