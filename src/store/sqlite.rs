use super::{CopyTarget, MetadataStore, RunQuery, RunRecord};
use crate::error::StoreError;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const BUSY_TIMEOUT_SECS: u64 = 30;

/// Run records stored as JSON documents, one row per run.
///
/// Status and start time are mirrored into columns so most queries are
/// narrowed in SQL before the nested copy predicate runs in process.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }

        let url = format!("sqlite://{}", path.display());
        let options = SqliteConnectOptions::from_str(&url)
            .with_context(|| format!("Invalid store path: {}", path.display()))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open metadata DB: {}", path.display()))?;

        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }
}

async fn ensure_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS runs (
            number      INTEGER PRIMARY KEY,
            status      TEXT NOT NULL,
            start_time  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            doc         TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create runs table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status, start_time)")
        .execute(pool)
        .await
        .context("Failed to create runs index")?;

    Ok(())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode(number: i64, doc: &str) -> Result<RunRecord, StoreError> {
    serde_json::from_str(doc).map_err(|e| StoreError::Corrupt {
        number: u32::try_from(number).unwrap_or(u32::MAX),
        reason: e.to_string(),
    })
}

async fn load_for_update(
    conn: &mut SqliteConnection,
    number: u32,
) -> Result<Option<RunRecord>, StoreError> {
    let row = sqlx::query("SELECT number, doc FROM runs WHERE number = ?")
        .bind(i64::from(number))
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|row| decode(row.try_get("number")?, row.try_get::<&str, _>("doc")?))
        .transpose()
}

async fn write_doc(conn: &mut SqliteConnection, run: &RunRecord) -> Result<(), StoreError> {
    let doc = serde_json::to_string(run)?;
    sqlx::query(
        "INSERT INTO runs (number, status, start_time, updated_at, doc)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(number) DO UPDATE SET
            status = excluded.status,
            start_time = excluded.start_time,
            updated_at = excluded.updated_at,
            doc = excluded.doc",
    )
    .bind(i64::from(run.number))
    .bind(run.processing_status.to_string())
    .bind(timestamp(run.start_time))
    .bind(timestamp(Utc::now()))
    .bind(doc)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn retire_in_tx(
    conn: &mut SqliteConnection,
    number: u32,
    target: &CopyTarget,
    removed_by: &str,
    removed_at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let Some(mut run) = load_for_update(conn, number).await? else {
        return Ok(false);
    };
    if !run.retire(target, removed_by, removed_at) {
        return Ok(false);
    }
    write_doc(conn, &run).await?;
    Ok(true)
}

#[async_trait]
impl MetadataStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>, StoreError> {
        let rows = if let Some(number) = query.number {
            sqlx::query("SELECT number, doc FROM runs WHERE number = ?")
                .bind(i64::from(number))
                .fetch_all(&self.pool)
                .await?
        } else if let Some(cutoff) = query.started_before {
            sqlx::query("SELECT number, doc FROM runs WHERE start_time <= ? ORDER BY number ASC")
                .bind(timestamp(cutoff))
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT number, doc FROM runs ORDER BY number ASC")
                .fetch_all(&self.pool)
                .await?
        };

        let mut runs = Vec::new();
        for row in rows {
            let run = decode(row.try_get("number")?, row.try_get::<&str, _>("doc")?)?;
            if query.matches(&run) {
                runs.push(run);
            }
        }
        Ok(runs)
    }

    async fn retire_copy(
        &self,
        number: u32,
        target: &CopyTarget,
        removed_by: &str,
        removed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        // IMMEDIATE takes the write lock before the read so the pop/push pair
        // cannot interleave with another agent's update of the same run.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        match retire_in_tx(&mut conn, number, target, removed_by, removed_at).await {
            Ok(applied) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(applied)
            }
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::warn!(error = %rollback, run = number, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn upsert_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        write_doc(&mut conn, run).await
    }
}
