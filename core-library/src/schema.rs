//! Snapshot table schema and migrations.
//!
//! Every snapshot database holds one table, `artist_snapshots`. Shards are
//! unconstrained; an older canonical file may carry `UNIQUE(id, timestamp)`,
//! which [`drop_unique_constraint`] migrates away before a merge writes to it.

use crate::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

pub const SNAPSHOT_TABLE: &str = "artist_snapshots";

/// Temporary name of the constrained table while rows are copied out.
pub const CONSTRAINED_TABLE: &str = "artist_snapshots_with_constraint";

pub const ID_INDEX: &str = "artist_snapshot_id";
pub const TIMESTAMP_INDEX: &str = "artist_snapshot_timestamp";

/// One step of a schema change. Identifiers are fixed names from this module,
/// never user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOp {
    CreateTable { name: &'static str, unique: bool },
    RenameTable { from: &'static str, to: &'static str },
    CopyRows { from: &'static str, to: &'static str },
    DropTable { name: &'static str },
    CreateIndex {
        name: &'static str,
        table: &'static str,
        column: &'static str,
    },
}

impl SchemaOp {
    pub fn sql(&self) -> String {
        match self {
            SchemaOp::CreateTable { name, unique } => {
                let constraint = if *unique {
                    ", UNIQUE(id, timestamp)"
                } else {
                    ""
                };
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (id TEXT, timestamp NUMERIC, followers NUMERIC, popularity NUMERIC{})",
                    name, constraint
                )
            }
            SchemaOp::RenameTable { from, to } => format!("ALTER TABLE {} RENAME TO {}", from, to),
            SchemaOp::CopyRows { from, to } => format!(
                "INSERT INTO {} (id, timestamp, followers, popularity) SELECT id, timestamp, followers, popularity FROM {}",
                to, from
            ),
            SchemaOp::DropTable { name } => format!("DROP TABLE IF EXISTS {}", name),
            SchemaOp::CreateIndex {
                name,
                table,
                column,
            } => format!("CREATE INDEX IF NOT EXISTS {} ON {} ({})", name, table, column),
        }
    }
}

/// Steps that replace a constrained snapshot table with an unconstrained one
/// holding the same rows.
pub fn constraint_removal_plan() -> Vec<SchemaOp> {
    vec![
        SchemaOp::RenameTable {
            from: SNAPSHOT_TABLE,
            to: CONSTRAINED_TABLE,
        },
        SchemaOp::CreateTable {
            name: SNAPSHOT_TABLE,
            unique: false,
        },
        SchemaOp::CopyRows {
            from: CONSTRAINED_TABLE,
            to: SNAPSHOT_TABLE,
        },
        SchemaOp::DropTable {
            name: CONSTRAINED_TABLE,
        },
    ]
}

pub fn index_plan() -> Vec<SchemaOp> {
    vec![
        SchemaOp::CreateIndex {
            name: ID_INDEX,
            table: SNAPSHOT_TABLE,
            column: "id",
        },
        SchemaOp::CreateIndex {
            name: TIMESTAMP_INDEX,
            table: SNAPSHOT_TABLE,
            column: "timestamp",
        },
    ]
}

/// Create `artist_snapshots` if it does not exist.
pub async fn create_snapshot_table(pool: &SqlitePool, unique: bool) -> Result<()> {
    let op = SchemaOp::CreateTable {
        name: SNAPSHOT_TABLE,
        unique,
    };
    sqlx::query(&op.sql()).execute(pool).await?;
    Ok(())
}

pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Whether `artist_snapshots` carries a table-level UNIQUE constraint.
///
/// SQLite backs such constraints with an automatic index whose origin is
/// `u`; explicitly created indexes report `c`.
pub async fn has_unique_constraint(pool: &SqlitePool) -> Result<bool> {
    let rows = sqlx::query(&format!("PRAGMA index_list({})", SNAPSHOT_TABLE))
        .fetch_all(pool)
        .await?;

    for row in rows {
        let origin: String = row.try_get("origin")?;
        if origin == "u" {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Remove the UNIQUE constraint if present, then reclaim the freed pages.
///
/// Returns `true` when a migration ran. All table steps commit together; a
/// failure leaves the original table untouched.
#[instrument(skip(pool))]
pub async fn drop_unique_constraint(pool: &SqlitePool) -> Result<bool> {
    if !has_unique_constraint(pool).await? {
        debug!("Snapshot table is already unconstrained");
        return Ok(false);
    }

    info!("Removing UNIQUE(id, timestamp) from {}", SNAPSHOT_TABLE);

    let mut tx = pool.begin().await?;
    for op in constraint_removal_plan() {
        let sql = op.sql();
        debug!(statement = %sql, "Applying schema step");
        sqlx::query(&sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    // VACUUM is not allowed inside a transaction.
    crate::db::vacuum(pool).await?;

    info!("Constraint removed");
    Ok(true)
}

pub async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    for op in index_plan() {
        sqlx::query(&op.sql()).execute(pool).await?;
    }
    Ok(())
}

/// Delete rows that repeat an `(id, timestamp)` already stored, keeping the
/// earliest inserted copy. Returns the number of rows removed.
pub async fn dedupe_by_natural_key(pool: &SqlitePool) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {table} WHERE rowid NOT IN (SELECT MIN(rowid) FROM {table} GROUP BY id, timestamp)",
        table = SNAPSHOT_TABLE
    );
    let result = sqlx::query(&sql).execute(pool).await?;
    Ok(result.rows_affected())
}

/// Artist ids that already have a row at `timestamp`.
pub async fn ids_at_timestamp(pool: &SqlitePool, timestamp: i64) -> Result<HashSet<String>> {
    let ids: Vec<String> = sqlx::query_scalar(&format!(
        "SELECT DISTINCT id FROM {} WHERE timestamp = ?",
        SNAPSHOT_TABLE
    ))
    .bind(timestamp)
    .fetch_all(pool)
    .await?;
    Ok(ids.into_iter().collect())
}

pub async fn count_snapshots(pool: &SqlitePool) -> Result<u64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", SNAPSHOT_TABLE))
        .fetch_one(pool)
        .await?;
    Ok(count.max(0) as u64)
}

pub async fn index_names(pool: &SqlitePool) -> Result<Vec<String>> {
    let names = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL ORDER BY name",
    )
    .bind(SNAPSHOT_TABLE)
    .fetch_all(pool)
    .await?;
    Ok(names)
}
