//! Store schema.
//!
//! `caches` holds one row per named store; `entries` holds the cached
//! responses keyed by `(cache_name, key_hash)` and cascades when its store is
//! deleted. Applied versions are recorded in `_migrations`.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Schema steps in version order.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_caches.sql")),
    (2, include_str!("../../migrations/002_entries.sql")),
];

/// Bring the schema up to the latest version.
///
/// Each step and its `_migrations` row commit together, so a failed step
/// leaves the earlier ones in place and is retried on the next open.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for (version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!("applied schema version {}", version);
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
