//! Cache schema versions.
//!
//! The schema version lives in SQLite's `user_version` pragma. Each step
//! runs in its own transaction together with the version bump, so a
//! database is never left half way between two versions.

use super::Error;
use tokio_rusqlite::Connection;

/// Schema steps as (version, SQL), in ascending version order.
const STEPS: &[(u32, &str)] = &[(1, include_str!("../../migrations/001_cache_storage.sql"))];

/// Newest schema version this build understands.
pub fn latest() -> u32 {
    STEPS.last().map_or(0, |(version, _)| *version)
}

/// Bring the schema up to date and return the versions that were applied.
///
/// # Errors
///
/// Fails if a step's SQL fails, or if the database was written by a newer
/// build with a schema this one doesn't know.
pub async fn run(conn: &Connection) -> Result<Vec<u32>, Error> {
    conn.call(|conn| -> Result<Vec<u32>, Error> {
        let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if current > latest() {
            return Err(Error::MigrationFailed(format!(
                "cache schema v{current} is newer than supported v{}",
                latest()
            )));
        }

        let mut applied = Vec::new();
        for (version, sql) in STEPS.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("v{version}: {e}")))?;
            tx.pragma_update(None, "user_version", version)?;
            tx.commit()?;
            applied.push(*version);
        }
        Ok(applied)
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user_version(conn: &Connection) -> u32 {
        conn.call(|conn| conn.query_row("PRAGMA user_version", [], |row| row.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_applies_pending_steps_once() {
        let conn = Connection::open_in_memory().await.unwrap();
        assert_eq!(run(&conn).await.unwrap(), vec![1]);
        assert!(run(&conn).await.unwrap().is_empty());
        assert_eq!(user_version(&conn).await, latest());

        let has_entries: bool = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='entries')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert!(has_entries);
    }

    #[tokio::test]
    async fn test_rejects_newer_schema() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| conn.pragma_update(None, "user_version", 99))
            .await
            .unwrap();

        assert!(matches!(run(&conn).await, Err(Error::MigrationFailed(_))));
    }
}
