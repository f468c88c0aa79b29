//! Schema migrations for the offline database

use libsql::Connection;

use crate::error::Result;

/// Statements of each schema version, applied in order inside one transaction.
const MIGRATIONS: &[(i64, &[&str])] = &[(
    1,
    &[
        // One row per queued record; `synced` flips once the server accepts it
        "CREATE TABLE IF NOT EXISTS offline_records (
            kind TEXT NOT NULL,
            id TEXT NOT NULL,
            payload TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0,
            queued_at INTEGER NOT NULL,
            PRIMARY KEY (kind, id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_offline_records_pending
            ON offline_records(kind, synced, queued_at)",
        // JSON blobs owned by the engine, e.g. the conflict list
        "CREATE TABLE IF NOT EXISTS sync_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    ],
)];

/// Bring the schema to the newest version. Already applied versions are skipped.
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;

    let applied = schema_version(conn).await?;
    for (version, statements) in MIGRATIONS {
        if *version <= applied {
            continue;
        }
        apply(conn, *version, statements).await?;
        tracing::info!("Offline database migrated to schema v{version}");
    }
    Ok(())
}

async fn schema_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i64>(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, version: i64, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for statement in statements {
        if let Err(error) = conn.execute(statement, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }
    }

    let recorded = conn
        .execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            libsql::params![version],
        )
        .await;
    if let Err(error) = recorded {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }

    if let Err(error) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test(flavor = "multi_thread")]
    async fn rerunning_keeps_latest_version() {
        let db = Database::open_in_memory().await.unwrap();
        run(db.connection()).await.unwrap();

        let latest = MIGRATIONS.last().map_or(0, |(version, _)| *version);
        assert_eq!(schema_version(db.connection()).await.unwrap(), latest);

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM schema_version", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queue_and_state_tables_exist() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db
            .connection()
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
                (),
            )
            .await
            .unwrap();

        let mut tables = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            tables.push(row.get::<String>(0).unwrap());
        }
        assert!(tables.contains(&"offline_records".to_string()));
        assert!(tables.contains(&"sync_state".to_string()));
    }
}
