//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &V1_STATEMENTS).await?;
    }
    if version < 2 {
        apply(conn, 2, &V2_STATEMENTS).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: story records (offline queue + local copy of remote truth)
const V1_STATEMENTS: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS stories (
        id TEXT PRIMARY KEY,
        description TEXT,
        lat REAL,
        lon REAL,
        photo_kind TEXT,
        photo_mime TEXT,
        photo_blob BLOB,
        photo_url TEXT,
        created_at INTEGER NOT NULL,
        synced INTEGER NOT NULL DEFAULT 0,
        deleted INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_stories_created ON stories(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_stories_pending ON stories(synced, deleted)",
    "INSERT INTO schema_version (version) VALUES (1)",
];

/// Version 2: persisted edge cache namespaces
const V2_STATEMENTS: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS edge_cache_namespaces (
        name TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS edge_cache_entries (
        namespace TEXT NOT NULL REFERENCES edge_cache_namespaces(name) ON DELETE CASCADE,
        url TEXT NOT NULL,
        status INTEGER NOT NULL,
        headers TEXT NOT NULL,
        body BLOB NOT NULL,
        stored_at INTEGER NOT NULL,
        PRIMARY KEY (namespace, url)
    )",
    "CREATE INDEX IF NOT EXISTS idx_edge_cache_entries_url ON edge_cache_entries(url)",
    "INSERT INTO schema_version (version) VALUES (2)",
];

// libsql doesn't have execute_batch, so each statement runs inside one transaction
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version} (target {CURRENT_VERSION})");
    Ok(())
}
