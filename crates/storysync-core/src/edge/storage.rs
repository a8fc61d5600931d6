//! Named cache namespaces mapping request URLs to stored responses.

use std::collections::{BTreeMap, HashMap};

use libsql::params::Params;
use libsql::{Connection, Value};
use tokio::sync::RwLock;

use super::EdgeResponse;
use crate::error::{Error, Result};
use crate::util::now_millis;

/// Storage backend for edge cache namespaces.
#[allow(async_fn_in_trait)]
pub trait CacheStorage {
    /// Names of every namespace that currently exists.
    async fn namespaces(&self) -> Result<Vec<String>>;

    /// Create the namespace if it does not exist yet.
    async fn open(&self, namespace: &str) -> Result<()>;

    /// Store a response, replacing any previous entry for the URL.
    async fn put(&self, namespace: &str, url: &str, response: &EdgeResponse) -> Result<()>;

    async fn get(&self, namespace: &str, url: &str) -> Result<Option<EdgeResponse>>;

    /// Remove a namespace and all of its entries.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool>;

    async fn entry_count(&self, namespace: &str) -> Result<usize>;

    /// First match for the URL across every namespace, in name order.
    async fn match_any(&self, url: &str) -> Result<Option<EdgeResponse>> {
        for namespace in self.namespaces().await? {
            if let Some(response) = self.get(&namespace, url).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

/// In-memory cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    namespaces: RwLock<BTreeMap<String, HashMap<String, EdgeResponse>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryCacheStorage {
    async fn namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.read().await.keys().cloned().collect())
    }

    async fn open(&self, namespace: &str) -> Result<()> {
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default();
        Ok(())
    }

    async fn put(&self, namespace: &str, url: &str, response: &EdgeResponse) -> Result<()> {
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(url.to_string(), response.clone());
        Ok(())
    }

    async fn get(&self, namespace: &str, url: &str) -> Result<Option<EdgeResponse>> {
        Ok(self
            .namespaces
            .read()
            .await
            .get(namespace)
            .and_then(|entries| entries.get(url))
            .cloned())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.write().await.remove(namespace).is_some())
    }

    async fn entry_count(&self, namespace: &str) -> Result<usize> {
        Ok(self
            .namespaces
            .read()
            .await
            .get(namespace)
            .map_or(0, HashMap::len))
    }
}

/// libSQL-backed cache storage using the `edge_cache_*` tables.
pub struct LibSqlCacheStorage<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCacheStorage<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CacheStorage for LibSqlCacheStorage<'_> {
    async fn namespaces(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT name FROM edge_cache_namespaces ORDER BY name", ())
            .await?;
        let mut names = Vec::new();
        while let Some(row) = rows.next().await? {
            names.push(row.get::<String>(0)?);
        }
        Ok(names)
    }

    async fn open(&self, namespace: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO edge_cache_namespaces (name, created_at) VALUES (?, ?)",
                Params::Positional(vec![
                    Value::Text(namespace.to_string()),
                    Value::Integer(now_millis()),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn put(&self, namespace: &str, url: &str, response: &EdgeResponse) -> Result<()> {
        self.open(namespace).await?;
        let headers = serde_json::to_string(&response.headers)?;
        self.conn
            .execute(
                "INSERT INTO edge_cache_entries (namespace, url, status, headers, body, stored_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(namespace, url) DO UPDATE SET
                     status = excluded.status,
                     headers = excluded.headers,
                     body = excluded.body,
                     stored_at = excluded.stored_at",
                Params::Positional(vec![
                    Value::Text(namespace.to_string()),
                    Value::Text(url.to_string()),
                    Value::Integer(i64::from(response.status)),
                    Value::Text(headers),
                    Value::Blob(response.body.clone()),
                    Value::Integer(now_millis()),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, namespace: &str, url: &str) -> Result<Option<EdgeResponse>> {
        let mut rows = self
            .conn
            .query(
                "SELECT status, headers, body FROM edge_cache_entries
                 WHERE namespace = ? AND url = ?",
                [namespace, url],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let status = u16::try_from(row.get::<i64>(0)?)
            .map_err(|_| Error::Database(format!("Invalid cached status for {url}")))?;
        let headers = serde_json::from_str(&row.get::<String>(1)?)?;
        let body = match row.get_value(2)? {
            Value::Blob(bytes) => bytes,
            _ => Vec::new(),
        };
        Ok(Some(EdgeResponse {
            status,
            headers,
            body,
        }))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        self.conn
            .execute("DELETE FROM edge_cache_entries WHERE namespace = ?", [namespace])
            .await?;
        let removed = self
            .conn
            .execute("DELETE FROM edge_cache_namespaces WHERE name = ?", [namespace])
            .await?;
        Ok(removed > 0)
    }

    async fn entry_count(&self, namespace: &str) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM edge_cache_entries WHERE namespace = ?",
                [namespace],
            )
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
