//! Versioned cache generations and their entries.
//!
//! Mirrors the platform cache storage primitives: open-by-name, list-names,
//! delete, match, put. A generation is a namespace; the same [`RequestKey`]
//! may be stored in several generations independently.

use super::connection::CacheDb;
use super::hash::RequestKey;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A captured HTTP response stored under a [`RequestKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub key: RequestKey,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    pub fn new(key: RequestKey, status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { key, status, headers, body, stored_at: chrono::Utc::now().to_rfc3339() }
    }

    /// First header value with the given name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Summary of one generation, used for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
    pub bytes: u64,
}

impl CacheDb {
    /// Create the generation if it does not exist yet.
    pub async fn open_generation(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_generations (name, created_at) VALUES (?1, ?2)",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every generation, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_generations ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a generation with this name exists.
    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and every entry in it.
    ///
    /// Returns false if no generation had that name.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_generations WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Per-generation entry counts and body sizes, oldest first.
    pub async fn generation_infos(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.created_at, COUNT(e.key_hash), COALESCE(SUM(LENGTH(e.body)), 0)
                     FROM cache_generations g
                     LEFT JOIN cache_entries e ON e.cache_name = g.name
                     GROUP BY g.name
                     ORDER BY g.rowid ASC",
                )?;
                let infos = stmt
                    .query_map([], |row| {
                        Ok(GenerationInfo {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                            bytes: row.get::<_, i64>(3)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(infos)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response in a generation, replacing any entry for the same key.
    ///
    /// Opens the generation implicitly.
    pub async fn put_entry(&self, cache_name: &str, entry: &CachedResponse) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let entry = entry.clone();
        let headers_json = serde_json::to_string(&entry.headers)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_generations (name, created_at) VALUES (?1, ?2)",
                    params![cache_name, chrono::Utc::now().to_rfc3339()],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (
                        cache_name, key_hash, method, url, status, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(cache_name, key_hash) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        cache_name,
                        entry.key.hash(),
                        entry.key.method,
                        entry.key.url,
                        entry.status,
                        headers_json,
                        entry.body,
                        entry.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a key in one generation.
    pub async fn match_entry(&self, cache_name: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error> {
        let cache_name = cache_name.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, headers_json, body, stored_at
                     FROM cache_entries WHERE cache_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![cache_name, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u16>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                match result {
                    Ok((method, url, status, headers_json, body, stored_at)) => Ok(Some(CachedResponse {
                        key: RequestKey { method, url },
                        status,
                        headers: serde_json::from_str(&headers_json)?,
                        body,
                        stored_at,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Remove one entry from a generation.
    pub async fn delete_entry(&self, cache_name: &str, key: &RequestKey) -> Result<bool, Error> {
        let cache_name = cache_name.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE cache_name = ?1 AND key_hash = ?2",
                    params![cache_name, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Keys stored in a generation, in insertion order.
    pub async fn entry_keys(&self, cache_name: &str) -> Result<Vec<RequestKey>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt =
                    conn.prepare("SELECT method, url FROM cache_entries WHERE cache_name = ?1 ORDER BY rowid ASC")?;
                let keys = stmt
                    .query_map(params![cache_name], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
