//! Local record log.
//!
//! An opaque store of JSON objects tagged with a kind. Records are stamped
//! with an epoch-millisecond timestamp on save and listed by timestamp.

use super::connection::CacheDb;
use super::migrations::SCHEMA_VERSION;
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Name reported by [`CacheDb::record_stats`].
pub const RECORD_STORE: &str = "records";

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub kind: String,
    pub payload: Map<String, Value>,
    pub timestamp: i64,
    pub version: i64,
    pub updated_at: Option<i64>,
}

/// Listing order by timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters for [`CacheDb::query_records`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RecordQuery {
    /// Only records of this kind.
    #[serde(default)]
    pub kind: Option<String>,
    /// Maximum number of records; 0 means no limit.
    #[serde(default)]
    pub limit: usize,
    /// Number of matching records to skip.
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub order: SortOrder,
}

/// Record store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordStats {
    pub total_records: u64,
    pub store_name: String,
    pub version: i64,
}

/// Full dump of the record log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordExport {
    pub export_date: String,
    pub version: i64,
    pub total_records: u64,
    pub data: Vec<Record>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, i64, i64, Option<i64>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn decode(raw: (i64, String, String, i64, i64, Option<i64>)) -> Result<Record, Error> {
    let (id, kind, payload_json, timestamp, version, updated_at) = raw;
    Ok(Record { id, kind, payload: serde_json::from_str(&payload_json)?, timestamp, version, updated_at })
}

impl CacheDb {
    /// Append a record and return it with its assigned id.
    pub async fn save_record(&self, kind: &str, payload: Map<String, Value>) -> Result<Record, Error> {
        if kind.trim().is_empty() {
            return Err(Error::InvalidInput("record kind cannot be empty".into()));
        }
        let kind = kind.to_string();
        let payload_json = serde_json::to_string(&payload)?;
        let timestamp = now_ms();
        self.conn
            .call(move |conn| -> Result<Record, Error> {
                conn.execute(
                    "INSERT INTO records (kind, payload_json, timestamp, version) VALUES (?1, ?2, ?3, 1)",
                    params![kind, payload_json, timestamp],
                )?;
                Ok(Record { id: conn.last_insert_rowid(), kind, payload, timestamp, version: 1, updated_at: None })
            })
            .await
            .map_err(Error::from)
    }

    /// List records by timestamp, optionally filtered by kind and paged.
    pub async fn query_records(&self, query: &RecordQuery) -> Result<Vec<Record>, Error> {
        let query = query.clone();
        self.conn
            .call(move |conn| -> Result<Vec<Record>, Error> {
                let order = match query.order {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                let limit = if query.limit == 0 { -1 } else { query.limit as i64 };
                let sql = format!(
                    "SELECT id, kind, payload_json, timestamp, version, updated_at FROM records
                     WHERE (?1 IS NULL OR kind = ?1)
                     ORDER BY timestamp {order}, id {order}
                     LIMIT ?2 OFFSET ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![query.kind, limit, query.offset as i64], row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(decode).collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Get one record by id.
    pub async fn get_record(&self, id: i64) -> Result<Option<Record>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<Record>, Error> {
                let result = conn.query_row(
                    "SELECT id, kind, payload_json, timestamp, version, updated_at FROM records WHERE id = ?1",
                    params![id],
                    row_to_record,
                );
                match result {
                    Ok(raw) => Ok(Some(decode(raw)?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Shallow-merge `updates` into a record's payload and stamp `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no record has this id.
    pub async fn update_record(&self, id: i64, updates: Map<String, Value>) -> Result<Record, Error> {
        self.conn
            .call(move |conn| -> Result<Record, Error> {
                let tx = conn.transaction()?;
                let raw = match tx.query_row(
                    "SELECT id, kind, payload_json, timestamp, version, updated_at FROM records WHERE id = ?1",
                    params![id],
                    row_to_record,
                ) {
                    Ok(raw) => raw,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Err(Error::NotFound(format!("record {id}"))),
                    Err(e) => return Err(e.into()),
                };

                let mut record = decode(raw)?;
                record.payload.extend(updates);
                record.updated_at = Some(now_ms());

                tx.execute(
                    "UPDATE records SET payload_json = ?1, updated_at = ?2 WHERE id = ?3",
                    params![serde_json::to_string(&record.payload)?, record.updated_at, id],
                )?;
                tx.commit()?;
                Ok(record)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one record. Returns false if it did not exist.
    pub async fn delete_record(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM records WHERE id = ?1", params![id])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every record. Returns the number removed.
    pub async fn clear_records(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM records", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn record_stats(&self) -> Result<RecordStats, Error> {
        let total: i64 = self
            .conn
            .call(|conn| -> Result<i64, Error> {
                Ok(conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?)
            })
            .await
            .map_err(Error::from)?;

        Ok(RecordStats { total_records: total as u64, store_name: RECORD_STORE.into(), version: SCHEMA_VERSION })
    }

    /// Dump every record, newest first.
    pub async fn export_records(&self) -> Result<RecordExport, Error> {
        let data = self.query_records(&RecordQuery::default()).await?;
        Ok(RecordExport {
            export_date: chrono::Utc::now().to_rfc3339(),
            version: SCHEMA_VERSION,
            total_records: data.len() as u64,
            data,
        })
    }

    /// Re-save every record of an export. Ids and timestamps are reassigned.
    pub async fn import_records(&self, export: &RecordExport) -> Result<u64, Error> {
        let mut imported = 0;
        for record in &export.data {
            self.save_record(&record.kind, record.payload.clone()).await?;
            imported += 1;
        }
        Ok(imported)
    }
}
