//! Record log tools.

use pwa_core::cache::{RecordExport, RecordQuery};
use pwa_core::{CacheDb, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::json_result;

/// Parameters for the data_save tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataSaveParams {
    /// Record kind, e.g. "note" or "settings".
    pub kind: String,
    /// Arbitrary JSON object to store.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

pub async fn save_impl(db: &CacheDb, params: DataSaveParams) -> Result<CallToolResult, McpError> {
    let record = db.save_record(params.kind.trim(), params.payload).await?;
    json_result(&record)
}

pub async fn query_impl(db: &CacheDb, params: RecordQuery) -> Result<CallToolResult, McpError> {
    let records = db.query_records(&params).await?;
    json_result(&records)
}

/// Parameters for the data_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataUpdateParams {
    pub id: i64,
    /// Fields merged over the stored payload.
    pub payload: Map<String, Value>,
}

pub async fn update_impl(db: &CacheDb, params: DataUpdateParams) -> Result<CallToolResult, McpError> {
    let record = db.update_record(params.id, params.payload).await?;
    json_result(&record)
}

/// Parameters for the data_delete tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DataDeleteParams {
    /// Record to delete.
    #[serde(default)]
    pub id: Option<i64>,
    /// Delete every record instead.
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataDeleteOutput {
    pub deleted: u64,
}

pub async fn delete_impl(db: &CacheDb, params: DataDeleteParams) -> Result<CallToolResult, McpError> {
    let deleted = match (params.id, params.all) {
        (Some(_), true) => return Err(Error::InvalidInput("specify either id or all, not both".into()).into()),
        (Some(id), false) => u64::from(db.delete_record(id).await?),
        (None, true) => db.clear_records().await?,
        (None, false) => return Err(Error::InvalidInput("id is required unless all is set".into()).into()),
    };
    json_result(&DataDeleteOutput { deleted })
}

pub async fn stats_impl(db: &CacheDb) -> Result<CallToolResult, McpError> {
    json_result(&db.record_stats().await?)
}

pub async fn export_impl(db: &CacheDb) -> Result<CallToolResult, McpError> {
    json_result(&db.export_records().await?)
}

/// Parameters for the data_import tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataImportParams {
    /// Output of data_export.
    pub export: RecordExport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataImportOutput {
    pub imported: u64,
}

pub async fn import_impl(db: &CacheDb, params: DataImportParams) -> Result<CallToolResult, McpError> {
    let imported = db.import_records(&params.export).await?;
    tracing::info!(imported, "imported records");
    json_result(&DataImportOutput { imported })
}
