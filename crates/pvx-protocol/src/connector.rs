//! # Coordinator Connector Handles
//!
//! Handles are tagged by connector with the `@type` field. The hive (file tables)
//! and tpch (generated benchmark tables) connectors are modelled in full. Any other
//! tag deserializes into an `Unsupported` variant, so a plan for a connector the
//! engine cannot serve still parses and fails later, during translation, with a
//! descriptive error.

use serde::{Deserialize, Serialize};

use crate::domain::TupleDomain;
use crate::expr::RowExpression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    PartitionKey,
    Regular,
    Synthesized,
    Aggregated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveColumnHandle {
    pub name: String,
    /// Type signature of the column in the engine's type system.
    pub type_signature: String,
    pub hive_column_index: i32,
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub required_subfields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpchColumnHandle {
    pub column_name: String,
    #[serde(rename = "type")]
    pub type_signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ColumnHandle {
    #[serde(rename = "hive")]
    Hive(HiveColumnHandle),
    #[serde(rename = "tpch")]
    Tpch(TpchColumnHandle),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveTableHandle {
    pub schema_name: String,
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpchTableHandle {
    pub table_name: String,
    pub scale_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ConnectorTableHandle {
    #[serde(rename = "hive")]
    Hive(HiveTableHandle),
    #[serde(rename = "tpch")]
    Tpch(TpchTableHandle),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTableName {
    /// Empty when the table has no schema qualifier.
    #[serde(default)]
    pub schema: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveTableLayoutHandle {
    pub schema_table_name: SchemaTableName,
    #[serde(default)]
    pub table_path: String,
    #[serde(default)]
    pub partition_columns: Vec<HiveColumnHandle>,
    #[serde(default)]
    pub data_columns: Vec<HiveColumnHandle>,
    pub domain_predicate: TupleDomain,
    pub remaining_predicate: RowExpression,
    pub pushdown_filter_enabled: bool,
    #[serde(default)]
    pub layout_string: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpchTableLayoutHandle {
    pub table: TpchTableHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ConnectorTableLayoutHandle {
    #[serde(rename = "hive")]
    Hive(HiveTableLayoutHandle),
    #[serde(rename = "tpch")]
    Tpch(TpchTableLayoutHandle),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableHandle {
    pub connector_id: String,
    pub connector_handle: ConnectorTableHandle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_table_layout: Option<ConnectorTableLayoutHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableType {
    New,
    Existing,
    Temporary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHandle {
    pub target_path: String,
    pub write_path: String,
    pub table_type: TableType,
}

/// Hive handle for `CREATE TABLE AS` and `INSERT` targets; both carry the same fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveWriteTableHandle {
    pub schema_name: String,
    pub table_name: String,
    pub input_columns: Vec<HiveColumnHandle>,
    pub location_handle: LocationHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ConnectorWriteTableHandle {
    #[serde(rename = "hive")]
    Hive(HiveWriteTableHandle),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteTableHandle {
    pub connector_id: String,
    pub connector_handle: ConnectorWriteTableHandle,
}
