//! # Connector Handles
//!
//! Connector handles tell a table scan or table write which connector to use and
//! how. The engine knows two connectors:
//!
//! - **Hive** (file-based tables). Scans carry subfield filters that the reader
//!   evaluates while decoding, plus an optional residual expression. Writes carry a
//!   location handle.
//! - **TPC-H** (generated benchmark tables). A scan is fully described by the table
//!   and a scale factor.
//!
//! Columns are referenced by [`Subfield`] paths (`a.b[1]["key"][*]`). A path is used
//! both to key pushed-down filters and to list the parts of a complex column a scan
//! needs to materialize.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::expr::TypedExpr;
use crate::filter::Filter;
use crate::types::Type;

/// One step of a [`Subfield`] path below the root column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathElement {
    /// `.name`
    Field(String),
    /// `[42]`
    LongSubscript(i64),
    /// `["key"]`
    StringSubscript(String),
    /// `[*]`
    AllSubscripts,
}

/// A path into a (possibly nested) column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subfield {
    root: String,
    path: Vec<PathElement>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubfieldError {
    #[error("Invalid subfield path '{path}': {message}")]
    Malformed { path: String, message: String },
}

impl Subfield {
    /// A path naming a whole top-level column.
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            root: name.into(),
            path: Vec::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, SubfieldError> {
        let malformed = |message: &str| SubfieldError::Malformed {
            path: text.to_string(),
            message: message.to_string(),
        };
        let chars: Vec<char> = text.chars().collect();
        let mut pos = 0;

        let read_name = |pos: &mut usize| -> String {
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != '.' && chars[*pos] != '[' {
                *pos += 1;
            }
            chars[start..*pos].iter().collect()
        };

        let root = read_name(&mut pos);
        if root.is_empty() {
            return Err(malformed("missing root column name"));
        }

        let mut path = Vec::new();
        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    pos += 1;
                    let name = read_name(&mut pos);
                    if name.is_empty() {
                        return Err(malformed("empty field name"));
                    }
                    path.push(PathElement::Field(name));
                }
                '[' => {
                    pos += 1;
                    let close = chars[pos..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|offset| pos + offset)
                        .ok_or_else(|| malformed("unterminated subscript"))?;
                    let inner: String = chars[pos..close].iter().collect();
                    let element = if inner == "*" {
                        PathElement::AllSubscripts
                    } else if inner.len() >= 2 && inner.starts_with('"') && inner.ends_with('"') {
                        PathElement::StringSubscript(inner[1..inner.len() - 1].to_string())
                    } else {
                        let index = inner
                            .parse()
                            .map_err(|_| malformed("subscript is not an integer"))?;
                        PathElement::LongSubscript(index)
                    };
                    path.push(element);
                    pos = close + 1;
                }
                _ => return Err(malformed("unexpected character")),
            }
        }
        Ok(Self { root, path })
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn path(&self) -> &[PathElement] {
        &self.path
    }
}

impl fmt::Display for Subfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for element in &self.path {
            match element {
                PathElement::Field(name) => write!(f, ".{}", name)?,
                PathElement::LongSubscript(i) => write!(f, "[{}]", i)?,
                PathElement::StringSubscript(s) => write!(f, "[\"{}\"]", s)?,
                PathElement::AllSubscripts => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for Subfield {
    type Error = SubfieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Subfield::parse(&value)
    }
}

impl From<Subfield> for String {
    fn from(value: Subfield) -> Self {
        value.to_string()
    }
}

/// Role of a Hive column within the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HiveColumnType {
    PartitionKey,
    Regular,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiveColumnHandle {
    pub name: String,
    pub column_type: HiveColumnType,
    pub data_type: Type,
    pub required_subfields: Vec<Subfield>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpchColumnHandle {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "connector", rename_all = "lowercase")]
pub enum ColumnHandle {
    Hive(HiveColumnHandle),
    Tpch(TpchColumnHandle),
}

impl ColumnHandle {
    pub fn name(&self) -> &str {
        match self {
            ColumnHandle::Hive(h) => &h.name,
            ColumnHandle::Tpch(h) => &h.name,
        }
    }
}

/// The eight TPC-H tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TpchTable {
    Lineitem,
    Orders,
    Customer,
    Nation,
    Region,
    Part,
    Supplier,
    Partsupp,
}

impl TpchTable {
    pub fn from_name(name: &str) -> Option<Self> {
        let table = match name.to_ascii_lowercase().as_str() {
            "lineitem" => TpchTable::Lineitem,
            "orders" => TpchTable::Orders,
            "customer" => TpchTable::Customer,
            "nation" => TpchTable::Nation,
            "region" => TpchTable::Region,
            "part" => TpchTable::Part,
            "supplier" => TpchTable::Supplier,
            "partsupp" => TpchTable::Partsupp,
            _ => return None,
        };
        Some(table)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TpchTable::Lineitem => "lineitem",
            TpchTable::Orders => "orders",
            TpchTable::Customer => "customer",
            TpchTable::Nation => "nation",
            TpchTable::Region => "region",
            TpchTable::Part => "part",
            TpchTable::Supplier => "supplier",
            TpchTable::Partsupp => "partsupp",
        }
    }
}

/// Scan handle for a Hive table with pushed-down filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiveTableHandle {
    pub connector_id: String,
    /// `schema.table`, or the bare table name when no schema is known.
    pub table_name: String,
    pub filter_pushdown_enabled: bool,
    pub subfield_filters: BTreeMap<Subfield, Filter>,
    /// Residual predicate evaluated after subfield filters, if any.
    pub remaining_filter: Option<TypedExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpchTableHandle {
    pub connector_id: String,
    pub table: TpchTable,
    pub scale_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "connector", rename_all = "lowercase")]
pub enum ConnectorTableHandle {
    Hive(HiveTableHandle),
    Tpch(TpchTableHandle),
}

impl ConnectorTableHandle {
    pub fn connector_id(&self) -> &str {
        match self {
            ConnectorTableHandle::Hive(h) => &h.connector_id,
            ConnectorTableHandle::Tpch(h) => &h.connector_id,
        }
    }
}

/// Whether a write creates a new table or appends to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationTableType {
    New,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationHandle {
    pub target_path: String,
    pub write_path: String,
    pub table_type: LocationTableType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiveInsertTableHandle {
    pub input_columns: Vec<HiveColumnHandle>,
    pub location_handle: LocationHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "connector", rename_all = "lowercase")]
pub enum ConnectorInsertTableHandle {
    Hive(HiveInsertTableHandle),
}

/// Target of a table write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertTableHandle {
    pub connector_id: String,
    pub handle: ConnectorInsertTableHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subfield_parse_and_display() {
        let subfield = Subfield::parse("a.b[1][\"k\"][*]").unwrap();
        assert_eq!(subfield.root_name(), "a");
        assert_eq!(
            subfield.path(),
            &[
                PathElement::Field("b".into()),
                PathElement::LongSubscript(1),
                PathElement::StringSubscript("k".into()),
                PathElement::AllSubscripts,
            ]
        );
        assert_eq!(subfield.to_string(), "a.b[1][\"k\"][*]");
        assert_eq!(Subfield::parse("orderkey").unwrap(), Subfield::column("orderkey"));
    }

    #[test]
    fn test_subfield_errors() {
        assert!(Subfield::parse("").is_err());
        assert!(Subfield::parse("a[1").is_err());
        assert!(Subfield::parse("a[x]").is_err());
        assert!(Subfield::parse("a.").is_err());
    }

    #[test]
    fn test_subfield_filters_serialize_as_string_keys() {
        let mut filters = BTreeMap::new();
        filters.insert(Subfield::parse("c.x").unwrap(), Filter::IsNotNull);
        let handle = HiveTableHandle {
            connector_id: "hive".into(),
            table_name: "tpch.orders".into(),
            filter_pushdown_enabled: true,
            subfield_filters: filters,
            remaining_filter: None,
        };
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["subfield_filters"]["c.x"]["kind"], "IsNotNull");
        let back: HiveTableHandle = serde_json::from_value(json).unwrap();
        assert_eq!(back, handle);
    }

    #[test]
    fn test_tpch_table_names() {
        assert_eq!(TpchTable::from_name("LINEITEM"), Some(TpchTable::Lineitem));
        assert_eq!(TpchTable::from_name("nope"), None);
        assert_eq!(TpchTable::Partsupp.name(), "partsupp");
    }
}
