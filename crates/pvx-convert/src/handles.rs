//! # Connector Handle Translation
//!
//! Coordinator handles name tables and columns in connector-specific terms. The
//! engine needs its own handles. For Hive tables these carry the compiled subfield
//! filters and the residual predicate, so this is where a scan's pushed-down
//! predicate is compiled.
//!
//! Only the `hive` and `tpch` connectors are translated. Anything else fails with
//! [`ConvertError::UnsupportedConnector`].

use std::collections::BTreeMap;

use pvx_core::connector::{
    ColumnHandle, ConnectorInsertTableHandle, ConnectorTableHandle, HiveColumnHandle,
    HiveColumnType, HiveInsertTableHandle, HiveTableHandle, InsertTableHandle, LocationHandle,
    LocationTableType, Subfield, TpchColumnHandle, TpchTable, TpchTableHandle,
};
use pvx_core::types::parse_type;
use pvx_core::value::ScalarValue;
use pvx_protocol::connector as protocol;
use pvx_protocol::fragment::{ExecutionWriterTarget, TableWriteInfo};

use crate::error::{ConvertError, Result};
use crate::expr::ExprConverter;
use crate::filter::domain_to_filter;

pub fn to_column_handle(handle: &protocol::ColumnHandle) -> Result<ColumnHandle> {
    match handle {
        protocol::ColumnHandle::Hive(hive) => Ok(ColumnHandle::Hive(to_hive_column_handle(hive)?)),
        protocol::ColumnHandle::Tpch(tpch) => Ok(ColumnHandle::Tpch(TpchColumnHandle {
            name: tpch.column_name.clone(),
        })),
        protocol::ColumnHandle::Unsupported => Err(ConvertError::UnsupportedConnector(
            "column handle of an unknown connector".into(),
        )),
    }
}

fn to_hive_column_handle(handle: &protocol::HiveColumnHandle) -> Result<HiveColumnHandle> {
    let column_type = match handle.column_type {
        protocol::ColumnType::PartitionKey => HiveColumnType::PartitionKey,
        protocol::ColumnType::Regular => HiveColumnType::Regular,
        protocol::ColumnType::Synthesized => HiveColumnType::Synthesized,
        protocol::ColumnType::Aggregated => {
            return Err(ConvertError::Unsupported(format!(
                "aggregated hive column '{}'",
                handle.name
            )))
        }
    };
    let required_subfields = handle
        .required_subfields
        .iter()
        .map(|path| Subfield::parse(path))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(HiveColumnHandle {
        name: handle.name.clone(),
        column_type,
        data_type: parse_type(&handle.type_signature)?,
        required_subfields,
    })
}

/// Translate a scan's table handle. Also returns the table's partition columns,
/// keyed by name, which the scan must be able to resolve.
pub fn to_table_handle(
    table: &protocol::TableHandle,
    exprs: &dyn ExprConverter,
) -> Result<(ConnectorTableHandle, Vec<(String, ColumnHandle)>)> {
    match &table.connector_table_layout {
        Some(protocol::ConnectorTableLayoutHandle::Hive(layout)) => {
            to_hive_table_handle(&table.connector_id, layout, exprs)
        }
        Some(protocol::ConnectorTableLayoutHandle::Tpch(layout)) => {
            let name = &layout.table.table_name;
            let tpch_table = TpchTable::from_name(name).ok_or_else(|| {
                ConvertError::Unsupported(format!("unknown tpch table '{}'", name))
            })?;
            let handle = ConnectorTableHandle::Tpch(TpchTableHandle {
                connector_id: table.connector_id.clone(),
                table: tpch_table,
                scale_factor: layout.table.scale_factor,
            });
            Ok((handle, Vec::new()))
        }
        Some(protocol::ConnectorTableLayoutHandle::Unsupported) | None => {
            Err(ConvertError::UnsupportedConnector(format!(
                "table layout of connector '{}'",
                table.connector_id
            )))
        }
    }
}

fn to_hive_table_handle(
    connector_id: &str,
    layout: &protocol::HiveTableLayoutHandle,
    exprs: &dyn ExprConverter,
) -> Result<(ConnectorTableHandle, Vec<(String, ColumnHandle)>)> {
    let name = &layout.schema_table_name;
    let table_name = if name.schema.is_empty() {
        name.table.clone()
    } else {
        format!("{}.{}", name.schema, name.table)
    };

    if !layout.pushdown_filter_enabled {
        return Err(ConvertError::FilterPushdownRequired(table_name));
    }

    let partition_columns = layout
        .partition_columns
        .iter()
        .map(|column| Ok((column.name.clone(), ColumnHandle::Hive(to_hive_column_handle(column)?))))
        .collect::<Result<Vec<_>>>()?;

    let domains = layout.domain_predicate.domains.as_ref().ok_or_else(|| {
        ConvertError::Unsupported(format!("'none' domain predicate on table {}", table_name))
    })?;
    let mut subfield_filters = BTreeMap::new();
    for (path, domain) in domains {
        subfield_filters.insert(Subfield::parse(path)?, domain_to_filter(domain, exprs)?);
    }

    let remaining = exprs.to_typed_expr(&layout.remaining_predicate)?;
    let remaining_filter = match remaining.as_constant() {
        Some(constant) if constant.value == ScalarValue::Boolean(true) => None,
        Some(_) => {
            return Err(ConvertError::Internal(
                "Unexpected always-false remaining predicate".into(),
            ))
        }
        None => Some(remaining),
    };

    let handle = ConnectorTableHandle::Hive(HiveTableHandle {
        connector_id: connector_id.to_string(),
        table_name,
        filter_pushdown_enabled: true,
        subfield_filters,
        remaining_filter,
    });
    Ok((handle, partition_columns))
}

pub fn to_location_handle(handle: &protocol::LocationHandle) -> Result<LocationHandle> {
    let table_type = match handle.table_type {
        protocol::TableType::New => LocationTableType::New,
        protocol::TableType::Existing => LocationTableType::Existing,
        protocol::TableType::Temporary => {
            return Err(ConvertError::Unsupported(
                "writes to temporary tables".into(),
            ))
        }
    };
    Ok(LocationHandle {
        target_path: handle.target_path.clone(),
        write_path: handle.write_path.clone(),
        table_type,
    })
}

/// The engine's write target for a table-writing task.
pub fn to_insert_table_handle(write_info: Option<&TableWriteInfo>) -> Result<InsertTableHandle> {
    let handle = match write_info.and_then(|info| info.writer_target.as_ref()) {
        Some(ExecutionWriterTarget::CreateHandle { handle })
        | Some(ExecutionWriterTarget::InsertHandle { handle }) => handle,
        Some(ExecutionWriterTarget::Unsupported) => {
            return Err(ConvertError::Unsupported("table writer target kind".into()))
        }
        None => {
            return Err(ConvertError::Unsupported(
                "table write without a writer target".into(),
            ))
        }
    };

    match &handle.connector_handle {
        protocol::ConnectorWriteTableHandle::Hive(hive) => {
            let input_columns = hive
                .input_columns
                .iter()
                .map(to_hive_column_handle)
                .collect::<Result<Vec<_>>>()?;
            Ok(InsertTableHandle {
                connector_id: handle.connector_id.clone(),
                handle: ConnectorInsertTableHandle::Hive(HiveInsertTableHandle {
                    input_columns,
                    location_handle: to_location_handle(&hive.location_handle)?,
                }),
            })
        }
        protocol::ConnectorWriteTableHandle::Unsupported => Err(ConvertError::UnsupportedConnector(
            format!("write handle of connector '{}'", handle.connector_id),
        )),
    }
}
