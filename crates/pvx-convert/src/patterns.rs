//! # Multi-Node Rewrites
//!
//! Some logical shapes have a cheaper physical form than their node-by-node
//! translation. The dispatcher in `plan` calls into this module before falling
//! back to the literal translation.
//!
//! ## Semi Joins
//!
//! The coordinator plans `x IN (subquery)` as a `SemiJoin` producing a boolean
//! marker column, usually followed by a `Filter` on that marker:
//!
//! ```text
//! Filter(marker)        -> HashJoin(LeftSemiFilter)
//! Filter(not(marker))   -> HashJoin(Anti, null aware)
//! Filter(other)         -> Filter(other) over HashJoin(LeftSemiProject)
//! SemiJoin (no filter)  -> HashJoin(LeftSemiProject)
//! ```
//!
//! ## OFFSET
//!
//! `OFFSET n LIMIT m` reaches the worker as a row number computation and a filter
//! on it, separated by local exchanges. The whole chain collapses into one
//! `Limit` with an offset. See [`try_fold_offset_limit`].

use std::sync::Arc;

use pvx_core::expr::{FieldAccessExpr, TypedExpr};
use pvx_core::plan::{
    self as physical, LocalPartitionType, PartitionFunctionSpec, PlanNode, PlanNodeRef,
};
use pvx_core::types::{RowType, Type};
use pvx_protocol::expr::{RowExpression, Variable};
use pvx_protocol::partitioning::{
    ConnectorPartitioningHandle, SystemPartitionFunction, SystemPartitioning,
};
use pvx_protocol::plan::{self as logical, LogicalPlanNode};
use tracing::trace;

use crate::error::{ConvertError, Result};
use crate::plan::{to_field, to_fields, to_ordering, to_row_type, PlanConverter, TranslationContext};

pub const NOT: &str = "presto.default.not";
pub const GREATER_THAN: &str = "presto.default.$operator$greater_than";

/// `SemiJoin` on its own: the left rows plus a boolean match marker.
pub fn mark_join(
    conv: &PlanConverter<'_>,
    semi: &logical::SemiJoinNode,
    ctx: &TranslationContext<'_>,
) -> Result<PlanNode> {
    let left = conv.to_physical_plan(&semi.source, ctx)?;
    let right = conv.to_physical_plan(&semi.filtering_source, ctx)?;
    let mut output_type = left.output_type();
    let marker = to_field(&semi.semi_join_output)?;
    output_type.push(marker.name, marker.ty);
    Ok(PlanNode::HashJoin(physical::HashJoinNode {
        id: semi.id.clone(),
        join_type: physical::JoinType::LeftSemiProject,
        null_aware: true,
        left_keys: vec![to_field(&semi.source_join_variable)?],
        right_keys: vec![to_field(&semi.filtering_source_join_variable)?],
        filter: None,
        left,
        right,
        output_type,
    }))
}

/// `Filter` directly over a `SemiJoin`.
///
/// When the predicate is the marker or its negation, the result is a semi or anti
/// join whose output is the left input only. The marker column is dropped without
/// a projection, so this is the one translation whose output names differ from the
/// logical node's. A parent that still reads the marker after this filter gets no
/// such column. The coordinator prunes the marker above such filters, since it is
/// constant there.
pub fn lower_filtered_semi_join(
    conv: &PlanConverter<'_>,
    filter: &logical::FilterNode,
    semi: &logical::SemiJoinNode,
    ctx: &TranslationContext<'_>,
) -> Result<PlanNode> {
    let marker = &semi.semi_join_output;
    let join_type = if is_variable(&filter.predicate, marker) {
        Some((physical::JoinType::LeftSemiFilter, false))
    } else if is_negated_variable(&filter.predicate, marker) {
        Some((physical::JoinType::Anti, true))
    } else {
        None
    };

    let Some((join_type, null_aware)) = join_type else {
        return Ok(PlanNode::Filter(physical::FilterNode {
            id: filter.id.clone(),
            filter: conv.exprs().to_typed_expr(&filter.predicate)?,
            source: Arc::new(mark_join(conv, semi, ctx)?),
        }));
    };

    trace!(node_id = %semi.id, ?join_type, "Lowering filtered semi join");
    let left = conv.to_physical_plan(&semi.source, ctx)?;
    let right = conv.to_physical_plan(&semi.filtering_source, ctx)?;
    Ok(PlanNode::HashJoin(physical::HashJoinNode {
        id: semi.id.clone(),
        join_type,
        null_aware,
        left_keys: vec![to_field(&semi.source_join_variable)?],
        right_keys: vec![to_field(&semi.filtering_source_join_variable)?],
        filter: None,
        output_type: left.output_type(),
        left,
        right,
    }))
}

fn is_variable(expr: &RowExpression, variable: &Variable) -> bool {
    expr.as_variable() == Some(variable)
}

fn is_negated_variable(expr: &RowExpression, variable: &Variable) -> bool {
    match expr.as_call() {
        Some(call) => {
            call.builtin_name() == Some(NOT)
                && call.arguments.len() == 1
                && is_variable(&call.arguments[0], variable)
        }
        None => false,
    }
}

/// The matched `OFFSET` chain, top to bottom.
struct OffsetLimitShape<'p> {
    limit: &'p logical::LimitNode,
    row_number: &'p logical::RowNumberNode,
    offset: i64,
}

/// Collapse
///
/// ```text
/// Project(identity) -> Exchange(local, round robin) -> Limit -> Exchange(local)
///   -> Filter(row_number > offset) -> Exchange(local) -> RowNumber
/// ```
///
/// into `Project -> Limit(offset, count) -> <row number source>`. Returns
/// `Ok(None)` when `project` does not head that chain.
pub fn try_fold_offset_limit(
    conv: &PlanConverter<'_>,
    project: &logical::ProjectNode,
    ctx: &TranslationContext<'_>,
) -> Result<Option<PlanNode>> {
    let Some(shape) = match_offset_limit(conv, project)? else {
        return Ok(None);
    };
    trace!(
        node_id = %project.id,
        offset = shape.offset,
        count = shape.limit.count,
        "Folding OFFSET into limit"
    );

    let limit = PlanNode::Limit(physical::LimitNode {
        id: shape.limit.id.clone(),
        offset: shape.offset,
        count: shape.limit.count,
        is_partial: shape.limit.step == logical::LimitStep::Partial,
        source: conv.to_physical_plan(&shape.row_number.source, ctx)?,
    });
    Ok(Some(PlanNode::Project(physical::ProjectNode {
        id: project.id.clone(),
        names: project
            .assignments
            .iter()
            .map(|a| a.variable.name.clone())
            .collect(),
        projections: conv.to_typed_exprs(project.assignments.iter().map(|a| &a.expression))?,
        source: Arc::new(limit),
    })))
}

fn match_offset_limit<'p>(
    conv: &PlanConverter<'_>,
    project: &'p logical::ProjectNode,
) -> Result<Option<OffsetLimitShape<'p>>> {
    if !project.is_identity() {
        return Ok(None);
    }
    let LogicalPlanNode::Exchange(round_robin) = project.source.as_ref() else {
        return Ok(None);
    };
    let is_round_robin = matches!(
        round_robin.partitioning_scheme.partitioning.handle.connector_handle,
        ConnectorPartitioningHandle::System {
            partitioning: SystemPartitioning::Fixed,
            function: SystemPartitionFunction::RoundRobin,
        }
    );
    if !is_round_robin || round_robin.exchange_type != logical::ExchangeType::Repartition {
        return Ok(None);
    }
    let Some(LogicalPlanNode::Limit(limit)) = single_local_source(project.source.as_ref()) else {
        return Ok(None);
    };
    let Some(LogicalPlanNode::Filter(filter)) = single_local_source(&limit.source) else {
        return Ok(None);
    };
    let Some(LogicalPlanNode::RowNumber(row_number)) = single_local_source(&filter.source) else {
        return Ok(None);
    };

    let row_number_variable = &row_number.row_number_variable;
    if project
        .assignments
        .iter()
        .any(|a| a.variable.name == row_number_variable.name)
    {
        return Ok(None);
    }

    let Some(call) = filter.predicate.as_call() else {
        return Ok(None);
    };
    if call.builtin_name() != Some(GREATER_THAN)
        || call.arguments.len() != 2
        || !is_variable(&call.arguments[0], row_number_variable)
    {
        return Ok(None);
    }
    let offset = match &call.arguments[1] {
        RowExpression::Constant(_) => match conv.exprs().to_typed_expr(&call.arguments[1])? {
            TypedExpr::Constant(constant) if constant.ty == Type::Bigint => {
                constant.value.as_i64()
            }
            _ => None,
        },
        _ => None,
    };
    Ok(offset.map(|offset| OffsetLimitShape {
        limit,
        row_number,
        offset,
    }))
}

/// The only source of a local exchange.
fn single_local_source(node: &LogicalPlanNode) -> Option<&LogicalPlanNode> {
    match node {
        LogicalPlanNode::Exchange(exchange)
            if exchange.scope == logical::ExchangeScope::Local && exchange.sources.len() == 1 =>
        {
            exchange.sources.first()
        }
        _ => None,
    }
}

/// Translate an exchange inside a fragment.
///
/// Every source is renamed to the exchange's output layout first, since each
/// source may name its columns differently.
pub fn local_exchange(
    conv: &PlanConverter<'_>,
    exchange: &logical::ExchangeNode,
    ctx: &TranslationContext<'_>,
) -> Result<PlanNode> {
    if exchange.scope != logical::ExchangeScope::Local {
        return Err(ConvertError::Unsupported(format!(
            "{:?} exchange {} inside a fragment",
            exchange.scope, exchange.id
        )));
    }
    let scheme = &exchange.partitioning_scheme;
    let output_type = to_row_type(&scheme.output_layout)?;

    if let Some(ordering) = &exchange.ordering_scheme {
        let (sorting_keys, sorting_orders) = to_ordering(ordering)?;
        return Ok(PlanNode::LocalMerge(physical::LocalMergeNode {
            id: exchange.id.clone(),
            sorting_keys,
            sorting_orders,
            sources: aligned_sources(conv, exchange, &output_type, ctx)?,
        }));
    }

    let (partition_type, partition_function) = match exchange.exchange_type {
        logical::ExchangeType::Gather => (LocalPartitionType::Gather, PartitionFunctionSpec::Gather),
        logical::ExchangeType::Repartition => {
            let function = match &scheme.partitioning.handle.connector_handle {
                ConnectorPartitioningHandle::System {
                    partitioning: SystemPartitioning::Fixed,
                    function: SystemPartitionFunction::Hash,
                } => PartitionFunctionSpec::Hash {
                    key_channels: key_channels(&scheme.partitioning.arguments, &output_type)?,
                    input_type: output_type.clone(),
                    constants: Vec::new(),
                },
                ConnectorPartitioningHandle::System {
                    partitioning: SystemPartitioning::Fixed,
                    function: SystemPartitionFunction::RoundRobin,
                } => PartitionFunctionSpec::RoundRobin,
                other => {
                    return Err(ConvertError::Unsupported(format!(
                        "local repartitioning with {:?}",
                        other
                    )))
                }
            };
            (LocalPartitionType::Repartition, function)
        }
        logical::ExchangeType::Replicate => {
            return Err(ConvertError::Unsupported(format!(
                "local replicate exchange {}",
                exchange.id
            )))
        }
    };

    Ok(PlanNode::LocalPartition(physical::LocalPartitionNode {
        id: exchange.id.clone(),
        partition_type,
        partition_function,
        sources: aligned_sources(conv, exchange, &output_type, ctx)?,
    }))
}

fn aligned_sources(
    conv: &PlanConverter<'_>,
    exchange: &logical::ExchangeNode,
    output_type: &RowType,
    ctx: &TranslationContext<'_>,
) -> Result<Vec<PlanNodeRef>> {
    if exchange.inputs.len() != exchange.sources.len() {
        return Err(ConvertError::InvalidInput(format!(
            "Exchange {} has {} sources but {} input layouts",
            exchange.id,
            exchange.sources.len(),
            exchange.inputs.len()
        )));
    }
    exchange
        .sources
        .iter()
        .zip(&exchange.inputs)
        .enumerate()
        .map(|(i, (source, inputs))| {
            if inputs.len() != output_type.len() {
                return Err(ConvertError::InvalidInput(format!(
                    "Exchange {} input {} has {} columns, expected {}",
                    exchange.id,
                    i,
                    inputs.len(),
                    output_type.len()
                )));
            }
            let projections = to_fields(inputs)?
                .into_iter()
                .map(TypedExpr::FieldAccess)
                .collect();
            Ok(Arc::new(PlanNode::Project(physical::ProjectNode {
                id: format!("{}.{}", exchange.id, i),
                names: output_type.names().to_vec(),
                projections,
                source: conv.to_physical_plan(source, ctx)?,
            })))
        })
        .collect()
}

fn key_channels(arguments: &[RowExpression], input_type: &RowType) -> Result<Vec<u32>> {
    arguments
        .iter()
        .map(|argument| {
            let variable = argument.as_variable().ok_or_else(|| {
                ConvertError::Unsupported("non-column local partitioning key".into())
            })?;
            let field: FieldAccessExpr = to_field(variable)?;
            input_type
                .index_of(&field.name)
                .map(|i| i as u32)
                .ok_or_else(|| {
                    ConvertError::InvalidInput(format!(
                        "Partitioning key {} is not in the exchange output",
                        field.name
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvx_protocol::expr::{CallExpression, FunctionHandle, FunctionKind, Signature};

    fn not_call(argument: RowExpression) -> RowExpression {
        RowExpression::Call(CallExpression {
            display_name: "not".into(),
            function_handle: FunctionHandle::BuiltIn {
                signature: Signature {
                    name: NOT.into(),
                    kind: FunctionKind::Scalar,
                    return_type: "boolean".into(),
                    argument_types: vec!["boolean".into()],
                },
            },
            return_type: "boolean".into(),
            arguments: vec![argument],
        })
    }

    #[test]
    fn test_marker_predicates() {
        let marker = Variable::new("m", "boolean");
        assert!(is_variable(&marker.clone().into(), &marker));
        assert!(!is_variable(&Variable::new("m", "bigint").into(), &marker));
        assert!(is_negated_variable(&not_call(marker.clone().into()), &marker));
        assert!(!is_negated_variable(
            &not_call(Variable::new("other", "boolean").into()),
            &marker
        ));
    }

    #[test]
    fn test_key_channels() {
        let row = RowType::from_fields(vec![("a", Type::Bigint), ("b", Type::Varchar)]);
        let keys = vec![Variable::new("b", "varchar").into()];
        assert_eq!(key_channels(&keys, &row).unwrap(), vec![1]);

        let missing = vec![Variable::new("z", "bigint").into()];
        assert!(matches!(
            key_channels(&missing, &row),
            Err(ConvertError::InvalidInput(_))
        ));
    }
}
