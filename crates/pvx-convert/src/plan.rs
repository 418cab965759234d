//! # Plan Node Translation
//!
//! [`PlanConverter::to_physical_plan`] is the single recursive entry point. It
//! matches on the logical node kind and builds the equivalent physical node,
//! translating children through itself. Most kinds map one-to-one. The exceptions:
//!
//! - **Filter over SemiJoin** becomes one semi or anti hash join (see `patterns`).
//! - **Project over the `OFFSET` shape** becomes one `Limit` with an offset.
//! - **DistinctLimit** becomes `Limit` over a grouping-only `Aggregation`.
//! - **Exchange** is only translated for local scope. Remote exchanges never
//!   reach a worker: the coordinator cuts fragments at them.
//! - **RemoteSource** reads from an exchange, or from the shuffle in batch mode.
//! - **Output** is handled by the fragment translator and is rejected here.
//!
//! The converter holds only borrowed collaborators and configuration. A single
//! instance can translate any number of fragments, from any number of threads.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use pvx_core::expr::{CallExpr, FieldAccessExpr, TypedExpr};
use pvx_core::plan::{self as physical, PlanNode, PlanNodeRef};
use pvx_core::types::{parse_type, RowType};
use pvx_core::value::RowVector;
use pvx_protocol::expr::{CallExpression, RowExpression, Variable};
use pvx_protocol::fragment::TableWriteInfo;
use pvx_protocol::plan::{self as logical, LogicalPlanNode};
use pvx_protocol::task_id::TaskId;
use tracing::trace;

use crate::error::{ConvertError, Result};
use crate::expr::ExprConverter;
use crate::handles::{to_column_handle, to_insert_table_handle, to_table_handle};
use crate::patterns;
use crate::{ConverterConfig, ExecutionMode};

/// Per-task inputs that some node kinds need.
#[derive(Debug, Clone, Copy)]
pub struct TranslationContext<'a> {
    pub table_write_info: Option<&'a TableWriteInfo>,
    pub task_id: &'a TaskId,
}

impl<'a> TranslationContext<'a> {
    pub fn new(task_id: &'a TaskId) -> Self {
        Self {
            table_write_info: None,
            task_id,
        }
    }

    pub fn with_table_write_info(mut self, info: Option<&'a TableWriteInfo>) -> Self {
        self.table_write_info = info;
        self
    }
}

pub struct PlanConverter<'a> {
    exprs: &'a dyn ExprConverter,
    config: ConverterConfig,
}

impl<'a> PlanConverter<'a> {
    pub fn new(exprs: &'a dyn ExprConverter, config: ConverterConfig) -> Self {
        Self { exprs, config }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn exprs(&self) -> &dyn ExprConverter {
        self.exprs
    }

    /// Translate `node` and its subtree.
    pub fn to_physical_plan(
        &self,
        node: &LogicalPlanNode,
        ctx: &TranslationContext<'_>,
    ) -> Result<PlanNodeRef> {
        trace!(node_id = node.id(), kind = node.kind_name(), "Translating plan node");
        let physical = match node {
            LogicalPlanNode::Values(n) => self.to_values(n)?,
            LogicalPlanNode::TableScan(n) => self.to_table_scan(n)?,
            LogicalPlanNode::Project(n) => match patterns::try_fold_offset_limit(self, n, ctx)? {
                Some(folded) => folded,
                None => PlanNode::Project(physical::ProjectNode {
                    id: n.id.clone(),
                    names: n.assignments.iter().map(|a| a.variable.name.clone()).collect(),
                    projections: self.to_typed_exprs(n.assignments.iter().map(|a| &a.expression))?,
                    source: self.to_physical_plan(&n.source, ctx)?,
                }),
            },
            LogicalPlanNode::Filter(n) => match n.source.as_ref() {
                LogicalPlanNode::SemiJoin(semi) => {
                    patterns::lower_filtered_semi_join(self, n, semi, ctx)?
                }
                _ => PlanNode::Filter(physical::FilterNode {
                    id: n.id.clone(),
                    filter: self.exprs.to_typed_expr(&n.predicate)?,
                    source: self.to_physical_plan(&n.source, ctx)?,
                }),
            },
            LogicalPlanNode::Aggregation(n) => self.to_aggregation(n, ctx)?,
            LogicalPlanNode::GroupId(n) => self.to_group_id(n, ctx)?,
            LogicalPlanNode::DistinctLimit(n) => self.to_distinct_limit(n, ctx)?,
            LogicalPlanNode::Join(n) => self.to_join(n, ctx)?,
            LogicalPlanNode::MergeJoin(n) => PlanNode::MergeJoin(physical::MergeJoinNode {
                id: n.id.clone(),
                join_type: to_join_type(n.join_type),
                left_keys: to_fields(n.criteria.iter().map(|c| &c.left))?,
                right_keys: to_fields(n.criteria.iter().map(|c| &c.right))?,
                filter: self.to_optional_expr(n.filter.as_ref())?,
                left: self.to_physical_plan(&n.left, ctx)?,
                right: self.to_physical_plan(&n.right, ctx)?,
                output_type: to_row_type(&n.output_variables)?,
            }),
            LogicalPlanNode::SemiJoin(n) => patterns::mark_join(self, n, ctx)?,
            LogicalPlanNode::Window(n) => self.to_window(n, ctx)?,
            LogicalPlanNode::TopN(n) => {
                let (sorting_keys, sorting_orders) = to_ordering(&n.ordering_scheme)?;
                PlanNode::TopN(physical::TopNNode {
                    id: n.id.clone(),
                    sorting_keys,
                    sorting_orders,
                    count: n.count,
                    is_partial: n.step == logical::TopNStep::Partial,
                    source: self.to_physical_plan(&n.source, ctx)?,
                })
            }
            LogicalPlanNode::Limit(n) => PlanNode::Limit(physical::LimitNode {
                id: n.id.clone(),
                offset: 0,
                count: n.count,
                is_partial: n.step == logical::LimitStep::Partial,
                source: self.to_physical_plan(&n.source, ctx)?,
            }),
            LogicalPlanNode::Sort(n) => {
                let (sorting_keys, sorting_orders) = to_ordering(&n.ordering_scheme)?;
                PlanNode::OrderBy(physical::OrderByNode {
                    id: n.id.clone(),
                    sorting_keys,
                    sorting_orders,
                    is_partial: n.is_partial,
                    source: self.to_physical_plan(&n.source, ctx)?,
                })
            }
            LogicalPlanNode::Unnest(n) => PlanNode::Unnest(physical::UnnestNode {
                id: n.id.clone(),
                replicate_variables: to_fields(&n.replicate_variables)?,
                unnest_variables: to_fields(n.unnest_variables.iter().map(|u| &u.input))?,
                unnest_names: n
                    .unnest_variables
                    .iter()
                    .flat_map(|u| u.outputs.iter().map(|o| o.name.clone()))
                    .collect(),
                ordinality_name: n.ordinality_variable.as_ref().map(|v| v.name.clone()),
                source: self.to_physical_plan(&n.source, ctx)?,
            }),
            LogicalPlanNode::Exchange(n) => patterns::local_exchange(self, n, ctx)?,
            LogicalPlanNode::RemoteSource(n) => self.to_remote_source(n)?,
            LogicalPlanNode::Output(n) => {
                return Err(ConvertError::UnsupportedPlanNode(format!(
                    "OutputNode {} is only valid as the fragment root",
                    n.id
                )))
            }
            LogicalPlanNode::TableWriter(n) => self.to_table_write(n, ctx)?,
            LogicalPlanNode::EnforceSingleRow(n) => {
                PlanNode::EnforceSingleRow(physical::EnforceSingleRowNode {
                    id: n.id.clone(),
                    source: self.to_physical_plan(&n.source, ctx)?,
                })
            }
            LogicalPlanNode::AssignUniqueId(n) => {
                PlanNode::AssignUniqueId(physical::AssignUniqueIdNode {
                    id: n.id.clone(),
                    id_name: n.id_variable.name.clone(),
                    task_unique_id: task_unique_id(ctx.task_id),
                    source: self.to_physical_plan(&n.source, ctx)?,
                })
            }
            LogicalPlanNode::RowNumber(n) => PlanNode::RowNumber(physical::RowNumberNode {
                id: n.id.clone(),
                partition_keys: to_fields(&n.partition_by)?,
                row_number_column_name: Some(n.row_number_variable.name.clone()),
                limit: n.max_row_count_per_partition,
                source: self.to_physical_plan(&n.source, ctx)?,
            }),
        };
        Ok(Arc::new(physical))
    }

    fn to_values(&self, node: &logical::ValuesNode) -> Result<PlanNode> {
        let row_type = to_row_type(&node.output_variables)?;
        let mut values = Vec::with_capacity(node.rows.len());
        for row in &node.rows {
            let scalars = row
                .iter()
                .map(|expr| match self.exprs.to_typed_expr(expr)? {
                    TypedExpr::Constant(constant) => Ok(constant.value),
                    other => Err(ConvertError::Unsupported(format!(
                        "non-constant expression {} in ValuesNode {}",
                        other, node.id
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            let width = scalars.len();
            let vector = RowVector::from_rows(row_type.clone(), vec![scalars]).ok_or_else(|| {
                ConvertError::InvalidInput(format!(
                    "ValuesNode {} has a row of {} values for {} columns",
                    node.id,
                    width,
                    row_type.len()
                ))
            })?;
            values.push(vector);
        }
        Ok(PlanNode::Values(physical::ValuesNode {
            id: node.id.clone(),
            row_type,
            values,
        }))
    }

    fn to_table_scan(&self, node: &logical::TableScanNode) -> Result<PlanNode> {
        let (table_handle, partition_columns) = to_table_handle(&node.table, self.exprs)?;
        let mut assignments = BTreeMap::new();
        for assignment in &node.assignments {
            assignments.insert(
                assignment.variable.name.clone(),
                to_column_handle(&assignment.column_handle)?,
            );
        }
        for (name, handle) in partition_columns {
            assignments.entry(name).or_insert(handle);
        }
        Ok(PlanNode::TableScan(physical::TableScanNode {
            id: node.id.clone(),
            output_type: to_row_type(&node.output_variables)?,
            table_handle,
            assignments,
        }))
    }

    fn to_aggregation(
        &self,
        node: &logical::AggregationNode,
        ctx: &TranslationContext<'_>,
    ) -> Result<PlanNode> {
        let grouping = &node.grouping_sets;
        let pre_grouped_keys = if !node.pre_grouped_variables.is_empty()
            && grouping.grouping_set_count == 1
            && grouping.global_grouping_sets.is_empty()
        {
            to_fields(&node.pre_grouped_variables)?
        } else {
            Vec::new()
        };

        let mut aggregate_names = Vec::with_capacity(node.aggregations.len());
        let mut aggregates = Vec::with_capacity(node.aggregations.len());
        let mut aggregate_masks = Vec::with_capacity(node.aggregations.len());
        for aggregation in &node.aggregations {
            aggregate_names.push(aggregation.variable.name.clone());
            aggregates.push(self.to_call(&aggregation.call)?);
            aggregate_masks.push(aggregation.mask.as_ref().map(to_field).transpose()?);
        }

        Ok(PlanNode::Aggregation(physical::AggregationNode {
            id: node.id.clone(),
            step: match node.step {
                logical::AggregationStep::Partial => physical::AggregationStep::Partial,
                logical::AggregationStep::Final => physical::AggregationStep::Final,
                logical::AggregationStep::Intermediate => physical::AggregationStep::Intermediate,
                logical::AggregationStep::Single => physical::AggregationStep::Single,
            },
            grouping_keys: to_fields(&grouping.grouping_keys)?,
            pre_grouped_keys,
            aggregate_names,
            aggregates,
            aggregate_masks,
            ignore_null_keys: false,
            source: self.to_physical_plan(&node.source, ctx)?,
        }))
    }

    fn to_group_id(
        &self,
        node: &logical::GroupIdNode,
        ctx: &TranslationContext<'_>,
    ) -> Result<PlanNode> {
        let inputs: HashMap<&str, &Variable> = node
            .grouping_columns
            .iter()
            .map(|c| (c.output.name.as_str(), &c.input))
            .collect();
        let input_of = |output: &Variable| -> Result<FieldAccessExpr> {
            let input = inputs.get(output.name.as_str()).ok_or_else(|| {
                ConvertError::InvalidInput(format!(
                    "GroupIdNode {} has no grouping column for {}",
                    node.id, output
                ))
            })?;
            to_field(input)
        };

        let mut grouping_sets = Vec::with_capacity(node.grouping_sets.len());
        let mut grouping_key_infos: Vec<physical::GroupingKeyInfo> = Vec::new();
        for set in &node.grouping_sets {
            let mut fields = Vec::with_capacity(set.len());
            for output in set {
                let input = input_of(output)?;
                if !grouping_key_infos.iter().any(|info| info.output == output.name) {
                    grouping_key_infos.push(physical::GroupingKeyInfo {
                        output: output.name.clone(),
                        input: input.clone(),
                    });
                }
                fields.push(input);
            }
            grouping_sets.push(fields);
        }

        Ok(PlanNode::GroupId(physical::GroupIdNode {
            id: node.id.clone(),
            grouping_sets,
            grouping_key_infos,
            aggregation_inputs: to_fields(&node.aggregation_arguments)?,
            group_id_name: node.group_id_variable.name.clone(),
            source: self.to_physical_plan(&node.source, ctx)?,
        }))
    }

    fn to_distinct_limit(
        &self,
        node: &logical::DistinctLimitNode,
        ctx: &TranslationContext<'_>,
    ) -> Result<PlanNode> {
        let aggregation = PlanNode::Aggregation(physical::AggregationNode {
            id: node.id.clone(),
            step: physical::AggregationStep::Single,
            grouping_keys: to_fields(&node.distinct_variables)?,
            pre_grouped_keys: Vec::new(),
            aggregate_names: Vec::new(),
            aggregates: Vec::new(),
            aggregate_masks: Vec::new(),
            ignore_null_keys: false,
            source: self.to_physical_plan(&node.source, ctx)?,
        });
        Ok(PlanNode::Limit(physical::LimitNode {
            id: format!("{}.limit", node.id),
            offset: 0,
            count: node.limit,
            is_partial: node.partial,
            source: Arc::new(aggregation),
        }))
    }

    fn to_join(&self, node: &logical::JoinNode, ctx: &TranslationContext<'_>) -> Result<PlanNode> {
        let join_type = to_join_type(node.join_type);
        let left = self.to_physical_plan(&node.left, ctx)?;
        let right = self.to_physical_plan(&node.right, ctx)?;
        let output_type = to_row_type(&node.output_variables)?;

        if node.criteria.is_empty()
            && join_type == physical::JoinType::Inner
            && node.filter.is_none()
        {
            return Ok(PlanNode::NestedLoopJoin(physical::NestedLoopJoinNode {
                id: node.id.clone(),
                join_type,
                join_condition: None,
                left,
                right,
                output_type,
            }));
        }

        Ok(PlanNode::HashJoin(physical::HashJoinNode {
            id: node.id.clone(),
            join_type,
            null_aware: false,
            left_keys: to_fields(node.criteria.iter().map(|c| &c.left))?,
            right_keys: to_fields(node.criteria.iter().map(|c| &c.right))?,
            filter: self.to_optional_expr(node.filter.as_ref())?,
            left,
            right,
            output_type,
        }))
    }

    fn to_window(&self, node: &logical::WindowNode, ctx: &TranslationContext<'_>) -> Result<PlanNode> {
        let (sorting_keys, sorting_orders) = match &node.specification.ordering_scheme {
            Some(scheme) => to_ordering(scheme)?,
            None => (Vec::new(), Vec::new()),
        };

        let mut window_column_names = Vec::with_capacity(node.window_functions.len());
        let mut window_functions = Vec::with_capacity(node.window_functions.len());
        for assignment in &node.window_functions {
            let function = &assignment.function;
            let frame = &function.frame;
            window_column_names.push(assignment.variable.name.clone());
            window_functions.push(physical::WindowFunction {
                function_call: self.to_call(&function.function_call)?,
                frame: physical::WindowFrame {
                    frame_type: match frame.frame_type {
                        logical::WindowType::Range => physical::WindowFrameType::Range,
                        logical::WindowType::Rows => physical::WindowFrameType::Rows,
                        logical::WindowType::Groups => {
                            return Err(ConvertError::Unsupported(
                                "GROUPS window frames".into(),
                            ))
                        }
                    },
                    start_type: to_bound_type(frame.start_type),
                    start_value: frame
                        .start_value
                        .as_ref()
                        .map(|v| to_field(v).map(TypedExpr::FieldAccess))
                        .transpose()?,
                    end_type: to_bound_type(frame.end_type),
                    end_value: frame
                        .end_value
                        .as_ref()
                        .map(|v| to_field(v).map(TypedExpr::FieldAccess))
                        .transpose()?,
                },
                ignore_nulls: function.ignore_nulls,
            });
        }

        Ok(PlanNode::Window(physical::WindowNode {
            id: node.id.clone(),
            partition_keys: to_fields(&node.specification.partition_by)?,
            sorting_keys,
            sorting_orders,
            window_column_names,
            window_functions,
            source: self.to_physical_plan(&node.source, ctx)?,
        }))
    }

    fn to_remote_source(&self, node: &logical::RemoteSourceNode) -> Result<PlanNode> {
        let output_type = to_row_type(&node.output_variables)?;
        if let ExecutionMode::Batch { .. } = self.config.mode {
            return Ok(PlanNode::ShuffleRead(physical::ShuffleReadNode {
                id: node.id.clone(),
                output_type,
            }));
        }
        match &node.ordering_scheme {
            Some(scheme) => {
                let (sorting_keys, sorting_orders) = to_ordering(scheme)?;
                Ok(PlanNode::MergeExchange(physical::MergeExchangeNode {
                    id: node.id.clone(),
                    output_type,
                    sorting_keys,
                    sorting_orders,
                }))
            }
            None => Ok(PlanNode::Exchange(physical::ExchangeNode {
                id: node.id.clone(),
                output_type,
            })),
        }
    }

    fn to_table_write(
        &self,
        node: &logical::TableWriterNode,
        ctx: &TranslationContext<'_>,
    ) -> Result<PlanNode> {
        if node.columns.len() != node.column_names.len() {
            return Err(ConvertError::InvalidInput(format!(
                "TableWriterNode {} has {} columns but {} column names",
                node.id,
                node.columns.len(),
                node.column_names.len()
            )));
        }
        Ok(PlanNode::TableWrite(physical::TableWriteNode {
            id: node.id.clone(),
            columns: to_row_type(&node.columns)?,
            column_names: node.column_names.clone(),
            insert_table_handle: to_insert_table_handle(ctx.table_write_info)?,
            output_type: to_row_type(&[
                node.row_count_variable.clone(),
                node.fragment_variable.clone(),
                node.table_commit_context_variable.clone(),
            ])?,
            commit_strategy: physical::CommitStrategy::NoCommit,
            source: self.to_physical_plan(&node.source, ctx)?,
        }))
    }

    pub(crate) fn to_typed_exprs<'e>(
        &self,
        exprs: impl IntoIterator<Item = &'e RowExpression>,
    ) -> Result<Vec<TypedExpr>> {
        exprs
            .into_iter()
            .map(|e| self.exprs.to_typed_expr(e))
            .collect()
    }

    fn to_optional_expr(&self, expr: Option<&RowExpression>) -> Result<Option<TypedExpr>> {
        expr.map(|e| self.exprs.to_typed_expr(e)).transpose()
    }

    /// Aggregate and window functions must stay calls.
    fn to_call(&self, call: &CallExpression) -> Result<CallExpr> {
        match self.exprs.to_typed_expr(&RowExpression::Call(call.clone()))? {
            TypedExpr::Call(call) => Ok(call),
            other => Err(ConvertError::Internal(format!(
                "Function {} translated to a non-call expression {}",
                call.display_name, other
            ))),
        }
    }
}

/// Task-level prefix for generated unique ids: 10 bits of stage id, 14 bits of
/// task id.
pub fn task_unique_id(task_id: &TaskId) -> i32 {
    ((task_id.stage_id & 0x3FF) << 14) | (task_id.id & 0x3FFF)
}

pub(crate) fn to_field(variable: &Variable) -> Result<FieldAccessExpr> {
    Ok(FieldAccessExpr::new(
        variable.name.clone(),
        parse_type(&variable.type_signature)?,
    ))
}

pub(crate) fn to_fields<'v>(
    variables: impl IntoIterator<Item = &'v Variable>,
) -> Result<Vec<FieldAccessExpr>> {
    variables.into_iter().map(to_field).collect()
}

pub(crate) fn to_row_type(variables: &[Variable]) -> Result<RowType> {
    let fields = variables
        .iter()
        .map(|v| Ok((v.name.clone(), parse_type(&v.type_signature)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(RowType::from_fields(fields))
}

pub(crate) fn to_ordering(
    scheme: &logical::OrderingScheme,
) -> Result<(Vec<FieldAccessExpr>, Vec<physical::SortOrder>)> {
    let keys = to_fields(scheme.order_by.iter().map(|o| &o.variable))?;
    let orders = scheme
        .order_by
        .iter()
        .map(|o| match o.sort_order {
            logical::SortOrder::AscNullsFirst => physical::SortOrder::ASC_NULLS_FIRST,
            logical::SortOrder::AscNullsLast => physical::SortOrder::ASC_NULLS_LAST,
            logical::SortOrder::DescNullsFirst => physical::SortOrder::DESC_NULLS_FIRST,
            logical::SortOrder::DescNullsLast => physical::SortOrder::DESC_NULLS_LAST,
        })
        .collect();
    Ok((keys, orders))
}

fn to_join_type(join_type: logical::JoinType) -> physical::JoinType {
    match join_type {
        logical::JoinType::Inner => physical::JoinType::Inner,
        logical::JoinType::Left => physical::JoinType::Left,
        logical::JoinType::Right => physical::JoinType::Right,
        logical::JoinType::Full => physical::JoinType::Full,
    }
}

fn to_bound_type(bound: logical::FrameBoundType) -> physical::BoundType {
    match bound {
        logical::FrameBoundType::UnboundedPreceding => physical::BoundType::UnboundedPreceding,
        logical::FrameBoundType::Preceding => physical::BoundType::Preceding,
        logical::FrameBoundType::CurrentRow => physical::BoundType::CurrentRow,
        logical::FrameBoundType::Following => physical::BoundType::Following,
        logical::FrameBoundType::UnboundedFollowing => physical::BoundType::UnboundedFollowing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_unique_id() {
        let task_id = TaskId::parse("q.3.0.5").unwrap();
        assert_eq!(task_unique_id(&task_id), (3 << 14) | 5);

        // Stage ids wrap at 10 bits, task ids at 14.
        let task_id = TaskId::parse("q.1025.0.16385").unwrap();
        assert_eq!(task_unique_id(&task_id), (1 << 14) | 1);
    }

    #[test]
    fn test_row_type_from_variables() {
        let row = to_row_type(&[Variable::new("a", "bigint"), Variable::new("b", "array(varchar)")])
            .unwrap();
        assert_eq!(row.names(), &["a".to_string(), "b".to_string()]);
        assert!(matches!(
            to_row_type(&[Variable::new("c", "char(3)")]),
            Err(ConvertError::UnsupportedType(_))
        ));
    }
}
