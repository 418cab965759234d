//! # Logical Plan Nodes
//!
//! The coordinator's logical plan, as received for one fragment. [`LogicalPlanNode`]
//! is a closed, `@type`-tagged variant over every node kind a fragment may contain.
//! Each node struct carries its id, its inputs (boxed, owned by the document) and
//! the variables it references.
//!
//! ## Output Variables
//!
//! [`LogicalPlanNode::output_variables`] returns the columns each node produces, in
//! order. Some kinds declare their outputs explicitly (scans, joins, values, remote
//! sources). The others derive them from their sources and assignments, the same
//! way the coordinator does.

use serde::{Deserialize, Serialize};

use crate::connector::{ColumnHandle, TableHandle};
use crate::expr::{CallExpression, RowExpression, Variable};
use crate::partitioning::PartitioningScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ordering {
    pub variable: Variable,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderingScheme {
    pub order_by: Vec<Ordering>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub variable: Variable,
    pub expression: RowExpression,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnAssignment {
    pub variable: Variable,
    pub column_handle: ColumnHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableScanNode {
    pub id: String,
    pub table: TableHandle,
    pub output_variables: Vec<Variable>,
    pub assignments: Vec<ColumnAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesNode {
    pub id: String,
    pub output_variables: Vec<Variable>,
    pub rows: Vec<Vec<RowExpression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub assignments: Vec<Assignment>,
}

impl ProjectNode {
    /// True when every assignment is `v := v`.
    pub fn is_identity(&self) -> bool {
        self.assignments
            .iter()
            .all(|a| a.expression.as_variable() == Some(&a.variable))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub predicate: RowExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationStep {
    Partial,
    Final,
    Intermediate,
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationAssignment {
    pub variable: Variable,
    pub call: CallExpression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingSetDescriptor {
    pub grouping_keys: Vec<Variable>,
    pub grouping_set_count: i32,
    #[serde(default)]
    pub global_grouping_sets: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub aggregations: Vec<AggregationAssignment>,
    pub grouping_sets: GroupingSetDescriptor,
    #[serde(default)]
    pub pre_grouped_variables: Vec<Variable>,
    pub step: AggregationStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_variable: Option<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id_variable: Option<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingColumn {
    pub output: Variable,
    pub input: Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupIdNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    /// Each set lists grouping output variables.
    pub grouping_sets: Vec<Vec<Variable>>,
    pub grouping_columns: Vec<GroupingColumn>,
    pub aggregation_arguments: Vec<Variable>,
    pub group_id_variable: Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinctLimitNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub limit: i64,
    pub partial: bool,
    pub distinct_variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_variable: Option<Variable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquiJoinClause {
    pub left: Variable,
    pub right: Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinNode {
    pub id: String,
    #[serde(rename = "type")]
    pub join_type: JoinType,
    pub left: Box<LogicalPlanNode>,
    pub right: Box<LogicalPlanNode>,
    pub criteria: Vec<EquiJoinClause>,
    pub output_variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<RowExpression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemiJoinNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub filtering_source: Box<LogicalPlanNode>,
    pub source_join_variable: Variable,
    pub filtering_source_join_variable: Variable,
    /// Boolean marker: true when the source row has a match.
    pub semi_join_output: Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowType {
    Range,
    Rows,
    Groups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameBoundType {
    UnboundedPreceding,
    Preceding,
    CurrentRow,
    Following,
    UnboundedFollowing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: WindowType,
    pub start_type: FrameBoundType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_value: Option<Variable>,
    pub end_type: FrameBoundType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_value: Option<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowFunction {
    pub function_call: CallExpression,
    pub frame: Frame,
    #[serde(default)]
    pub ignore_nulls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowFunctionAssignment {
    pub variable: Variable,
    pub function: WindowFunction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specification {
    pub partition_by: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_scheme: Option<OrderingScheme>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub specification: Specification,
    pub window_functions: Vec<WindowFunctionAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopNStep {
    Single,
    Partial,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopNNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub count: i64,
    pub ordering_scheme: OrderingScheme,
    pub step: TopNStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitStep {
    Partial,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub count: i64,
    pub step: LimitStep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub ordering_scheme: OrderingScheme,
    pub is_partial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnnestAssignment {
    pub input: Variable,
    pub outputs: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnnestNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub replicate_variables: Vec<Variable>,
    pub unnest_variables: Vec<UnnestAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinality_variable: Option<Variable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeType {
    Gather,
    Repartition,
    Replicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeScope {
    Local,
    RemoteStreaming,
    RemoteMaterialized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeNode {
    pub id: String,
    #[serde(rename = "type")]
    pub exchange_type: ExchangeType,
    pub scope: ExchangeScope,
    pub partitioning_scheme: PartitioningScheme,
    pub sources: Vec<LogicalPlanNode>,
    /// For each source, its variables in output-layout order.
    pub inputs: Vec<Vec<Variable>>,
    #[serde(default)]
    pub ensure_source_ordering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_scheme: Option<OrderingScheme>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSourceNode {
    pub id: String,
    pub source_fragment_ids: Vec<String>,
    pub output_variables: Vec<Variable>,
    #[serde(default)]
    pub ensure_source_ordering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_scheme: Option<OrderingScheme>,
    pub exchange_type: ExchangeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub column_names: Vec<String>,
    pub output_variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableWriterNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub row_count_variable: Variable,
    pub fragment_variable: Variable,
    pub table_commit_context_variable: Variable,
    pub columns: Vec<Variable>,
    pub column_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforceSingleRowNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignUniqueIdNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub id_variable: Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowNumberNode {
    pub id: String,
    pub source: Box<LogicalPlanNode>,
    pub partition_by: Vec<Variable>,
    pub row_number_variable: Variable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_row_count_per_partition: Option<i32>,
    #[serde(default)]
    pub partial: bool,
}

/// A node of the coordinator's logical plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum LogicalPlanNode {
    #[serde(rename = "TableScanNode")]
    TableScan(TableScanNode),
    #[serde(rename = "ValuesNode")]
    Values(ValuesNode),
    #[serde(rename = "ProjectNode")]
    Project(ProjectNode),
    #[serde(rename = "FilterNode")]
    Filter(FilterNode),
    #[serde(rename = "AggregationNode")]
    Aggregation(AggregationNode),
    #[serde(rename = "GroupIdNode")]
    GroupId(GroupIdNode),
    #[serde(rename = "DistinctLimitNode")]
    DistinctLimit(DistinctLimitNode),
    #[serde(rename = "JoinNode")]
    Join(JoinNode),
    #[serde(rename = "MergeJoinNode")]
    MergeJoin(JoinNode),
    #[serde(rename = "SemiJoinNode")]
    SemiJoin(SemiJoinNode),
    #[serde(rename = "WindowNode")]
    Window(WindowNode),
    #[serde(rename = "TopNNode")]
    TopN(TopNNode),
    #[serde(rename = "LimitNode")]
    Limit(LimitNode),
    #[serde(rename = "SortNode")]
    Sort(SortNode),
    #[serde(rename = "UnnestNode")]
    Unnest(UnnestNode),
    #[serde(rename = "ExchangeNode")]
    Exchange(ExchangeNode),
    #[serde(rename = "RemoteSourceNode")]
    RemoteSource(RemoteSourceNode),
    #[serde(rename = "OutputNode")]
    Output(OutputNode),
    #[serde(rename = "TableWriterNode")]
    TableWriter(TableWriterNode),
    #[serde(rename = "EnforceSingleRowNode")]
    EnforceSingleRow(EnforceSingleRowNode),
    #[serde(rename = "AssignUniqueIdNode")]
    AssignUniqueId(AssignUniqueIdNode),
    #[serde(rename = "RowNumberNode")]
    RowNumber(RowNumberNode),
}

impl LogicalPlanNode {
    pub fn id(&self) -> &str {
        match self {
            LogicalPlanNode::TableScan(n) => &n.id,
            LogicalPlanNode::Values(n) => &n.id,
            LogicalPlanNode::Project(n) => &n.id,
            LogicalPlanNode::Filter(n) => &n.id,
            LogicalPlanNode::Aggregation(n) => &n.id,
            LogicalPlanNode::GroupId(n) => &n.id,
            LogicalPlanNode::DistinctLimit(n) => &n.id,
            LogicalPlanNode::Join(n) | LogicalPlanNode::MergeJoin(n) => &n.id,
            LogicalPlanNode::SemiJoin(n) => &n.id,
            LogicalPlanNode::Window(n) => &n.id,
            LogicalPlanNode::TopN(n) => &n.id,
            LogicalPlanNode::Limit(n) => &n.id,
            LogicalPlanNode::Sort(n) => &n.id,
            LogicalPlanNode::Unnest(n) => &n.id,
            LogicalPlanNode::Exchange(n) => &n.id,
            LogicalPlanNode::RemoteSource(n) => &n.id,
            LogicalPlanNode::Output(n) => &n.id,
            LogicalPlanNode::TableWriter(n) => &n.id,
            LogicalPlanNode::EnforceSingleRow(n) => &n.id,
            LogicalPlanNode::AssignUniqueId(n) => &n.id,
            LogicalPlanNode::RowNumber(n) => &n.id,
        }
    }

    /// The `@type` tag of this node.
    pub fn kind_name(&self) -> &'static str {
        match self {
            LogicalPlanNode::TableScan(_) => "TableScanNode",
            LogicalPlanNode::Values(_) => "ValuesNode",
            LogicalPlanNode::Project(_) => "ProjectNode",
            LogicalPlanNode::Filter(_) => "FilterNode",
            LogicalPlanNode::Aggregation(_) => "AggregationNode",
            LogicalPlanNode::GroupId(_) => "GroupIdNode",
            LogicalPlanNode::DistinctLimit(_) => "DistinctLimitNode",
            LogicalPlanNode::Join(_) => "JoinNode",
            LogicalPlanNode::MergeJoin(_) => "MergeJoinNode",
            LogicalPlanNode::SemiJoin(_) => "SemiJoinNode",
            LogicalPlanNode::Window(_) => "WindowNode",
            LogicalPlanNode::TopN(_) => "TopNNode",
            LogicalPlanNode::Limit(_) => "LimitNode",
            LogicalPlanNode::Sort(_) => "SortNode",
            LogicalPlanNode::Unnest(_) => "UnnestNode",
            LogicalPlanNode::Exchange(_) => "ExchangeNode",
            LogicalPlanNode::RemoteSource(_) => "RemoteSourceNode",
            LogicalPlanNode::Output(_) => "OutputNode",
            LogicalPlanNode::TableWriter(_) => "TableWriterNode",
            LogicalPlanNode::EnforceSingleRow(_) => "EnforceSingleRowNode",
            LogicalPlanNode::AssignUniqueId(_) => "AssignUniqueIdNode",
            LogicalPlanNode::RowNumber(_) => "RowNumberNode",
        }
    }

    pub fn sources(&self) -> Vec<&LogicalPlanNode> {
        match self {
            LogicalPlanNode::TableScan(_)
            | LogicalPlanNode::Values(_)
            | LogicalPlanNode::RemoteSource(_) => vec![],
            LogicalPlanNode::Project(n) => vec![&n.source],
            LogicalPlanNode::Filter(n) => vec![&n.source],
            LogicalPlanNode::Aggregation(n) => vec![&n.source],
            LogicalPlanNode::GroupId(n) => vec![&n.source],
            LogicalPlanNode::DistinctLimit(n) => vec![&n.source],
            LogicalPlanNode::Join(n) | LogicalPlanNode::MergeJoin(n) => vec![&n.left, &n.right],
            LogicalPlanNode::SemiJoin(n) => vec![&n.source, &n.filtering_source],
            LogicalPlanNode::Window(n) => vec![&n.source],
            LogicalPlanNode::TopN(n) => vec![&n.source],
            LogicalPlanNode::Limit(n) => vec![&n.source],
            LogicalPlanNode::Sort(n) => vec![&n.source],
            LogicalPlanNode::Unnest(n) => vec![&n.source],
            LogicalPlanNode::Exchange(n) => n.sources.iter().collect(),
            LogicalPlanNode::Output(n) => vec![&n.source],
            LogicalPlanNode::TableWriter(n) => vec![&n.source],
            LogicalPlanNode::EnforceSingleRow(n) => vec![&n.source],
            LogicalPlanNode::AssignUniqueId(n) => vec![&n.source],
            LogicalPlanNode::RowNumber(n) => vec![&n.source],
        }
    }

    /// Columns produced by this node, in order.
    pub fn output_variables(&self) -> Vec<Variable> {
        match self {
            LogicalPlanNode::TableScan(n) => n.output_variables.clone(),
            LogicalPlanNode::Values(n) => n.output_variables.clone(),
            LogicalPlanNode::Project(n) => {
                n.assignments.iter().map(|a| a.variable.clone()).collect()
            }
            LogicalPlanNode::Filter(n) => n.source.output_variables(),
            LogicalPlanNode::Aggregation(n) => n
                .grouping_sets
                .grouping_keys
                .iter()
                .cloned()
                .chain(n.aggregations.iter().map(|a| a.variable.clone()))
                .collect(),
            LogicalPlanNode::GroupId(n) => {
                let mut outputs: Vec<Variable> = Vec::new();
                for set in &n.grouping_sets {
                    for variable in set {
                        if !outputs.contains(variable) {
                            outputs.push(variable.clone());
                        }
                    }
                }
                outputs.extend(n.aggregation_arguments.iter().cloned());
                outputs.push(n.group_id_variable.clone());
                outputs
            }
            LogicalPlanNode::DistinctLimit(n) => n.distinct_variables.clone(),
            LogicalPlanNode::Join(n) | LogicalPlanNode::MergeJoin(n) => {
                n.output_variables.clone()
            }
            LogicalPlanNode::SemiJoin(n) => {
                let mut outputs = n.source.output_variables();
                outputs.push(n.semi_join_output.clone());
                outputs
            }
            LogicalPlanNode::Window(n) => {
                let mut outputs = n.source.output_variables();
                outputs.extend(n.window_functions.iter().map(|f| f.variable.clone()));
                outputs
            }
            LogicalPlanNode::TopN(n) => n.source.output_variables(),
            LogicalPlanNode::Limit(n) => n.source.output_variables(),
            LogicalPlanNode::Sort(n) => n.source.output_variables(),
            LogicalPlanNode::Unnest(n) => {
                let mut outputs = n.replicate_variables.clone();
                for assignment in &n.unnest_variables {
                    outputs.extend(assignment.outputs.iter().cloned());
                }
                outputs.extend(n.ordinality_variable.iter().cloned());
                outputs
            }
            LogicalPlanNode::Exchange(n) => n.partitioning_scheme.output_layout.clone(),
            LogicalPlanNode::RemoteSource(n) => n.output_variables.clone(),
            LogicalPlanNode::Output(n) => n.output_variables.clone(),
            LogicalPlanNode::TableWriter(n) => vec![
                n.row_count_variable.clone(),
                n.fragment_variable.clone(),
                n.table_commit_context_variable.clone(),
            ],
            LogicalPlanNode::EnforceSingleRow(n) => n.source.output_variables(),
            LogicalPlanNode::AssignUniqueId(n) => {
                let mut outputs = n.source.output_variables();
                outputs.push(n.id_variable.clone());
                outputs
            }
            LogicalPlanNode::RowNumber(n) => {
                let mut outputs = n.source.output_variables();
                outputs.push(n.row_number_variable.clone());
                outputs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(id: &str, names: &[&str]) -> LogicalPlanNode {
        LogicalPlanNode::Values(ValuesNode {
            id: id.into(),
            output_variables: names.iter().map(|n| Variable::new(*n, "bigint")).collect(),
            rows: vec![],
        })
    }

    #[test]
    fn test_semi_join_outputs_append_marker() {
        let node = LogicalPlanNode::SemiJoin(SemiJoinNode {
            id: "3".into(),
            source: Box::new(values("1", &["a", "b"])),
            filtering_source: Box::new(values("2", &["c"])),
            source_join_variable: Variable::new("a", "bigint"),
            filtering_source_join_variable: Variable::new("c", "bigint"),
            semi_join_output: Variable::new("m", "boolean"),
        });
        let names: Vec<String> = node.output_variables().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["a", "b", "m"]);
        assert_eq!(node.sources().len(), 2);
    }

    #[test]
    fn test_identity_projection() {
        let project = ProjectNode {
            id: "2".into(),
            source: Box::new(values("1", &["a"])),
            assignments: vec![Assignment {
                variable: Variable::new("a", "bigint"),
                expression: RowExpression::Variable(Variable::new("a", "bigint")),
            }],
        };
        assert!(project.is_identity());
    }

    #[test]
    fn test_deserialize_tagged_node() {
        let json = serde_json::json!({
            "@type": "LimitNode",
            "id": "5",
            "count": 10,
            "step": "PARTIAL",
            "source": {
                "@type": "ValuesNode",
                "id": "4",
                "outputVariables": [{"name": "x", "type": "integer"}],
                "rows": []
            }
        });
        let node: LogicalPlanNode = serde_json::from_value(json).unwrap();
        assert_eq!(node.kind_name(), "LimitNode");
        assert_eq!(node.output_variables(), vec![Variable::new("x", "integer")]);
    }
}
