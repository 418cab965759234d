//! # Physical Plan Nodes
//!
//! This module defines the plan tree the execution engine runs. Each variant of
//! [`PlanNode`] wraps a node struct with a unique string id and its children. The
//! children are held as [`PlanNodeRef`] (`Arc<PlanNode>`), so one subtree can feed
//! several parents.
//!
//! ## Output Types
//!
//! Every node reports a fully resolved output row type through
//! [`PlanNode::output_type`]. Pass-through nodes (filters, limits, sorts, local
//! exchanges) report their first source's type. Every other node derives its type
//! from its own fields.
//!
//! ## Distribution Nodes
//!
//! A fragment's root is a distribution node:
//!
//! - [`PartitionedOutputNode`] sends rows to downstream tasks over the network.
//! - In batch mode the root is a [`ShuffleWriteNode`] chain instead.
//!
//! The partitioning itself is described by a [`PartitionFunctionSpec`].
//!
//! ## Serialization
//!
//! Nodes serialize with a `name` tag naming their kind (for example `"HashJoinNode"`).
//! The [`registry`](crate::registry) module uses these names to rebuild nodes from JSON.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::connector::{ColumnHandle, ConnectorTableHandle, InsertTableHandle};
use crate::expr::{CallExpr, ConstantExpr, FieldAccessExpr, TypedExpr};
use crate::types::{RowType, Type};
use crate::value::RowVector;

/// Shared pointer to a plan node.
pub type PlanNodeRef = Arc<PlanNode>;

/// Key channel used by partition functions for a constant partitioning key.
pub const CONSTANT_CHANNEL: u32 = u32::MAX;

/// Sort direction and null placement for one sorting key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOrder {
    pub ascending: bool,
    pub nulls_first: bool,
}

impl SortOrder {
    pub const ASC_NULLS_FIRST: SortOrder = SortOrder { ascending: true, nulls_first: true };
    pub const ASC_NULLS_LAST: SortOrder = SortOrder { ascending: true, nulls_first: false };
    pub const DESC_NULLS_FIRST: SortOrder = SortOrder { ascending: false, nulls_first: true };
    pub const DESC_NULLS_LAST: SortOrder = SortOrder { ascending: false, nulls_first: false };
}

/// Join semantics supported by the engine's join operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Matching rows from both sides.
    Inner,
    /// All left rows, with nulls for unmatched right columns.
    Left,
    /// All right rows, with nulls for unmatched left columns.
    Right,
    /// All rows from both sides.
    Full,
    /// Left rows that have at least one match. Output is the left columns only.
    LeftSemiFilter,
    /// All left rows plus a boolean "matched" column (a mark join).
    LeftSemiProject,
    /// Left rows with no match.
    Anti,
}

/// Phase of a (possibly distributed) aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationStep {
    Partial,
    Final,
    Intermediate,
    Single,
}

/// How a local partition node spreads rows across its consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalPartitionType {
    /// All rows go to one consumer.
    Gather,
    /// Rows are spread over all consumers by the partition function.
    Repartition,
}

/// Function deciding the destination partition of each row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PartitionFunctionSpec {
    /// Everything goes to partition 0.
    Gather,
    RoundRobin,
    /// Hash of the key channels. `key_channels` entries equal to
    /// [`CONSTANT_CHANNEL`] take their value from `constants`, in order.
    Hash {
        input_type: RowType,
        key_channels: Vec<u32>,
        constants: Vec<ConstantExpr>,
    },
    /// Hive-compatible bucketing followed by a bucket-to-partition lookup.
    HiveBucket {
        bucket_count: u32,
        bucket_to_partition: Vec<u32>,
        key_channels: Vec<u32>,
        constants: Vec<ConstantExpr>,
    },
}

/// Whether a table writer commits its own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitStrategy {
    NoCommit,
    TaskCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowFrameType {
    Range,
    Rows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundType {
    UnboundedPreceding,
    Preceding,
    CurrentRow,
    Following,
    UnboundedFollowing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFrame {
    pub frame_type: WindowFrameType,
    pub start_type: BoundType,
    pub start_value: Option<TypedExpr>,
    pub end_type: BoundType,
    pub end_value: Option<TypedExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFunction {
    pub function_call: CallExpr,
    pub frame: WindowFrame,
    pub ignore_nulls: bool,
}

/// Maps an output grouping key of a GroupId node to the input column it copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingKeyInfo {
    pub output: String,
    pub input: FieldAccessExpr,
}

// ---------------------------------------------------------------------------
// Node structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuesNode {
    pub id: String,
    pub row_type: RowType,
    pub values: Vec<RowVector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableScanNode {
    pub id: String,
    pub output_type: RowType,
    pub table_handle: ConnectorTableHandle,
    /// Output column name -> connector column.
    pub assignments: BTreeMap<String, ColumnHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    pub id: String,
    pub filter: TypedExpr,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectNode {
    pub id: String,
    pub names: Vec<String>,
    pub projections: Vec<TypedExpr>,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationNode {
    pub id: String,
    pub step: AggregationStep,
    pub grouping_keys: Vec<FieldAccessExpr>,
    /// Keys on which the input is already clustered; enables streaming aggregation.
    pub pre_grouped_keys: Vec<FieldAccessExpr>,
    pub aggregate_names: Vec<String>,
    pub aggregates: Vec<CallExpr>,
    pub aggregate_masks: Vec<Option<FieldAccessExpr>>,
    pub ignore_null_keys: bool,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupIdNode {
    pub id: String,
    pub grouping_sets: Vec<Vec<FieldAccessExpr>>,
    pub grouping_key_infos: Vec<GroupingKeyInfo>,
    pub aggregation_inputs: Vec<FieldAccessExpr>,
    pub group_id_name: String,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashJoinNode {
    pub id: String,
    pub join_type: JoinType,
    /// Anti join only: a null key on either side makes `NOT IN` return no rows.
    pub null_aware: bool,
    pub left_keys: Vec<FieldAccessExpr>,
    pub right_keys: Vec<FieldAccessExpr>,
    pub filter: Option<TypedExpr>,
    pub left: PlanNodeRef,
    pub right: PlanNodeRef,
    pub output_type: RowType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeJoinNode {
    pub id: String,
    pub join_type: JoinType,
    pub left_keys: Vec<FieldAccessExpr>,
    pub right_keys: Vec<FieldAccessExpr>,
    pub filter: Option<TypedExpr>,
    pub left: PlanNodeRef,
    pub right: PlanNodeRef,
    pub output_type: RowType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedLoopJoinNode {
    pub id: String,
    pub join_type: JoinType,
    pub join_condition: Option<TypedExpr>,
    pub left: PlanNodeRef,
    pub right: PlanNodeRef,
    pub output_type: RowType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitNode {
    pub id: String,
    pub offset: i64,
    pub count: i64,
    pub is_partial: bool,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNNode {
    pub id: String,
    pub sorting_keys: Vec<FieldAccessExpr>,
    pub sorting_orders: Vec<SortOrder>,
    pub count: i64,
    pub is_partial: bool,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByNode {
    pub id: String,
    pub sorting_keys: Vec<FieldAccessExpr>,
    pub sorting_orders: Vec<SortOrder>,
    pub is_partial: bool,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalMergeNode {
    pub id: String,
    pub sorting_keys: Vec<FieldAccessExpr>,
    pub sorting_orders: Vec<SortOrder>,
    pub sources: Vec<PlanNodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPartitionNode {
    pub id: String,
    pub partition_type: LocalPartitionType,
    pub partition_function: PartitionFunctionSpec,
    pub sources: Vec<PlanNodeRef>,
}

impl LocalPartitionNode {
    pub fn gather(id: impl Into<String>, sources: Vec<PlanNodeRef>) -> Self {
        Self {
            id: id.into(),
            partition_type: LocalPartitionType::Gather,
            partition_function: PartitionFunctionSpec::Gather,
            sources,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeNode {
    pub id: String,
    pub output_type: RowType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeExchangeNode {
    pub id: String,
    pub output_type: RowType,
    pub sorting_keys: Vec<FieldAccessExpr>,
    pub sorting_orders: Vec<SortOrder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionedOutputNode {
    pub id: String,
    pub keys: Vec<TypedExpr>,
    pub num_partitions: u32,
    pub broadcast: bool,
    pub replicate_nulls_and_any: bool,
    pub partition_function: PartitionFunctionSpec,
    pub output_type: RowType,
    pub source: PlanNodeRef,
}

impl PartitionedOutputNode {
    /// All rows go to a single destination.
    pub fn single(id: impl Into<String>, output_type: RowType, source: PlanNodeRef) -> Self {
        Self {
            id: id.into(),
            keys: Vec::new(),
            num_partitions: 1,
            broadcast: false,
            replicate_nulls_and_any: false,
            partition_function: PartitionFunctionSpec::Gather,
            output_type,
            source,
        }
    }

    /// Every row goes to every destination.
    pub fn broadcast(
        id: impl Into<String>,
        num_partitions: u32,
        output_type: RowType,
        source: PlanNodeRef,
    ) -> Self {
        Self {
            id: id.into(),
            keys: Vec::new(),
            num_partitions,
            broadcast: true,
            replicate_nulls_and_any: false,
            partition_function: PartitionFunctionSpec::Gather,
            output_type,
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableWriteNode {
    pub id: String,
    /// Input columns being written, with their target column names.
    pub columns: RowType,
    pub column_names: Vec<String>,
    pub insert_table_handle: InsertTableHandle,
    pub output_type: RowType,
    pub commit_strategy: CommitStrategy,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnnestNode {
    pub id: String,
    pub replicate_variables: Vec<FieldAccessExpr>,
    pub unnest_variables: Vec<FieldAccessExpr>,
    /// One name per array unnest column, two (key, value) per map unnest column.
    pub unnest_names: Vec<String>,
    pub ordinality_name: Option<String>,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforceSingleRowNode {
    pub id: String,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignUniqueIdNode {
    pub id: String,
    pub id_name: String,
    /// Task-level prefix of the generated ids, unique within the query.
    pub task_unique_id: i32,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowNode {
    pub id: String,
    pub partition_keys: Vec<FieldAccessExpr>,
    pub sorting_keys: Vec<FieldAccessExpr>,
    pub sorting_orders: Vec<SortOrder>,
    pub window_column_names: Vec<String>,
    pub window_functions: Vec<WindowFunction>,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowNumberNode {
    pub id: String,
    pub partition_keys: Vec<FieldAccessExpr>,
    pub row_number_column_name: Option<String>,
    pub limit: Option<i32>,
    pub source: PlanNodeRef,
}

/// Computes a partition number for each row and serializes the row into a
/// single binary column, ready to be handed to a shuffle writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionAndSerializeNode {
    pub id: String,
    pub keys: Vec<TypedExpr>,
    pub num_partitions: u32,
    pub serialized_row_type: RowType,
    pub partition_function: PartitionFunctionSpec,
    pub source: PlanNodeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuffleReadNode {
    pub id: String,
    pub output_type: RowType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuffleWriteNode {
    pub id: String,
    pub shuffle_name: String,
    pub serialized_shuffle_write_info: String,
    pub source: PlanNodeRef,
}

// ---------------------------------------------------------------------------
// PlanNode
// ---------------------------------------------------------------------------

/// A node of the physical plan tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum PlanNode {
    #[serde(rename = "ValuesNode")]
    Values(ValuesNode),
    #[serde(rename = "TableScanNode")]
    TableScan(TableScanNode),
    #[serde(rename = "FilterNode")]
    Filter(FilterNode),
    #[serde(rename = "ProjectNode")]
    Project(ProjectNode),
    #[serde(rename = "AggregationNode")]
    Aggregation(AggregationNode),
    #[serde(rename = "GroupIdNode")]
    GroupId(GroupIdNode),
    #[serde(rename = "HashJoinNode")]
    HashJoin(HashJoinNode),
    #[serde(rename = "MergeJoinNode")]
    MergeJoin(MergeJoinNode),
    #[serde(rename = "NestedLoopJoinNode")]
    NestedLoopJoin(NestedLoopJoinNode),
    #[serde(rename = "LimitNode")]
    Limit(LimitNode),
    #[serde(rename = "TopNNode")]
    TopN(TopNNode),
    #[serde(rename = "OrderByNode")]
    OrderBy(OrderByNode),
    #[serde(rename = "LocalMergeNode")]
    LocalMerge(LocalMergeNode),
    #[serde(rename = "LocalPartitionNode")]
    LocalPartition(LocalPartitionNode),
    #[serde(rename = "ExchangeNode")]
    Exchange(ExchangeNode),
    #[serde(rename = "MergeExchangeNode")]
    MergeExchange(MergeExchangeNode),
    #[serde(rename = "PartitionedOutputNode")]
    PartitionedOutput(PartitionedOutputNode),
    #[serde(rename = "TableWriteNode")]
    TableWrite(TableWriteNode),
    #[serde(rename = "UnnestNode")]
    Unnest(UnnestNode),
    #[serde(rename = "EnforceSingleRowNode")]
    EnforceSingleRow(EnforceSingleRowNode),
    #[serde(rename = "AssignUniqueIdNode")]
    AssignUniqueId(AssignUniqueIdNode),
    #[serde(rename = "WindowNode")]
    Window(WindowNode),
    #[serde(rename = "RowNumberNode")]
    RowNumber(RowNumberNode),
    #[serde(rename = "PartitionAndSerializeNode")]
    PartitionAndSerialize(PartitionAndSerializeNode),
    #[serde(rename = "ShuffleReadNode")]
    ShuffleRead(ShuffleReadNode),
    #[serde(rename = "ShuffleWriteNode")]
    ShuffleWrite(ShuffleWriteNode),
}

impl PlanNode {
    pub fn id(&self) -> &str {
        match self {
            PlanNode::Values(n) => &n.id,
            PlanNode::TableScan(n) => &n.id,
            PlanNode::Filter(n) => &n.id,
            PlanNode::Project(n) => &n.id,
            PlanNode::Aggregation(n) => &n.id,
            PlanNode::GroupId(n) => &n.id,
            PlanNode::HashJoin(n) => &n.id,
            PlanNode::MergeJoin(n) => &n.id,
            PlanNode::NestedLoopJoin(n) => &n.id,
            PlanNode::Limit(n) => &n.id,
            PlanNode::TopN(n) => &n.id,
            PlanNode::OrderBy(n) => &n.id,
            PlanNode::LocalMerge(n) => &n.id,
            PlanNode::LocalPartition(n) => &n.id,
            PlanNode::Exchange(n) => &n.id,
            PlanNode::MergeExchange(n) => &n.id,
            PlanNode::PartitionedOutput(n) => &n.id,
            PlanNode::TableWrite(n) => &n.id,
            PlanNode::Unnest(n) => &n.id,
            PlanNode::EnforceSingleRow(n) => &n.id,
            PlanNode::AssignUniqueId(n) => &n.id,
            PlanNode::Window(n) => &n.id,
            PlanNode::RowNumber(n) => &n.id,
            PlanNode::PartitionAndSerialize(n) => &n.id,
            PlanNode::ShuffleRead(n) => &n.id,
            PlanNode::ShuffleWrite(n) => &n.id,
        }
    }

    /// Kind name, as used by the serialized form and the node registry.
    pub fn name(&self) -> &'static str {
        match self {
            PlanNode::Values(_) => "ValuesNode",
            PlanNode::TableScan(_) => "TableScanNode",
            PlanNode::Filter(_) => "FilterNode",
            PlanNode::Project(_) => "ProjectNode",
            PlanNode::Aggregation(_) => "AggregationNode",
            PlanNode::GroupId(_) => "GroupIdNode",
            PlanNode::HashJoin(_) => "HashJoinNode",
            PlanNode::MergeJoin(_) => "MergeJoinNode",
            PlanNode::NestedLoopJoin(_) => "NestedLoopJoinNode",
            PlanNode::Limit(_) => "LimitNode",
            PlanNode::TopN(_) => "TopNNode",
            PlanNode::OrderBy(_) => "OrderByNode",
            PlanNode::LocalMerge(_) => "LocalMergeNode",
            PlanNode::LocalPartition(_) => "LocalPartitionNode",
            PlanNode::Exchange(_) => "ExchangeNode",
            PlanNode::MergeExchange(_) => "MergeExchangeNode",
            PlanNode::PartitionedOutput(_) => "PartitionedOutputNode",
            PlanNode::TableWrite(_) => "TableWriteNode",
            PlanNode::Unnest(_) => "UnnestNode",
            PlanNode::EnforceSingleRow(_) => "EnforceSingleRowNode",
            PlanNode::AssignUniqueId(_) => "AssignUniqueIdNode",
            PlanNode::Window(_) => "WindowNode",
            PlanNode::RowNumber(_) => "RowNumberNode",
            PlanNode::PartitionAndSerialize(_) => "PartitionAndSerializeNode",
            PlanNode::ShuffleRead(_) => "ShuffleReadNode",
            PlanNode::ShuffleWrite(_) => "ShuffleWriteNode",
        }
    }

    /// Child nodes, left to right.
    pub fn sources(&self) -> Vec<&PlanNodeRef> {
        match self {
            PlanNode::Values(_)
            | PlanNode::TableScan(_)
            | PlanNode::Exchange(_)
            | PlanNode::MergeExchange(_)
            | PlanNode::ShuffleRead(_) => vec![],
            PlanNode::Filter(n) => vec![&n.source],
            PlanNode::Project(n) => vec![&n.source],
            PlanNode::Aggregation(n) => vec![&n.source],
            PlanNode::GroupId(n) => vec![&n.source],
            PlanNode::HashJoin(n) => vec![&n.left, &n.right],
            PlanNode::MergeJoin(n) => vec![&n.left, &n.right],
            PlanNode::NestedLoopJoin(n) => vec![&n.left, &n.right],
            PlanNode::Limit(n) => vec![&n.source],
            PlanNode::TopN(n) => vec![&n.source],
            PlanNode::OrderBy(n) => vec![&n.source],
            PlanNode::LocalMerge(n) => n.sources.iter().collect(),
            PlanNode::LocalPartition(n) => n.sources.iter().collect(),
            PlanNode::PartitionedOutput(n) => vec![&n.source],
            PlanNode::TableWrite(n) => vec![&n.source],
            PlanNode::Unnest(n) => vec![&n.source],
            PlanNode::EnforceSingleRow(n) => vec![&n.source],
            PlanNode::AssignUniqueId(n) => vec![&n.source],
            PlanNode::Window(n) => vec![&n.source],
            PlanNode::RowNumber(n) => vec![&n.source],
            PlanNode::PartitionAndSerialize(n) => vec![&n.source],
            PlanNode::ShuffleWrite(n) => vec![&n.source],
        }
    }

    /// The row type this node produces.
    pub fn output_type(&self) -> RowType {
        match self {
            PlanNode::Values(n) => n.row_type.clone(),
            PlanNode::TableScan(n) => n.output_type.clone(),
            PlanNode::Filter(n) => n.source.output_type(),
            PlanNode::Project(n) => RowType::from_fields(
                n.names
                    .iter()
                    .cloned()
                    .zip(n.projections.iter().map(|p| p.ty().clone())),
            ),
            PlanNode::Aggregation(n) => RowType::from_fields(
                n.grouping_keys
                    .iter()
                    .map(|k| (k.name.clone(), k.ty.clone()))
                    .chain(
                        n.aggregate_names
                            .iter()
                            .cloned()
                            .zip(n.aggregates.iter().map(|a| a.ty.clone())),
                    ),
            ),
            PlanNode::GroupId(n) => {
                let mut row = RowType::from_fields(
                    n.grouping_key_infos
                        .iter()
                        .map(|info| (info.output.clone(), info.input.ty.clone()))
                        .chain(
                            n.aggregation_inputs
                                .iter()
                                .map(|input| (input.name.clone(), input.ty.clone())),
                        ),
                );
                row.push(n.group_id_name.clone(), Type::Bigint);
                row
            }
            PlanNode::HashJoin(n) => n.output_type.clone(),
            PlanNode::MergeJoin(n) => n.output_type.clone(),
            PlanNode::NestedLoopJoin(n) => n.output_type.clone(),
            PlanNode::Limit(n) => n.source.output_type(),
            PlanNode::TopN(n) => n.source.output_type(),
            PlanNode::OrderBy(n) => n.source.output_type(),
            PlanNode::LocalMerge(n) => first_source_type(&n.sources),
            PlanNode::LocalPartition(n) => first_source_type(&n.sources),
            PlanNode::Exchange(n) => n.output_type.clone(),
            PlanNode::MergeExchange(n) => n.output_type.clone(),
            PlanNode::PartitionedOutput(n) => n.output_type.clone(),
            PlanNode::TableWrite(n) => n.output_type.clone(),
            PlanNode::Unnest(n) => {
                let mut row = RowType::from_fields(
                    n.replicate_variables
                        .iter()
                        .map(|v| (v.name.clone(), v.ty.clone())),
                );
                let unnested = n.unnest_variables.iter().flat_map(|v| match &v.ty {
                    Type::Array(element) => vec![element.as_ref().clone()],
                    Type::Map(key, value) => vec![key.as_ref().clone(), value.as_ref().clone()],
                    other => vec![other.clone()],
                });
                for (name, ty) in n.unnest_names.iter().zip(unnested) {
                    row.push(name.clone(), ty);
                }
                if let Some(ordinality) = &n.ordinality_name {
                    row.push(ordinality.clone(), Type::Bigint);
                }
                row
            }
            PlanNode::EnforceSingleRow(n) => n.source.output_type(),
            PlanNode::AssignUniqueId(n) => {
                let mut row = n.source.output_type();
                row.push(n.id_name.clone(), Type::Bigint);
                row
            }
            PlanNode::Window(n) => {
                let mut row = n.source.output_type();
                for (name, function) in n.window_column_names.iter().zip(&n.window_functions) {
                    row.push(name.clone(), function.function_call.ty.clone());
                }
                row
            }
            PlanNode::RowNumber(n) => {
                let mut row = n.source.output_type();
                if let Some(name) = &n.row_number_column_name {
                    row.push(name.clone(), Type::Bigint);
                }
                row
            }
            PlanNode::PartitionAndSerialize(_) => {
                RowType::from_fields([("partition", Type::Integer), ("data", Type::Varbinary)])
            }
            PlanNode::ShuffleRead(n) => n.output_type.clone(),
            PlanNode::ShuffleWrite(_) => RowType::default(),
        }
    }

    /// Visit this node and all descendants in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a PlanNode)) {
        visit(self);
        for source in self.sources() {
            source.walk(visit);
        }
    }
}

fn first_source_type(sources: &[PlanNodeRef]) -> RowType {
    sources
        .first()
        .map(|s| s.output_type())
        .unwrap_or_default()
}

/// Whether the fragment runs ungrouped or one split group (bucket) at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    Ungrouped,
    Grouped,
}

/// A translated plan fragment, ready to be run by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFragment {
    pub plan_node: PlanNodeRef,
    pub execution_strategy: ExecutionStrategy,
    pub num_split_groups: i32,
    /// Ids of the leaf scan nodes that run grouped.
    pub grouped_execution_leaf_node_ids: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarValue;

    fn values(id: &str, fields: &[(&str, Type)]) -> PlanNodeRef {
        Arc::new(PlanNode::Values(ValuesNode {
            id: id.into(),
            row_type: RowType::from_fields(fields.iter().map(|(n, t)| (*n, t.clone()))),
            values: vec![],
        }))
    }

    #[test]
    fn test_pass_through_output_type() {
        let source = values("0", &[("a", Type::Bigint), ("b", Type::Varchar)]);
        let filter = PlanNode::Filter(FilterNode {
            id: "1".into(),
            filter: TypedExpr::constant(Type::Boolean, ScalarValue::Boolean(true)),
            source: source.clone(),
        });
        assert_eq!(filter.output_type(), source.output_type());
        assert_eq!(filter.sources().len(), 1);
        assert_eq!(filter.name(), "FilterNode");
    }

    #[test]
    fn test_unnest_output_type() {
        let source = values(
            "0",
            &[
                ("k", Type::Bigint),
                ("arr", Type::array(Type::Double)),
                ("m", Type::map(Type::Varchar, Type::Bigint)),
            ],
        );
        let unnest = PlanNode::Unnest(UnnestNode {
            id: "1".into(),
            replicate_variables: vec![FieldAccessExpr::new("k", Type::Bigint)],
            unnest_variables: vec![
                FieldAccessExpr::new("arr", Type::array(Type::Double)),
                FieldAccessExpr::new("m", Type::map(Type::Varchar, Type::Bigint)),
            ],
            unnest_names: vec!["e".into(), "mk".into(), "mv".into()],
            ordinality_name: Some("ord".into()),
            source,
        });
        let output = unnest.output_type();
        assert_eq!(output.names(), &["k", "e", "mk", "mv", "ord"]);
        assert_eq!(
            output.types(),
            &[Type::Bigint, Type::Double, Type::Varchar, Type::Bigint, Type::Bigint]
        );
    }

    #[test]
    fn test_walk_and_serialized_kind_name() {
        let left = values("0", &[("a", Type::Bigint)]);
        let right = values("1", &[("b", Type::Bigint)]);
        let join = PlanNode::HashJoin(HashJoinNode {
            id: "2".into(),
            join_type: JoinType::Inner,
            null_aware: false,
            left_keys: vec![FieldAccessExpr::new("a", Type::Bigint)],
            right_keys: vec![FieldAccessExpr::new("b", Type::Bigint)],
            filter: None,
            left,
            right,
            output_type: RowType::from_fields([("a", Type::Bigint), ("b", Type::Bigint)]),
        });

        let mut ids = Vec::new();
        join.walk(&mut |n| ids.push(n.id().to_string()));
        assert_eq!(ids, vec!["2", "0", "1"]);

        let json = serde_json::to_value(&join).unwrap();
        assert_eq!(json["name"], "HashJoinNode");
        assert_eq!(json["left"]["name"], "ValuesNode");
        let back: PlanNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, join);
    }
}
