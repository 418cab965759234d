//! Plan fragments and table-write targets.

use serde::{Deserialize, Serialize};

use crate::connector::WriteTableHandle;
use crate::partitioning::PartitioningScheme;
use crate::plan::LogicalPlanNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageExecutionStrategy {
    UngroupedExecution,
    FixedLifespanScheduleGroupedExecution,
    DynamicLifespanScheduleGroupedExecution,
    RecoverableGroupedExecution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageExecutionDescriptor {
    pub stage_execution_strategy: StageExecutionStrategy,
    /// Ids of the scan nodes that run one lifespan at a time.
    #[serde(default)]
    pub grouped_execution_scan_nodes: Vec<String>,
    #[serde(default)]
    pub total_lifespans: i32,
}

impl StageExecutionDescriptor {
    pub fn ungrouped() -> Self {
        Self {
            stage_execution_strategy: StageExecutionStrategy::UngroupedExecution,
            grouped_execution_scan_nodes: Vec::new(),
            total_lifespans: 0,
        }
    }
}

/// The unit of distributed work: a plan subtree plus how its output is distributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFragment {
    pub id: String,
    pub root: LogicalPlanNode,
    pub partitioning_scheme: PartitioningScheme,
    pub stage_execution_descriptor: StageExecutionDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ExecutionWriterTarget {
    #[serde(rename = "CreateHandle")]
    CreateHandle { handle: WriteTableHandle },
    #[serde(rename = "InsertHandle")]
    InsertHandle { handle: WriteTableHandle },
    #[serde(other)]
    Unsupported,
}

/// Write target attached to a task running a table-writing fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableWriteInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer_target: Option<ExecutionWriterTarget>,
}
