//! # Fragment Translation
//!
//! Wraps the translated plan in the node that ships its rows to the next stage,
//! and decides how the fragment's splits are scheduled.
//!
//! ## Output Partitioning
//!
//! | Coordinator partitioning   | Engine root                                  |
//! |----------------------------|----------------------------------------------|
//! | `OutputNode` root          | single partition                             |
//! | `SINGLE`                   | single partition                             |
//! | `FIXED` + `HASH`           | hash over key channels (single if 1 part.)   |
//! | `FIXED` + `ROUND_ROBIN`    | round robin (single if 1 partition)          |
//! | `FIXED` + `BROADCAST`      | broadcast                                    |
//! | hive bucketing             | hive bucket function over key channels       |
//!
//! In batch mode the partitioned output is replaced by a write to the shuffle:
//!
//! ```text
//! ShuffleWrite("root")
//!   LocalPartition gather ("shuffle-gather")
//!     PartitionAndSerialize ("shuffle-partition-serialize")
//!       <plan>
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use pvx_core::expr::{ConstantExpr, TypedExpr};
use pvx_core::plan::{
    self as physical, ExecutionStrategy, LocalPartitionNode, PartitionFunctionSpec,
    PartitionedOutputNode, PlanNode, PlanNodeRef, CONSTANT_CHANNEL,
};
use pvx_core::types::RowType;
use pvx_protocol::fragment::{PlanFragment, StageExecutionStrategy, TableWriteInfo};
use pvx_protocol::partitioning::{
    BucketFunctionType, ConnectorPartitioningHandle, PartitioningScheme,
    SystemPartitionFunction, SystemPartitioning,
};
use pvx_protocol::plan::LogicalPlanNode;
use pvx_protocol::task_id::TaskId;
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::plan::{to_row_type, PlanConverter, TranslationContext};
use crate::ExecutionMode;

const ROOT_ID: &str = "root";
const SHUFFLE_GATHER_ID: &str = "shuffle-gather";
const SHUFFLE_PARTITION_ID: &str = "shuffle-partition-serialize";

impl PlanConverter<'_> {
    /// Translate a whole fragment for the task `task_id`.
    pub fn to_physical_fragment(
        &self,
        fragment: &PlanFragment,
        table_write_info: Option<&TableWriteInfo>,
        task_id: &TaskId,
    ) -> Result<physical::PlanFragment> {
        let descriptor = &fragment.stage_execution_descriptor;
        let execution_strategy = match descriptor.stage_execution_strategy {
            StageExecutionStrategy::UngroupedExecution => ExecutionStrategy::Ungrouped,
            StageExecutionStrategy::FixedLifespanScheduleGroupedExecution
            | StageExecutionStrategy::DynamicLifespanScheduleGroupedExecution => {
                ExecutionStrategy::Grouped
            }
            StageExecutionStrategy::RecoverableGroupedExecution => {
                return Err(ConvertError::Unsupported(
                    "recoverable grouped execution".into(),
                ))
            }
        };
        let grouped_execution_leaf_node_ids: BTreeSet<String> =
            descriptor.grouped_execution_scan_nodes.iter().cloned().collect();
        if execution_strategy == ExecutionStrategy::Grouped
            && grouped_execution_leaf_node_ids.is_empty()
        {
            return Err(ConvertError::Internal(format!(
                "Fragment {} uses grouped execution without grouped scan nodes",
                fragment.id
            )));
        }

        let ctx = TranslationContext::new(task_id).with_table_write_info(table_write_info);
        let output = self.to_partitioned_output(fragment, &ctx)?;
        debug!(
            fragment_id = %fragment.id,
            task_id = %task_id,
            ?execution_strategy,
            num_partitions = output.num_partitions,
            batch = self.config().is_batch(),
            "Translated plan fragment"
        );
        let plan_node = match &self.config().mode {
            ExecutionMode::Interactive => Arc::new(PlanNode::PartitionedOutput(output)),
            ExecutionMode::Batch {
                shuffle_name,
                serialized_shuffle_write_info,
            } => to_shuffle_write(output, shuffle_name, serialized_shuffle_write_info.as_deref())?,
        };

        Ok(physical::PlanFragment {
            plan_node,
            execution_strategy,
            num_split_groups: descriptor.total_lifespans,
            grouped_execution_leaf_node_ids,
        })
    }

    fn to_partitioned_output(
        &self,
        fragment: &PlanFragment,
        ctx: &TranslationContext<'_>,
    ) -> Result<PartitionedOutputNode> {
        let scheme = &fragment.partitioning_scheme;

        if let LogicalPlanNode::Output(output) = &fragment.root {
            let source = self.to_physical_plan(&output.source, ctx)?;
            return Ok(PartitionedOutputNode::single(
                output.id.clone(),
                to_row_type(&output.output_variables)?,
                source,
            ));
        }

        let output_type = to_row_type(&scheme.output_layout)?;

        let source = self.to_physical_plan(&fragment.root, ctx)?;
        let keys = PartitionKeys::resolve(self, scheme, &source.output_type())?;

        match &scheme.partitioning.handle.connector_handle {
            ConnectorPartitioningHandle::System {
                partitioning: SystemPartitioning::Single,
                function,
            } => {
                if *function != SystemPartitionFunction::Single {
                    return Err(ConvertError::Internal(format!(
                        "SINGLE partitioning with {:?} function",
                        function
                    )));
                }
                Ok(PartitionedOutputNode::single(ROOT_ID, output_type, source))
            }
            ConnectorPartitioningHandle::System {
                partitioning: SystemPartitioning::Fixed,
                function: SystemPartitionFunction::Broadcast,
            } => Ok(PartitionedOutputNode::broadcast(ROOT_ID, 1, output_type, source)),
            ConnectorPartitioningHandle::System {
                partitioning: SystemPartitioning::Fixed,
                function: function @ (SystemPartitionFunction::Hash
                | SystemPartitionFunction::RoundRobin),
            } => {
                let bucket_to_partition = scheme.bucket_to_partition.as_ref().ok_or_else(|| {
                    ConvertError::Unsupported(
                        "FIXED partitioning without a bucket to partition map".into(),
                    )
                })?;
                let num_partitions = bucket_to_partition.len() as u32;
                if num_partitions == 1 {
                    return Ok(PartitionedOutputNode::single(ROOT_ID, output_type, source));
                }
                let partition_function = if *function == SystemPartitionFunction::Hash {
                    PartitionFunctionSpec::Hash {
                        input_type: source.output_type(),
                        key_channels: keys.channels.clone(),
                        constants: keys.constants.clone(),
                    }
                } else {
                    PartitionFunctionSpec::RoundRobin
                };
                Ok(keys.into_output(
                    num_partitions,
                    scheme.replicate_nulls_and_any,
                    partition_function,
                    output_type,
                    source,
                ))
            }
            ConnectorPartitioningHandle::System {
                partitioning,
                function,
            } => Err(ConvertError::Unsupported(format!(
                "{:?} partitioning with {:?} function",
                partitioning, function
            ))),
            ConnectorPartitioningHandle::Hive {
                bucket_count,
                bucket_function_type,
                ..
            } => {
                let bucket_to_partition = scheme.bucket_to_partition.as_ref().ok_or_else(|| {
                    ConvertError::Unsupported(
                        "hive bucketing without a bucket to partition map".into(),
                    )
                })?;
                let num_partitions = match bucket_to_partition.iter().max() {
                    None => 1,
                    Some(max) => max.checked_add(1).ok_or_else(|| {
                        ConvertError::Internal(format!("partition number {} out of range", max))
                    })?,
                };
                if num_partitions == 1 {
                    return Ok(PartitionedOutputNode::single(ROOT_ID, output_type, source));
                }
                if *bucket_function_type != BucketFunctionType::HiveCompatible {
                    return Err(ConvertError::Unsupported(format!(
                        "{:?} bucket function",
                        bucket_function_type
                    )));
                }
                let partition_function = PartitionFunctionSpec::HiveBucket {
                    bucket_count: *bucket_count,
                    bucket_to_partition: bucket_to_partition.clone(),
                    key_channels: keys.channels.clone(),
                    constants: keys.constants.clone(),
                };
                Ok(keys.into_output(
                    num_partitions,
                    scheme.replicate_nulls_and_any,
                    partition_function,
                    output_type,
                    source,
                ))
            }
            ConnectorPartitioningHandle::Unsupported => Err(ConvertError::UnsupportedConnector(
                format!(
                    "partitioning from connector {}",
                    scheme
                        .partitioning
                        .handle
                        .connector_id
                        .as_deref()
                        .unwrap_or("<unknown>")
                ),
            )),
        }
    }
}

/// Partitioning keys resolved against the fragment's plan output.
struct PartitionKeys {
    exprs: Vec<TypedExpr>,
    channels: Vec<u32>,
    constants: Vec<ConstantExpr>,
}

impl PartitionKeys {
    fn resolve(
        conv: &PlanConverter<'_>,
        scheme: &PartitioningScheme,
        input_type: &RowType,
    ) -> Result<Self> {
        let mut keys = PartitionKeys {
            exprs: Vec::new(),
            channels: Vec::new(),
            constants: Vec::new(),
        };
        for argument in &scheme.partitioning.arguments {
            match conv.exprs().to_typed_expr(argument)? {
                TypedExpr::FieldAccess(field) => {
                    let channel = input_type.index_of(&field.name).ok_or_else(|| {
                        ConvertError::InvalidInput(format!(
                            "Partitioning key {} is not produced by the fragment",
                            field.name
                        ))
                    })?;
                    keys.channels.push(channel as u32);
                    keys.exprs.push(TypedExpr::FieldAccess(field));
                }
                TypedExpr::Constant(constant) => {
                    keys.channels.push(CONSTANT_CHANNEL);
                    keys.constants.push(constant.clone());
                    keys.exprs.push(TypedExpr::Constant(constant));
                }
                other => {
                    return Err(ConvertError::Unsupported(format!(
                        "partitioning key {}",
                        other
                    )))
                }
            }
        }
        Ok(keys)
    }

    fn into_output(
        self,
        num_partitions: u32,
        replicate_nulls_and_any: bool,
        partition_function: PartitionFunctionSpec,
        output_type: RowType,
        source: PlanNodeRef,
    ) -> PartitionedOutputNode {
        PartitionedOutputNode {
            id: ROOT_ID.to_string(),
            keys: self.exprs,
            num_partitions,
            broadcast: false,
            replicate_nulls_and_any,
            partition_function,
            output_type,
            source,
        }
    }
}

/// Replace the partitioned output with a write to the shuffle.
fn to_shuffle_write(
    output: PartitionedOutputNode,
    shuffle_name: &str,
    write_info: Option<&str>,
) -> Result<PlanNodeRef> {
    if output.broadcast {
        return Err(ConvertError::Unsupported(
            "broadcast output in batch mode".into(),
        ));
    }
    if output.replicate_nulls_and_any {
        return Err(ConvertError::Unsupported(
            "replicate-nulls-and-any output in batch mode".into(),
        ));
    }
    let Some(write_info) = write_info else {
        if output.num_partitions != 1 {
            return Err(ConvertError::InvalidInput(format!(
                "{} output partitions but no shuffle write info",
                output.num_partitions
            )));
        }
        return Ok(Arc::new(PlanNode::PartitionedOutput(output)));
    };

    let serialize = PlanNode::PartitionAndSerialize(physical::PartitionAndSerializeNode {
        id: SHUFFLE_PARTITION_ID.to_string(),
        keys: output.keys,
        num_partitions: output.num_partitions,
        serialized_row_type: output.output_type,
        partition_function: output.partition_function,
        source: output.source,
    });
    let gather = LocalPartitionNode::gather(SHUFFLE_GATHER_ID, vec![Arc::new(serialize)]);
    Ok(Arc::new(PlanNode::ShuffleWrite(physical::ShuffleWriteNode {
        id: ROOT_ID.to_string(),
        shuffle_name: shuffle_name.to_string(),
        serialized_shuffle_write_info: write_info.to_string(),
        source: Arc::new(PlanNode::LocalPartition(gather)),
    })))
}
