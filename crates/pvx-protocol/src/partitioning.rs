//! Partitioning schemes attached to fragments and exchanges.

use serde::{Deserialize, Serialize};

use crate::expr::{RowExpression, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemPartitioning {
    Single,
    Fixed,
    Source,
    Scaled,
    CoordinatorOnly,
    Arbitrary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemPartitionFunction {
    Single,
    Hash,
    RoundRobin,
    Broadcast,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BucketFunctionType {
    HiveCompatible,
    PrestoNative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ConnectorPartitioningHandle {
    /// Partitioning implemented by the engine itself.
    #[serde(rename = "$remote")]
    System {
        partitioning: SystemPartitioning,
        function: SystemPartitionFunction,
    },
    #[serde(rename = "hive", rename_all = "camelCase")]
    Hive {
        bucket_count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_compatible_bucket_count: Option<u32>,
        bucket_function_type: BucketFunctionType,
    },
    #[serde(other)]
    Unsupported,
}

impl ConnectorPartitioningHandle {
    pub fn system(partitioning: SystemPartitioning, function: SystemPartitionFunction) -> Self {
        ConnectorPartitioningHandle::System {
            partitioning,
            function,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitioningHandle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<String>,
    pub connector_handle: ConnectorPartitioningHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partitioning {
    pub handle: PartitioningHandle,
    pub arguments: Vec<RowExpression>,
}

/// How a fragment (or an exchange) distributes its output rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitioningScheme {
    pub partitioning: Partitioning,
    pub output_layout: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_column: Option<Variable>,
    #[serde(default)]
    pub replicate_nulls_and_any: bool,
    /// Bucket number -> destination partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_to_partition: Option<Vec<u32>>,
}
