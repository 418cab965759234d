//! Registration of the batch shuffle node kinds.
//!
//! `PartitionAndSerializeNode`, `ShuffleReadNode` and `ShuffleWriteNode` only
//! appear in batch-mode plans. Workers that run those plans call
//! [`register_plan_node_serde`] once at startup, next to the built-in kinds.

use pvx_core::registry::{deserialize_node, NodeRegistry};
use tracing::debug;

pub const SHUFFLE_NODE_KINDS: &[&str] = &[
    "PartitionAndSerializeNode",
    "ShuffleReadNode",
    "ShuffleWriteNode",
];

/// Teach `registry` the shuffle node kinds. Registering twice is harmless.
pub fn register_plan_node_serde(registry: &mut NodeRegistry) {
    for kind in SHUFFLE_NODE_KINDS {
        if registry.register(*kind, deserialize_node) {
            debug!(kind, "Registered plan node kind");
        }
    }
}
