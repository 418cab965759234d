//! # Plan Node Registry
//!
//! Serialized plans are shipped to remote workers as JSON and rebuilt there. Each
//! serialized node carries a `name` field naming its kind. The [`NodeRegistry`] maps
//! kind names to factory functions.
//!
//! A worker only reconstructs the kinds it has registered. Deserializing a plan that
//! contains an unregistered kind anywhere in the tree fails. Without this check, a
//! worker that was never taught about the shuffle extension nodes would run a plan
//! it cannot execute.

use serde_json::Value;
use std::collections::HashMap;

use crate::plan::PlanNode;

/// Builds a plan node from its serialized JSON form.
pub type NodeFactory = fn(&Value) -> Result<PlanNode, RegistryError>;

/// Kinds every engine understands without extension registration.
pub const BUILTIN_NODE_KINDS: &[&str] = &[
    "ValuesNode",
    "TableScanNode",
    "FilterNode",
    "ProjectNode",
    "AggregationNode",
    "GroupIdNode",
    "HashJoinNode",
    "MergeJoinNode",
    "NestedLoopJoinNode",
    "LimitNode",
    "TopNNode",
    "OrderByNode",
    "LocalMergeNode",
    "LocalPartitionNode",
    "ExchangeNode",
    "MergeExchangeNode",
    "PartitionedOutputNode",
    "TableWriteNode",
    "UnnestNode",
    "EnforceSingleRowNode",
    "AssignUniqueIdNode",
    "WindowNode",
    "RowNumberNode",
];

/// Errors raised while rebuilding plan nodes.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Serialized plan node has no 'name' field")]
    MissingName,
    #[error("Plan node kind '{0}' is not registered")]
    Unregistered(String),
    #[error("Failed to deserialize {kind}: {source}")]
    Deserialize {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Factory registered for '{expected}' produced a '{actual}' node")]
    KindMismatch { expected: String, actual: String },
}

/// Kind name -> factory map.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. Returns `false` if the kind was already registered,
    /// in which case the existing factory is kept.
    pub fn register(&mut self, name: impl Into<String>, factory: NodeFactory) -> bool {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return false;
        }
        self.factories.insert(name, factory);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Rebuild a plan tree, checking that every node kind in it is registered.
    pub fn deserialize(&self, value: &Value) -> Result<PlanNode, RegistryError> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or(RegistryError::MissingName)?;
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::Unregistered(name.to_string()))?;
        let node = factory(value)?;
        if node.name() != name {
            return Err(RegistryError::KindMismatch {
                expected: name.to_string(),
                actual: node.name().to_string(),
            });
        }

        let mut unregistered = None;
        node.walk(&mut |n| {
            if unregistered.is_none() && !self.contains(n.name()) {
                unregistered = Some(n.name().to_string());
            }
        });
        match unregistered {
            Some(kind) => Err(RegistryError::Unregistered(kind)),
            None => Ok(node),
        }
    }
}

/// Generic factory for any kind the [`PlanNode`] serde form understands.
pub fn deserialize_node(value: &Value) -> Result<PlanNode, RegistryError> {
    serde_json::from_value(value.clone()).map_err(|source| RegistryError::Deserialize {
        kind: value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string(),
        source,
    })
}

/// Register the engine's built-in node kinds.
pub fn register_builtin_nodes(registry: &mut NodeRegistry) {
    for kind in BUILTIN_NODE_KINDS {
        registry.register(*kind, deserialize_node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ExchangeNode, ShuffleReadNode};
    use crate::types::{RowType, Type};

    #[test]
    fn test_builtin_roundtrip() {
        let mut registry = NodeRegistry::new();
        register_builtin_nodes(&mut registry);
        assert!(registry.contains("ExchangeNode"));
        assert!(!registry.contains("ShuffleReadNode"));

        let node = PlanNode::Exchange(ExchangeNode {
            id: "7".into(),
            output_type: RowType::from_fields([("a", Type::Bigint)]),
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(registry.deserialize(&json).unwrap(), node);
    }

    #[test]
    fn test_unregistered_kind_is_rejected() {
        let mut registry = NodeRegistry::new();
        register_builtin_nodes(&mut registry);
        let node = PlanNode::ShuffleRead(ShuffleReadNode {
            id: "1".into(),
            output_type: RowType::default(),
        });
        let json = serde_json::to_value(&node).unwrap();
        assert!(matches!(
            registry.deserialize(&json),
            Err(RegistryError::Unregistered(kind)) if kind == "ShuffleReadNode"
        ));
        assert!(matches!(
            registry.deserialize(&serde_json::json!({"id": "1"})),
            Err(RegistryError::MissingName)
        ));
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = NodeRegistry::new();
        assert!(registry.register("ExchangeNode", deserialize_node));
        assert!(!registry.register("ExchangeNode", deserialize_node));
        assert_eq!(registry.kinds(), vec!["ExchangeNode"]);
    }
}
