//! # Application State
//!
//! Created once at startup and shared with every handler through `Arc`. Nothing
//! in it is mutated after startup, so handlers never lock.

use pvx_convert::registry::register_plan_node_serde;
use pvx_convert::RowExpressionConverter;
use pvx_core::registry::{register_builtin_nodes, NodeRegistry};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Server settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Name of the shuffle implementation batch fragments write to. `None`
    /// disables batch translation.
    pub shuffle_name: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            shuffle_name: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: std::env::var("PVX_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            shuffle_name: std::env::var("PVX_SHUFFLE_NAME")
                .ok()
                .filter(|name| !name.is_empty()),
        }
    }
}

pub struct AppState {
    /// Expression translator used for every request.
    pub exprs: RowExpressionConverter,
    /// Node kinds this worker can rebuild from JSON, shuffle kinds included.
    pub registry: NodeRegistry,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let mut registry = NodeRegistry::new();
        register_builtin_nodes(&mut registry);
        register_plan_node_serde(&mut registry);
        Self {
            exprs: RowExpressionConverter,
            registry,
            config,
        }
    }
}
