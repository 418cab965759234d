//! # pvx-convert: Logical-to-Physical Plan Translation
//!
//! This crate turns a coordinator [`PlanFragment`](pvx_protocol::fragment::PlanFragment)
//! into an engine [`PlanFragment`](pvx_core::plan::PlanFragment) that a task can run.
//!
//! ```text
//! coordinator fragment (JSON)
//!   -> pvx_protocol::fragment::PlanFragment
//!   -> PlanConverter::to_physical_fragment()
//!        -> to_physical_plan() per node, recursively
//!             -> handles / filter / expression translators at the leaves
//!        -> output partitioning (+ shuffle chain in batch mode)
//!   -> pvx_core::plan::PlanFragment
//! ```
//!
//! ## Module Overview
//!
//! - **`expr`**: The expression translator seam (`ExprConverter`) and its default
//!   implementation for coordinator row expressions.
//! - **`filter`**: Column domain -> scan filter compaction.
//! - **`handles`**: Table, column, location and insert handle translation.
//! - **`plan`**: The per-node dispatcher (`PlanConverter::to_physical_plan`).
//! - **`patterns`**: Multi-node rewrites recognised during dispatch (semi/anti joins,
//!   `OFFSET ... LIMIT`, local exchanges).
//! - **`fragment`**: Execution strategy, output partitioning and the batch shuffle
//!   chain.
//! - **`registry`**: Registration of the shuffle extension node kinds.
//!
//! ## Execution Modes
//!
//! Interactive queries exchange data between stages through the engine's exchange
//! operators. Batch queries write to and read from an external shuffle service
//! instead. The mode changes how remote sources and fragment outputs translate, and
//! is fixed per [`PlanConverter`] by its [`ConverterConfig`].

pub mod error;
pub mod expr;
pub mod filter;
pub mod fragment;
pub mod handles;
pub mod patterns;
pub mod plan;
pub mod registry;

pub use error::{ConvertError, Result};
pub use expr::{ExprConverter, RowExpressionConverter};
pub use plan::{PlanConverter, TranslationContext};

use serde::{Deserialize, Serialize};

/// How stages exchange data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Stages stream pages to each other through exchanges.
    #[default]
    Interactive,
    /// Stages write their output to a named shuffle and read their input from it.
    Batch {
        shuffle_name: String,
        /// Opaque per-query write configuration for the shuffle. `None` when this
        /// fragment only reads.
        serialized_shuffle_write_info: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterConfig {
    pub mode: ExecutionMode,
}

impl ConverterConfig {
    pub fn interactive() -> Self {
        Self {
            mode: ExecutionMode::Interactive,
        }
    }

    pub fn batch(shuffle_name: impl Into<String>, write_info: Option<String>) -> Self {
        Self {
            mode: ExecutionMode::Batch {
                shuffle_name: shuffle_name.into(),
                serialized_shuffle_write_info: write_info,
            },
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self.mode, ExecutionMode::Batch { .. })
    }
}
