//! # pvx-core: Native Engine Plan Model
//!
//! This crate defines the data model of the native columnar execution engine, the
//! target of plan translation. Nothing here knows about the coordinator. The types
//! describe what the engine executes.
//!
//! ## Module Overview
//!
//! - **`types`**: The engine type model (`Type`, `RowType`) and the type-signature
//!   parser used at the coordinator boundary.
//! - **`value`**: Constant values (`ScalarValue`) and columnar row batches (`RowVector`).
//! - **`expr`**: Typed scalar expression trees (`TypedExpr`).
//! - **`filter`**: Compiled per-column predicates pushed into scans (`Filter`).
//! - **`connector`**: Connector table, column and insert handles, and `Subfield` paths.
//! - **`plan`**: Physical plan nodes (`PlanNode`), partition function specs and the
//!   translated `PlanFragment`.
//! - **`registry`**: Kind-name -> factory registry used to rebuild serialized plans.

pub mod connector;
pub mod expr;
pub mod filter;
pub mod plan;
pub mod registry;
pub mod types;
pub mod value;
