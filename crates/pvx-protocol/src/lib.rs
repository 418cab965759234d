//! # pvx-protocol: Coordinator Plan Fragments
//!
//! The coordinator plans a query, cuts the plan into fragments and sends each
//! fragment to the workers that run it. This crate models what arrives: the logical
//! plan tree, its scalar expressions, predicate domains, connector handles and
//! output partitioning. Every type is serde-deserializable from the coordinator's
//! JSON form, with polymorphic values discriminated by an `@type` field.
//!
//! ## Module Overview
//!
//! - **`plan`**: Logical plan nodes (`LogicalPlanNode`) and their output variables.
//! - **`expr`**: Row expressions, variables and function handles.
//! - **`domain`**: Column domains (`Domain`, `ValueSet`, `Range`, `Marker`).
//! - **`block`**: The serialized single-value block codec used for constants.
//! - **`connector`**: Table, column, layout and write handles.
//! - **`partitioning`**: `PartitioningScheme` and partitioning handles.
//! - **`fragment`**: `PlanFragment` and `TableWriteInfo`.
//! - **`task_id`**: Parsing of task identifiers.

pub mod block;
pub mod connector;
pub mod domain;
pub mod expr;
pub mod fragment;
pub mod partitioning;
pub mod plan;
pub mod task_id;
