//! # Column Domains
//!
//! A [`Domain`] describes the set of values a column may take: a [`ValueSet`] plus
//! whether null is allowed. The coordinator attaches a [`TupleDomain`] (one domain
//! per subfield) to table scans whose predicates it was able to push down.
//!
//! Three value-set shapes exist:
//!
//! - **`SortedRangeSet`**: an ordered list of non-overlapping ranges over an
//!   orderable type. Each range end is a [`Marker`] holding a value and a [`Bound`].
//!   An end with no value is unbounded.
//! - **`EquatableValueSet`**: an allow-list or deny-list of values of a type that
//!   supports equality but not ordering.
//! - **`AllOrNoneValueSet`**: everything or nothing, for types with neither.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::block::Block;

/// Position of a marker relative to its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bound {
    /// Just below the value: an exclusive upper end.
    Below,
    /// The value itself: an inclusive end.
    Exactly,
    /// Just above the value: an exclusive lower end.
    Above,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    #[serde(rename = "type")]
    pub type_signature: String,
    /// `None` for an unbounded end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_block: Option<Block>,
    pub bound: Bound,
}

impl Marker {
    pub fn is_unbounded(&self) -> bool {
        self.value_block.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub low: Marker,
    pub high: Marker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ValueSet {
    #[serde(rename = "sortable")]
    SortedRangeSet {
        #[serde(rename = "type")]
        type_signature: String,
        ranges: Vec<Range>,
    },
    #[serde(rename = "equatable", rename_all = "camelCase")]
    EquatableValueSet {
        #[serde(rename = "type")]
        type_signature: String,
        white_list: bool,
        entries: Vec<Block>,
    },
    #[serde(rename = "allOrNone")]
    AllOrNoneValueSet {
        #[serde(rename = "type")]
        type_signature: String,
        all: bool,
    },
}

impl ValueSet {
    pub fn type_signature(&self) -> &str {
        match self {
            ValueSet::SortedRangeSet { type_signature, .. }
            | ValueSet::EquatableValueSet { type_signature, .. }
            | ValueSet::AllOrNoneValueSet { type_signature, .. } => type_signature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub values: ValueSet,
    pub null_allowed: bool,
}

/// Per-subfield domains. `domains == None` is the "none" domain: no row can match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleDomain {
    pub domains: Option<BTreeMap<String, Domain>>,
}

impl TupleDomain {
    /// The domain that places no restriction on any column.
    pub fn all() -> Self {
        Self {
            domains: Some(BTreeMap::new()),
        }
    }
}
