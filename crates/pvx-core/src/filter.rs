//! # Column Filters
//!
//! Filters are the compiled, per-column predicates the engine evaluates while
//! scanning. They are pushed into table scans as a map from subfield to [`Filter`].
//!
//! ## Variants
//!
//! The variant chosen for a predicate determines how the scan evaluates it, so the
//! most specific variant is always preferred:
//!
//! - **Point and range filters**: `BigintRange`, `DoubleRange`, `FloatRange`,
//!   `BytesRange`, `BoolValue`.
//! - **Value lists**: `BigintValues`, `BytesValues`, evaluated by lookup.
//! - **Negations**: `NegatedBigintRange`, `NegatedBigintValues`,
//!   `NegatedBytesRange`, `NegatedBytesValues`, for `NOT IN` and `<>` shaped
//!   predicates.
//! - **Disjunctions**: `BigintMultiRange` for integer ranges, and the generic
//!   `MultiRange` over arbitrary sub-filters.
//! - **Null tests**: `IsNull`, `IsNotNull`, plus the constants `AlwaysTrue` and
//!   `AlwaysFalse`.
//!
//! Every variant decides separately whether a null passes (`null_allowed`).
//!
//! ## Evaluation
//!
//! The `test_*` methods evaluate a filter against a single value. A filter tested
//! against a value of a kind it does not apply to rejects it.

use serde::{Deserialize, Serialize};

/// Inclusive 64-bit integer range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigintRange {
    pub lower: i64,
    pub upper: i64,
    pub null_allowed: bool,
}

impl BigintRange {
    pub fn new(lower: i64, upper: i64, null_allowed: bool) -> Self {
        Self {
            lower,
            upper,
            null_allowed,
        }
    }

    pub fn is_single_value(&self) -> bool {
        self.lower == self.upper
    }

    fn contains(&self, value: i64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Range over a floating-point domain with explicit bound flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingPointRange<T> {
    pub lower: T,
    pub lower_unbounded: bool,
    pub lower_exclusive: bool,
    pub upper: T,
    pub upper_unbounded: bool,
    pub upper_exclusive: bool,
    pub null_allowed: bool,
}

impl<T: PartialOrd + Copy> FloatingPointRange<T> {
    fn contains(&self, value: T) -> bool {
        let above_lower = self.lower_unbounded
            || if self.lower_exclusive {
                value > self.lower
            } else {
                value >= self.lower
            };
        let below_upper = self.upper_unbounded
            || if self.upper_exclusive {
                value < self.upper
            } else {
                value <= self.upper
            };
        above_lower && below_upper
    }
}

/// Range over byte strings, compared lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesRange {
    pub lower: String,
    pub lower_unbounded: bool,
    pub lower_exclusive: bool,
    pub upper: String,
    pub upper_unbounded: bool,
    pub upper_exclusive: bool,
    pub null_allowed: bool,
}

impl BytesRange {
    /// True when the range admits exactly one value.
    pub fn is_single_value(&self) -> bool {
        !self.lower_unbounded
            && !self.upper_unbounded
            && !self.lower_exclusive
            && !self.upper_exclusive
            && self.lower == self.upper
    }

    fn contains(&self, value: &str) -> bool {
        let above_lower = self.lower_unbounded
            || if self.lower_exclusive {
                value > self.lower.as_str()
            } else {
                value >= self.lower.as_str()
            };
        let below_upper = self.upper_unbounded
            || if self.upper_exclusive {
                value < self.upper.as_str()
            } else {
                value <= self.upper.as_str()
            };
        above_lower && below_upper
    }
}

/// Engine-side compiled column predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Filter {
    AlwaysTrue,
    AlwaysFalse,
    IsNull,
    IsNotNull,
    BoolValue {
        value: bool,
        null_allowed: bool,
    },
    BigintRange(BigintRange),
    /// Accepts every value outside `[lower, upper]`.
    NegatedBigintRange(BigintRange),
    /// Sorted, deduplicated accepted values.
    BigintValues {
        values: Vec<i64>,
        null_allowed: bool,
    },
    /// Sorted, deduplicated rejected values.
    NegatedBigintValues {
        values: Vec<i64>,
        null_allowed: bool,
    },
    BigintMultiRange {
        ranges: Vec<BigintRange>,
        null_allowed: bool,
    },
    DoubleRange(FloatingPointRange<f64>),
    FloatRange(FloatingPointRange<f32>),
    BytesRange(BytesRange),
    /// Accepts every value outside the described range.
    NegatedBytesRange(BytesRange),
    BytesValues {
        values: Vec<String>,
        null_allowed: bool,
    },
    NegatedBytesValues {
        values: Vec<String>,
        null_allowed: bool,
    },
    /// Disjunction of arbitrary sub-filters over one column.
    MultiRange {
        filters: Vec<Filter>,
        null_allowed: bool,
        nan_allowed: bool,
    },
}

impl Filter {
    /// `IsNull` when nulls pass, otherwise `AlwaysFalse`.
    pub fn null_or_false(null_allowed: bool) -> Filter {
        if null_allowed {
            Filter::IsNull
        } else {
            Filter::AlwaysFalse
        }
    }

    pub fn bigint_range(lower: i64, upper: i64, null_allowed: bool) -> Filter {
        Filter::BigintRange(BigintRange::new(lower, upper, null_allowed))
    }

    /// Accept exactly `values`. A single value or a run of consecutive values
    /// becomes a range.
    pub fn bigint_values(mut values: Vec<i64>, null_allowed: bool) -> Filter {
        values.sort_unstable();
        values.dedup();
        match consecutive_bounds(&values) {
            None => Filter::null_or_false(null_allowed),
            Some(Some((lower, upper))) => Filter::bigint_range(lower, upper, null_allowed),
            Some(None) => Filter::BigintValues {
                values,
                null_allowed,
            },
        }
    }

    /// Reject exactly `values`. A single value or a run of consecutive values
    /// becomes a negated range.
    pub fn negated_bigint_values(mut values: Vec<i64>, null_allowed: bool) -> Filter {
        values.sort_unstable();
        values.dedup();
        match consecutive_bounds(&values) {
            None if null_allowed => Filter::AlwaysTrue,
            None => Filter::IsNotNull,
            Some(Some((lower, upper))) => {
                Filter::NegatedBigintRange(BigintRange::new(lower, upper, null_allowed))
            }
            Some(None) => Filter::NegatedBigintValues {
                values,
                null_allowed,
            },
        }
    }

    pub fn bytes_values(mut values: Vec<String>, null_allowed: bool) -> Filter {
        values.sort();
        values.dedup();
        if values.is_empty() {
            return Filter::null_or_false(null_allowed);
        }
        Filter::BytesValues {
            values,
            null_allowed,
        }
    }

    pub fn negated_bytes_values(mut values: Vec<String>, null_allowed: bool) -> Filter {
        values.sort();
        values.dedup();
        if values.is_empty() {
            return if null_allowed {
                Filter::AlwaysTrue
            } else {
                Filter::IsNotNull
            };
        }
        Filter::NegatedBytesValues {
            values,
            null_allowed,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Filter::AlwaysTrue => "AlwaysTrue",
            Filter::AlwaysFalse => "AlwaysFalse",
            Filter::IsNull => "IsNull",
            Filter::IsNotNull => "IsNotNull",
            Filter::BoolValue { .. } => "BoolValue",
            Filter::BigintRange(_) => "BigintRange",
            Filter::NegatedBigintRange(_) => "NegatedBigintRange",
            Filter::BigintValues { .. } => "BigintValues",
            Filter::NegatedBigintValues { .. } => "NegatedBigintValues",
            Filter::BigintMultiRange { .. } => "BigintMultiRange",
            Filter::DoubleRange(_) => "DoubleRange",
            Filter::FloatRange(_) => "FloatRange",
            Filter::BytesRange(_) => "BytesRange",
            Filter::NegatedBytesRange(_) => "NegatedBytesRange",
            Filter::BytesValues { .. } => "BytesValues",
            Filter::NegatedBytesValues { .. } => "NegatedBytesValues",
            Filter::MultiRange { .. } => "MultiRange",
        }
    }

    /// Whether a null value passes this filter.
    pub fn test_null(&self) -> bool {
        match self {
            Filter::AlwaysTrue | Filter::IsNull => true,
            Filter::AlwaysFalse | Filter::IsNotNull => false,
            Filter::BoolValue { null_allowed, .. }
            | Filter::BigintValues { null_allowed, .. }
            | Filter::NegatedBigintValues { null_allowed, .. }
            | Filter::BigintMultiRange { null_allowed, .. }
            | Filter::BytesValues { null_allowed, .. }
            | Filter::NegatedBytesValues { null_allowed, .. }
            | Filter::MultiRange { null_allowed, .. } => *null_allowed,
            Filter::BigintRange(r) | Filter::NegatedBigintRange(r) => r.null_allowed,
            Filter::DoubleRange(r) => r.null_allowed,
            Filter::FloatRange(r) => r.null_allowed,
            Filter::BytesRange(r) | Filter::NegatedBytesRange(r) => r.null_allowed,
        }
    }

    pub fn test_i64(&self, value: i64) -> bool {
        match self {
            Filter::AlwaysTrue | Filter::IsNotNull => true,
            Filter::BigintRange(r) => r.contains(value),
            Filter::NegatedBigintRange(r) => !r.contains(value),
            Filter::BigintValues { values, .. } => values.binary_search(&value).is_ok(),
            Filter::NegatedBigintValues { values, .. } => values.binary_search(&value).is_err(),
            Filter::BigintMultiRange { ranges, .. } => ranges.iter().any(|r| r.contains(value)),
            Filter::MultiRange { filters, .. } => filters.iter().any(|f| f.test_i64(value)),
            _ => false,
        }
    }

    pub fn test_f64(&self, value: f64) -> bool {
        match self {
            Filter::AlwaysTrue | Filter::IsNotNull => true,
            Filter::DoubleRange(r) => r.contains(value),
            Filter::MultiRange {
                filters,
                nan_allowed,
                ..
            } => {
                if value.is_nan() {
                    *nan_allowed
                } else {
                    filters.iter().any(|f| f.test_f64(value))
                }
            }
            _ => false,
        }
    }

    pub fn test_f32(&self, value: f32) -> bool {
        match self {
            Filter::AlwaysTrue | Filter::IsNotNull => true,
            Filter::FloatRange(r) => r.contains(value),
            Filter::MultiRange {
                filters,
                nan_allowed,
                ..
            } => {
                if value.is_nan() {
                    *nan_allowed
                } else {
                    filters.iter().any(|f| f.test_f32(value))
                }
            }
            _ => false,
        }
    }

    pub fn test_bytes(&self, value: &str) -> bool {
        match self {
            Filter::AlwaysTrue | Filter::IsNotNull => true,
            Filter::BytesRange(r) => r.contains(value),
            Filter::NegatedBytesRange(r) => !r.contains(value),
            Filter::BytesValues { values, .. } => {
                values.binary_search_by(|v| v.as_str().cmp(value)).is_ok()
            }
            Filter::NegatedBytesValues { values, .. } => {
                values.binary_search_by(|v| v.as_str().cmp(value)).is_err()
            }
            Filter::MultiRange { filters, .. } => filters.iter().any(|f| f.test_bytes(value)),
            _ => false,
        }
    }

    pub fn test_bool(&self, value: bool) -> bool {
        match self {
            Filter::AlwaysTrue | Filter::IsNotNull => true,
            Filter::BoolValue { value: v, .. } => *v == value,
            Filter::MultiRange { filters, .. } => filters.iter().any(|f| f.test_bool(value)),
            _ => false,
        }
    }
}

/// `None` for an empty list, `Some(Some((min, max)))` when the sorted values form
/// one consecutive run, `Some(None)` otherwise.
fn consecutive_bounds(sorted: &[i64]) -> Option<Option<(i64, i64)>> {
    let (first, last) = (*sorted.first()?, *sorted.last()?);
    let span = (last as i128) - (first as i128);
    if span == sorted.len() as i128 - 1 {
        Some(Some((first, last)))
    } else {
        Some(None)
    }
}
