//! # Domain -> Filter Compaction
//!
//! The coordinator describes a pushed-down predicate on one column as a [`Domain`]:
//! a set of disjoint ranges (or a value list) plus whether null passes. The scan
//! wants the most specific [`Filter`] that accepts exactly the same values, because
//! a value list or a negated range is far cheaper to evaluate than a disjunction.
//!
//! ## Compaction Rules
//!
//! For a sorted range set:
//!
//! - **No ranges**: only null passes (`IsNull`); without nulls the domain is a
//!   contradiction the coordinator should have folded away, and translation fails.
//! - **One unbounded range, nulls rejected**: `IsNotNull`.
//! - **One range**: a range filter for the column type.
//! - **Integer ranges**: all points -> `BigintValues`; `(-inf, a] U [b, +inf)` ->
//!   `NegatedBigintRange(a+1, b-1)`; ranges separated by single-value holes ->
//!   `NegatedBigintValues`; otherwise `BigintMultiRange`.
//! - **Varchar ranges**: all points -> `BytesValues`; exclusive ranges meeting at
//!   shared endpoints -> `NegatedBytesValues`; two half-open ranges ->
//!   `NegatedBytesRange`; otherwise a `MultiRange` of `BytesRange`s.
//! - **Boolean ranges**: collapse to a single `BoolValue`.
//! - **Anything else**: a generic `MultiRange`.
//!
//! Shapes that cannot be represented exactly are rejected. Nothing is approximated.

use pvx_core::filter::{BigintRange, BytesRange, Filter, FloatingPointRange};
use pvx_core::types::{parse_type, Type, TypeKind};
use pvx_core::value::ScalarValue;
use pvx_protocol::domain::{Bound, Domain, Marker, Range, ValueSet};

use crate::error::{ConvertError, Result};
use crate::expr::ExprConverter;

/// Compile a column domain into a scan filter.
pub fn domain_to_filter(domain: &Domain, exprs: &dyn ExprConverter) -> Result<Filter> {
    let null_allowed = domain.null_allowed;
    match &domain.values {
        ValueSet::SortedRangeSet {
            type_signature,
            ranges,
        } => {
            let ty = parse_type(type_signature)?;
            sorted_range_set_to_filter(&ty, ranges, null_allowed, exprs)
        }
        ValueSet::EquatableValueSet {
            type_signature,
            entries,
            ..
        } => {
            if !entries.is_empty() {
                return Err(ConvertError::UnsupportedFilter(format!(
                    "EquatableValueSet of type {} with {} entries",
                    type_signature,
                    entries.len()
                )));
            }
            Ok(if null_allowed {
                Filter::IsNull
            } else {
                Filter::IsNotNull
            })
        }
        ValueSet::AllOrNoneValueSet { type_signature, .. } => Err(
            ConvertError::UnsupportedFilter(format!("AllOrNoneValueSet of type {}", type_signature)),
        ),
    }
}

fn sorted_range_set_to_filter(
    ty: &Type,
    ranges: &[Range],
    null_allowed: bool,
    exprs: &dyn ExprConverter,
) -> Result<Filter> {
    match ranges {
        [] => {
            if !null_allowed {
                return Err(ConvertError::Internal(
                    "Unexpected always-false filter".into(),
                ));
            }
            Ok(Filter::IsNull)
        }
        [range] => {
            if range.low.is_unbounded() && range.high.is_unbounded() && !null_allowed {
                return Ok(Filter::IsNotNull);
            }
            range_to_filter(ty, range, null_allowed, exprs)
        }
        _ => match ty.kind() {
            TypeKind::Tinyint | TypeKind::Smallint | TypeKind::Integer | TypeKind::Bigint => {
                let bigint_ranges = ranges
                    .iter()
                    .map(|r| bigint_range(ty, r, i64::MIN, i64::MAX, false, exprs))
                    .collect::<Result<Vec<_>>>()?;
                compact_bigint_ranges(bigint_ranges, null_allowed)
            }
            TypeKind::Varchar => {
                let bytes_ranges = ranges
                    .iter()
                    .map(|r| bytes_range(ty, r, false, exprs))
                    .collect::<Result<Vec<_>>>()?;
                Ok(compact_bytes_ranges(bytes_ranges, null_allowed))
            }
            TypeKind::Boolean => boolean_ranges_to_filter(ty, ranges, null_allowed, exprs),
            _ => {
                let filters = ranges
                    .iter()
                    .map(|r| range_to_filter(ty, r, false, exprs))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Filter::MultiRange {
                    filters,
                    null_allowed,
                    nan_allowed: false,
                })
            }
        },
    }
}

/// Filter accepting exactly the values of one range.
fn range_to_filter(
    ty: &Type,
    range: &Range,
    null_allowed: bool,
    exprs: &dyn ExprConverter,
) -> Result<Filter> {
    match ty.kind() {
        TypeKind::Tinyint | TypeKind::Smallint | TypeKind::Integer | TypeKind::Bigint => {
            bigint_range(ty, range, i64::MIN, i64::MAX, null_allowed, exprs)
                .map(Filter::BigintRange)
        }
        TypeKind::Date => bigint_range(
            ty,
            range,
            i32::MIN as i64,
            i32::MAX as i64,
            null_allowed,
            exprs,
        )
        .map(Filter::BigintRange),
        TypeKind::Double => floating_point_range(
            ty,
            range,
            f64::MIN,
            f64::MAX,
            ScalarValue::as_f64,
            null_allowed,
            exprs,
        )
        .map(Filter::DoubleRange),
        TypeKind::Real => floating_point_range(
            ty,
            range,
            f32::MIN,
            f32::MAX,
            ScalarValue::as_f32,
            null_allowed,
            exprs,
        )
        .map(Filter::FloatRange),
        TypeKind::Varchar => bytes_range(ty, range, null_allowed, exprs).map(Filter::BytesRange),
        TypeKind::Boolean => boolean_range_to_filter(ty, range, null_allowed, exprs),
        _ => Err(ConvertError::UnsupportedFilter(format!(
            "range filter on column of type {}",
            ty
        ))),
    }
}

fn marker_value(ty: &Type, marker: &Marker, exprs: &dyn ExprConverter) -> Result<Option<ScalarValue>> {
    marker
        .value_block
        .as_ref()
        .map(|block| exprs.constant_value(ty, block))
        .transpose()
}

fn integer_marker(ty: &Type, marker: &Marker, exprs: &dyn ExprConverter) -> Result<Option<i64>> {
    match marker_value(ty, marker, exprs)? {
        None => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            ConvertError::InvalidInput(format!("range bound {} is not an integer", value))
        }),
    }
}

/// Inclusive integer range. Exclusive bounds are tightened by one.
fn bigint_range(
    ty: &Type,
    range: &Range,
    min: i64,
    max: i64,
    null_allowed: bool,
    exprs: &dyn ExprConverter,
) -> Result<BigintRange> {
    let empty = || ConvertError::Internal("Unexpected empty integer range".into());
    let lower = match integer_marker(ty, &range.low, exprs)? {
        None => min,
        Some(v) if range.low.bound == Bound::Above => v.checked_add(1).ok_or_else(empty)?,
        Some(v) => v,
    };
    let upper = match integer_marker(ty, &range.high, exprs)? {
        None => max,
        Some(v) if range.high.bound == Bound::Below => v.checked_sub(1).ok_or_else(empty)?,
        Some(v) => v,
    };
    Ok(BigintRange::new(lower, upper, null_allowed))
}

fn floating_point_range<T: Copy>(
    ty: &Type,
    range: &Range,
    lowest: T,
    highest: T,
    extract: fn(&ScalarValue) -> Option<T>,
    null_allowed: bool,
    exprs: &dyn ExprConverter,
) -> Result<FloatingPointRange<T>> {
    let bound = |marker: &Marker, unbounded: T| -> Result<T> {
        match marker_value(ty, marker, exprs)? {
            None => Ok(unbounded),
            Some(value) => extract(&value).ok_or_else(|| {
                ConvertError::InvalidInput(format!("range bound {} is not a {}", value, ty))
            }),
        }
    };
    Ok(FloatingPointRange {
        lower: bound(&range.low, lowest)?,
        lower_unbounded: range.low.is_unbounded(),
        lower_exclusive: range.low.bound == Bound::Above,
        upper: bound(&range.high, highest)?,
        upper_unbounded: range.high.is_unbounded(),
        upper_exclusive: range.high.bound == Bound::Below,
        null_allowed,
    })
}

fn bytes_range(
    ty: &Type,
    range: &Range,
    null_allowed: bool,
    exprs: &dyn ExprConverter,
) -> Result<BytesRange> {
    let bound = |marker: &Marker| -> Result<String> {
        match marker_value(ty, marker, exprs)? {
            None => Ok(String::new()),
            Some(ScalarValue::Varchar(s)) => Ok(s),
            Some(other) => Err(ConvertError::InvalidInput(format!(
                "range bound {} is not a varchar",
                other
            ))),
        }
    };
    Ok(BytesRange {
        lower: bound(&range.low)?,
        lower_unbounded: range.low.is_unbounded(),
        lower_exclusive: range.low.bound == Bound::Above,
        upper: bound(&range.high)?,
        upper_unbounded: range.high.is_unbounded(),
        upper_exclusive: range.high.bound == Bound::Below,
        null_allowed,
    })
}

fn boolean_marker(ty: &Type, marker: &Marker, exprs: &dyn ExprConverter) -> Result<Option<bool>> {
    match marker_value(ty, marker, exprs)? {
        None => Ok(None),
        Some(value) => value.as_bool().map(Some).ok_or_else(|| {
            ConvertError::InvalidInput(format!("range bound {} is not a boolean", value))
        }),
    }
}

fn boolean_range_to_filter(
    ty: &Type,
    range: &Range,
    null_allowed: bool,
    exprs: &dyn ExprConverter,
) -> Result<Filter> {
    let low = boolean_marker(ty, &range.low, exprs)?;
    let high = boolean_marker(ty, &range.high, exprs)?;
    match (low, high) {
        (Some(low), Some(high)) => {
            if low != high {
                return Err(ConvertError::Internal(format!(
                    "Unexpected boolean range [{}, {}]",
                    low, high
                )));
            }
            Ok(Filter::BoolValue {
                value: low,
                null_allowed,
            })
        }
        (Some(low), None) => match (low, range.low.bound) {
            // (TRUE, +inf)
            (true, Bound::Above) => Ok(Filter::null_or_false(null_allowed)),
            // [FALSE, +inf)
            (false, Bound::Exactly) => Err(ConvertError::Internal(
                "Unexpected boolean range [false, +inf)".into(),
            )),
            _ => Ok(Filter::BoolValue {
                value: true,
                null_allowed,
            }),
        },
        (None, Some(high)) => match (high, range.high.bound) {
            // (-inf, FALSE)
            (false, Bound::Below) => Ok(Filter::null_or_false(null_allowed)),
            // (-inf, TRUE]
            (true, Bound::Exactly) => Err(ConvertError::Internal(
                "Unexpected boolean range (-inf, true]".into(),
            )),
            _ => Ok(Filter::BoolValue {
                value: false,
                null_allowed,
            }),
        },
        (None, None) => Err(ConvertError::Internal(
            "Unexpected unbounded boolean range".into(),
        )),
    }
}

fn boolean_ranges_to_filter(
    ty: &Type,
    ranges: &[Range],
    null_allowed: bool,
    exprs: &dyn ExprConverter,
) -> Result<Filter> {
    if ranges.len() != 2 {
        return Err(ConvertError::Internal(format!(
            "Unexpected boolean range set with {} ranges",
            ranges.len()
        )));
    }
    let mut remaining = Vec::new();
    for range in ranges {
        let filter = boolean_range_to_filter(ty, range, null_allowed, exprs)?;
        if !matches!(filter, Filter::AlwaysFalse | Filter::IsNull) {
            remaining.push(filter);
        }
    }
    match <[Filter; 1]>::try_from(remaining) {
        Ok([filter]) => Ok(filter),
        Err(remaining) => Err(ConvertError::Internal(format!(
            "Unexpected boolean range set collapsing to {} filters",
            remaining.len()
        ))),
    }
}

fn compact_bigint_ranges(ranges: Vec<BigintRange>, null_allowed: bool) -> Result<Filter> {
    if ranges.iter().all(BigintRange::is_single_value) {
        let values = ranges.iter().map(|r| r.lower).collect();
        return Ok(Filter::bigint_values(values, null_allowed));
    }

    if let [first, second] = ranges.as_slice() {
        if first.lower == i64::MIN && second.upper == i64::MAX {
            let overlapping = || {
                ConvertError::Internal(format!(
                    "Overlapping bigint ranges [{}, {}] and [{}, {}]",
                    first.lower, first.upper, second.lower, second.upper
                ))
            };
            return Ok(Filter::NegatedBigintRange(BigintRange::new(
                first.upper.checked_add(1).ok_or_else(overlapping)?,
                second.lower.checked_sub(1).ok_or_else(overlapping)?,
                null_allowed,
            )));
        }
    }

    if let Some(rejected) = rejected_bigint_values(&ranges) {
        return Ok(Filter::negated_bigint_values(rejected, null_allowed));
    }

    Ok(Filter::BigintMultiRange {
        ranges,
        null_allowed,
    })
}

/// The values missing from `ranges` when they cover the whole integer line except
/// for isolated single values.
fn rejected_bigint_values(ranges: &[BigintRange]) -> Option<Vec<i64>> {
    let first = ranges.first()?;
    let last = ranges.last()?;
    let mut rejected = Vec::new();

    if first.lower == i64::MIN + 1 {
        rejected.push(i64::MIN);
    } else if first.lower != i64::MIN {
        return None;
    }

    for pair in ranges.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.upper.checked_add(2) != Some(next.lower) {
            return None;
        }
        rejected.push(prev.upper + 1);
    }

    if last.upper == i64::MAX - 1 {
        rejected.push(i64::MAX);
    } else if last.upper != i64::MAX {
        return None;
    }

    Some(rejected)
}

fn compact_bytes_ranges(ranges: Vec<BytesRange>, null_allowed: bool) -> Filter {
    if ranges.iter().all(BytesRange::is_single_value) {
        let values = ranges.into_iter().map(|r| r.lower).collect();
        return Filter::bytes_values(values, null_allowed);
    }

    let all_exclusive = ranges
        .iter()
        .all(|r| r.lower_exclusive && r.upper_exclusive);
    if all_exclusive {
        if let Some(rejected) = rejected_bytes_values(&ranges) {
            return Filter::negated_bytes_values(rejected, null_allowed);
        }
    }

    if let [first, second] = ranges.as_slice() {
        if first.lower_unbounded && second.upper_unbounded {
            return Filter::NegatedBytesRange(BytesRange {
                lower: first.upper.clone(),
                lower_unbounded: false,
                lower_exclusive: !first.upper_exclusive,
                upper: second.lower.clone(),
                upper_unbounded: false,
                upper_exclusive: !second.lower_exclusive,
                null_allowed,
            });
        }
    }

    Filter::MultiRange {
        filters: ranges.into_iter().map(Filter::BytesRange).collect(),
        null_allowed,
        nan_allowed: false,
    }
}

/// `(-inf, a) U (a, b) U ... U (z, +inf)` rejects exactly `a, b, ..., z`.
fn rejected_bytes_values(ranges: &[BytesRange]) -> Option<Vec<String>> {
    let last = ranges.len().checked_sub(1)?;
    let mut rejected = Vec::new();
    let mut pending: Option<&str> = None;
    for (i, range) in ranges.iter().enumerate() {
        match (range.lower_unbounded, pending.take()) {
            (true, None) if i == 0 => {}
            (false, Some(prev)) if prev == range.lower => rejected.push(prev.to_string()),
            _ => return None,
        }
        if range.upper_unbounded {
            if i != last {
                return None;
            }
        } else {
            pending = Some(&range.upper);
        }
    }
    if pending.is_some() {
        return None;
    }
    Some(rejected)
}
