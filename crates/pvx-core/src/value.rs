//! Constant values and in-memory row vectors.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{RowType, Type};

/// A single constant value as seen by the engine.
///
/// Floating-point variants are wrapped in `OrderedFloat` so constants can be
/// compared and hashed like every other value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Tinyint(i8),
    Smallint(i16),
    Integer(i32),
    Bigint(i64),
    Real(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Varchar(String),
    Varbinary(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    /// Days since the Unix epoch.
    Date(i32),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Widen any integer-like value (including dates and timestamps) to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Tinyint(v) => Some(*v as i64),
            ScalarValue::Smallint(v) => Some(*v as i64),
            ScalarValue::Integer(v) => Some(*v as i64),
            ScalarValue::Bigint(v) => Some(*v),
            ScalarValue::Date(v) => Some(*v as i64),
            ScalarValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Double(v) => Some(v.0),
            ScalarValue::Real(v) => Some(v.0 as f64),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ScalarValue::Real(v) => Some(v.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Varchar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this value can be stored in a column of type `ty`. Null fits any type.
    pub fn fits(&self, ty: &Type) -> bool {
        matches!(
            (self, ty),
            (ScalarValue::Null, _)
                | (ScalarValue::Boolean(_), Type::Boolean)
                | (ScalarValue::Tinyint(_), Type::Tinyint)
                | (ScalarValue::Smallint(_), Type::Smallint)
                | (ScalarValue::Integer(_), Type::Integer)
                | (ScalarValue::Bigint(_), Type::Bigint)
                | (ScalarValue::Real(_), Type::Real)
                | (ScalarValue::Double(_), Type::Double)
                | (ScalarValue::Varchar(_), Type::Varchar)
                | (ScalarValue::Varbinary(_), Type::Varbinary)
                | (ScalarValue::Timestamp(_), Type::Timestamp)
                | (ScalarValue::Date(_), Type::Date)
        )
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "null"),
            ScalarValue::Boolean(v) => write!(f, "{}", v),
            ScalarValue::Tinyint(v) => write!(f, "{}", v),
            ScalarValue::Smallint(v) => write!(f, "{}", v),
            ScalarValue::Integer(v) => write!(f, "{}", v),
            ScalarValue::Bigint(v) => write!(f, "{}", v),
            ScalarValue::Real(v) => write!(f, "{}", v),
            ScalarValue::Double(v) => write!(f, "{}", v),
            ScalarValue::Varchar(v) => write!(f, "'{}'", v),
            ScalarValue::Varbinary(v) => write!(f, "X'{}'", hex(v)),
            ScalarValue::Timestamp(v) => write!(f, "timestamp {}", v),
            ScalarValue::Date(v) => write!(f, "date {}", v),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A columnar batch of rows, as carried by literal `Values` nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowVector {
    pub row_type: RowType,
    /// One vector per column, each `size` entries long.
    pub children: Vec<Vec<ScalarValue>>,
    pub size: usize,
}

impl RowVector {
    /// Transpose row-major values into a columnar vector. Returns `None` when a row's
    /// width does not match the row type.
    pub fn from_rows(row_type: RowType, rows: Vec<Vec<ScalarValue>>) -> Option<Self> {
        let mut children: Vec<Vec<ScalarValue>> = vec![Vec::with_capacity(rows.len()); row_type.len()];
        let size = rows.len();
        for row in rows {
            if row.len() != row_type.len() {
                return None;
            }
            for (column, value) in children.iter_mut().zip(row) {
                column.push(value);
            }
        }
        Some(Self {
            row_type,
            children,
            size,
        })
    }

    pub fn row(&self, index: usize) -> Option<Vec<&ScalarValue>> {
        (index < self.size).then(|| self.children.iter().map(|c| &c[index]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widening() {
        assert_eq!(ScalarValue::Tinyint(-3).as_i64(), Some(-3));
        assert_eq!(ScalarValue::Date(19000).as_i64(), Some(19000));
        assert_eq!(ScalarValue::Varchar("x".into()).as_i64(), None);
    }

    #[test]
    fn test_fits() {
        assert!(ScalarValue::Null.fits(&Type::Varchar));
        assert!(ScalarValue::Bigint(1).fits(&Type::Bigint));
        assert!(!ScalarValue::Bigint(1).fits(&Type::Integer));
    }

    #[test]
    fn test_row_vector_from_rows() {
        let row_type = RowType::from_fields([("a", Type::Bigint), ("b", Type::Varchar)]);
        let rows = vec![
            vec![ScalarValue::Bigint(1), ScalarValue::Varchar("x".into())],
            vec![ScalarValue::Bigint(2), ScalarValue::Null],
        ];
        let vector = RowVector::from_rows(row_type.clone(), rows).unwrap();
        assert_eq!(vector.size, 2);
        assert_eq!(vector.children[0], vec![ScalarValue::Bigint(1), ScalarValue::Bigint(2)]);
        assert_eq!(vector.row(1).unwrap()[1], &ScalarValue::Null);

        assert!(RowVector::from_rows(row_type, vec![vec![ScalarValue::Bigint(1)]]).is_none());
    }
}
