//! # Typed Expressions
//!
//! The engine evaluates scalar computations as trees of [`TypedExpr`]. Every node
//! carries its resolved result type, so a plan node can compute its output row type
//! without consulting any function registry.
//!
//! Only the shapes the plan model needs are represented: column references,
//! constants, function calls and casts. Special forms (`and`, `if`, `coalesce`, ...)
//! are calls with well-known names.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Type;
use crate::value::ScalarValue;

/// Reference to an input column by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldAccessExpr {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl FieldAccessExpr {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A literal value of a known type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstantExpr {
    #[serde(rename = "type")]
    pub ty: Type,
    pub value: ScalarValue,
}

/// A named function invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallExpr {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub inputs: Vec<TypedExpr>,
}

/// Scalar expression tree with resolved types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TypedExpr {
    FieldAccess(FieldAccessExpr),
    Constant(ConstantExpr),
    Call(CallExpr),
    Cast {
        #[serde(rename = "type")]
        ty: Type,
        input: Box<TypedExpr>,
        null_on_failure: bool,
    },
}

impl TypedExpr {
    pub fn field(name: impl Into<String>, ty: Type) -> Self {
        TypedExpr::FieldAccess(FieldAccessExpr::new(name, ty))
    }

    pub fn constant(ty: Type, value: ScalarValue) -> Self {
        TypedExpr::Constant(ConstantExpr { ty, value })
    }

    pub fn call(name: impl Into<String>, ty: Type, inputs: Vec<TypedExpr>) -> Self {
        TypedExpr::Call(CallExpr {
            name: name.into(),
            ty,
            inputs,
        })
    }

    /// The result type of this expression.
    pub fn ty(&self) -> &Type {
        match self {
            TypedExpr::FieldAccess(f) => &f.ty,
            TypedExpr::Constant(c) => &c.ty,
            TypedExpr::Call(c) => &c.ty,
            TypedExpr::Cast { ty, .. } => ty,
        }
    }

    pub fn as_field(&self) -> Option<&FieldAccessExpr> {
        match self {
            TypedExpr::FieldAccess(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&ConstantExpr> {
        match self {
            TypedExpr::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&CallExpr> {
        match self {
            TypedExpr::Call(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for TypedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedExpr::FieldAccess(field) => write!(f, "\"{}\"", field.name),
            TypedExpr::Constant(c) => write!(f, "{}", c.value),
            TypedExpr::Call(call) => {
                write!(f, "{}(", call.name)?;
                for (i, input) in call.inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", input)?;
                }
                write!(f, ")")
            }
            TypedExpr::Cast { ty, input, .. } => write!(f, "cast({} as {})", input, ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_types_and_display() {
        let expr = TypedExpr::call(
            "presto.default.gt",
            Type::Boolean,
            vec![
                TypedExpr::field("a", Type::Bigint),
                TypedExpr::constant(Type::Bigint, ScalarValue::Bigint(10)),
            ],
        );
        assert_eq!(expr.ty(), &Type::Boolean);
        assert_eq!(expr.to_string(), "presto.default.gt(\"a\", 10)");
        assert!(expr.as_call().is_some());
        assert!(expr.as_field().is_none());
    }
}
