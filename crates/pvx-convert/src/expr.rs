//! # Expression Translation
//!
//! Scalar expressions cross the coordinator/engine boundary through the
//! [`ExprConverter`] trait. Plan translation only depends on the trait, so an
//! embedder with its own function registry can substitute its own converter.
//!
//! [`RowExpressionConverter`] is the default implementation:
//!
//! - variables become field accesses;
//! - constants are decoded from their value block and paired with their type;
//! - calls keep their qualified function name, except casts, which become
//!   [`TypedExpr::Cast`] (folded away when the input is an integer literal);
//! - special forms become calls named after the lower-case form (`and`, `if`, ...).

use ordered_float::OrderedFloat;
use pvx_core::expr::TypedExpr;
use pvx_core::types::{parse_type, Type};
use pvx_core::value::ScalarValue;
use pvx_protocol::block::{Block, BlockValue};
use pvx_protocol::expr::{CallExpression, Form, FunctionHandle, RowExpression};

use crate::error::{ConvertError, Result};

pub const CAST: &str = "presto.default.$operator$cast";
pub const TRY_CAST: &str = "presto.default.try_cast";

/// Translates coordinator scalar expressions into engine expressions.
pub trait ExprConverter: Send + Sync {
    fn to_typed_expr(&self, expr: &RowExpression) -> Result<TypedExpr>;

    /// Decode a serialized constant of type `ty`.
    fn constant_value(&self, ty: &Type, block: &Block) -> Result<ScalarValue>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RowExpressionConverter;

impl ExprConverter for RowExpressionConverter {
    fn to_typed_expr(&self, expr: &RowExpression) -> Result<TypedExpr> {
        match expr {
            RowExpression::Variable(v) => {
                Ok(TypedExpr::field(v.name.clone(), parse_type(&v.type_signature)?))
            }
            RowExpression::Constant(c) => {
                let ty = parse_type(&c.type_signature)?;
                let value = self.constant_value(&ty, &c.value_block)?;
                Ok(TypedExpr::constant(ty, value))
            }
            RowExpression::Call(call) => self.call_to_typed_expr(call),
            RowExpression::Special(special) => {
                let inputs = special
                    .arguments
                    .iter()
                    .map(|arg| self.to_typed_expr(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypedExpr::call(
                    form_name(special.form),
                    parse_type(&special.return_type)?,
                    inputs,
                ))
            }
        }
    }

    fn constant_value(&self, ty: &Type, block: &Block) -> Result<ScalarValue> {
        let value = block.decode()?;
        let scalar = match (ty, value) {
            (_, BlockValue::Null) => ScalarValue::Null,
            (Type::Boolean, BlockValue::Byte(v)) => ScalarValue::Boolean(v != 0),
            (Type::Tinyint, BlockValue::Byte(v)) => ScalarValue::Tinyint(v),
            (Type::Smallint, BlockValue::Short(v)) => ScalarValue::Smallint(v),
            (Type::Integer, BlockValue::Int(v)) => ScalarValue::Integer(v),
            (Type::Date, BlockValue::Int(v)) => ScalarValue::Date(v),
            (Type::Bigint, BlockValue::Long(v)) => ScalarValue::Bigint(v),
            (Type::Timestamp, BlockValue::Long(v)) => ScalarValue::Timestamp(v),
            (Type::Real, BlockValue::Int(bits)) => {
                ScalarValue::Real(OrderedFloat(f32::from_bits(bits as u32)))
            }
            (Type::Double, BlockValue::Long(bits)) => {
                ScalarValue::Double(OrderedFloat(f64::from_bits(bits as u64)))
            }
            (Type::Varchar, BlockValue::Bytes(bytes)) => {
                ScalarValue::Varchar(String::from_utf8(bytes).map_err(|_| {
                    ConvertError::InvalidInput("varchar constant is not valid UTF-8".into())
                })?)
            }
            (Type::Varbinary, BlockValue::Bytes(bytes)) => ScalarValue::Varbinary(bytes),
            (
                Type::Decimal { .. } | Type::Array(_) | Type::Map(..) | Type::Row(_) | Type::Unknown,
                _,
            ) => {
                return Err(ConvertError::UnsupportedType(format!(
                    "constant of type {}",
                    ty
                )))
            }
            (ty, value) => {
                return Err(ConvertError::InvalidInput(format!(
                    "value block {:?} does not hold a {}",
                    value, ty
                )))
            }
        };
        Ok(scalar)
    }
}

impl RowExpressionConverter {
    fn call_to_typed_expr(&self, call: &CallExpression) -> Result<TypedExpr> {
        let name = function_name(call);
        let ty = parse_type(&call.return_type)?;
        let mut inputs = call
            .arguments
            .iter()
            .map(|arg| self.to_typed_expr(arg))
            .collect::<Result<Vec<_>>>()?;

        if name == CAST || name == TRY_CAST {
            if inputs.len() != 1 {
                return Err(ConvertError::InvalidInput(format!(
                    "{} takes one argument, got {}",
                    name,
                    inputs.len()
                )));
            }
            let input = inputs.remove(0);
            if let Some(folded) = fold_integer_cast(&ty, &input) {
                return Ok(folded);
            }
            return Ok(TypedExpr::Cast {
                ty,
                input: Box::new(input),
                null_on_failure: name == TRY_CAST,
            });
        }

        Ok(TypedExpr::call(name, ty, inputs))
    }
}

/// Qualified name of the called function. SQL-invoked function ids have the form
/// `name;argument types`.
fn function_name(call: &CallExpression) -> String {
    match &call.function_handle {
        FunctionHandle::BuiltIn { signature } => signature.name.clone(),
        FunctionHandle::SqlInvoked { function_id, .. } => function_id
            .split(';')
            .next()
            .unwrap_or(function_id)
            .to_string(),
    }
}

/// Casting an integer literal to another integer type. Out-of-range literals are
/// left to fail at run time.
fn fold_integer_cast(target: &Type, input: &TypedExpr) -> Option<TypedExpr> {
    let constant = input.as_constant()?;
    if !target.is_integer() || !constant.ty.is_integer() {
        return None;
    }
    if constant.value.is_null() {
        return Some(TypedExpr::constant(target.clone(), ScalarValue::Null));
    }
    let value = integer_value(target, constant.value.as_i64()?)?;
    Some(TypedExpr::constant(target.clone(), value))
}

/// `value` as a scalar of integer type `ty`, or `None` when it does not fit.
pub fn integer_value(ty: &Type, value: i64) -> Option<ScalarValue> {
    match ty {
        Type::Tinyint => i8::try_from(value).ok().map(ScalarValue::Tinyint),
        Type::Smallint => i16::try_from(value).ok().map(ScalarValue::Smallint),
        Type::Integer => i32::try_from(value).ok().map(ScalarValue::Integer),
        Type::Bigint => Some(ScalarValue::Bigint(value)),
        _ => None,
    }
}

fn form_name(form: Form) -> &'static str {
    match form {
        Form::If => "if",
        Form::NullIf => "null_if",
        Form::Switch => "switch",
        Form::When => "when",
        Form::IsNull => "is_null",
        Form::Coalesce => "coalesce",
        Form::In => "in",
        Form::And => "and",
        Form::Or => "or",
        Form::Dereference => "dereference",
        Form::RowConstructor => "row_constructor",
        Form::Bind => "bind",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvx_protocol::expr::{
        ConstantExpression, FunctionKind, Signature, SpecialFormExpression, Variable,
    };

    fn constant(ty: &str, value: BlockValue) -> RowExpression {
        RowExpression::Constant(ConstantExpression {
            value_block: Block::encode(&value),
            type_signature: ty.into(),
        })
    }

    fn builtin(name: &str, return_type: &str, arguments: Vec<RowExpression>) -> RowExpression {
        RowExpression::Call(CallExpression {
            display_name: name.rsplit('.').next().unwrap_or(name).into(),
            function_handle: FunctionHandle::BuiltIn {
                signature: Signature {
                    name: name.into(),
                    kind: FunctionKind::Scalar,
                    return_type: return_type.into(),
                    argument_types: arguments
                        .iter()
                        .map(|a| a.type_signature().to_string())
                        .collect(),
                },
            },
            return_type: return_type.into(),
            arguments,
        })
    }

    #[test]
    fn test_variable_and_constant() {
        let converter = RowExpressionConverter;
        let field = converter
            .to_typed_expr(&Variable::new("orderkey", "bigint").into())
            .unwrap();
        assert_eq!(field, TypedExpr::field("orderkey", Type::Bigint));

        let value = converter
            .to_typed_expr(&constant("double", BlockValue::Long(2.5f64.to_bits() as i64)))
            .unwrap();
        assert_eq!(
            value,
            TypedExpr::constant(Type::Double, ScalarValue::Double(OrderedFloat(2.5)))
        );
    }

    #[test]
    fn test_varchar_and_boolean_constants() {
        let converter = RowExpressionConverter;
        assert_eq!(
            converter
                .constant_value(&Type::Varchar, &Block::encode(&BlockValue::Bytes(b"abc".to_vec())))
                .unwrap(),
            ScalarValue::Varchar("abc".into())
        );
        assert_eq!(
            converter
                .constant_value(&Type::Boolean, &Block::encode(&BlockValue::Byte(1)))
                .unwrap(),
            ScalarValue::Boolean(true)
        );
        assert_eq!(
            converter
                .constant_value(&Type::Bigint, &Block::encode(&BlockValue::Null))
                .unwrap(),
            ScalarValue::Null
        );
    }

    #[test]
    fn test_mismatched_block_is_invalid_input() {
        let err = RowExpressionConverter
            .constant_value(&Type::Bigint, &Block::encode(&BlockValue::Int(3)))
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput(_)));
    }

    #[test]
    fn test_integer_cast_is_folded() {
        let cast = builtin(CAST, "bigint", vec![constant("integer", BlockValue::Int(7))]);
        assert_eq!(
            RowExpressionConverter.to_typed_expr(&cast).unwrap(),
            TypedExpr::constant(Type::Bigint, ScalarValue::Bigint(7))
        );
    }

    #[test]
    fn test_out_of_range_cast_is_kept() {
        let cast = builtin(CAST, "tinyint", vec![constant("integer", BlockValue::Int(1000))]);
        let expr = RowExpressionConverter.to_typed_expr(&cast).unwrap();
        assert!(matches!(expr, TypedExpr::Cast { null_on_failure: false, .. }));
    }

    #[test]
    fn test_cast_of_column() {
        let cast = builtin(CAST, "varchar", vec![Variable::new("x", "bigint").into()]);
        let expr = RowExpressionConverter.to_typed_expr(&cast).unwrap();
        assert_eq!(
            expr,
            TypedExpr::Cast {
                ty: Type::Varchar,
                input: Box::new(TypedExpr::field("x", Type::Bigint)),
                null_on_failure: false,
            }
        );
    }

    #[test]
    fn test_call_and_special_form() {
        let gt = builtin(
            "presto.default.$operator$greater_than",
            "boolean",
            vec![
                Variable::new("a", "bigint").into(),
                constant("bigint", BlockValue::Long(10)),
            ],
        );
        let and = RowExpression::Special(SpecialFormExpression {
            form: Form::And,
            return_type: "boolean".into(),
            arguments: vec![gt.clone(), Variable::new("flag", "boolean").into()],
        });
        let expr = RowExpressionConverter.to_typed_expr(&and).unwrap();
        let call = expr.as_call().unwrap();
        assert_eq!(call.name, "and");
        assert_eq!(
            call.inputs[0].as_call().unwrap().name,
            "presto.default.$operator$greater_than"
        );
    }

    #[test]
    fn test_sql_invoked_function_name() {
        let call = RowExpression::Call(CallExpression {
            display_name: "square".into(),
            function_handle: FunctionHandle::SqlInvoked {
                function_id: "unittest.memory.square;integer".into(),
                version: "1".into(),
            },
            return_type: "integer".into(),
            arguments: vec![Variable::new("x", "integer").into()],
        });
        let expr = RowExpressionConverter.to_typed_expr(&call).unwrap();
        assert_eq!(expr.as_call().unwrap().name, "unittest.memory.square");
    }
}
