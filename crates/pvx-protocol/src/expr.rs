//! Coordinator row expressions.
//!
//! Types are carried as type-signature strings. They are parsed by the expression
//! translator, not here.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::block::Block;

/// A named, typed column reference. Plan nodes use variables to declare their
/// outputs and to refer to their inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub type_signature: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, type_signature: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_signature: type_signature.into(),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.name, self.type_signature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstantExpression {
    pub value_block: Block,
    #[serde(rename = "type")]
    pub type_signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionKind {
    Scalar,
    Aggregate,
    Window,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    /// Fully qualified name, e.g. `presto.default.$operator$greater_than`.
    pub name: String,
    pub kind: FunctionKind,
    pub return_type: String,
    pub argument_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum FunctionHandle {
    #[serde(rename = "$static")]
    BuiltIn { signature: Signature },
    /// Function defined through SQL; `function_id` is `name;arg types`.
    #[serde(rename = "sql", rename_all = "camelCase")]
    SqlInvoked { function_id: String, version: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallExpression {
    pub display_name: String,
    pub function_handle: FunctionHandle,
    pub return_type: String,
    pub arguments: Vec<RowExpression>,
}

impl CallExpression {
    /// Qualified name of a built-in function, `None` for other handles.
    pub fn builtin_name(&self) -> Option<&str> {
        match &self.function_handle {
            FunctionHandle::BuiltIn { signature } => Some(&signature.name),
            FunctionHandle::SqlInvoked { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Form {
    If,
    NullIf,
    Switch,
    When,
    IsNull,
    Coalesce,
    In,
    And,
    Or,
    Dereference,
    RowConstructor,
    Bind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialFormExpression {
    pub form: Form,
    pub return_type: String,
    pub arguments: Vec<RowExpression>,
}

/// Scalar expression as produced by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "lowercase")]
pub enum RowExpression {
    Variable(Variable),
    Constant(ConstantExpression),
    Call(CallExpression),
    Special(SpecialFormExpression),
}

impl RowExpression {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            RowExpression::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&CallExpression> {
        match self {
            RowExpression::Call(c) => Some(c),
            _ => None,
        }
    }

    pub fn type_signature(&self) -> &str {
        match self {
            RowExpression::Variable(v) => &v.type_signature,
            RowExpression::Constant(c) => &c.type_signature,
            RowExpression::Call(c) => &c.return_type,
            RowExpression::Special(s) => &s.return_type,
        }
    }
}

impl From<Variable> for RowExpression {
    fn from(value: Variable) -> Self {
        RowExpression::Variable(value)
    }
}
