//! # Engine Type Model
//!
//! The execution engine works with a small closed set of logical types. The coordinator
//! describes column and expression types as type-signature strings (`bigint`,
//! `varchar(25)`, `map(varchar,array(bigint))`, `row("a" bigint,"b" double)`), so every
//! type that crosses the boundary is parsed here.
//!
//! ## Signature Normalization
//!
//! Some coordinator types have no engine counterpart of their own and are mapped onto
//! the physical representation the engine uses for them:
//!
//! - `json` -> `VARCHAR`
//! - `interval day to second` -> `BIGINT` (milliseconds)
//! - `interval year to month` -> `INTEGER` (months)
//! - `hyperloglog`, `p4hyperloglog` -> `VARBINARY`
//!
//! Anything else the parser does not recognize is rejected with
//! [`TypeParseError::Unsupported`] rather than mapped to a lookalike.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-side scalar and container types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Type {
    Boolean,
    Tinyint,
    Smallint,
    Integer,
    Bigint,
    Real,
    Double,
    Varchar,
    Varbinary,
    Timestamp,
    Date,
    Decimal { precision: u8, scale: u8 },
    Array(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Row(RowType),
    Unknown,
}

/// Field-less discriminant of [`Type`], used to dispatch on a type without
/// inspecting its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Boolean,
    Tinyint,
    Smallint,
    Integer,
    Bigint,
    Real,
    Double,
    Varchar,
    Varbinary,
    Timestamp,
    Date,
    Decimal,
    Array,
    Map,
    Row,
    Unknown,
}

impl Type {
    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Boolean => TypeKind::Boolean,
            Type::Tinyint => TypeKind::Tinyint,
            Type::Smallint => TypeKind::Smallint,
            Type::Integer => TypeKind::Integer,
            Type::Bigint => TypeKind::Bigint,
            Type::Real => TypeKind::Real,
            Type::Double => TypeKind::Double,
            Type::Varchar => TypeKind::Varchar,
            Type::Varbinary => TypeKind::Varbinary,
            Type::Timestamp => TypeKind::Timestamp,
            Type::Date => TypeKind::Date,
            Type::Decimal { .. } => TypeKind::Decimal,
            Type::Array(_) => TypeKind::Array,
            Type::Map(_, _) => TypeKind::Map,
            Type::Row(_) => TypeKind::Row,
            Type::Unknown => TypeKind::Unknown,
        }
    }

    /// True for the fixed-width integer kinds that share the 64-bit range filters.
    pub fn is_integer(&self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Tinyint | TypeKind::Smallint | TypeKind::Integer | TypeKind::Bigint
        )
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Boolean => write!(f, "boolean"),
            Type::Tinyint => write!(f, "tinyint"),
            Type::Smallint => write!(f, "smallint"),
            Type::Integer => write!(f, "integer"),
            Type::Bigint => write!(f, "bigint"),
            Type::Real => write!(f, "real"),
            Type::Double => write!(f, "double"),
            Type::Varchar => write!(f, "varchar"),
            Type::Varbinary => write!(f, "varbinary"),
            Type::Timestamp => write!(f, "timestamp"),
            Type::Date => write!(f, "date"),
            Type::Decimal { precision, scale } => write!(f, "decimal({},{})", precision, scale),
            Type::Array(element) => write!(f, "array({})", element),
            Type::Map(key, value) => write!(f, "map({},{})", key, value),
            Type::Row(row) => {
                write!(f, "row(")?;
                for (i, (name, ty)) in row.fields().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if name.is_empty() {
                        write!(f, "{}", ty)?;
                    } else {
                        write!(f, "\"{}\" {}", name, ty)?;
                    }
                }
                write!(f, ")")
            }
            Type::Unknown => write!(f, "unknown"),
        }
    }
}

/// An ordered list of named, typed columns. Used as the output type of every
/// physical plan node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowType {
    names: Vec<String>,
    types: Vec<Type>,
}

impl RowType {
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        let (names, types) = fields.into_iter().map(|(n, t)| (n.into(), t)).unzip();
        Self { names, types }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.names.iter().map(String::as_str).zip(self.types.iter())
    }

    /// Position of the first column with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn type_of(&self, name: &str) -> Option<&Type> {
        self.index_of(name).map(|i| &self.types[i])
    }

    /// Concatenate two row types, keeping column order.
    pub fn concat(&self, other: &RowType) -> RowType {
        let mut names = self.names.clone();
        let mut types = self.types.clone();
        names.extend(other.names.iter().cloned());
        types.extend(other.types.iter().cloned());
        RowType { names, types }
    }

    pub fn push(&mut self, name: impl Into<String>, ty: Type) {
        self.names.push(name.into());
        self.types.push(ty);
    }
}

/// Errors produced while parsing a type signature.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeParseError {
    /// The signature is not syntactically valid.
    #[error("Malformed type signature '{signature}': {message}")]
    Malformed { signature: String, message: String },
    /// The signature is valid but names a type the engine does not support.
    #[error("Unsupported type: {0}")]
    Unsupported(String),
}

/// Parse a coordinator type signature into an engine [`Type`].
pub fn parse_type(signature: &str) -> Result<Type, TypeParseError> {
    let mut parser = SignatureParser::new(signature);
    let ty = parser.parse_type()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.malformed("trailing characters"));
    }
    Ok(ty)
}

struct SignatureParser<'a> {
    signature: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> SignatureParser<'a> {
    fn new(signature: &'a str) -> Self {
        Self {
            signature,
            chars: signature.chars().collect(),
            pos: 0,
        }
    }

    fn malformed(&self, message: impl Into<String>) -> TypeParseError {
        TypeParseError::Malformed {
            signature: self.signature.to_string(),
            message: format!("{} at position {}", message.into(), self.pos),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn consume(&mut self, expected: char) -> Result<(), TypeParseError> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.malformed(format!("expected '{}'", expected)))
        }
    }

    fn word(&mut self) -> Option<String> {
        self.skip_whitespace();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '$') {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }

    /// Words up to the next delimiter, lowercased. Multi-word base names such as
    /// `interval day to second` come back as several words.
    fn words(&mut self) -> Vec<String> {
        let mut words = Vec::new();
        while let Some(w) = self.word() {
            words.push(w.to_ascii_lowercase());
        }
        words
    }

    fn quoted(&mut self) -> Result<String, TypeParseError> {
        self.consume('"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.malformed("unterminated quoted name")),
                Some('"') => {
                    self.pos += 1;
                    if self.peek() == Some('"') {
                        out.push('"');
                        self.pos += 1;
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn number(&mut self) -> Result<u32, TypeParseError> {
        let word = self.word().ok_or_else(|| self.malformed("expected a number"))?;
        word.parse()
            .map_err(|_| self.malformed(format!("'{}' is not a number", word)))
    }

    fn parse_type(&mut self) -> Result<Type, TypeParseError> {
        let words = self.words();
        if words.is_empty() {
            return Err(self.malformed("expected a type name"));
        }
        self.finish_type(words.join(" "))
    }

    fn has_parameters(&mut self) -> bool {
        self.skip_whitespace();
        self.peek() == Some('(')
    }

    fn finish_type(&mut self, base: String) -> Result<Type, TypeParseError> {
        match base.as_str() {
            "array" => {
                self.consume('(')?;
                let element = self.parse_type()?;
                self.consume(')')?;
                Ok(Type::array(element))
            }
            "map" => {
                self.consume('(')?;
                let key = self.parse_type()?;
                self.consume(',')?;
                let value = self.parse_type()?;
                self.consume(')')?;
                Ok(Type::map(key, value))
            }
            "row" => self.parse_row(),
            "decimal" => {
                self.consume('(')?;
                let precision = self.number()?;
                self.skip_whitespace();
                let scale = if self.peek() == Some(',') {
                    self.pos += 1;
                    self.number()?
                } else {
                    0
                };
                self.consume(')')?;
                if precision == 0 || precision > 38 || scale > precision {
                    return Err(self.malformed(format!(
                        "invalid decimal precision/scale ({}, {})",
                        precision, scale
                    )));
                }
                Ok(Type::Decimal {
                    precision: precision as u8,
                    scale: scale as u8,
                })
            }
            "varchar" | "varbinary" => {
                if self.has_parameters() {
                    self.consume('(')?;
                    self.number()?;
                    self.consume(')')?;
                }
                Ok(if base == "varchar" {
                    Type::Varchar
                } else {
                    Type::Varbinary
                })
            }
            _ => {
                if self.has_parameters() {
                    return Err(TypeParseError::Unsupported(self.signature.to_string()));
                }
                simple_type(&base)
                    .ok_or_else(|| TypeParseError::Unsupported(self.signature.to_string()))
            }
        }
    }

    fn parse_row(&mut self) -> Result<Type, TypeParseError> {
        self.consume('(')?;
        let mut row = RowType::default();
        loop {
            self.skip_whitespace();
            let field = if self.peek() == Some('"') {
                let name = self.quoted()?;
                (name, self.parse_type()?)
            } else {
                let mut words = self.words();
                if words.is_empty() {
                    return Err(self.malformed("expected a row field"));
                }
                // A leading word that is not itself the start of the type is the field name.
                if words.len() > 1 && simple_type(&words.join(" ")).is_none() {
                    let name = words.remove(0);
                    (name, self.finish_type(words.join(" "))?)
                } else {
                    (String::new(), self.finish_type(words.join(" "))?)
                }
            };
            row.push(field.0, field.1);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(Type::Row(row));
                }
                _ => return Err(self.malformed("expected ',' or ')' in row")),
            }
        }
    }
}

fn simple_type(base: &str) -> Option<Type> {
    let ty = match base {
        "boolean" => Type::Boolean,
        "tinyint" => Type::Tinyint,
        "smallint" => Type::Smallint,
        "integer" | "int" => Type::Integer,
        "bigint" => Type::Bigint,
        "real" => Type::Real,
        "double" => Type::Double,
        "varchar" | "json" => Type::Varchar,
        "varbinary" | "hyperloglog" | "p4hyperloglog" => Type::Varbinary,
        "timestamp" => Type::Timestamp,
        "date" => Type::Date,
        "unknown" => Type::Unknown,
        "interval day to second" => Type::Bigint,
        "interval year to month" => Type::Integer,
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_type("bigint").unwrap(), Type::Bigint);
        assert_eq!(parse_type("BOOLEAN").unwrap(), Type::Boolean);
        assert_eq!(parse_type("varchar(25)").unwrap(), Type::Varchar);
        assert_eq!(parse_type("json").unwrap(), Type::Varchar);
        assert_eq!(parse_type("interval day to second").unwrap(), Type::Bigint);
        assert_eq!(parse_type("interval year to month").unwrap(), Type::Integer);
        assert_eq!(
            parse_type("decimal(10, 2)").unwrap(),
            Type::Decimal {
                precision: 10,
                scale: 2
            }
        );
    }

    #[test]
    fn test_parse_containers() {
        assert_eq!(
            parse_type("map(varchar,array(bigint))").unwrap(),
            Type::map(Type::Varchar, Type::array(Type::Bigint))
        );

        let row = parse_type("row(\"a b\" bigint,c array(double),varchar)").unwrap();
        let Type::Row(row) = row else {
            panic!("expected a row type");
        };
        assert_eq!(row.names(), &["a b".to_string(), "c".to_string(), String::new()]);
        assert_eq!(row.types()[1], Type::array(Type::Double));
        assert_eq!(row.types()[2], Type::Varchar);
    }

    #[test]
    fn test_display_roundtrips_through_parser() {
        let ty = Type::map(
            Type::Varchar,
            Type::Row(RowType::from_fields([("x", Type::Bigint), ("y", Type::Date)])),
        );
        assert_eq!(parse_type(&ty.to_string()).unwrap(), ty);
    }

    #[test]
    fn test_unsupported_and_malformed() {
        assert!(matches!(
            parse_type("char(3)"),
            Err(TypeParseError::Unsupported(_))
        ));
        assert!(matches!(
            parse_type("timestamp with time zone"),
            Err(TypeParseError::Unsupported(_))
        ));
        assert!(matches!(
            parse_type("array(bigint"),
            Err(TypeParseError::Malformed { .. })
        ));
        assert!(matches!(parse_type(""), Err(TypeParseError::Malformed { .. })));
    }

    #[test]
    fn test_row_type_lookup() {
        let row = RowType::from_fields([("a", Type::Bigint), ("b", Type::Varchar)]);
        assert_eq!(row.index_of("b"), Some(1));
        assert_eq!(row.type_of("a"), Some(&Type::Bigint));
        assert_eq!(row.index_of("c"), None);
        let joined = row.concat(&RowType::from_fields([("c", Type::Boolean)]));
        assert_eq!(joined.len(), 3);
    }
}
