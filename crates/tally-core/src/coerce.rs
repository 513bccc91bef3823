//! Type coercion for formula inputs
//!
//! Each declared [`TypeTag`] is registered once in the [`TypeRegistry`] with
//! the function that converts a raw field value into that type. Dispatch goes
//! through the registry; there is no per-call branching on the tag.

use crate::datetime::parse_datetime;
use crate::error::{CoerceResult, CoercionError};
use crate::value::Value;
use lazy_regex::regex_captures;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Global type registry (lazily initialized)
static TYPE_REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

/// Get the global type registry
pub fn registry() -> &'static TypeRegistry {
    TYPE_REGISTRY.get_or_init(TypeRegistry::new)
}

/// Semantic type declared for a formula input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum TypeTag {
    Number,
    Boolean,
    Datetime,
    Percentage,
    Currency,
}

impl TypeTag {
    /// All supported tags
    pub const ALL: [TypeTag; 5] = [
        TypeTag::Number,
        TypeTag::Boolean,
        TypeTag::Datetime,
        TypeTag::Percentage,
        TypeTag::Currency,
    ];

    /// The tag as written in formula declarations
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Datetime => "datetime",
            TypeTag::Percentage => "percentage",
            TypeTag::Currency => "currency",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = CoercionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        registry()
            .lookup(s)
            .map(|def| def.tag)
            .ok_or_else(|| CoercionError::UnsupportedType(s.to_string()))
    }
}

/// Coercion function signature
pub type CoerceFn = fn(&Value) -> CoerceResult<Value>;

/// Type definition
pub struct TypeDef {
    /// Tag name as declared
    pub name: &'static str,
    /// Tag
    pub tag: TypeTag,
    /// Implementation
    pub coerce: CoerceFn,
}

/// Type registry
pub struct TypeRegistry {
    types: HashMap<&'static str, TypeDef>,
}

impl TypeRegistry {
    /// Create a new registry with all built-in types
    pub fn new() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
        };

        registry.register(TypeTag::Number, coerce_number);
        registry.register(TypeTag::Boolean, coerce_boolean);
        registry.register(TypeTag::Datetime, coerce_datetime);
        registry.register(TypeTag::Percentage, coerce_percentage);
        registry.register(TypeTag::Currency, coerce_currency);

        registry
    }

    /// Register a coercion for a tag
    pub fn register(&mut self, tag: TypeTag, coerce: CoerceFn) {
        let name = tag.as_str();
        self.types.insert(name, TypeDef { name, tag, coerce });
    }

    /// Look up a type by its declared name
    pub fn lookup(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Look up a type by tag
    pub fn get(&self, tag: TypeTag) -> Option<&TypeDef> {
        self.types.get(tag.as_str())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Coerce a value to the given type
///
/// # Example
/// ```rust
/// use tally_core::{coerce, TypeTag, Value};
///
/// assert_eq!(coerce(&Value::from("50%"), TypeTag::Percentage).unwrap(), Value::Number(50.0));
/// assert_eq!(coerce(&Value::from("USD 1,234.50"), TypeTag::Currency).unwrap(), Value::Number(1234.5));
/// ```
pub fn coerce(value: &Value, tag: TypeTag) -> CoerceResult<Value> {
    let def = registry()
        .get(tag)
        .ok_or_else(|| CoercionError::UnsupportedType(tag.to_string()))?;
    (def.coerce)(value)
}

/// Coerce a value to a type given by its declared name
///
/// Unknown names fail with [`CoercionError::UnsupportedType`].
pub fn coerce_as(value: &Value, type_name: &str) -> CoerceResult<Value> {
    let def = registry()
        .lookup(type_name)
        .ok_or_else(|| CoercionError::UnsupportedType(type_name.to_string()))?;
    (def.coerce)(value)
}

/// Parse trimmed text as a float
fn parse_float(text: &str) -> CoerceResult<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| CoercionError::InvalidNumber {
            value: text.to_string(),
            found: "string",
        })
}

fn to_number(value: &Value) -> CoerceResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_float(s),
        other => Err(CoercionError::InvalidNumber {
            value: other.to_string(),
            found: other.type_name(),
        }),
    }
}

fn coerce_number(value: &Value) -> CoerceResult<Value> {
    to_number(value).map(Value::Number)
}

// "false" as text is non-empty and therefore true
fn coerce_boolean(value: &Value) -> CoerceResult<Value> {
    Ok(Value::Boolean(value.is_truthy()))
}

fn coerce_datetime(value: &Value) -> CoerceResult<Value> {
    match value {
        Value::String(s) => parse_datetime(s).map(Value::DateTime),
        other => Ok(other.clone()),
    }
}

// "50%" is 50.0, not 0.5
fn coerce_percentage(value: &Value) -> CoerceResult<Value> {
    match value {
        Value::String(s) => {
            let text = s.trim();
            if text.ends_with('%') {
                parse_float(text.trim_matches('%')).map(Value::Number)
            } else {
                parse_float(text).map(Value::Number)
            }
        }
        other => coerce_number(other),
    }
}

fn coerce_currency(value: &Value) -> CoerceResult<Value> {
    match value {
        Value::String(s) => parse_currency(s).map(Value::Number),
        other => coerce_number(other),
    }
}

/// Extract the amount from a currency string
///
/// Tolerates a leading 3-letter ISO code, a `$` symbol, single spaces around
/// them and thousands separators.
pub fn parse_currency(text: &str) -> CoerceResult<f64> {
    let cleaned = text.replace(',', "");
    let (_, _code, amount) = regex_captures!(r"^([A-Za-z]{3})?\s?\$?\s?([0-9,.]+)", &cleaned)
        .ok_or_else(|| CoercionError::InvalidCurrency(text.to_string()))?;
    amount
        .parse::<f64>()
        .map_err(|_| CoercionError::InvalidCurrency(text.to_string()))
}
