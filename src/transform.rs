//! Field transforms: pure conversions from one wire value to one typed value.
//!
//! Transforms are an enumerated set rather than arbitrary callables, so a field
//! specification is a plain `const` table. Reference transforms consult the
//! [`Registry`] passed in by the caller; all others depend on the wire value only.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::entity::{FieldValue, HydrationError};
use crate::registry::{EntityKind, Registry, Snowflake};

/// A wire value's shape does not match the declared type.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoercionError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{0}` is not an integer")]
    NotAnInteger(String),

    #[error("{0} is out of range")]
    OutOfRange(String),

    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),

    #[error("null is not allowed here")]
    UnexpectedNull,

    #[error("list element has no `{0}` key")]
    MissingElementKey(&'static str),

    #[error("no attribute named `{0}`")]
    UnknownAttribute(String),
}

impl CoercionError {
    pub(crate) fn mismatch(expected: &'static str, value: &Value) -> Self {
        CoercionError::Mismatch {
            expected,
            found: wire_type(value),
        }
    }
}

/// A cross-entity reference could not be resolved.
#[derive(Debug, Clone, Error)]
pub enum ReferenceError {
    #[error("{kind} {id} is not known")]
    NotFound { kind: EntityKind, id: Snowflake },

    #[error("{value} does not identify a {kind}")]
    Unresolvable { kind: EntityKind, value: String },

    #[error("{kind} entities are not cached")]
    Uncached { kind: EntityKind },

    #[error("embedded {kind} record rejected: {source}")]
    Embedded {
        kind: EntityKind,
        #[source]
        source: Box<HydrationError>,
    },
}

/// Failure of a single transform, before the engine attaches the field name.
#[derive(Debug, Clone, Error)]
pub enum FieldError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

impl FieldError {
    /// Attach the entity and field the failure belongs to.
    pub fn at(self, kind: &'static str, field: &'static str) -> HydrationError {
        match self {
            FieldError::Coercion(source) => HydrationError::Coercion { kind, field, source },
            FieldError::Reference(source) => HydrationError::Reference { kind, field, source },
        }
    }
}

/// Conversion applied to a wire value before it is stored on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Passthrough; the attribute's type performs the final check.
    Identity,
    Text,
    Bool,
    /// Signed integer from a JSON number or a decimal string.
    Integer,
    /// Unsigned 64-bit id from a JSON number or a decimal string.
    Snowflake,
    /// RFC 3339 string.
    Timestamp,
    /// Registry lookup by id or embedded record.
    Reference(EntityKind),
    /// Element transform over an array, optionally reading `key` from each element first.
    ListOf {
        element: &'static Transform,
        key: Option<&'static str>,
    },
}

impl Transform {
    pub fn apply(&self, value: &Value, registry: &dyn Registry) -> Result<FieldValue, FieldError> {
        match self {
            Transform::Identity => Ok(FieldValue::Raw(value.clone())),
            Transform::Text => value
                .as_str()
                .map(|s| FieldValue::Text(s.to_string()))
                .ok_or_else(|| CoercionError::mismatch("string", value).into()),
            Transform::Bool => value
                .as_bool()
                .map(FieldValue::Bool)
                .ok_or_else(|| CoercionError::mismatch("boolean", value).into()),
            Transform::Integer => Ok(FieldValue::Int(coerce_integer(value)?)),
            Transform::Snowflake => Ok(FieldValue::Snowflake(coerce_snowflake(value)?)),
            Transform::Timestamp => Ok(FieldValue::Timestamp(coerce_timestamp(value)?)),
            Transform::Reference(kind) => Ok(FieldValue::Ref(registry.get_by_raw_key(*kind, value)?)),
            Transform::ListOf { element, key } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| CoercionError::mismatch("array", value))?;

                items
                    .iter()
                    .map(|item| -> Result<FieldValue, FieldError> {
                        let item = match key {
                            Some(key) => item
                                .get(*key)
                                .ok_or(CoercionError::MissingElementKey(*key))?,
                            None => item,
                        };
                        element.apply(item, registry)
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(FieldValue::List)
            }
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => write!(f, "identity"),
            Transform::Text => write!(f, "text"),
            Transform::Bool => write!(f, "bool"),
            Transform::Integer => write!(f, "integer"),
            Transform::Snowflake => write!(f, "snowflake"),
            Transform::Timestamp => write!(f, "timestamp"),
            Transform::Reference(kind) => write!(f, "ref<{}>", kind),
            Transform::ListOf { element, key: Some(key) } => write!(f, "list<{}@{}>", element, key),
            Transform::ListOf { element, key: None } => write!(f, "list<{}>", element),
        }
    }
}

/// JSON type name used in error messages.
pub fn wire_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Integral floats are exact up to 2^53.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

pub fn coerce_integer(value: &Value) -> Result<i64, CoercionError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if n.is_u64() {
                Err(CoercionError::OutOfRange(n.to_string()))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT => Ok(f as i64),
                    _ => Err(CoercionError::NotAnInteger(n.to_string())),
                }
            }
        }
        Value::String(s) => s.parse::<i64>().map_err(|_| {
            if s.parse::<i128>().is_ok() {
                CoercionError::OutOfRange(s.clone())
            } else {
                CoercionError::NotAnInteger(s.clone())
            }
        }),
        other => Err(CoercionError::mismatch("integer", other)),
    }
}

pub fn coerce_snowflake(value: &Value) -> Result<Snowflake, CoercionError> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(id) => Ok(id),
            None if n.is_i64() => Err(CoercionError::OutOfRange(n.to_string())),
            None => Err(CoercionError::NotAnInteger(n.to_string())),
        },
        Value::String(s) => s.parse::<u64>().map_err(|_| {
            if s.parse::<i128>().is_ok() {
                CoercionError::OutOfRange(s.clone())
            } else {
                CoercionError::NotAnInteger(s.clone())
            }
        }),
        other => Err(CoercionError::mismatch("snowflake", other)),
    }
}

pub fn coerce_timestamp(value: &Value) -> Result<DateTime<Utc>, CoercionError> {
    let text = value
        .as_str()
        .ok_or_else(|| CoercionError::mismatch("timestamp", value))?;

    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| CoercionError::InvalidTimestamp(text.to_string()))
}
