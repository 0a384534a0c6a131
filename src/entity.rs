//! Identity-bearing entities and the hydration engine.
//!
//! An [`Entity`] pairs an immutable id with the last raw record it was built from
//! and a fixed, typed attribute struct described by its [`Model`]. Hydration
//! fills every attribute from a complete record; update merges a partial record
//! and either applies completely or leaves the entity untouched.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use thiserror::Error;
use tracing::debug;

use crate::registry::{EntityKind, EntityRef, Registry, Snowflake};
use crate::schema::{FieldSpec, Presence};
use crate::transform::{coerce_snowflake, CoercionError, ReferenceError};

/// String-keyed wire record as received from the gateway or the REST API.
pub type WireRecord = Map<String, Value>;

/// Typed output of a [`Transform`](crate::transform::Transform).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Raw(Value),
    Text(String),
    Bool(bool),
    Int(i64),
    Snowflake(Snowflake),
    Timestamp(DateTime<Utc>),
    Ref(EntityRef),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Raw(value) => crate::transform::wire_type(value),
            FieldValue::Text(_) => "text",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Int(_) => "integer",
            FieldValue::Snowflake(_) => "snowflake",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Ref(_) => "reference",
            FieldValue::List(_) => "list",
        }
    }

    fn mismatch(&self, expected: &'static str) -> CoercionError {
        CoercionError::Mismatch {
            expected,
            found: self.type_name(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Raw(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Snowflake(id) => write!(f, "{}", id),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            FieldValue::Ref(r) => write!(f, "{}", r),
            FieldValue::List(l) => write!(f, "{:?}", l),
        }
    }
}

/// Final typed check when a transformed value is stored into an attribute slot.
pub trait FromFieldValue: Sized {
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError>;
}

impl FromFieldValue for String {
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Text(s) | FieldValue::Raw(Value::String(s)) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }
}

impl FromFieldValue for bool {
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Bool(b) | FieldValue::Raw(Value::Bool(b)) => Ok(b),
            other => Err(other.mismatch("boolean")),
        }
    }
}

impl FromFieldValue for i64 {
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Int(i) => Ok(i),
            FieldValue::Raw(Value::Number(n)) => n
                .as_i64()
                .ok_or(CoercionError::NotAnInteger(n.to_string())),
            other => Err(other.mismatch("integer")),
        }
    }
}

impl FromFieldValue for Snowflake {
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Snowflake(id) => Ok(id),
            FieldValue::Raw(raw) => coerce_snowflake(&raw),
            other => Err(other.mismatch("snowflake")),
        }
    }
}

impl FromFieldValue for DateTime<Utc> {
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Timestamp(ts) => Ok(ts),
            other => Err(other.mismatch("timestamp")),
        }
    }
}

impl FromFieldValue for EntityRef {
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Ref(r) => Ok(r),
            other => Err(other.mismatch("reference")),
        }
    }
}

impl FromFieldValue for Value {
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Raw(raw) => Ok(raw),
            other => Err(other.mismatch("raw value")),
        }
    }
}

impl<T: FromFieldValue> FromFieldValue for Vec<T> {
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::List(items) => items.into_iter().map(T::from_field_value).collect(),
            FieldValue::Raw(Value::Array(items)) => items
                .into_iter()
                .map(|item| T::from_field_value(FieldValue::Raw(item)))
                .collect(),
            other => Err(other.mismatch("list")),
        }
    }
}

/// Storage for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    /// Not hydrated yet.
    Unset,
    /// Present on the wire as `null`.
    Null,
    Value(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Unset
    }
}

impl<T> Slot<T> {
    pub fn get(&self) -> Option<&T> {
        match self {
            Slot::Value(value) => Some(value),
            Slot::Unset | Slot::Null => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Slot::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Slot::Null)
    }
}

impl<T: FromFieldValue> Slot<T> {
    /// `None` is an explicit wire null.
    pub fn from_wire(value: Option<FieldValue>) -> Result<Self, CoercionError> {
        match value {
            None => Ok(Slot::Null),
            Some(value) => T::from_field_value(value).map(Slot::Value),
        }
    }
}

/// Fixed attribute struct of one model. Generated by [`attributes!`](crate::attributes).
pub trait Attributes: Default + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Every attribute name, in declaration order.
    const NAMES: &'static [&'static str];

    fn assign(&mut self, attribute: &str, value: Option<FieldValue>) -> Result<(), CoercionError>;

    /// Whether the attribute has been hydrated (set or explicit null).
    fn is_present(&self, attribute: &str) -> bool;
}

/// Static description of one entity kind.
pub trait Model: Sized + 'static {
    const NAME: &'static str;

    /// Registry keyspace this model lives in.
    const KIND: EntityKind;

    /// Path to the identity inside a record.
    const ID_PATH: &'static [&'static str] = &["id"];

    const FIELDS: &'static [FieldSpec];

    type Attributes: Attributes;
}

/// Error type for hydration and update.
#[derive(Debug, Clone, Error)]
pub enum HydrationError {
    #[error("{kind} record is missing required field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("{kind}.{field}: {source}")]
    Coercion {
        kind: &'static str,
        field: &'static str,
        #[source]
        source: CoercionError,
    },

    #[error("{kind}.{field}: {source}")]
    Reference {
        kind: &'static str,
        field: &'static str,
        #[source]
        source: ReferenceError,
    },

    #[error("{kind} record for id {found} cannot update entity {expected}")]
    IdentityMismatch {
        kind: &'static str,
        expected: Snowflake,
        found: Snowflake,
    },

    #[error("{kind} payload must be an object, found {found}")]
    NotARecord {
        kind: &'static str,
        found: &'static str,
    },
}

/// A hydrated instance of model `M`.
///
/// Equality and hashing use the id only.
pub struct Entity<M: Model> {
    id: Snowflake,
    raw: WireRecord,
    attributes: M::Attributes,
    model: PhantomData<fn() -> M>,
}

impl<M: Model> Entity<M> {
    /// Build an entity from a complete record.
    ///
    /// Every [`Presence::Required`] field must be present. Nothing is returned
    /// on failure, so a half-built entity can never be registered.
    pub fn hydrate(record: &WireRecord, registry: &dyn Registry) -> Result<Self, HydrationError> {
        let id = Self::identity(record)?;
        let mut attributes = M::Attributes::default();

        for field in M::FIELDS {
            match record.get(field.wire_key) {
                Some(value) => store::<M>(&mut attributes, field, value, registry)?,
                None if field.presence == Presence::Optional => {}
                None => {
                    return Err(HydrationError::MissingField {
                        kind: M::NAME,
                        field: field.wire_key,
                    })
                }
            }
        }

        let entity = Self {
            id,
            raw: record.clone(),
            attributes,
            model: PhantomData,
        };
        debug!(kind = M::NAME, id, full = entity.is_full(), "Hydrated entity");
        Ok(entity)
    }

    /// [`hydrate`](Self::hydrate) from an arbitrary wire value.
    pub fn hydrate_value(value: &Value, registry: &dyn Registry) -> Result<Self, HydrationError> {
        let record = value.as_object().ok_or(HydrationError::NotARecord {
            kind: M::NAME,
            found: crate::transform::wire_type(value),
        })?;
        Self::hydrate(record, registry)
    }

    /// Id-only entity standing in for one the registry has not seen yet.
    pub fn placeholder(id: Snowflake) -> Self {
        let mut raw = WireRecord::new();
        raw.insert("id".to_string(), Value::String(id.to_string()));
        Self {
            id,
            raw,
            attributes: M::Attributes::default(),
            model: PhantomData,
        }
    }

    /// Merge a partial record.
    ///
    /// Fields absent from `record` keep their value. If any present field fails
    /// to convert, the whole update is discarded and the entity is unchanged.
    /// Returns the attributes that were written.
    pub fn update(
        &mut self,
        record: &WireRecord,
        registry: &dyn Registry,
    ) -> Result<Vec<&'static str>, HydrationError> {
        if lookup(record, M::ID_PATH).is_some() {
            let found = Self::identity(record)?;
            if found != self.id {
                return Err(HydrationError::IdentityMismatch {
                    kind: M::NAME,
                    expected: self.id,
                    found,
                });
            }
        }

        let mut staged = self.attributes.clone();
        let mut written = Vec::new();

        for field in M::FIELDS {
            let Some(value) = record.get(field.wire_key) else {
                continue;
            };
            store::<M>(&mut staged, field, value, registry)?;
            written.push(field.attribute);
        }

        self.attributes = staged;
        for (key, value) in record {
            self.raw.insert(key.clone(), value.clone());
        }

        debug!(kind = M::NAME, id = self.id, fields = written.len(), "Updated entity");
        Ok(written)
    }

    /// Read the identity of a record without hydrating it.
    pub fn identity(record: &WireRecord) -> Result<Snowflake, HydrationError> {
        let field = M::ID_PATH.last().copied().unwrap_or("id");
        let value = lookup(record, M::ID_PATH).ok_or(HydrationError::MissingField {
            kind: M::NAME,
            field,
        })?;

        if value.is_null() {
            return Err(HydrationError::Coercion {
                kind: M::NAME,
                field,
                source: CoercionError::UnexpectedNull,
            });
        }

        coerce_snowflake(value).map_err(|source| HydrationError::Coercion {
            kind: M::NAME,
            field,
            source,
        })
    }

    pub fn id(&self) -> Snowflake {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        M::KIND
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(M::KIND, self.id)
    }

    /// The record this entity was hydrated from, with later updates merged in.
    pub fn raw(&self) -> &WireRecord {
        &self.raw
    }

    pub fn attributes(&self) -> &M::Attributes {
        &self.attributes
    }

    /// Every attribute named by the field specification is present.
    pub fn is_full(&self) -> bool {
        M::FIELDS
            .iter()
            .all(|field| self.attributes.is_present(field.attribute))
    }

    pub fn has_fields(&self, attributes: &[&str]) -> bool {
        attributes
            .iter()
            .all(|attribute| self.attributes.is_present(attribute))
    }
}

/// Resolve one present wire value and write it into `attributes`.
fn store<M: Model>(
    attributes: &mut M::Attributes,
    field: &FieldSpec,
    value: &Value,
    registry: &dyn Registry,
) -> Result<(), HydrationError> {
    let resolved = if value.is_null() {
        if !field.nullable {
            return Err(HydrationError::Coercion {
                kind: M::NAME,
                field: field.wire_key,
                source: CoercionError::UnexpectedNull,
            });
        }
        None
    } else {
        Some(
            field
                .transform
                .apply(value, registry)
                .map_err(|err| err.at(M::NAME, field.wire_key))?,
        )
    };

    attributes
        .assign(field.attribute, resolved)
        .map_err(|source| HydrationError::Coercion {
            kind: M::NAME,
            field: field.wire_key,
            source,
        })
}

fn lookup<'a>(record: &'a WireRecord, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut value = record.get(*first)?;
    for key in rest {
        value = value.get(*key)?;
    }
    Some(value)
}

impl<M: Model> Deref for Entity<M> {
    type Target = M::Attributes;

    fn deref(&self) -> &Self::Target {
        &self.attributes
    }
}

impl<M: Model> Clone for Entity<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            raw: self.raw.clone(),
            attributes: self.attributes.clone(),
            model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Entity<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(M::NAME)
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl<M: Model> PartialEq for Entity<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<M: Model> Eq for Entity<M> {}

impl<M: Model> Hash for Entity<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Declare a model's attribute struct.
///
/// Each field becomes a public [`Slot`] and the struct implements
/// [`Attributes`] with assignment by attribute name.
///
/// ```ignore
/// cord::attributes! {
///     pub struct NoteAttributes {
///         title: String,
///         pinned: bool,
///     }
/// }
/// ```
#[macro_export]
macro_rules! attributes {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$field_meta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $( $(#[$field_meta])* pub $field: $crate::entity::Slot<$ty>, )*
        }

        impl $crate::entity::Attributes for $name {
            const NAMES: &'static [&'static str] = &[$(stringify!($field)),*];

            fn assign(
                &mut self,
                attribute: &str,
                value: ::std::option::Option<$crate::entity::FieldValue>,
            ) -> ::std::result::Result<(), $crate::transform::CoercionError> {
                $(
                    if attribute == stringify!($field) {
                        self.$field = $crate::entity::Slot::from_wire(value)?;
                        return ::std::result::Result::Ok(());
                    }
                )*
                ::std::result::Result::Err($crate::transform::CoercionError::UnknownAttribute(
                    attribute.to_string(),
                ))
            }

            fn is_present(&self, attribute: &str) -> bool {
                $(
                    if attribute == stringify!($field) {
                        return !self.$field.is_unset();
                    }
                )*
                false
            }
        }
    };
}
