//! Field specifications: the static per-model table the engine walks.
//!
//! # Example
//!
//! ```ignore
//! const FIELDS: &'static [FieldSpec] = &[
//!     FieldSpec::transformed(Transform::Snowflake, "guild_id"),
//!     FieldSpec::field("name").non_null(),
//!     FieldSpec::renamed(Transform::Identity, "type", "kind"),
//! ];
//! ```

use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::entity::{Attributes, Model};
use crate::registry::EntityKind;
use crate::transform::Transform;

/// Whether a field must appear in the record passed to hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// One entry of a model's field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub wire_key: &'static str,
    pub attribute: &'static str,
    pub transform: Transform,
    pub presence: Presence,
    /// A wire `null` is stored as an explicit null instead of failing.
    pub nullable: bool,
}

impl FieldSpec {
    /// Identity transform; the attribute is named after the wire key.
    pub const fn field(name: &'static str) -> Self {
        Self::renamed(Transform::Identity, name, name)
    }

    pub const fn transformed(transform: Transform, wire_key: &'static str) -> Self {
        Self::renamed(transform, wire_key, wire_key)
    }

    pub const fn renamed(
        transform: Transform,
        wire_key: &'static str,
        attribute: &'static str,
    ) -> Self {
        Self {
            wire_key,
            attribute,
            transform,
            presence: Presence::Required,
            nullable: true,
        }
    }

    pub const fn rename(self, attribute: &'static str) -> Self {
        Self { attribute, ..self }
    }

    pub const fn optional(self) -> Self {
        Self {
            presence: Presence::Optional,
            ..self
        }
    }

    pub const fn non_null(self) -> Self {
        Self {
            nullable: false,
            ..self
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wire_key == self.attribute {
            write!(f, "{}: {}", self.attribute, self.transform)?;
        } else {
            write!(f, "{} <- {}: {}", self.attribute, self.wire_key, self.transform)?;
        }
        if self.presence == Presence::Optional {
            write!(f, " (optional)")?;
        }
        if !self.nullable {
            write!(f, " (non-null)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{model}: attribute `{attribute}` is declared twice")]
    DuplicateAttribute {
        model: &'static str,
        attribute: &'static str,
    },

    #[error("{model}: attribute `{attribute}` has no storage slot")]
    UnknownAttribute {
        model: &'static str,
        attribute: &'static str,
    },
}

/// Type-erased view of a model's schema, for listing and validation.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub name: &'static str,
    pub kind: EntityKind,
    pub fields: &'static [FieldSpec],
    pub attributes: &'static [&'static str],
}

impl Schema {
    pub fn of<M: Model>() -> Self {
        Self {
            name: M::NAME,
            kind: M::KIND,
            fields: M::FIELDS,
            attributes: <M::Attributes as Attributes>::NAMES,
        }
    }

    /// Every field targets a distinct attribute that the attribute struct can hold.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();

        for field in self.fields {
            if !seen.insert(field.attribute) {
                return Err(SchemaError::DuplicateAttribute {
                    model: self.name,
                    attribute: field.attribute,
                });
            }

            if !self.attributes.contains(&field.attribute) {
                return Err(SchemaError::UnknownAttribute {
                    model: self.name,
                    attribute: field.attribute,
                });
            }
        }

        Ok(())
    }
}
