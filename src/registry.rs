//! Registry contract consumed by reference transforms.
//!
//! Entities never own each other. A reference-valued attribute stores an
//! [`EntityRef`] (kind + id) and the registry that owns the referenced entity
//! resolves it on demand. Every hydration and update call receives the registry
//! handle explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::transform::{coerce_snowflake, ReferenceError};

/// 64-bit entity identity as sent by the gateway (usually as a decimal string).
pub type Snowflake = u64;

/// Registry keyspaces. Several entity models may share one keyspace
/// (text and voice channels are both `Channel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Guild,
    Channel,
    User,
    Member,
    Message,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Guild => "guild",
            EntityKind::Channel => "channel",
            EntityKind::User => "user",
            EntityKind::Member => "member",
            EntityKind::Message => "message",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-owning handle to an entity held by a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Snowflake,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Snowflake) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Lookup service used by [`Transform::Reference`](crate::transform::Transform::Reference).
///
/// Implementations decide their own caching policy: an unknown id may be
/// materialized as a placeholder or rejected with [`ReferenceError::NotFound`].
/// Handles returned here may point at entities that are not yet fully hydrated.
///
/// Lookups are synchronous. An implementation shared across threads must
/// synchronize internally.
pub trait Registry: Send + Sync {
    /// Resolve an identity within `kind`.
    fn get(&self, kind: EntityKind, id: Snowflake) -> Result<EntityRef, ReferenceError>;

    /// Resolve a raw wire value: either an id (string or integer) or an
    /// embedded record carrying an `id` key.
    ///
    /// The default implementation only extracts the id; registries that can
    /// build entities from embedded records override this.
    fn get_by_raw_key(&self, kind: EntityKind, value: &Value) -> Result<EntityRef, ReferenceError> {
        let key = match value {
            Value::Object(record) => record.get("id").unwrap_or(&Value::Null),
            other => other,
        };

        let id = coerce_snowflake(key).map_err(|_| ReferenceError::Unresolvable {
            kind,
            value: value.to_string(),
        })?;

        self.get(kind, id)
    }
}
