//! # cord: typed entity hydration for gateway records
//!
//! Records arrive from the gateway or REST API as loosely typed JSON objects.
//! Each model declares a static table of [`FieldSpec`]s saying which wire key
//! feeds which attribute and through which [`Transform`]. The engine in
//! [`entity`] walks that table to build an [`Entity`] from a full record or to
//! merge a partial one into an existing entity.
//!
//! References to other entities are resolved through a [`Registry`]; the
//! process-wide cache, [`runtime::State`], is the registry used in practice.
//!
//! ## Example
//!
//! ```ignore
//! use cord::models::TextChannel;
//! use cord::runtime::State;
//! use cord::Entity;
//!
//! let state = State::default();
//! let record = serde_json::json!({
//!     "id": "41771983423143937", "guild_id": "41771983423143937",
//!     "name": "general", "type": 0, "position": 6,
//!     "topic": "24/7 chat about how to gank Mike #2",
//!     "last_message_id": "155117677105512449"
//! });
//! let channel = Entity::<TextChannel>::hydrate_value(&record, &state)?;
//! assert_eq!(channel.position.get(), Some(&6));
//! ```

pub mod entity;
pub mod ingest;
pub mod models;
pub mod registry;
pub mod runtime;
pub mod schema;
pub mod transform;
pub mod transport;

pub use entity::{Attributes, Entity, FieldValue, HydrationError, Model, Slot, WireRecord};
pub use registry::{EntityKind, EntityRef, Registry, Snowflake};
pub use schema::{FieldSpec, Presence, Schema};
pub use transform::{CoercionError, ReferenceError, Transform};
pub use transport::{ActionError, Method, Transport, TransportError};
