//! Guild models.

use crate::entity::{Entity, Model};
use crate::registry::EntityKind;
use crate::schema::FieldSpec;
use crate::transform::Transform;

/// Guild announced in `READY` before its `GUILD_CREATE` arrives.
pub struct UnavailableGuild;

crate::attributes! {
    pub struct UnavailableGuildAttributes {
        id: u64,
    }
}

impl Model for UnavailableGuild {
    const NAME: &'static str = "UnavailableGuild";
    const KIND: EntityKind = EntityKind::Guild;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::transformed(Transform::Snowflake, "id")];
    type Attributes = UnavailableGuildAttributes;
}

pub struct Guild;

crate::attributes! {
    pub struct GuildAttributes {
        name: String,
        region: String,
        owner_id: u64,
        verification_level: i64,
        features: Vec<String>,
        large: bool,
        unavailable: bool,
        /// Member records as received; see [`Member`](super::Member) for typed access.
        members: Vec<serde_json::Value>,
        channels: Vec<crate::registry::EntityRef>,
    }
}

impl Model for Guild {
    const NAME: &'static str = "Guild";
    const KIND: EntityKind = EntityKind::Guild;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::field("name").non_null(),
        FieldSpec::field("region"),
        FieldSpec::transformed(Transform::Snowflake, "owner_id"),
        FieldSpec::transformed(Transform::Integer, "verification_level"),
        FieldSpec::transformed(
            Transform::ListOf {
                element: &Transform::Text,
                key: None,
            },
            "features",
        ),
        FieldSpec::field("large"),
        FieldSpec::field("unavailable"),
        FieldSpec::field("members"),
        FieldSpec::transformed(
            Transform::ListOf {
                element: &Transform::Reference(EntityKind::Channel),
                key: Some("id"),
            },
            "channels",
        ),
    ];
    type Attributes = GuildAttributes;
}

impl std::fmt::Display for Entity<Guild> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name.get() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "guild {}", self.id()),
        }
    }
}
