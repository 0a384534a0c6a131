//! Guild channel models.
//!
//! Text and voice channels share the `Channel` registry keyspace and are told
//! apart by the wire `type` (see [`VOICE_CHANNEL_TYPE`]).

use std::fmt;

use crate::entity::{Entity, Model};
use crate::registry::EntityKind;
use crate::runtime::{GuildEntry, State};
use crate::schema::FieldSpec;
use crate::transform::Transform;

pub const VOICE_CHANNEL_TYPE: i64 = 2;

pub struct TextChannel;

crate::attributes! {
    pub struct TextChannelAttributes {
        guild_id: u64,
        name: String,
        /// Wire `type`.
        kind: i64,
        position: i64,
        topic: String,
        last_message_id: u64,
    }
}

impl Model for TextChannel {
    const NAME: &'static str = "TextChannel";
    const KIND: EntityKind = EntityKind::Channel;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::transformed(Transform::Snowflake, "guild_id"),
        FieldSpec::field("name").non_null(),
        FieldSpec::renamed(Transform::Integer, "type", "kind"),
        FieldSpec::field("position"),
        // Absent on category and other non-text channel types.
        FieldSpec::field("topic").optional(),
        FieldSpec::transformed(Transform::Snowflake, "last_message_id").optional(),
    ];
    type Attributes = TextChannelAttributes;
}

pub struct VoiceChannel;

crate::attributes! {
    pub struct VoiceChannelAttributes {
        guild_id: u64,
        name: String,
        kind: i64,
        position: i64,
    }
}

impl Model for VoiceChannel {
    const NAME: &'static str = "VoiceChannel";
    const KIND: EntityKind = EntityKind::Channel;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::transformed(Transform::Snowflake, "guild_id"),
        FieldSpec::field("name").non_null(),
        FieldSpec::renamed(Transform::Integer, "type", "kind"),
        FieldSpec::field("position"),
    ];
    type Attributes = VoiceChannelAttributes;
}

impl Entity<TextChannel> {
    /// Look up the owning guild; `None` until it is cached.
    pub fn guild(&self, state: &State) -> Option<GuildEntry> {
        state.get_guild(*self.guild_id.get()?)
    }
}

impl Entity<VoiceChannel> {
    pub fn guild(&self, state: &State) -> Option<GuildEntry> {
        state.get_guild(*self.guild_id.get()?)
    }
}

impl fmt::Display for Entity<TextChannel> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.get().map(String::as_str).unwrap_or_default())
    }
}

impl fmt::Display for Entity<VoiceChannel> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.get().map(String::as_str).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{HydrationError, WireRecord};
    use serde_json::json;

    fn record(value: serde_json::Value) -> WireRecord {
        value.as_object().cloned().unwrap()
    }

    fn general() -> WireRecord {
        record(json!({
            "id": "123",
            "guild_id": "9",
            "name": "general",
            "type": 0,
            "position": 1,
            "topic": null,
            "last_message_id": "55"
        }))
    }

    #[test]
    fn test_text_channel_hydration() {
        let state = State::default();
        let channel = Entity::<TextChannel>::hydrate(&general(), &state).unwrap();

        assert_eq!(channel.id(), 123);
        assert_eq!(channel.guild_id.get(), Some(&9));
        assert!(channel.topic.is_null());
        assert_eq!(channel.last_message_id.get(), Some(&55));
        assert_eq!(channel.kind.get(), Some(&0));
        assert!(channel.is_full());
        assert_eq!(channel.to_string(), "general");
    }

    #[test]
    fn test_topic_update_changes_only_topic() {
        let state = State::default();
        let mut channel = Entity::<TextChannel>::hydrate(&general(), &state).unwrap();
        let before = channel.attributes().clone();

        channel.update(&record(json!({"topic": "hello"})), &state).unwrap();

        assert_eq!(channel.id(), 123);
        assert_eq!(channel.topic.get().map(String::as_str), Some("hello"));
        assert_eq!(channel.guild_id, before.guild_id);
        assert_eq!(channel.name, before.name);
        assert_eq!(channel.last_message_id, before.last_message_id);
    }

    #[test]
    fn test_missing_guild_id() {
        let mut record = general();
        record.remove("guild_id");

        let err = Entity::<TextChannel>::hydrate(&record, &State::default()).unwrap_err();
        assert!(matches!(
            err,
            HydrationError::MissingField { kind: "TextChannel", field: "guild_id" }
        ));
        assert!(err.to_string().contains("guild_id"));
    }

    #[test]
    fn test_type_is_stored_as_kind() {
        let channel = Entity::<TextChannel>::hydrate(&general(), &State::default()).unwrap();

        assert!(channel.has_fields(&["kind"]));
        assert!(!channel.has_fields(&["type"]));
    }

    #[test]
    fn test_voice_channel_ignores_text_fields() {
        let voice = Entity::<VoiceChannel>::hydrate(
            &record(json!({
                "id": "200", "guild_id": "9", "name": "Lounge", "type": 2, "position": 0,
                "bitrate": 64000
            })),
            &State::default(),
        )
        .unwrap();

        assert_eq!(voice.kind.get(), Some(&VOICE_CHANNEL_TYPE));
        assert!(voice.is_full());
        assert_eq!(voice.raw().get("bitrate"), Some(&json!(64000)));
    }

    #[test]
    fn test_category_channel_without_text_fields() {
        let category = Entity::<TextChannel>::hydrate(
            &record(json!({"id": "300", "guild_id": "9", "name": "Text Channels", "type": 4, "position": 0})),
            &State::default(),
        )
        .unwrap();

        assert_eq!(category.kind.get(), Some(&4));
        assert!(category.topic.is_unset());
        assert!(category.last_message_id.is_unset());
        assert!(!category.is_full());
    }

    #[test]
    fn test_guild_resolves_lazily() {
        let state = State::default();
        let channel = Entity::<TextChannel>::hydrate(&general(), &state).unwrap();
        assert!(channel.guild(&state).is_none());

        state
            .add_guild_record(&record(json!({"id": "9", "unavailable": true})))
            .unwrap();
        assert!(matches!(channel.guild(&state), Some(GuildEntry::Unavailable(_))));
    }
}
