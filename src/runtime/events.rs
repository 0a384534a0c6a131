//! Dispatch events and how each one changes the cache.

use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

use crate::entity::{Entity, HydrationError};
use crate::models::{ClientUser, Guild, Message, TextChannel, User};
use crate::registry::{EntityKind, EntityRef};
use crate::runtime::state::{GuildEntry, State};
use crate::transform::coerce_snowflake;

/// Dispatch events the cache understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Ready,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    UserUpdate,
}

impl Event {
    pub fn from_name(name: &str) -> Option<Self> {
        let event = match name {
            "READY" => Event::Ready,
            "GUILD_CREATE" => Event::GuildCreate,
            "GUILD_UPDATE" => Event::GuildUpdate,
            "GUILD_DELETE" => Event::GuildDelete,
            "CHANNEL_CREATE" => Event::ChannelCreate,
            "CHANNEL_UPDATE" => Event::ChannelUpdate,
            "CHANNEL_DELETE" => Event::ChannelDelete,
            "MESSAGE_CREATE" => Event::MessageCreate,
            "MESSAGE_UPDATE" => Event::MessageUpdate,
            "MESSAGE_DELETE" => Event::MessageDelete,
            "USER_UPDATE" => Event::UserUpdate,
            _ => return None,
        };
        Some(event)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Ready => "READY",
            Event::GuildCreate => "GUILD_CREATE",
            Event::GuildUpdate => "GUILD_UPDATE",
            Event::GuildDelete => "GUILD_DELETE",
            Event::ChannelCreate => "CHANNEL_CREATE",
            Event::ChannelUpdate => "CHANNEL_UPDATE",
            Event::ChannelDelete => "CHANNEL_DELETE",
            Event::MessageCreate => "MESSAGE_CREATE",
            Event::MessageUpdate => "MESSAGE_UPDATE",
            Event::MessageDelete => "MESSAGE_DELETE",
            Event::UserUpdate => "USER_UPDATE",
        }
    }
}

impl Event {
    /// Registry keyspace of the entity the event is about.
    pub fn kind(&self) -> EntityKind {
        match self {
            Event::Ready | Event::UserUpdate => EntityKind::User,
            Event::GuildCreate | Event::GuildUpdate | Event::GuildDelete => EntityKind::Guild,
            Event::ChannelCreate | Event::ChannelUpdate | Event::ChannelDelete => EntityKind::Channel,
            Event::MessageCreate | Event::MessageUpdate | Event::MessageDelete => {
                EntityKind::Message
            }
        }
    }

    /// The entity an event payload is about: the client user for `READY`,
    /// the record's own `id` otherwise.
    pub fn target(&self, data: &Value) -> Option<EntityRef> {
        let id = match self {
            Event::Ready => data.get("user")?.get("id")?,
            _ => data.get("id")?,
        };
        coerce_snowflake(id).ok().map(|id| EntityRef::new(self.kind(), id))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl State {
    /// Apply one dispatch event to the cache.
    ///
    /// Returns `Ok(true)` if the cache changed and `Ok(false)` for unknown
    /// events or updates that did not apply. Create events and `READY`
    /// propagate hydration failures; update events log them and return `false`.
    /// Malformed guild entries in `READY` are logged and skipped.
    pub fn apply(&self, name: &str, data: &Value) -> Result<bool, HydrationError> {
        let Some(event) = Event::from_name(name) else {
            debug!(event = name, "Ignoring unhandled event");
            return Ok(false);
        };

        let record = data.as_object().ok_or(HydrationError::NotARecord {
            kind: event.as_str(),
            found: crate::transform::wire_type(data),
        })?;

        let changed = match event {
            Event::Ready => {
                let user = record.get("user").ok_or(HydrationError::MissingField {
                    kind: event.as_str(),
                    field: "user",
                })?;
                let client_user = Entity::<ClientUser>::hydrate_value(user, self)?;
                let cached_user = Entity::<User>::hydrate_value(user, self)?;
                self.add_user(cached_user);
                info!(user = %client_user, "Logged in");
                self.set_client_user(client_user);

                // A bad guild entry must not undo the login above.
                let guilds = record.get("guilds").and_then(Value::as_array);
                for guild in guilds.into_iter().flatten() {
                    let added = match guild.as_object() {
                        Some(guild) => self.add_guild_record(guild).map(|_| ()),
                        None => Err(HydrationError::NotARecord {
                            kind: "UnavailableGuild",
                            found: crate::transform::wire_type(guild),
                        }),
                    };
                    if let Err(err) = added {
                        warn!(error = %err, "Skipping guild announced in READY");
                    }
                }
                true
            }

            Event::GuildCreate => {
                self.add_guild_record(record)?;
                true
            }
            Event::GuildUpdate => self.update_guild(record),
            Event::GuildDelete => {
                let id = Entity::<Guild>::identity(record)?;
                let outage = record
                    .get("unavailable")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);

                if outage {
                    // Kept, but marked unavailable until the next GUILD_CREATE.
                    self.add_guild(GuildEntry::Unavailable(Entity::hydrate(record, self)?));
                    true
                } else {
                    self.delete_guild(id).is_some()
                }
            }

            Event::ChannelCreate => {
                self.add_channel_record(record)?;
                true
            }
            Event::ChannelUpdate => self.update_channel(record),
            Event::ChannelDelete => {
                let id = Entity::<TextChannel>::identity(record)?;
                self.delete_channel(id).is_some()
            }

            Event::MessageCreate => {
                self.add_message_record(record)?;
                true
            }
            Event::MessageUpdate => self.update_message(record),
            Event::MessageDelete => {
                let id = Entity::<Message>::identity(record)?;
                self.delete_message(id).is_some()
            }

            Event::UserUpdate => self.update_client_user(record),
        };

        debug!(%event, changed, "Applied event");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ready() -> Value {
        json!({
            "v": 6,
            "user": {
                "id": "1", "username": "bot", "discriminator": "0001",
                "avatar": null, "bot": true
            },
            "guilds": [{"id": "100", "unavailable": true}],
            "session_id": "abc"
        })
    }

    #[test]
    fn test_event_names() {
        assert_eq!(Event::from_name("MESSAGE_CREATE"), Some(Event::MessageCreate));
        assert_eq!(Event::from_name("TYPING_START"), None);
        assert_eq!(Event::GuildDelete.to_string(), "GUILD_DELETE");
    }

    #[test]
    fn test_event_targets() {
        assert_eq!(
            Event::Ready.target(&ready()),
            Some(EntityRef::new(EntityKind::User, 1))
        );
        assert_eq!(
            Event::MessageDelete.target(&json!({"id": "5", "channel_id": "10"})),
            Some(EntityRef::new(EntityKind::Message, 5))
        );
        assert_eq!(Event::ChannelUpdate.target(&json!({"name": "x"})), None);
    }

    #[test]
    fn test_ready() {
        let state = State::default();
        assert!(state.apply("READY", &ready()).unwrap());

        assert_eq!(state.client_user().unwrap().to_string(), "bot#0001");
        assert!(state.get_user(1).is_some());
        assert!(state.get_guild(100).unwrap().as_guild().is_none());
    }

    #[test]
    fn test_ready_skips_bad_guild_entries() {
        let state = State::default();
        let mut payload = ready();
        payload["guilds"] = json!([{"id": "100", "unavailable": true}, {"unavailable": true}, 5]);

        assert!(state.apply("READY", &payload).unwrap());

        assert!(state.client_user().is_some());
        assert!(state.get_guild(100).is_some());
        assert_eq!(state.summary().guilds, 1);
    }

    #[test]
    fn test_ready_with_bad_user_applies_nothing() {
        let state = State::default();
        let mut payload = ready();
        payload["user"]["bot"] = json!("yes");

        assert!(state.apply("READY", &payload).is_err());
        assert!(state.client_user().is_none());
        assert!(state.get_user(1).is_none());
        assert!(state.get_guild(100).is_none());
    }

    #[test]
    fn test_outage_of_available_guild() {
        let state = State::default();
        state
            .apply(
                "GUILD_CREATE",
                &json!({
                    "id": "100", "name": "Guild", "region": "eu", "owner_id": "1",
                    "verification_level": 0, "features": [], "large": false,
                    "unavailable": false, "members": [], "channels": []
                }),
            )
            .unwrap();

        assert!(state
            .apply("GUILD_DELETE", &json!({"id": "100", "unavailable": true}))
            .unwrap());

        let entry = state.get_guild(100).unwrap();
        assert!(!entry.is_available());
        assert_eq!(state.summary().unavailable_guilds, 1);
    }

    #[test]
    fn test_ready_without_user() {
        let state = State::default();
        let err = state.apply("READY", &json!({"guilds": []})).unwrap_err();
        assert!(matches!(err, HydrationError::MissingField { kind: "READY", field: "user" }));
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let state = State::default();
        assert!(!state.apply("TYPING_START", &json!({"user_id": "1"})).unwrap());
    }

    #[test]
    fn test_payload_must_be_an_object() {
        let state = State::default();
        let err = state.apply("CHANNEL_CREATE", &json!([1, 2])).unwrap_err();
        assert!(matches!(err, HydrationError::NotARecord { kind: "CHANNEL_CREATE", found: "array" }));
    }

    #[test]
    fn test_channel_lifecycle() {
        let state = State::default();
        let channel = json!({
            "id": "10", "guild_id": "100", "name": "general", "type": 0,
            "position": 0, "topic": null, "last_message_id": null
        });

        assert!(state.apply("CHANNEL_CREATE", &channel).unwrap());
        assert!(state
            .apply("CHANNEL_UPDATE", &json!({"id": "10", "name": "lobby"}))
            .unwrap());
        let entry = state.get_channel(10).unwrap();
        assert_eq!(entry.as_text().unwrap().to_string(), "lobby");

        assert!(state.apply("CHANNEL_DELETE", &json!({"id": "10"})).unwrap());
        assert!(!state.apply("CHANNEL_DELETE", &json!({"id": "10"})).unwrap());
    }

    #[test]
    fn test_guild_outage_keeps_guild() {
        let state = State::default();
        state.apply("READY", &ready()).unwrap();

        assert!(state
            .apply("GUILD_DELETE", &json!({"id": "100", "unavailable": true}))
            .unwrap());
        assert!(state.get_guild(100).is_some());

        assert!(state.apply("GUILD_DELETE", &json!({"id": "100"})).unwrap());
        assert!(state.get_guild(100).is_none());
    }

    #[test]
    fn test_user_update_changes_client_user() {
        let state = State::default();
        state.apply("READY", &ready()).unwrap();

        assert!(state
            .apply("USER_UPDATE", &json!({"id": "1", "username": "renamed"}))
            .unwrap());
        assert_eq!(state.client_user().unwrap().to_string(), "renamed#0001");
    }
}
