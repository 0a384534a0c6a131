//! Process-wide entity cache.
//!
//! [`State`] owns every cached entity and implements [`Registry`] for the
//! hydration engine. The cache sits behind a single `RwLock`; no lock is held
//! while an entity is being hydrated or updated, because reference resolution
//! re-enters the registry. Getters hand out snapshots (clones).
//!
//! Processing is expected to be single-writer: one loop feeds records in order.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::entity::{Entity, HydrationError, Model, WireRecord};
use crate::models::channel::VOICE_CHANNEL_TYPE;
use crate::models::{ClientUser, Guild, Message, TextChannel, UnavailableGuild, User, VoiceChannel};
use crate::registry::{EntityKind, EntityRef, Registry, Snowflake};
use crate::runtime::config::CacheConfig;
use crate::transform::{coerce_integer, coerce_snowflake, ReferenceError};

/// A cached guild, either announced-only or fully created.
#[derive(Debug, Clone, PartialEq)]
pub enum GuildEntry {
    Unavailable(Entity<UnavailableGuild>),
    Available(Entity<Guild>),
}

impl GuildEntry {
    pub fn id(&self) -> Snowflake {
        match self {
            GuildEntry::Unavailable(guild) => guild.id(),
            GuildEntry::Available(guild) => guild.id(),
        }
    }

    pub fn raw(&self) -> &WireRecord {
        match self {
            GuildEntry::Unavailable(guild) => guild.raw(),
            GuildEntry::Available(guild) => guild.raw(),
        }
    }

    pub fn as_guild(&self) -> Option<&Entity<Guild>> {
        match self {
            GuildEntry::Available(guild) => Some(guild),
            GuildEntry::Unavailable(_) => None,
        }
    }

    /// `false` for announced-only guilds and for guilds in an outage
    /// (`GUILD_DELETE` with `unavailable: true`).
    pub fn is_available(&self) -> bool {
        match self {
            GuildEntry::Unavailable(_) => false,
            GuildEntry::Available(guild) => guild.unavailable.get() != Some(&true),
        }
    }

    pub fn is_full(&self) -> bool {
        match self {
            GuildEntry::Unavailable(guild) => guild.is_full(),
            GuildEntry::Available(guild) => guild.is_full(),
        }
    }
}

/// A cached guild channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEntry {
    Text(Entity<TextChannel>),
    Voice(Entity<VoiceChannel>),
}

impl ChannelEntry {
    pub fn id(&self) -> Snowflake {
        match self {
            ChannelEntry::Text(channel) => channel.id(),
            ChannelEntry::Voice(channel) => channel.id(),
        }
    }

    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            ChannelEntry::Text(channel) => channel.guild_id.get().copied(),
            ChannelEntry::Voice(channel) => channel.guild_id.get().copied(),
        }
    }

    pub fn as_text(&self) -> Option<&Entity<TextChannel>> {
        match self {
            ChannelEntry::Text(channel) => Some(channel),
            ChannelEntry::Voice(_) => None,
        }
    }

    pub fn as_voice(&self) -> Option<&Entity<VoiceChannel>> {
        match self {
            ChannelEntry::Voice(channel) => Some(channel),
            ChannelEntry::Text(_) => None,
        }
    }

    pub fn is_full(&self) -> bool {
        match self {
            ChannelEntry::Text(channel) => channel.is_full(),
            ChannelEntry::Voice(channel) => channel.is_full(),
        }
    }
}

/// Entity counts, as printed by `cord replay`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSummary {
    pub guilds: usize,
    pub unavailable_guilds: usize,
    pub channels: usize,
    pub users: usize,
    pub messages: usize,
    /// Cached entities that are not fully hydrated (placeholders, partial users).
    pub incomplete: usize,
}

#[derive(Default)]
struct Cache {
    guilds: IndexMap<Snowflake, GuildEntry>,
    channels: IndexMap<Snowflake, ChannelEntry>,
    users: IndexMap<Snowflake, Entity<User>>,
    messages: IndexMap<Snowflake, Entity<Message>>,
    client_user: Option<Entity<ClientUser>>,
}

impl Cache {
    fn contains(&self, kind: EntityKind, id: Snowflake) -> bool {
        match kind {
            EntityKind::Guild => self.guilds.contains_key(&id),
            EntityKind::Channel => self.channels.contains_key(&id),
            EntityKind::User => self.users.contains_key(&id),
            EntityKind::Message => self.messages.contains_key(&id),
            EntityKind::Member => false,
        }
    }

    fn evict_messages(&mut self, max_messages: usize) {
        while self.messages.len() > max_messages {
            if let Some((id, _)) = self.messages.shift_remove_index(0) {
                debug!(id, "Evicted message");
            }
        }
    }
}

/// Shared entity cache and reference resolver.
pub struct State {
    config: CacheConfig,
    cache: RwLock<Cache>,
}

impl Default for State {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl State {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(Cache::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Merge `record` into `entity`, logging instead of failing.
    ///
    /// A failed update leaves the entity as it was.
    fn refresh<M: Model>(&self, entity: &mut Entity<M>, record: &WireRecord) -> bool {
        match entity.update(record, self) {
            Ok(_) => true,
            Err(err) => {
                warn!(kind = M::NAME, id = entity.id(), error = %err, "Discarded update");
                false
            }
        }
    }

    fn record_id<M: Model>(record: &WireRecord) -> Option<Snowflake> {
        match Entity::<M>::identity(record) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(kind = M::NAME, error = %err, "Ignoring update without a usable id");
                None
            }
        }
    }

    // --- Guilds ---

    /// Cache a guild. A full guild replaces an unavailable one; otherwise an
    /// existing entry is updated from the incoming raw record.
    pub fn add_guild(&self, incoming: GuildEntry) {
        let id = incoming.id();
        let existing = self.cache.read().guilds.get(&id).cloned();

        let merged = match (existing, incoming) {
            (None, incoming) => incoming,
            (Some(GuildEntry::Unavailable(_)), incoming @ GuildEntry::Available(_)) => incoming,
            (Some(GuildEntry::Available(mut guild)), incoming) => {
                self.refresh(&mut guild, incoming.raw());
                GuildEntry::Available(guild)
            }
            (Some(GuildEntry::Unavailable(mut guild)), GuildEntry::Unavailable(incoming)) => {
                self.refresh(&mut guild, incoming.raw());
                GuildEntry::Unavailable(guild)
            }
        };

        self.cache.write().guilds.insert(id, merged);
    }

    /// Hydrate and cache a guild record.
    ///
    /// Records flagged `unavailable` without a name become [`UnavailableGuild`]s.
    /// Channels embedded in a full guild get the guild's id filled in. The
    /// channels and the guild are all hydrated before any of them is cached, so
    /// a rejected record leaves the cache untouched.
    pub fn add_guild_record(&self, record: &WireRecord) -> Result<Snowflake, HydrationError> {
        let unavailable = record
            .get("unavailable")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if unavailable && !record.contains_key("name") {
            let guild = Entity::<UnavailableGuild>::hydrate(record, self)?;
            let id = guild.id();
            self.add_guild(GuildEntry::Unavailable(guild));
            return Ok(id);
        }

        let id = Entity::<Guild>::identity(record)?;
        let mut channels = Vec::new();
        if let Some(embedded) = record.get("channels").and_then(Value::as_array) {
            for channel in embedded.iter().filter_map(Value::as_object) {
                let mut channel = channel.clone();
                channel
                    .entry("guild_id")
                    .or_insert_with(|| Value::String(id.to_string()));
                channels.push(self.hydrate_channel(&channel)?);
            }
        }

        let staged = StagedChannels {
            state: self,
            channels: channels.iter().map(ChannelEntry::id).collect(),
        };
        let guild = Entity::<Guild>::hydrate(record, &staged)?;

        for channel in channels {
            self.add_channel(channel);
        }
        self.add_guild(GuildEntry::Available(guild));
        Ok(id)
    }

    /// Apply a partial guild record. Unknown guilds are ignored.
    pub fn update_guild(&self, record: &WireRecord) -> bool {
        let Some(id) = Self::record_id::<Guild>(record) else {
            return false;
        };
        let existing = self.cache.read().guilds.get(&id).cloned();

        let updated = match existing {
            Some(GuildEntry::Available(mut guild)) => {
                self.refresh(&mut guild, record).then(|| GuildEntry::Available(guild))
            }
            Some(GuildEntry::Unavailable(mut guild)) => {
                self.refresh(&mut guild, record).then(|| GuildEntry::Unavailable(guild))
            }
            None => {
                debug!(id, "Update for unknown guild");
                None
            }
        };

        match updated {
            Some(entry) => {
                self.cache.write().guilds.insert(id, entry);
                true
            }
            None => false,
        }
    }

    pub fn get_guild(&self, id: Snowflake) -> Option<GuildEntry> {
        self.cache.read().guilds.get(&id).cloned()
    }

    /// Remove a guild and the channels that belong to it.
    pub fn delete_guild(&self, id: Snowflake) -> Option<GuildEntry> {
        let mut cache = self.cache.write();
        cache.channels.retain(|_, channel| channel.guild_id() != Some(id));
        cache.guilds.shift_remove(&id)
    }

    pub fn guilds(&self) -> Vec<GuildEntry> {
        self.cache.read().guilds.values().cloned().collect()
    }

    // --- Channels ---

    /// Cache a channel, updating an existing one of the same type.
    pub fn add_channel(&self, incoming: ChannelEntry) {
        let id = incoming.id();
        let existing = self.cache.read().channels.get(&id).cloned();

        let merged = match (existing, incoming) {
            (Some(ChannelEntry::Text(mut channel)), ChannelEntry::Text(incoming)) => {
                self.refresh(&mut channel, incoming.raw());
                ChannelEntry::Text(channel)
            }
            (Some(ChannelEntry::Voice(mut channel)), ChannelEntry::Voice(incoming)) => {
                self.refresh(&mut channel, incoming.raw());
                ChannelEntry::Voice(channel)
            }
            (_, incoming) => incoming,
        };

        self.cache.write().channels.insert(id, merged);
    }

    /// Hydrate a channel record as text or voice by its `type`, without caching it.
    fn hydrate_channel(&self, record: &WireRecord) -> Result<ChannelEntry, HydrationError> {
        let voice = record
            .get("type")
            .and_then(|kind| coerce_integer(kind).ok())
            == Some(VOICE_CHANNEL_TYPE);

        if voice {
            Ok(ChannelEntry::Voice(Entity::hydrate(record, self)?))
        } else {
            Ok(ChannelEntry::Text(Entity::hydrate(record, self)?))
        }
    }

    /// Hydrate and cache a channel record.
    pub fn add_channel_record(&self, record: &WireRecord) -> Result<Snowflake, HydrationError> {
        let entry = self.hydrate_channel(record)?;
        let id = entry.id();
        self.add_channel(entry);
        Ok(id)
    }

    /// Apply a partial channel record. Unknown channels are ignored.
    pub fn update_channel(&self, record: &WireRecord) -> bool {
        let Some(id) = Self::record_id::<TextChannel>(record) else {
            return false;
        };
        let existing = self.cache.read().channels.get(&id).cloned();

        let updated = match existing {
            Some(ChannelEntry::Text(mut channel)) => {
                self.refresh(&mut channel, record).then(|| ChannelEntry::Text(channel))
            }
            Some(ChannelEntry::Voice(mut channel)) => {
                self.refresh(&mut channel, record).then(|| ChannelEntry::Voice(channel))
            }
            None => None,
        };

        match updated {
            Some(entry) => {
                self.cache.write().channels.insert(id, entry);
                true
            }
            None => false,
        }
    }

    pub fn get_channel(&self, id: Snowflake) -> Option<ChannelEntry> {
        self.cache.read().channels.get(&id).cloned()
    }

    pub fn delete_channel(&self, id: Snowflake) -> Option<ChannelEntry> {
        self.cache.write().channels.shift_remove(&id)
    }

    pub fn channels_of(&self, guild_id: Snowflake) -> Vec<ChannelEntry> {
        self.cache
            .read()
            .channels
            .values()
            .filter(|channel| channel.guild_id() == Some(guild_id))
            .cloned()
            .collect()
    }

    // --- Users ---

    /// Cache a user, updating an existing entry from the incoming raw record.
    pub fn add_user(&self, incoming: Entity<User>) {
        let id = incoming.id();
        let existing = self.cache.read().users.get(&id).cloned();

        let merged = match existing {
            Some(mut user) => {
                self.refresh(&mut user, incoming.raw());
                user
            }
            None => incoming,
        };

        self.cache.write().users.insert(id, merged);
    }

    pub fn add_user_record(&self, record: &WireRecord) -> Result<Snowflake, HydrationError> {
        let user = Entity::<User>::hydrate(record, self)?;
        let id = user.id();
        self.add_user(user);
        Ok(id)
    }

    pub fn update_user(&self, record: &WireRecord) -> bool {
        let Some(id) = Self::record_id::<User>(record) else {
            return false;
        };
        let existing = self.cache.read().users.get(&id).cloned();

        let Some(mut user) = existing else {
            return false;
        };
        if !self.refresh(&mut user, record) {
            return false;
        }

        self.cache.write().users.insert(id, user);
        true
    }

    pub fn get_user(&self, id: Snowflake) -> Option<Entity<User>> {
        self.cache.read().users.get(&id).cloned()
    }

    pub fn delete_user(&self, id: Snowflake) -> Option<Entity<User>> {
        self.cache.write().users.shift_remove(&id)
    }

    // --- Client user ---

    pub fn set_client_user(&self, user: Entity<ClientUser>) {
        self.cache.write().client_user = Some(user);
    }

    pub fn client_user(&self) -> Option<Entity<ClientUser>> {
        self.cache.read().client_user.clone()
    }

    pub fn update_client_user(&self, record: &WireRecord) -> bool {
        let existing = self.cache.read().client_user.clone();

        let Some(mut user) = existing else {
            return false;
        };
        if !self.refresh(&mut user, record) {
            return false;
        }

        self.cache.write().client_user = Some(user);
        true
    }

    // --- Messages ---

    /// Cache a message, evicting the oldest once `max_messages` is exceeded.
    pub fn add_message(&self, incoming: Entity<Message>) {
        let id = incoming.id();
        let existing = self.cache.read().messages.get(&id).cloned();

        let merged = match existing {
            Some(mut message) => {
                self.refresh(&mut message, incoming.raw());
                message
            }
            None => incoming,
        };

        let mut cache = self.cache.write();
        cache.messages.insert(id, merged);
        cache.evict_messages(self.config.max_messages);
    }

    pub fn add_message_record(&self, record: &WireRecord) -> Result<Snowflake, HydrationError> {
        let message = Entity::<Message>::hydrate(record, self)?;
        let id = message.id();
        self.add_message(message);
        Ok(id)
    }

    pub fn update_message(&self, record: &WireRecord) -> bool {
        let Some(id) = Self::record_id::<Message>(record) else {
            return false;
        };
        let existing = self.cache.read().messages.get(&id).cloned();

        let Some(mut message) = existing else {
            return false;
        };
        if !self.refresh(&mut message, record) {
            return false;
        }

        self.cache.write().messages.insert(id, message);
        true
    }

    pub fn get_message(&self, id: Snowflake) -> Option<Entity<Message>> {
        self.cache.read().messages.get(&id).cloned()
    }

    pub fn delete_message(&self, id: Snowflake) -> Option<Entity<Message>> {
        self.cache.write().messages.shift_remove(&id)
    }

    pub fn summary(&self) -> CacheSummary {
        let cache = self.cache.read();

        let incomplete = cache.guilds.values().filter(|g| !g.is_full()).count()
            + cache.channels.values().filter(|c| !c.is_full()).count()
            + cache.users.values().filter(|u| !u.is_full()).count()
            + cache.messages.values().filter(|m| !m.is_full()).count();

        CacheSummary {
            guilds: cache.guilds.len(),
            unavailable_guilds: cache.guilds.values().filter(|g| !g.is_available()).count(),
            channels: cache.channels.len(),
            users: cache.users.len(),
            messages: cache.messages.len(),
            incomplete,
        }
    }
}

/// Resolves a guild's embedded channels before they are committed to the cache.
struct StagedChannels<'a> {
    state: &'a State,
    channels: Vec<Snowflake>,
}

impl Registry for StagedChannels<'_> {
    fn get(&self, kind: EntityKind, id: Snowflake) -> Result<EntityRef, ReferenceError> {
        if kind == EntityKind::Channel && self.channels.contains(&id) {
            return Ok(EntityRef::new(kind, id));
        }
        self.state.get(kind, id)
    }

    fn get_by_raw_key(&self, kind: EntityKind, value: &Value) -> Result<EntityRef, ReferenceError> {
        if value.is_object() {
            return self.state.get_by_raw_key(kind, value);
        }
        let id = coerce_snowflake(value).map_err(|_| ReferenceError::Unresolvable {
            kind,
            value: value.to_string(),
        })?;
        self.get(kind, id)
    }
}

impl Registry for State {
    /// Known ids resolve directly. Unknown ids become placeholders when
    /// `materialize_placeholders` is set; members are never cached.
    fn get(&self, kind: EntityKind, id: Snowflake) -> Result<EntityRef, ReferenceError> {
        let known = self.cache.read().contains(kind, id);
        if known {
            return Ok(EntityRef::new(kind, id));
        }

        if kind == EntityKind::Member {
            return Err(ReferenceError::Uncached { kind });
        }
        if !self.config.materialize_placeholders {
            return Err(ReferenceError::NotFound { kind, id });
        }

        let mut cache = self.cache.write();
        match kind {
            EntityKind::Guild => {
                cache
                    .guilds
                    .entry(id)
                    .or_insert_with(|| GuildEntry::Unavailable(Entity::placeholder(id)));
            }
            EntityKind::Channel => {
                cache
                    .channels
                    .entry(id)
                    .or_insert_with(|| ChannelEntry::Text(Entity::placeholder(id)));
            }
            EntityKind::User => {
                cache.users.entry(id).or_insert_with(|| Entity::placeholder(id));
            }
            EntityKind::Message => {
                cache.messages.entry(id).or_insert_with(|| Entity::placeholder(id));
                cache.evict_messages(self.config.max_messages);
            }
            EntityKind::Member => return Err(ReferenceError::Uncached { kind }),
        }

        debug!(%kind, id, "Materialized placeholder");
        Ok(EntityRef::new(kind, id))
    }

    /// Embedded records are hydrated and cached (merging into any existing
    /// entry) before the reference is returned.
    fn get_by_raw_key(&self, kind: EntityKind, value: &Value) -> Result<EntityRef, ReferenceError> {
        let Value::Object(record) = value else {
            let id = coerce_snowflake(value).map_err(|_| ReferenceError::Unresolvable {
                kind,
                value: value.to_string(),
            })?;
            return self.get(kind, id);
        };

        let added = match kind {
            EntityKind::User => self.add_user_record(record),
            EntityKind::Channel => self.add_channel_record(record),
            EntityKind::Guild => self.add_guild_record(record),
            EntityKind::Message => self.add_message_record(record),
            EntityKind::Member => return Err(ReferenceError::Uncached { kind }),
        };

        let id = added.map_err(|source| ReferenceError::Embedded {
            kind,
            source: Box::new(source),
        })?;
        Ok(EntityRef::new(kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> WireRecord {
        value.as_object().cloned().unwrap()
    }

    fn strict() -> State {
        State::new(CacheConfig {
            materialize_placeholders: false,
            ..CacheConfig::default()
        })
    }

    fn text_channel(id: &str, guild_id: &str) -> WireRecord {
        record(json!({
            "id": id, "guild_id": guild_id, "name": "general", "type": 0,
            "position": 0, "topic": null, "last_message_id": null
        }))
    }

    fn message(id: &str, channel_id: &str) -> WireRecord {
        record(json!({
            "id": id,
            "channel_id": channel_id,
            "author": {"id": "7", "username": "ana", "discriminator": "0001"},
            "content": "hi",
            "timestamp": "2017-07-11T17:27:07.299000+00:00",
            "tts": false,
            "mention_everyone": false,
            "mentions": [],
            "pinned": false
        }))
    }

    #[test]
    fn test_add_and_get_channel() {
        let state = State::default();
        let id = state.add_channel_record(&text_channel("10", "1")).unwrap();

        assert_eq!(id, 10);
        let channel = state.get_channel(10).unwrap();
        assert!(channel.as_text().is_some());
        assert_eq!(channel.guild_id(), Some(1));
        assert_eq!(state.channels_of(1).len(), 1);
    }

    #[test]
    fn test_voice_channels_are_told_apart() {
        let state = State::default();
        state
            .add_channel_record(&record(json!({
                "id": "11", "guild_id": "1", "name": "Lounge", "type": 2, "position": 0
            })))
            .unwrap();

        assert!(state.get_channel(11).unwrap().as_voice().is_some());
    }

    #[test]
    fn test_update_channel_is_partial() {
        let state = State::default();
        state.add_channel_record(&text_channel("10", "1")).unwrap();

        assert!(state.update_channel(&record(json!({"id": "10", "topic": "hello"}))));

        let channel = state.get_channel(10).unwrap();
        let channel = channel.as_text().unwrap();
        assert_eq!(channel.topic.get().map(String::as_str), Some("hello"));
        assert_eq!(channel.name.get().map(String::as_str), Some("general"));
    }

    #[test]
    fn test_malformed_update_keeps_last_good_state() {
        let state = State::default();
        state.add_channel_record(&text_channel("10", "1")).unwrap();

        let applied = state.update_channel(&record(json!({
            "id": "10", "topic": "new", "last_message_id": "not-a-number"
        })));

        assert!(!applied);
        let channel = state.get_channel(10).unwrap();
        assert!(channel.as_text().unwrap().topic.is_null());
    }

    #[test]
    fn test_update_unknown_is_a_no_op() {
        let state = State::default();
        assert!(!state.update_channel(&record(json!({"id": "99", "topic": "x"}))));
        assert!(!state.update_message(&record(json!({"content": "no id"}))));
        assert!(state.get_channel(99).is_none());
    }

    #[test]
    fn test_unavailable_guild_is_replaced() {
        let state = State::default();
        state
            .add_guild_record(&record(json!({"id": "1", "unavailable": true})))
            .unwrap();
        assert!(state.get_guild(1).unwrap().as_guild().is_none());

        state
            .add_guild_record(&record(json!({
                "id": "1", "name": "Guild", "region": "eu", "owner_id": "7",
                "verification_level": 0, "features": [], "large": false,
                "unavailable": false, "members": [],
                "channels": [{"id": "10", "name": "general", "type": 0, "position": 0,
                              "topic": null, "last_message_id": null}]
            })))
            .unwrap();

        let entry = state.get_guild(1).unwrap();
        let guild = entry.as_guild().unwrap();
        assert_eq!(guild.name.get().map(String::as_str), Some("Guild"));
        assert_eq!(guild.channels.get().map(Vec::len), Some(1));
        assert_eq!(state.get_channel(10).unwrap().guild_id(), Some(1));
    }

    fn guild(id: &str, channels: Value) -> WireRecord {
        record(json!({
            "id": id, "name": "Guild", "region": "eu", "owner_id": "7",
            "verification_level": 0, "features": [], "large": false,
            "unavailable": false, "members": [], "channels": channels
        }))
    }

    #[test]
    fn test_rejected_guild_caches_no_channels() {
        let state = State::default();
        let mut bad = guild("9", json!([{"id": "10", "name": "general", "type": 0, "position": 0}]));
        bad.remove("region");

        let err = state.add_guild_record(&bad).unwrap_err();

        assert!(matches!(err, HydrationError::MissingField { kind: "Guild", field: "region" }));
        assert!(state.get_guild(9).is_none());
        assert!(state.get_channel(10).is_none());
        assert_eq!(state.summary().channels, 0);
    }

    #[test]
    fn test_rejected_channel_caches_nothing() {
        let state = State::default();
        let record = guild(
            "9",
            json!([
                {"id": "10", "name": "general", "type": 0, "position": 0},
                {"id": "11", "name": null, "type": 0, "position": 1}
            ]),
        );

        assert!(state.add_guild_record(&record).is_err());
        assert!(state.get_channel(10).is_none());
        assert!(state.get_guild(9).is_none());
    }

    #[test]
    fn test_guild_with_category_channel() {
        let state = State::default();
        let record = guild(
            "9",
            json!([
                {"id": "10", "name": "general", "type": 0, "position": 0,
                 "topic": null, "last_message_id": null},
                {"id": "11", "name": "Text Channels", "type": 4, "position": 0}
            ]),
        );

        state.add_guild_record(&record).unwrap();

        assert_eq!(state.channels_of(9).len(), 2);
        let entry = state.get_guild(9).unwrap();
        assert_eq!(entry.as_guild().unwrap().channels.get().map(Vec::len), Some(2));
    }

    #[test]
    fn test_strict_guild_resolves_its_own_channels() {
        let state = strict();
        let record = guild("9", json!([{"id": "10", "name": "general", "type": 0, "position": 0}]));

        state.add_guild_record(&record).unwrap();

        assert_eq!(state.get_channel(10).unwrap().guild_id(), Some(9));
        assert!(state.get_guild(9).unwrap().as_guild().is_some());
    }

    #[test]
    fn test_outage_counts_as_unavailable() {
        let state = State::default();
        state.add_guild_record(&guild("9", json!([]))).unwrap();
        assert_eq!(state.summary().unavailable_guilds, 0);

        state.add_guild(GuildEntry::Unavailable(
            Entity::hydrate(&record(json!({"id": "9", "unavailable": true})), &state).unwrap(),
        ));

        let entry = state.get_guild(9).unwrap();
        assert!(entry.as_guild().is_some());
        assert!(!entry.is_available());
        assert_eq!(state.summary().unavailable_guilds, 1);
    }

    #[test]
    fn test_delete_guild_drops_its_channels() {
        let state = State::default();
        state.add_channel_record(&text_channel("10", "1")).unwrap();
        state.add_channel_record(&text_channel("20", "2")).unwrap();
        state
            .add_guild_record(&record(json!({"id": "1", "unavailable": true})))
            .unwrap();

        assert!(state.delete_guild(1).is_some());
        assert!(state.get_channel(10).is_none());
        assert!(state.get_channel(20).is_some());
    }

    #[test]
    fn test_embedded_user_is_cached_and_merged() {
        let state = State::default();
        state
            .add_user_record(&record(json!({"id": "7", "username": "ana", "bot": false})))
            .unwrap();

        state.add_message_record(&message("100", "10")).unwrap();

        let user = state.get_user(7).unwrap();
        assert_eq!(user.discriminator.get().map(String::as_str), Some("0001"));
        assert_eq!(user.bot.get(), Some(&false));
    }

    #[test]
    fn test_unknown_channel_becomes_placeholder() {
        let state = State::default();
        state.add_message_record(&message("100", "10")).unwrap();

        let channel = state.get_channel(10).unwrap();
        assert!(!channel.is_full());

        state.add_channel_record(&text_channel("10", "1")).unwrap();
        assert!(state.get_channel(10).unwrap().is_full());
    }

    #[test]
    fn test_strict_registry_rejects_unknown_references() {
        let state = strict();

        let err = state.add_message_record(&message("100", "10")).unwrap_err();
        assert!(matches!(
            err,
            HydrationError::Reference {
                field: "channel_id",
                source: ReferenceError::NotFound { kind: EntityKind::Channel, id: 10 },
                ..
            }
        ));
        assert!(state.get_message(100).is_none());

        state.add_channel_record(&text_channel("10", "1")).unwrap();
        assert!(state.add_message_record(&message("100", "10")).is_ok());
    }

    #[test]
    fn test_embedded_record_failure_is_a_reference_error() {
        let state = State::default();
        let mut bad = message("100", "10");
        bad.insert("author".to_string(), json!({"username": "no id"}));

        let err = state.add_message_record(&bad).unwrap_err();
        assert!(matches!(
            err,
            HydrationError::Reference { source: ReferenceError::Embedded { .. }, .. }
        ));
    }

    #[test]
    fn test_message_cache_is_bounded() {
        let state = State::new(CacheConfig {
            max_messages: 2,
            ..CacheConfig::default()
        });

        for id in ["1", "2", "3"] {
            state.add_message_record(&message(id, "10")).unwrap();
        }

        assert!(state.get_message(1).is_none());
        assert!(state.get_message(2).is_some());
        assert!(state.get_message(3).is_some());
        assert_eq!(state.summary().messages, 2);
    }

    #[test]
    fn test_client_user() {
        let state = State::default();
        assert!(state.client_user().is_none());
        assert!(!state.update_client_user(&record(json!({"username": "x"}))));

        let user = Entity::<ClientUser>::hydrate(
            &record(json!({
                "id": "1", "username": "bot", "discriminator": "0001", "avatar": null, "bot": true
            })),
            &state,
        )
        .unwrap();
        state.set_client_user(user);

        assert!(state.update_client_user(&record(json!({"username": "renamed"}))));
        let user = state.client_user().unwrap();
        assert_eq!(user.to_string(), "renamed#0001");
    }

    #[test]
    fn test_member_references_are_uncached() {
        let state = State::default();
        let err = state.get(EntityKind::Member, 1).unwrap_err();
        assert!(matches!(err, ReferenceError::Uncached { kind: EntityKind::Member }));
    }
}
