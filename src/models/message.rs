//! Message model and its REST actions.

use serde_json::json;
use tracing::info;

use crate::entity::{Entity, Model};
use crate::registry::{EntityKind, EntityRef, Registry, Snowflake};
use crate::schema::FieldSpec;
use crate::transform::Transform;
use crate::transport::{ActionError, Method, Transport};

pub struct Message;

crate::attributes! {
    pub struct MessageAttributes {
        channel_id: u64,
        channel: EntityRef,
        author: EntityRef,
        content: String,
        timestamp: chrono::DateTime<chrono::Utc>,
        edited_timestamp: chrono::DateTime<chrono::Utc>,
        tts: bool,
        mention_everyone: bool,
        mentions: Vec<EntityRef>,
        pinned: bool,
    }
}

impl Model for Message {
    const NAME: &'static str = "Message";
    const KIND: EntityKind = EntityKind::Message;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::transformed(Transform::Snowflake, "channel_id").non_null(),
        FieldSpec::renamed(Transform::Reference(EntityKind::Channel), "channel_id", "channel")
            .non_null(),
        FieldSpec::transformed(Transform::Reference(EntityKind::User), "author").non_null(),
        FieldSpec::field("content"),
        FieldSpec::transformed(Transform::Timestamp, "timestamp"),
        FieldSpec::transformed(Transform::Timestamp, "edited_timestamp").optional(),
        FieldSpec::field("tts"),
        FieldSpec::field("mention_everyone"),
        FieldSpec::transformed(
            Transform::ListOf {
                element: &Transform::Reference(EntityKind::User),
                key: None,
            },
            "mentions",
        ),
        FieldSpec::field("pinned"),
    ];
    type Attributes = MessageAttributes;
}

impl Entity<Message> {
    fn channel_id_or_err(&self) -> Result<Snowflake, ActionError> {
        self.channel_id.get().copied().ok_or(ActionError::NotHydrated {
            kind: Message::NAME,
            attribute: "channel_id",
        })
    }

    /// Post `content` to this message's channel and return the new message.
    pub async fn reply(
        &self,
        transport: &dyn Transport,
        registry: &dyn Registry,
        content: impl ToString,
    ) -> Result<Entity<Message>, ActionError> {
        let channel_id = self.channel_id_or_err()?;
        let path = format!("/channels/{}/messages", channel_id);

        let response = transport
            .request(Method::Post, &path, json!({ "content": content.to_string() }))
            .await?;
        let reply = Entity::<Message>::hydrate_value(&response, registry)?;

        info!(channel_id, message_id = reply.id(), "Replied to message {}", self.id());
        Ok(reply)
    }

    /// Replace this message's content.
    ///
    /// Returns the edited message as a new entity; `self` is not modified.
    /// Use [`Entity::update`] with the returned entity's raw record to merge it
    /// into a cached copy.
    pub async fn edit(
        &self,
        transport: &dyn Transport,
        registry: &dyn Registry,
        content: &str,
    ) -> Result<Entity<Message>, ActionError> {
        let channel_id = self.channel_id_or_err()?;
        let path = format!("/channels/{}/messages/{}", channel_id, self.id());

        let response = transport
            .request(Method::Patch, &path, json!({ "content": content }))
            .await?;
        let edited = Entity::<Message>::hydrate_value(&response, registry)?;

        info!(channel_id, message_id = edited.id(), "Edited message");
        Ok(edited)
    }
}
