//! Entity models for the gateway's object kinds.
//!
//! Each model is a field table plus a generated attribute struct; the engine
//! in [`crate::entity`] does the rest.

pub mod channel;
pub mod guild;
pub mod member;
pub mod message;
pub mod user;

pub use channel::{TextChannel, TextChannelAttributes, VoiceChannel, VoiceChannelAttributes};
pub use guild::{Guild, GuildAttributes, UnavailableGuild, UnavailableGuildAttributes};
pub use member::{Member, MemberAttributes};
pub use message::{Message, MessageAttributes};
pub use user::{ClientUser, User, UserAttributes};

use crate::schema::Schema;

/// Schemas of every model, in dependency-free listing order.
pub fn schemas() -> Vec<Schema> {
    vec![
        Schema::of::<UnavailableGuild>(),
        Schema::of::<Guild>(),
        Schema::of::<TextChannel>(),
        Schema::of::<VoiceChannel>(),
        Schema::of::<User>(),
        Schema::of::<ClientUser>(),
        Schema::of::<Member>(),
        Schema::of::<Message>(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_schema_is_valid() {
        for schema in schemas() {
            assert!(schema.validate().is_ok(), "{} failed validation", schema.name);
        }
    }

    #[test]
    fn test_schema_names_are_unique() {
        let mut names: Vec<_> = schemas().iter().map(|s| s.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), schemas().len());
    }
}
