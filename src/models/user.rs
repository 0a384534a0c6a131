//! User models.

use std::fmt;

use crate::entity::{Entity, Model};
use crate::registry::EntityKind;
use crate::schema::FieldSpec;

/// A user seen anywhere in a payload. Embedded user objects are often partial,
/// so every field is optional at hydration.
pub struct User;

crate::attributes! {
    pub struct UserAttributes {
        username: String,
        discriminator: String,
        avatar: String,
        bot: bool,
    }
}

impl Model for User {
    const NAME: &'static str = "User";
    const KIND: EntityKind = EntityKind::User;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::field("username").optional(),
        FieldSpec::field("discriminator").optional(),
        FieldSpec::field("avatar").optional(),
        FieldSpec::field("bot").optional(),
    ];
    type Attributes = UserAttributes;
}

/// The account the client is logged in as, from `READY`.
pub struct ClientUser;

impl Model for ClientUser {
    const NAME: &'static str = "ClientUser";
    const KIND: EntityKind = EntityKind::User;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::field("username"),
        FieldSpec::field("discriminator"),
        FieldSpec::field("avatar"),
        FieldSpec::field("bot"),
    ];
    type Attributes = UserAttributes;
}

fn tag(attributes: &UserAttributes, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let username = attributes.username.get().map(String::as_str).unwrap_or("?");
    match attributes.discriminator.get() {
        Some(discriminator) => write!(f, "{}#{}", username, discriminator),
        None => write!(f, "{}", username),
    }
}

impl fmt::Display for Entity<User> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        tag(self.attributes(), f)
    }
}

impl fmt::Display for Entity<ClientUser> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        tag(self.attributes(), f)
    }
}
