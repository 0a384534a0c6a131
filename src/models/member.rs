//! Guild member model.
//!
//! Member records have no top-level id; they are identified by their user.

use crate::entity::Model;
use crate::registry::{EntityKind, EntityRef};
use crate::schema::FieldSpec;
use crate::transform::Transform;

pub struct Member;

crate::attributes! {
    pub struct MemberAttributes {
        user: EntityRef,
        nick: String,
        joined_at: chrono::DateTime<chrono::Utc>,
    }
}

impl Model for Member {
    const NAME: &'static str = "Member";
    const KIND: EntityKind = EntityKind::Member;
    const ID_PATH: &'static [&'static str] = &["user", "id"];
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::transformed(Transform::Reference(EntityKind::User), "user").non_null(),
        FieldSpec::field("nick").optional(),
        FieldSpec::transformed(Transform::Timestamp, "joined_at"),
    ];
    type Attributes = MemberAttributes;
}
