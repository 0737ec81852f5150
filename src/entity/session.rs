//! Session entity model for Sea-ORM database interaction.
//!
//! Maps to the `session` table that backs [`DbSessionStore`](crate::DbSessionStore).

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing a persisted login session.
///
/// # Database Schema
///
/// | Column      | Type                    | Description                             |
/// |-------------|-------------------------|-----------------------------------------|
/// | id          | TEXT (Primary Key)      | Session ID                              |
/// | data        | BYTEA / BLOB            | MessagePack serialized session record   |
/// | expiry_date | TIMESTAMPTZ             | Session expiration timestamp            |
/// | user_id     | TEXT (nullable)         | Authenticated user bound to the session |
///
/// `user_id` duplicates what is already inside `data`. It exists so that every
/// session of a user can be revoked with one statement when that user is
/// deactivated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "session")]
pub struct Model {
    /// The session identifier as rendered by `tower_sessions::session::Id`.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    /// MessagePack-encoded `tower_sessions::session::Record`.
    pub data: Vec<u8>,

    /// Sessions past this instant are never loaded and are swept by
    /// `delete_expired`.
    pub expiry_date: DateTimeWithTimeZone,

    #[sea_orm(column_type = "Text", nullable)]
    pub user_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
