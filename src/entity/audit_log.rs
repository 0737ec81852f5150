//! Immutable records of privileged and security-relevant actions.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "audit_logs")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Acting user. `None` for anonymous actions such as a login attempt with
    /// an unknown email.
    pub actor_id: Option<String>,
    /// One of the [`AuditAction`](crate::AuditAction) codes.
    pub action: String,
    pub target_table: String,
    pub target_id: Option<String>,
    /// JSON document describing the change or failure.
    #[sea_orm(column_type = "Text", nullable)]
    pub changes: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
