//! Users: identity, credential and role.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The four mutually exclusive roles of the system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "COORDINATOR")]
    Coordinator,
    #[sea_orm(string_value = "DRIVER")]
    Driver,
    #[sea_orm(string_value = "STUDENT")]
    Student,
}

impl Role {
    /// Admins and coordinators administer the fleet and may act on behalf of
    /// any student.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Coordinator)
    }
}

/// A user row. Deliberately not `Serialize`: the password hash must never
/// reach a response, use [`PublicUser`] instead.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub full_name: String,
    /// Login handle.
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub is_active: bool,
    /// University or school the student attends; shown on the driver manifest.
    pub institution: Option<String>,
    /// Where the student is picked up; shown on the driver manifest.
    pub pickup_address: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollment,
    #[sea_orm(has_many = "super::daily_presence::Entity")]
    DailyPresence,
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollment.def()
    }
}

impl Related<super::daily_presence::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DailyPresence.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// A user as exposed over the API: everything except the password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub institution: Option<String>,
    pub pickup_address: Option<String>,
    pub created_at: DateTimeUtc,
}

impl From<Model> for PublicUser {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            full_name: model.full_name,
            email: model.email,
            phone_number: model.phone_number,
            role: model.role,
            is_active: model.is_active,
            institution: model.institution,
            pickup_address: model.pickup_address,
            created_at: model.created_at,
        }
    }
}
