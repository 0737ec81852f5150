//! Per-student, per-day attendance intent for the two legs of the trip.
//!
//! `(student_id, date)` is unique; the migration backs this with a unique
//! index and the presence engine writes through an atomic upsert on it.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "daily_presence")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub student_id: String,
    /// Calendar date without time of day, serialized as `YYYY-MM-DD`.
    pub date: Date,
    /// Going on the outbound leg ("ida").
    pub status_ida: bool,
    /// Going on the return leg ("volta").
    pub status_volta: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub observation: Option<String>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id"
    )]
    Student,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
