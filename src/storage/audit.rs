use sea_orm::{ActiveModelTrait, DbErr, EntityTrait, QueryOrder, QuerySelect, Set};

use super::{new_id, Storage};
use crate::audit::AuditEntry;
use crate::entity::audit_log;

impl Storage {
    pub async fn create_audit_log(&self, entry: AuditEntry) -> Result<audit_log::Model, DbErr> {
        audit_log::ActiveModel {
            id: Set(new_id()),
            actor_id: Set(entry.actor_id),
            action: Set(entry.action.as_str().to_string()),
            target_table: Set(entry.target_table.to_string()),
            target_id: Set(entry.target_id),
            changes: Set(entry.changes.map(|changes| changes.to_string())),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(&self.conn)
        .await
    }

    /// Newest entries first.
    pub async fn list_audit_logs(&self, limit: u64) -> Result<Vec<audit_log::Model>, DbErr> {
        audit_log::Entity::find()
            .order_by_desc(audit_log::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
    }
}
