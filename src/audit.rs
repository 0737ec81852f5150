//! Audit trail of privileged and security-relevant actions.

use serde_json::Value;

/// What an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Login,
    FailedLogin,
    Logout,
    Create,
    FailedCreate,
    Update,
    UpdatePresence,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::FailedLogin => "FAILED_LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::Create => "CREATE",
            AuditAction::FailedCreate => "FAILED_CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::UpdatePresence => "UPDATE_PRESENCE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An audit entry under construction.
///
/// ```
/// use campus_shuttle::{AuditAction, AuditEntry};
///
/// let entry = AuditEntry::new(AuditAction::Delete, "routes")
///     .actor("admin-id")
///     .target("route-id");
/// assert_eq!(entry.target_id.as_deref(), Some("route-id"));
/// ```
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<String>,
    pub action: AuditAction,
    pub target_table: &'static str,
    pub target_id: Option<String>,
    pub changes: Option<Value>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, target_table: &'static str) -> Self {
        Self {
            actor_id: None,
            action,
            target_table,
            target_id: None,
            changes: None,
        }
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn changes(mut self, changes: Value) -> Self {
        self.changes = Some(changes);
        self
    }
}
