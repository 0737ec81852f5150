use std::sync::LazyLock;

use axum::extract::{Path, State};
use axum::Json;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{AdminOnly, AuthUser, Authorized, Staff};
use crate::entity::{PublicUser, Role};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;
use crate::storage::{is_unique_violation, UserChanges};

const MIN_PASSWORD_LEN: usize = 6;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"));

pub(super) fn validate_email(email: &str) -> ApiResult<()> {
    if EMAIL.is_match(email.trim()) {
        Ok(())
    } else {
        Err(ApiError::validation("Invalid email"))
    }
}

pub(super) fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub(super) fn email_taken() -> ApiError {
    ApiError::Conflict("Email already registered".to_string())
}

pub(super) async fn list(
    State(state): State<AppState>,
    _staff: Authorized<Staff>,
) -> ApiResult<Json<Value>> {
    let users: Vec<PublicUser> = state
        .storage
        .list_users()
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();
    Ok(Json(json!({ "users": users })))
}

pub(super) async fn show(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = state
        .storage
        .get_user(&id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(json!({ "user": PublicUser::from(user) })))
}

/// Partial update. Serializes to the audit trail without the password.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(alias = "passwordHash", skip_serializing)]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pickup_address: Option<String>,
}

pub(super) async fn update(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<Value>> {
    let existing = state
        .storage
        .get_user(&id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if let Some(full_name) = &request.full_name {
        if full_name.trim().is_empty() {
            return Err(ApiError::validation("Full name is required"));
        }
    }
    if let Some(email) = &request.email {
        validate_email(email)?;
        let owner = state.storage.get_user_by_email(email).await?;
        if owner.is_some_and(|owner| owner.id != existing.id) {
            return Err(email_taken());
        }
    }

    let deactivating = existing.is_active && request.is_active == Some(false);
    if deactivating && state.storage.has_active_enrollments(&existing.id).await? {
        return Err(ApiError::validation(
            "Cannot deactivate user with active enrollments",
        ));
    }

    let password_hash = match &request.password {
        Some(password) => {
            validate_password(password)?;
            Some(state.hasher.hash(password).await?)
        }
        None => None,
    };

    let audit_changes = serde_json::to_value(&request).unwrap_or(Value::Null);
    let changes = UserChanges {
        full_name: request.full_name,
        email: request.email,
        password_hash,
        phone_number: request.phone_number,
        role: request.role,
        is_active: request.is_active,
        institution: request.institution,
        pickup_address: request.pickup_address,
    };

    let updated = state
        .storage
        .update_user(&id, changes)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                email_taken()
            } else {
                err.into()
            }
        })?
        .ok_or(ApiError::NotFound("User"))?;

    if deactivating {
        let revoked = state.sessions.delete_by_user(&updated.id).await?;
        tracing::info!(user_id = %updated.id, revoked, "user deactivated");
    }

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Update, "users")
                .actor(admin.id())
                .target(updated.id.clone())
                .changes(audit_changes),
        )
        .await?;

    Ok(Json(json!({ "user": PublicUser::from(updated) })))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.storage.get_user(&id).await?.is_none() {
        return Err(ApiError::NotFound("User"));
    }
    // Inactive enrollments still own payment history
    if !state.storage.list_enrollments_by_student(&id).await?.is_empty() {
        return Err(ApiError::validation(
            "Cannot delete user with active enrollments",
        ));
    }

    if !state.storage.delete_user(&id).await? {
        return Err(ApiError::NotFound("User"));
    }
    let revoked = state.sessions.delete_by_user(&id).await?;

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Delete, "users")
                .actor(admin.id())
                .target(id.clone()),
        )
        .await?;

    tracing::info!(user_id = %id, revoked, "user deleted");
    Ok(super::success())
}
