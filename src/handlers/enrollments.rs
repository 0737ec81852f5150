use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{AuthUser, Authorized, Crew, Staff};
use crate::entity::Role;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;
use crate::storage::{EnrollmentChanges, NewEnrollment};

pub(super) async fn list(
    State(state): State<AppState>,
    _staff: Authorized<Staff>,
) -> ApiResult<Json<Value>> {
    let enrollments = state.storage.list_enrollments().await?;
    Ok(Json(json!({ "enrollments": enrollments })))
}

pub(super) async fn by_student(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if caller.role() == Role::Student && caller.id() != student_id {
        return Err(ApiError::Forbidden);
    }
    let enrollments = state.storage.list_enrollments_by_student(&student_id).await?;
    Ok(Json(json!({ "enrollments": enrollments })))
}

pub(super) async fn by_route(
    State(state): State<AppState>,
    _crew: Authorized<Crew>,
    Path(route_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let enrollments = state.storage.list_enrollments_by_route(&route_id).await?;
    Ok(Json(json!({ "enrollments": enrollments })))
}

fn check_terms(monthly_fee_cents: Option<i64>, due_day: Option<i32>) -> ApiResult<()> {
    if monthly_fee_cents.is_some_and(|fee| fee < 0) {
        return Err(ApiError::validation("Monthly fee cannot be negative"));
    }
    if due_day.is_some_and(|day| !(1..=31).contains(&day)) {
        return Err(ApiError::validation("Due day must be between 1 and 31"));
    }
    Ok(())
}

pub(super) async fn create(
    State(state): State<AppState>,
    staff: Authorized<Staff>,
    ApiJson(new): ApiJson<NewEnrollment>,
) -> ApiResult<Json<Value>> {
    check_terms(Some(new.monthly_fee_cents), Some(new.due_day))?;

    match state.storage.get_user(&new.student_id).await? {
        Some(student) if student.role == Role::Student => {}
        _ => return Err(ApiError::validation("studentId must reference a student")),
    }

    let enrollment = state.storage.create_enrollment(new).await?;
    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Create, "enrollments")
                .actor(staff.id())
                .target(enrollment.id.clone())
                .changes(json!(enrollment)),
        )
        .await?;

    tracing::info!(
        enrollment_id = %enrollment.id,
        student_id = %enrollment.student_id,
        route_id = %enrollment.route_id,
        "student enrolled"
    );
    Ok(Json(json!({ "enrollment": enrollment })))
}

pub(super) async fn update(
    State(state): State<AppState>,
    staff: Authorized<Staff>,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<EnrollmentChanges>,
) -> ApiResult<Json<Value>> {
    check_terms(changes.monthly_fee_cents, changes.due_day)?;

    let enrollment = state
        .storage
        .update_enrollment(&id, changes)
        .await?
        .ok_or(ApiError::NotFound("Enrollment"))?;

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Update, "enrollments")
                .actor(staff.id())
                .target(enrollment.id.clone())
                .changes(json!(enrollment)),
        )
        .await?;

    Ok(Json(json!({ "enrollment": enrollment })))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    staff: Authorized<Staff>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let outstanding = state
        .storage
        .list_payments_by_enrollment(&id)
        .await?
        .iter()
        .any(|payment| payment.status.is_outstanding());
    if outstanding {
        return Err(ApiError::validation(
            "Cannot delete enrollment with pending payments",
        ));
    }
    if !state.storage.delete_enrollment(&id).await? {
        return Err(ApiError::NotFound("Enrollment"));
    }

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Delete, "enrollments")
                .actor(staff.id())
                .target(id),
        )
        .await?;

    Ok(super::success())
}
