use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{AuthUser, Authorized, Staff};
use crate::entity::{PaymentStatus, Role};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;
use crate::storage::{NewPayment, PaymentChanges};

pub(super) async fn list(
    State(state): State<AppState>,
    _staff: Authorized<Staff>,
) -> ApiResult<Json<Value>> {
    let payments = state.storage.list_payments().await?;
    Ok(Json(json!({ "payments": payments })))
}

pub(super) async fn by_enrollment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(enrollment_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if caller.role() == Role::Student {
        let enrollment = state
            .storage
            .get_enrollment(&enrollment_id)
            .await?
            .ok_or(ApiError::NotFound("Enrollment"))?;
        if enrollment.student_id != caller.id() {
            return Err(ApiError::Forbidden);
        }
    }

    let payments = state.storage.list_payments_by_enrollment(&enrollment_id).await?;
    Ok(Json(json!({ "payments": payments })))
}

fn check_amount(amount_due_cents: Option<i64>) -> ApiResult<()> {
    if amount_due_cents.is_some_and(|amount| amount < 0) {
        return Err(ApiError::validation("Amount due cannot be negative"));
    }
    Ok(())
}

/// Settlement is manual: a payment moved to PAID records who processed it
/// and, unless given, when.
fn settle(changes: &mut PaymentChanges, processed_by: &str) {
    if changes.status == Some(PaymentStatus::Paid) {
        if changes.paid_at.is_none() {
            changes.paid_at = Some(Utc::now());
        }
        changes.processed_by_id = Some(processed_by.to_string());
    }
}

pub(super) async fn create(
    State(state): State<AppState>,
    staff: Authorized<Staff>,
    ApiJson(new): ApiJson<NewPayment>,
) -> ApiResult<Json<Value>> {
    check_amount(Some(new.amount_due_cents))?;
    if state.storage.get_enrollment(&new.enrollment_id).await?.is_none() {
        return Err(ApiError::NotFound("Enrollment"));
    }

    let status = new.status;
    let mut payment = state.storage.create_payment(new).await?;
    if status == PaymentStatus::Paid {
        let mut changes = PaymentChanges {
            status: Some(status),
            ..Default::default()
        };
        settle(&mut changes, staff.id());
        payment = state
            .storage
            .update_payment(&payment.id, changes)
            .await?
            .ok_or(ApiError::NotFound("Payment"))?;
    }

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Create, "payments")
                .actor(staff.id())
                .target(payment.id.clone())
                .changes(json!(payment)),
        )
        .await?;

    Ok(Json(json!({ "payment": payment })))
}

pub(super) async fn update(
    State(state): State<AppState>,
    staff: Authorized<Staff>,
    Path(id): Path<String>,
    ApiJson(mut changes): ApiJson<PaymentChanges>,
) -> ApiResult<Json<Value>> {
    check_amount(changes.amount_due_cents)?;

    let existing = state
        .storage
        .get_payment(&id)
        .await?
        .ok_or(ApiError::NotFound("Payment"))?;
    if existing.status != PaymentStatus::Paid {
        settle(&mut changes, staff.id());
    }

    let payment = state
        .storage
        .update_payment(&id, changes)
        .await?
        .ok_or(ApiError::NotFound("Payment"))?;

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Update, "payments")
                .actor(staff.id())
                .target(payment.id.clone())
                .changes(json!(payment)),
        )
        .await?;

    if existing.status != payment.status {
        tracing::info!(
            payment_id = %payment.id,
            from = ?existing.status,
            to = ?payment.status,
            "payment status changed"
        );
    }
    Ok(Json(json!({ "payment": payment })))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    staff: Authorized<Staff>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.storage.delete_payment(&id).await? {
        return Err(ApiError::NotFound("Payment"));
    }

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Delete, "payments")
                .actor(staff.id())
                .target(id),
        )
        .await?;

    Ok(super::success())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn marking_paid_stamps_processor_and_time() {
        let mut changes = PaymentChanges {
            status: Some(PaymentStatus::Paid),
            ..Default::default()
        };
        settle(&mut changes, "coord-1");
        assert_eq!(changes.processed_by_id.as_deref(), Some("coord-1"));
        assert!(changes.paid_at.is_some());
    }

    #[test]
    fn explicit_paid_at_is_kept() {
        let paid_at = Utc.with_ymd_and_hms(2025, 11, 5, 12, 0, 0).unwrap();
        let mut changes = PaymentChanges {
            status: Some(PaymentStatus::Paid),
            paid_at: Some(paid_at),
            ..Default::default()
        };
        settle(&mut changes, "coord-1");
        assert_eq!(changes.paid_at, Some(paid_at));
    }

    #[test]
    fn other_transitions_are_untouched() {
        let mut changes = PaymentChanges {
            status: Some(PaymentStatus::Overdue),
            ..Default::default()
        };
        settle(&mut changes, "coord-1");
        assert!(changes.processed_by_id.is_none());
        assert!(changes.paid_at.is_none());
    }
}
