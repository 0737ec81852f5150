//! HTTP surface. Every route lives under `/api` and speaks JSON.
//!
//! Authentication and role checks happen in the extractors from
//! [`crate::auth`]; a handler that names `Authorized<Staff>` in its signature
//! never runs for anybody else.

use axum::extract::State;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::audit::AuditEntry;
use crate::error::ApiResult;
use crate::state::AppState;

mod audit;
mod auth;
mod driver;
mod enrollments;
mod payments;
mod presence;
mod routes;
mod users;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/register", post(auth::register))
        .route("/api/users", get(users::list))
        .route(
            "/api/users/{id}",
            get(users::show).patch(users::update).delete(users::delete),
        )
        .route("/api/routes", get(routes::list).post(routes::create))
        .route("/api/routes/active", get(routes::list_active))
        .route(
            "/api/routes/{id}",
            get(routes::show).patch(routes::update).delete(routes::delete),
        )
        .route(
            "/api/enrollments",
            get(enrollments::list).post(enrollments::create),
        )
        .route(
            "/api/enrollments/student/{student_id}",
            get(enrollments::by_student),
        )
        .route(
            "/api/enrollments/route/{route_id}",
            get(enrollments::by_route),
        )
        .route(
            "/api/enrollments/{id}",
            patch(enrollments::update).delete(enrollments::delete),
        )
        .route("/api/payments", get(payments::list).post(payments::create))
        .route(
            "/api/payments/enrollment/{enrollment_id}",
            get(payments::by_enrollment),
        )
        .route(
            "/api/payments/{id}",
            patch(payments::update).delete(payments::delete),
        )
        .route("/api/audit-logs", get(audit::list))
        .route("/api/presence", post(presence::submit))
        .route("/api/presence/today", get(presence::today))
        .route("/api/driver/manifest", get(driver::manifest))
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.storage.conn().ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Writes an audit entry whose loss must not fail the request it describes.
async fn audit_best_effort(state: &AppState, entry: AuditEntry) {
    let action = entry.action;
    if let Err(err) = state.storage.create_audit_log(entry).await {
        tracing::warn!(error = %err, %action, "failed to write audit entry");
    }
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}
