use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{AuthUser, Authorized, Staff};
use crate::entity::Role;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;
use crate::storage::{NewRoute, RouteChanges};

pub(super) async fn list(State(state): State<AppState>, _caller: AuthUser) -> ApiResult<Json<Value>> {
    let routes = state.storage.list_routes().await?;
    Ok(Json(json!({ "routes": routes })))
}

pub(super) async fn list_active(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> ApiResult<Json<Value>> {
    let routes = state.storage.list_active_routes().await?;
    Ok(Json(json!({ "routes": routes })))
}

pub(super) async fn show(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let route = state
        .storage
        .get_route(&id)
        .await?
        .ok_or(ApiError::NotFound("Route"))?;
    Ok(Json(json!({ "route": route })))
}

async fn check_driver(state: &AppState, driver_id: &str) -> ApiResult<()> {
    match state.storage.get_user(driver_id).await? {
        Some(user) if user.role == Role::Driver => Ok(()),
        _ => Err(ApiError::validation("driverId must reference a driver")),
    }
}

fn check_capacity(max_capacity: i32) -> ApiResult<()> {
    if max_capacity < 1 {
        return Err(ApiError::validation("Capacity must be at least 1"));
    }
    Ok(())
}

pub(super) async fn create(
    State(state): State<AppState>,
    staff: Authorized<Staff>,
    ApiJson(new): ApiJson<NewRoute>,
) -> ApiResult<Json<Value>> {
    if new.name.trim().is_empty() {
        return Err(ApiError::validation("Route name is required"));
    }
    check_capacity(new.max_capacity)?;
    if let Some(driver_id) = &new.driver_id {
        check_driver(&state, driver_id).await?;
    }

    let route = state.storage.create_route(new).await?;
    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Create, "routes")
                .actor(staff.id())
                .target(route.id.clone())
                .changes(json!(route)),
        )
        .await?;

    tracing::info!(route_id = %route.id, name = %route.name, "route created");
    Ok(Json(json!({ "route": route })))
}

pub(super) async fn update(
    State(state): State<AppState>,
    staff: Authorized<Staff>,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<RouteChanges>,
) -> ApiResult<Json<Value>> {
    if changes
        .name
        .as_ref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(ApiError::validation("Route name is required"));
    }
    if let Some(max_capacity) = changes.max_capacity {
        check_capacity(max_capacity)?;
    }
    if let (Some(driver_id), false) = (&changes.driver_id, changes.unassign_driver) {
        check_driver(&state, driver_id).await?;
    }

    let route = state
        .storage
        .update_route(&id, changes)
        .await?
        .ok_or(ApiError::NotFound("Route"))?;

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Update, "routes")
                .actor(staff.id())
                .target(route.id.clone())
                .changes(json!(route)),
        )
        .await?;

    Ok(Json(json!({ "route": route })))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    staff: Authorized<Staff>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.storage.list_enrollments_by_route(&id).await?.is_empty() {
        return Err(ApiError::validation(
            "Cannot delete route with active enrollments",
        ));
    }
    if !state.storage.delete_route(&id).await? {
        return Err(ApiError::NotFound("Route"));
    }

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Delete, "routes")
                .actor(staff.id())
                .target(id),
        )
        .await?;

    Ok(super::success())
}
