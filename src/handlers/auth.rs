use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

use super::{audit_best_effort, users};
use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{authenticate, AdminOnly, AuthUser, Authorized};
use crate::entity::{user, PublicUser, Role};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::session_store::USER_ID_KEY;
use crate::state::AppState;
use crate::storage::{is_unique_violation, NewUser};

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

pub(super) async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let email = request.email.filter(|email| !email.trim().is_empty());
    let password = request.password.filter(|password| !password.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::validation("Email and password required"));
    };

    let user = authenticate(&state, &email, &password).await?;

    // A fresh id on every login; any id planted before authentication is dropped
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, &user.id).await?;

    state
        .storage
        .create_audit_log(
            AuditEntry::new(AuditAction::Login, "users")
                .actor(user.id.clone())
                .target(user.id.clone()),
        )
        .await?;

    tracing::info!(user_id = %user.id, role = ?user.role, "user logged in");
    Ok(Json(json!({ "user": PublicUser::from(user) })))
}

pub(super) async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
) -> Response {
    if let Err(err) = session.flush().await {
        tracing::error!(error = %err, user_id = %user.id, "failed to destroy session");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to logout" })),
        )
            .into_response();
    }

    audit_best_effort(
        &state,
        AuditEntry::new(AuditAction::Logout, "users")
            .actor(user.id.clone())
            .target(user.id),
    )
    .await;

    super::success().into_response()
}

pub(super) async fn me(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({ "user": PublicUser::from(user) }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegisterRequest {
    full_name: String,
    email: String,
    /// Plain-text password; hashed before it is stored.
    #[serde(alias = "passwordHash")]
    password: String,
    #[serde(default)]
    phone_number: Option<String>,
    role: Role,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    institution: Option<String>,
    #[serde(default)]
    pickup_address: Option<String>,
}

fn default_true() -> bool {
    true
}

pub(super) async fn register(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    body: Result<ApiJson<RegisterRequest>, ApiError>,
) -> ApiResult<Json<Value>> {
    let created = match body {
        Ok(ApiJson(request)) => create_account(&state, request).await,
        Err(err) => Err(err),
    };

    match created {
        Ok(user) => {
            state
                .storage
                .create_audit_log(
                    AuditEntry::new(AuditAction::Create, "users")
                        .actor(admin.id())
                        .target(user.id.clone()),
                )
                .await?;
            tracing::info!(user_id = %user.id, role = ?user.role, "user registered");
            Ok(Json(json!({ "user": PublicUser::from(user) })))
        }
        Err(err) => {
            audit_best_effort(
                &state,
                AuditEntry::new(AuditAction::FailedCreate, "users")
                    .actor(admin.id())
                    .changes(json!({ "error": err.to_string() })),
            )
            .await;
            Err(err)
        }
    }
}

async fn create_account(state: &AppState, request: RegisterRequest) -> ApiResult<user::Model> {
    if request.full_name.trim().is_empty() {
        return Err(ApiError::validation("Full name is required"));
    }
    users::validate_email(&request.email)?;
    users::validate_password(&request.password)?;

    if state
        .storage
        .get_user_by_email(&request.email)
        .await?
        .is_some()
    {
        return Err(users::email_taken());
    }

    let password_hash = state.hasher.hash(&request.password).await?;
    state
        .storage
        .create_user(NewUser {
            full_name: request.full_name,
            email: request.email,
            password_hash,
            phone_number: request.phone_number,
            role: request.role,
            is_active: request.is_active,
            institution: request.institution,
            pickup_address: request.pickup_address,
        })
        .await
        .map_err(|err| {
            // Lost a race with a concurrent registration
            if is_unique_violation(&err) {
                users::email_taken()
            } else {
                err.into()
            }
        })
}
