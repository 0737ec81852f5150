//! Authentication and role-based authorization.
//!
//! A request moves through three gates before any handler code runs:
//!
//! 1. the session layer turns the `sid` cookie into a [`Session`];
//! 2. [`AuthUser`] reads the bound user id from the session and loads the
//!    user, rejecting with `401` when there is none or the account is
//!    inactive;
//! 3. [`Authorized<P>`] additionally checks the user's role against the
//!    policy `P`, rejecting with `403`.
//!
//! Both gates are extractors, so a rejected request never reaches the handler
//! body and the resolved user is handed to the handler as a plain value.

use std::marker::PhantomData;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde_json::json;
use tower_sessions::Session;

use crate::audit::{AuditAction, AuditEntry};
use crate::entity::{user, Role};
use crate::error::{ApiError, ApiResult};
use crate::session_store::USER_ID_KEY;
use crate::state::AppState;

/// The authenticated caller, resolved from the session.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        // Resolved once per request
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| ApiError::Internal(msg.to_string()))?;

        let user_id: String = session
            .get(USER_ID_KEY)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let user = state
            .storage
            .get_user(&user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| {
                tracing::debug!(%user_id, "session bound to missing or inactive user");
                ApiError::Unauthorized
            })?;

        let user = AuthUser(user);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// A set of roles allowed through [`Authorized`].
pub trait RolePolicy {
    const ALLOWED: &'static [Role];
}

/// Administrators only.
#[derive(Debug)]
pub struct AdminOnly;

impl RolePolicy for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

/// Administrators and coordinators.
#[derive(Debug)]
pub struct Staff;

impl RolePolicy for Staff {
    const ALLOWED: &'static [Role] = &[Role::Admin, Role::Coordinator];
}

/// Staff plus drivers.
#[derive(Debug)]
pub struct Crew;

impl RolePolicy for Crew {
    const ALLOWED: &'static [Role] = &[Role::Admin, Role::Coordinator, Role::Driver];
}

/// Roles that may submit presence: students for themselves, staff for anyone.
#[derive(Debug)]
pub struct PresenceWriters;

impl RolePolicy for PresenceWriters {
    const ALLOWED: &'static [Role] = &[Role::Student, Role::Coordinator, Role::Admin];
}

/// An [`AuthUser`] whose role is in `P::ALLOWED`.
#[derive(Debug)]
pub struct Authorized<P> {
    pub user: user::Model,
    _policy: PhantomData<fn() -> P>,
}

impl<P> Authorized<P> {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

impl<P: RolePolicy> FromRequestParts<AppState> for Authorized<P> {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, P::ALLOWED)?;
        Ok(Self {
            user,
            _policy: PhantomData,
        })
    }
}

/// Fails with [`ApiError::Forbidden`] unless `user` holds one of `allowed`.
pub fn require_role(user: &user::Model, allowed: &[Role]) -> ApiResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.id, role = ?user.role, "role not allowed");
        Err(ApiError::Forbidden)
    }
}

/// Checks a login attempt.
///
/// Unknown email, inactive account and wrong password all end in the same
/// [`ApiError::InvalidCredentials`]; each is audited as `FAILED_LOGIN` with
/// whatever identifies the attempt.
pub async fn authenticate(state: &AppState, email: &str, password: &str) -> ApiResult<user::Model> {
    let user = match state.storage.get_user_by_email(email).await? {
        Some(user) if user.is_active => user,
        Some(inactive) => {
            tracing::warn!(email, user_id = %inactive.id, "login rejected: inactive account");
            state
                .storage
                .create_audit_log(
                    AuditEntry::new(AuditAction::FailedLogin, "users")
                        .actor(inactive.id.clone())
                        .target(inactive.id)
                        .changes(json!({ "email": email, "reason": "inactive" })),
                )
                .await?;
            return Err(ApiError::InvalidCredentials);
        }
        None => {
            tracing::warn!(email, "login rejected: unknown email");
            state
                .storage
                .create_audit_log(
                    AuditEntry::new(AuditAction::FailedLogin, "users")
                        .changes(json!({ "email": email })),
                )
                .await?;
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !state.hasher.verify(password, &user.password_hash).await? {
        tracing::warn!(email, user_id = %user.id, "login rejected: wrong password");
        state
            .storage
            .create_audit_log(
                AuditEntry::new(AuditAction::FailedLogin, "users")
                    .actor(user.id.clone())
                    .target(user.id.clone()),
            )
            .await?;
        return Err(ApiError::InvalidCredentials);
    }

    Ok(user)
}
