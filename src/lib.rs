//! # Campus Shuttle
//!
//! Administration API for a student-transportation service: staff manage
//! routes, enrollments and monthly payments; students confirm every day
//! whether they ride the outbound ("ida") and return ("volta") legs; drivers
//! read a manifest of who to expect.
//!
//! The server is an [axum](https://crates.io/crates/axum) application over
//! [Sea-ORM](https://crates.io/crates/sea-orm). Logins are server-side
//! [`tower-sessions`](https://crates.io/crates/tower-sessions) sessions kept
//! in the same database by [`DbSessionStore`]. With a fixed `SESSION_SECRET`
//! a restart never logs anybody out.
//!
//! ## Features
//!
//! - Cookie sessions persisted in PostgreSQL (SQLite for tests), revocable per
//!   user
//! - Role-based access through typed extractors (`Authorized<Staff>`, ...)
//! - Atomic per-student, per-day presence upsert
//! - Per-driver manifest for any calendar date
//! - Audit trail of logins, failed logins and every write
//!
//! ## Quick Start
//!
//! ```no_run
//! use campus_shuttle::migration::{Migrator, MigratorTrait};
//! use campus_shuttle::{app, AppState, Config, PasswordHasher};
//! use sea_orm::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let conn = Database::connect(&config.database_url).await?;
//! Migrator::up(&conn, None).await?;
//!
//! let state = AppState::new(conn, PasswordHasher::new(config.bcrypt_cost));
//! let router = app(state, &config)?;
//!
//! let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use axum::Router;
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::{Expiry, SessionManagerLayer};

pub mod audit;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
mod handlers;
#[cfg(feature = "migration")]
pub mod migration;
pub mod password;
pub mod presence;
pub mod session_store;
pub mod state;
pub mod storage;

pub use audit::{AuditAction, AuditEntry};
pub use config::{Config, ConfigError};
pub use error::{ApiError, ApiResult};
pub use password::PasswordHasher;
pub use session_store::DbSessionStore;
pub use state::AppState;
pub use storage::Storage;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

/// Builds the complete application: every `/api` route behind the session
/// layer and HTTP tracing.
///
/// The cookie is `HttpOnly`, `SameSite=Lax`, signed, and expires after
/// `session_ttl_days` without a request.
pub fn app(state: AppState, config: &Config) -> Result<Router, ConfigError> {
    let key = match &config.session_secret {
        Some(secret) => {
            Key::try_from(secret.as_bytes()).map_err(|_| ConfigError::WeakSecret)?
        }
        None => {
            tracing::warn!("SESSION_SECRET not set, sessions will not survive a restart");
            Key::generate()
        }
    };

    let session_layer = SessionManagerLayer::new(state.sessions.clone())
        .with_name(SESSION_COOKIE)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(config.cookie_secure)
        .with_expiry(Expiry::OnInactivity(Duration::days(config.session_ttl_days)))
        .with_signed(key);

    Ok(handlers::router()
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
