//! Sea-ORM entity models.
//!
//! One module per table. Relations are declared for documentation and for
//! ad-hoc joins, but the application composes its reads explicitly (see
//! [`presence::manifest`](crate::presence::manifest)).

pub mod audit_log;
pub mod daily_presence;
pub mod enrollment;
pub mod payment;
pub mod route;

/// Session entity model backing [`DbSessionStore`](crate::DbSessionStore).
pub mod session;
pub mod user;

pub use payment::PaymentStatus;
pub use user::{PublicUser, Role};
