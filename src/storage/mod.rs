//! Repository layer over Sea-ORM.
//!
//! [`Storage`] is the credential store and the CRUD surface for routes,
//! enrollments, payments and the audit log. Every method is a handful of
//! statements. Route capacity is checked here, inside the enrollment write's
//! transaction; deletion guards are enforced by the handlers, which own the
//! error messages.

use sea_orm::{DatabaseConnection, DbErr, SqlErr};

mod audit;
mod enrollments;
mod payments;
mod routes;
mod users;

pub use enrollments::{EnrollmentChanges, EnrollmentError, NewEnrollment};
pub use payments::{NewPayment, PaymentChanges};
pub use routes::{NewRoute, RouteChanges};
pub use users::{NewUser, UserChanges};

#[derive(Debug, Clone)]
pub struct Storage {
    conn: DatabaseConnection,
}

impl Storage {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Whether `err` is a unique-constraint violation (duplicate email, duplicate
/// presence key).
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Empty strings clear optional text fields.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::{ConnectOptions, Database};

    use super::*;
    use crate::entity::{user, Role};
    use crate::migration::{Migrator, MigratorTrait};

    pub async fn storage() -> Storage {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let conn = Database::connect(opt).await.unwrap();
        Migrator::up(&conn, None).await.unwrap();
        Storage::new(conn)
    }

    pub async fn user(storage: &Storage, email: &str, role: Role) -> user::Model {
        storage
            .create_user(NewUser {
                full_name: email.split('@').next().unwrap_or(email).to_string(),
                email: email.to_string(),
                password_hash: "$2b$04$not-a-real-hash".to_string(),
                phone_number: Some("+55 11 90000-0000".to_string()),
                role,
                is_active: true,
                institution: None,
                pickup_address: None,
            })
            .await
            .unwrap()
    }
}
