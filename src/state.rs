use sea_orm::DatabaseConnection;

use crate::password::PasswordHasher;
use crate::session_store::DbSessionStore;
use crate::storage::Storage;

/// Shared, cheaply cloneable handler state. The connection pool inside is the
/// only resource shared between requests.
#[derive(Debug, Clone)]
pub struct AppState {
    pub storage: Storage,
    pub sessions: DbSessionStore,
    pub hasher: PasswordHasher,
}

impl AppState {
    pub fn new(conn: DatabaseConnection, hasher: PasswordHasher) -> Self {
        Self {
            storage: Storage::new(conn.clone()),
            sessions: DbSessionStore::new(conn),
            hasher,
        }
    }
}
