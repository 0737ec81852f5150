//! Schema migrations, applied at server start and by the seed binary.

pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_session_table;
mod m20250101_000002_create_domain_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    // Own history table so the schema can share a database with other apps
    fn migration_table_name() -> sea_orm::DynIden {
        Alias::new("campus_shuttle_migrations").into_iden()
    }

    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_session_table::Migration),
            Box::new(m20250101_000002_create_domain_tables::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, Database};

    #[tokio::test]
    async fn migrations_apply_and_roll_back_on_sqlite() {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();

        Migrator::up(&db, None).await.unwrap();
        let manager = SchemaManager::new(&db);
        for table in [
            "session",
            "users",
            "routes",
            "enrollments",
            "payments",
            "audit_logs",
            "daily_presence",
        ] {
            assert!(manager.has_table(table).await.unwrap(), "missing {table}");
        }

        Migrator::down(&db, None).await.unwrap();
        assert!(!manager.has_table("users").await.unwrap());
    }
}
