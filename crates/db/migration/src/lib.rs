use sea_orm_migration::prelude::*;

mod m20250101000000_baseline;
mod m20250110000000_employee_version;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101000000_baseline::Migration),
            Box::new(m20250110000000_employee_version::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use sea_orm_migration::sea_orm::{ConnectOptions, Database};

    use super::*;

    #[tokio::test]
    async fn migrations_roll_back_and_reapply() {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1);
        let db = Database::connect(options).await.unwrap();

        Migrator::up(&db, None).await.unwrap();
        let manager = SchemaManager::new(&db);
        assert!(manager.has_table("projects").await.unwrap());
        assert!(manager.has_column("employees", "version").await.unwrap());

        Migrator::down(&db, None).await.unwrap();
        for table in ["invite_links", "notes", "tasks", "employees", "projects"] {
            assert!(!manager.has_table(table).await.unwrap(), "{table} survived");
        }

        Migrator::up(&db, None).await.unwrap();
        assert!(manager.has_table("employees").await.unwrap());
    }
}
