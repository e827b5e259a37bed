pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_table;
mod m20240601_000002_add_review_unique_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_table::Migration),
            Box::new(m20240601_000002_add_review_unique_index::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    #[tokio::test]
    async fn test_migrations_apply_and_revert() {
        let db = Database::connect("sqlite::memory:").await.unwrap();

        Migrator::up(&db, None).await.unwrap();
        let manager = SchemaManager::new(&db);
        for table in ["users", "categories", "genres", "titles", "title_genres", "reviews", "comments"] {
            assert!(manager.has_table(table).await.unwrap(), "missing table {table}");
        }
        assert!(manager
            .has_index("reviews", "idx_reviews_author_title")
            .await
            .unwrap());

        Migrator::down(&db, None).await.unwrap();
        assert!(!manager.has_table("users").await.unwrap());
    }
}
