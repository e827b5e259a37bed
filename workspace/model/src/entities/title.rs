use super::{category, genre, review};
use sea_orm::entity::prelude::*;

/// A reviewable work (book, film, song...).
///
/// The rating is not stored: it is the mean of the title's review scores and
/// is computed on every read.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "titles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Release year; never later than the current year.
    pub year: i32,
    pub description: Option<String>,
    /// Set to NULL when the category is deleted.
    pub category_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "category::Entity",
        from = "Column::CategoryId",
        to = "category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(has_many = "review::Entity")]
    Review,
    #[sea_orm(has_many = "super::title_genre::Entity")]
    TitleGenre,
}

impl Related<category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl Related<genre::Entity> for Entity {
    fn to() -> RelationDef {
        super::title_genre::Relation::Genre.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::title_genre::Relation::Title.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::title_genre;
    use sea_orm::sea_query::SqliteQueryBuilder;
    use sea_orm::{Database, DbBackend, Schema, Set, Statement};

    async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();

        let schema = Schema::new(DbBackend::Sqlite);
        let statements = vec![
            schema.create_table_from_entity(category::Entity),
            schema.create_table_from_entity(genre::Entity),
            schema.create_table_from_entity(Entity),
            schema.create_table_from_entity(title_genre::Entity),
        ];
        for stmt in statements {
            let statement =
                Statement::from_string(DbBackend::Sqlite, stmt.to_string(SqliteQueryBuilder));
            db.execute(statement).await.unwrap();
        }

        db
    }

    async fn create_genre(db: &DatabaseConnection, name: &str, slug: &str) -> genre::Model {
        genre::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_genres_are_reachable_through_link_table() {
        let db = setup_test_db().await;

        let drama = create_genre(&db, "Drama", "drama").await;
        let comedy = create_genre(&db, "Comedy", "comedy").await;
        create_genre(&db, "Horror", "horror").await;

        let title = ActiveModel {
            name: Set("Twelfth Night".to_string()),
            year: Set(1602),
            description: Set(None),
            category_id: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        for genre_id in [drama.id, comedy.id] {
            title_genre::ActiveModel {
                title_id: Set(title.id),
                genre_id: Set(genre_id),
            }
            .insert(&db)
            .await
            .unwrap();
        }

        let mut slugs: Vec<String> = title
            .find_related(genre::Entity)
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.slug)
            .collect();
        slugs.sort();

        assert_eq!(slugs, vec!["comedy".to_string(), "drama".to_string()]);
    }

    #[tokio::test]
    async fn test_category_relation() {
        let db = setup_test_db().await;

        let books = category::ActiveModel {
            name: Set("Books".to_string()),
            slug: Set("books".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let title = ActiveModel {
            name: Set("Dune".to_string()),
            year: Set(1965),
            description: Set(Some("Spice".to_string())),
            category_id: Set(Some(books.id)),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let found = title.find_related(category::Entity).one(&db).await.unwrap();
        assert_eq!(found.map(|c| c.slug), Some("books".to_string()));
    }
}
