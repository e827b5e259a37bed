use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use model::Role;
use model::entities::{category, genre, review, title, user};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};

use crate::policy::Principal;

pub async fn setup_test_db() -> DatabaseConnection {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub async fn create_user_row(db: &DatabaseConnection, username: &str, role: Role) -> user::Model {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        bio: Set(String::new()),
        role: Set(role),
        confirmation_code: Set(None),
        date_joined: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user")
}

pub fn principal(user: &user::Model) -> Principal {
    Principal {
        id: user.id,
        username: user.username.clone(),
        role: user.role,
    }
}

pub async fn create_category_row(db: &DatabaseConnection, name: &str, slug: &str) -> category::Model {
    category::ActiveModel {
        name: Set(name.to_string()),
        slug: Set(slug.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create category")
}

pub async fn create_genre_row(db: &DatabaseConnection, name: &str, slug: &str) -> genre::Model {
    genre::ActiveModel {
        name: Set(name.to_string()),
        slug: Set(slug.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create genre")
}

pub async fn create_title_row(
    db: &DatabaseConnection,
    name: &str,
    year: i32,
    category_id: Option<i32>,
) -> title::Model {
    title::ActiveModel {
        name: Set(name.to_string()),
        year: Set(year),
        description: Set(None),
        category_id: Set(category_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create title")
}

pub async fn create_review_row(
    db: &DatabaseConnection,
    author_id: i32,
    title_id: i32,
    score: i32,
) -> review::Model {
    review::ActiveModel {
        author_id: Set(author_id),
        title_id: Set(title_id),
        text: Set(format!("Review by {author_id}")),
        score: Set(score),
        pub_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create review")
}
