use super::{comment, title, user};
use sea_orm::entity::prelude::*;

/// A user's scored review of a title.
///
/// At most one review exists per `(author_id, title_id)`; the migration backs
/// this with a unique index.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub author_id: i32,
    pub title_id: i32,
    pub text: String,
    /// Between 1 and 10 inclusive.
    pub score: i32,
    pub pub_date: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::AuthorId",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,
    #[sea_orm(
        belongs_to = "title::Entity",
        from = "Column::TitleId",
        to = "title::Column::Id",
        on_delete = "Cascade"
    )]
    Title,
    #[sea_orm(has_many = "comment::Entity")]
    Comment,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<title::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Title.def()
    }
}

impl Related<comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
