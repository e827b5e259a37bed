//! SeaORM entities for the catalog: accounts, the category/genre taxonomy,
//! titles, and the reviews and comments attached to them.

pub mod category;
pub mod comment;
pub mod genre;
pub mod review;
pub mod title;
pub mod title_genre;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::category::Entity as Category;
    pub use super::comment::Entity as Comment;
    pub use super::genre::Entity as Genre;
    pub use super::review::Entity as Review;
    pub use super::title::Entity as Title;
    pub use super::title_genre::Entity as TitleGenre;
    pub use super::user::Entity as User;
}
