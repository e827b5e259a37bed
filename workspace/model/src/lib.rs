pub mod entities;

pub use entities::user::Role;
