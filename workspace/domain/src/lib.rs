//! Business rules of the catalog service.
//!
//! Everything here works against a SeaORM connection and knows nothing about
//! HTTP: the server crate maps requests onto these operations and their
//! [`DomainError`](error::DomainError)s onto responses.

pub mod auth;
pub mod catalog;
pub mod error;
pub mod mail;
pub mod pagination;
pub mod policy;
pub mod rating;
pub mod reviews;
pub mod users;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DomainError, Result};
pub use pagination::{Page, PageRequest};
pub use policy::{Access, Principal, Rule};
