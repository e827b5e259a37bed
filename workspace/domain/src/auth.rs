//! Signup, confirmation codes and access tokens.

pub mod codes;
pub mod service;
pub mod tokens;

pub use codes::{CodeGenerator, RandomCodeGenerator, SequenceCodeGenerator};
pub use service::{AuthService, SignUp};
pub use tokens::{Claims, IssuedToken, TokenSigner};
