//! Authorization policy.
//!
//! Rules are pure functions of the caller (if any), the kind of access, and
//! the author of the target resource when one exists. Read access is settled
//! before any role or authorship check runs.

use model::Role;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// The authenticated caller as carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_moderator(&self) -> bool {
        self.role.is_moderator()
    }
}

/// Whether a request only reads state or may change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Reads for anyone, writes for no one.
    ReadOnly,
    /// Any authenticated caller, any method.
    Authenticated,
    /// Reads for anyone, writes for admins and superusers.
    AdminOrReadOnly,
    /// Admins and superusers only, reads included.
    SuperUserOrAdmin,
    /// Reads for anyone; writes for the resource author, moderators, admins
    /// and superusers. Without a target (a create) any authenticated caller
    /// may write.
    AuthorModeratorAdminOrReadOnly,
}

impl Rule {
    /// Evaluates the rule. A missing caller is reported as
    /// [`DomainError::Unauthenticated`], a known caller lacking rights as
    /// [`DomainError::PermissionDenied`].
    pub fn check(
        self,
        caller: Option<&Principal>,
        access: Access,
        author_id: Option<i32>,
    ) -> Result<()> {
        let safe = access == Access::Read;
        match self {
            Rule::ReadOnly => {
                if safe {
                    return Ok(());
                }
                require(caller)?;
                Err(denied("This resource is read-only"))
            }
            Rule::Authenticated => require(caller).map(|_| ()),
            Rule::AdminOrReadOnly => {
                if safe {
                    return Ok(());
                }
                admin(require(caller)?)
            }
            Rule::SuperUserOrAdmin => admin(require(caller)?),
            Rule::AuthorModeratorAdminOrReadOnly => {
                if safe {
                    return Ok(());
                }
                let caller = require(caller)?;
                match author_id {
                    None => Ok(()),
                    Some(author) if author == caller.id || caller.is_moderator() => Ok(()),
                    Some(_) => Err(denied(
                        "Only the author, a moderator or an admin may change this resource",
                    )),
                }
            }
        }
    }
}

fn require(caller: Option<&Principal>) -> Result<&Principal> {
    caller.ok_or(DomainError::Unauthenticated)
}

fn admin(caller: &Principal) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(denied("Administrator privileges are required"))
    }
}

fn denied(message: &str) -> DomainError {
    DomainError::PermissionDenied(message.to_string())
}

/// Only a superuser may hand out the superuser role or manage an account that
/// already holds it.
pub fn check_role_assignment(
    caller: &Principal,
    target_role: Option<Role>,
    requested_role: Option<Role>,
) -> Result<()> {
    let touches_superuser = target_role == Some(Role::Superuser)
        || requested_role == Some(Role::Superuser);
    if touches_superuser && !caller.role.is_superuser() {
        return Err(denied("Only a superuser may manage superuser accounts"));
    }
    Ok(())
}
