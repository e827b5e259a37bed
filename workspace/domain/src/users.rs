//! User directory management and self-service profiles.

use chrono::Utc;
use model::Role;
use model::entities::user;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{DomainError, Result};
use crate::pagination::{Page, PageRequest, contains_ignore_case, fetch_page};
use crate::policy::{Access, Principal, Rule, check_role_assignment};
use crate::validation::{
    MAX_PERSON_NAME_LEN, validate_email, validate_max_length, validate_username,
};

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

impl UserChanges {
    fn validate(&self) -> Result<()> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(first_name) = &self.first_name {
            validate_max_length("first_name", first_name, MAX_PERSON_NAME_LEN)?;
        }
        if let Some(last_name) = &self.last_name {
            validate_max_length("last_name", last_name, MAX_PERSON_NAME_LEN)?;
        }
        Ok(())
    }
}

fn directory_access(caller: Option<&Principal>, access: Access) -> Result<&Principal> {
    Rule::SuperUserOrAdmin.check(caller, access, None)?;
    caller.ok_or(DomainError::Unauthenticated)
}

#[instrument(skip(db, caller))]
pub async fn list_users(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    search: Option<&str>,
    page: PageRequest,
) -> Result<Page<user::Model>> {
    directory_access(caller, Access::Read)?;

    let mut query = user::Entity::find().order_by_asc(user::Column::Username);
    if let Some(term) = search.filter(|t| !t.is_empty()) {
        query = query.filter(contains_ignore_case(user::Column::Username, term));
    }
    let page = fetch_page(db, query, page).await?;
    debug!("Listed {} of {} users", page.items.len(), page.total);
    Ok(page)
}

pub async fn find_by_username(db: &DatabaseConnection, username: &str) -> Result<user::Model> {
    user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("User", username))
}

#[instrument(skip(db, caller))]
pub async fn get_user(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    username: &str,
) -> Result<user::Model> {
    directory_access(caller, Access::Read)?;
    find_by_username(db, username).await
}

/// Creates an account directly. No confirmation code is issued; the account
/// obtains one by signing up with the same username and email.
#[instrument(skip(db, caller))]
pub async fn create_user(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    new_user: NewUser,
) -> Result<user::Model> {
    let caller = directory_access(caller, Access::Write)?;
    check_role_assignment(caller, None, new_user.role)?;

    let changes = UserChanges {
        username: Some(new_user.username.clone()),
        email: Some(new_user.email.clone()),
        first_name: new_user.first_name.clone(),
        last_name: new_user.last_name.clone(),
        bio: new_user.bio.clone(),
        role: new_user.role,
    };
    changes.validate()?;
    ensure_available(db, None, changes.username.as_deref(), changes.email.as_deref()).await?;

    let account = user::ActiveModel {
        username: Set(new_user.username),
        email: Set(new_user.email),
        first_name: Set(new_user.first_name.unwrap_or_default()),
        last_name: Set(new_user.last_name.unwrap_or_default()),
        bio: Set(new_user.bio.unwrap_or_default()),
        role: Set(new_user.role.unwrap_or_default()),
        confirmation_code: Set(None),
        date_joined: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| DomainError::from_write(err, || duplicate_message()))?;

    info!("User {} created by {} with role {}", account.username, caller.username, account.role);
    Ok(account)
}

#[instrument(skip(db, caller))]
pub async fn update_user(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    username: &str,
    changes: UserChanges,
) -> Result<user::Model> {
    let caller = directory_access(caller, Access::Write)?;
    let target = find_by_username(db, username).await?;
    check_role_assignment(caller, Some(target.role), changes.role)?;

    let updated = apply_changes(db, target, changes).await?;
    info!("User {} updated by {}", updated.username, caller.username);
    Ok(updated)
}

#[instrument(skip(db, caller))]
pub async fn delete_user(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    username: &str,
) -> Result<()> {
    let caller = directory_access(caller, Access::Write)?;
    let target = find_by_username(db, username).await?;
    check_role_assignment(caller, Some(target.role), None)?;

    user::Entity::delete_by_id(target.id).exec(db).await?;
    info!("User {} deleted by {}", target.username, caller.username);
    Ok(())
}

/// The caller's own account.
#[instrument(skip(db))]
pub async fn get_profile(db: &DatabaseConnection, caller: Option<&Principal>) -> Result<user::Model> {
    Rule::Authenticated.check(caller, Access::Read, None)?;
    let caller = caller.ok_or(DomainError::Unauthenticated)?;
    user::Entity::find_by_id(caller.id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("User", &caller.username))
}

/// Updates the caller's own account. A role change is dropped unless the
/// caller is a superuser.
#[instrument(skip(db))]
pub async fn update_profile(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    mut changes: UserChanges,
) -> Result<user::Model> {
    let me = get_profile(db, caller).await?;
    if changes.role.is_some() && !me.role.is_superuser() {
        debug!("Ignoring role change requested by {} on own profile", me.username);
        changes.role = None;
    }
    apply_changes(db, me, changes).await
}

/// Creates a superuser, or promotes the account if the identical
/// `(username, email)` pair already exists.
#[instrument(skip(db))]
pub async fn create_superuser(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
) -> Result<user::Model> {
    validate_username(username)?;
    validate_email(email)?;

    if let Some(existing) = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
    {
        if existing.email != email {
            return Err(DomainError::Conflict(
                "A user with that username already exists".to_string(),
            ));
        }
        if existing.role.is_superuser() {
            debug!("User {} is already a superuser", username);
            return Ok(existing);
        }
        let mut active: user::ActiveModel = existing.into();
        active.role = Set(Role::Superuser);
        let promoted = active.update(db).await?;
        info!("Promoted {} to superuser", promoted.username);
        return Ok(promoted);
    }

    ensure_available(db, None, None, Some(email)).await?;
    let created = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        bio: Set(String::new()),
        role: Set(Role::Superuser),
        confirmation_code: Set(None),
        date_joined: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| DomainError::from_write(err, duplicate_message))?;
    info!("Created superuser {}", created.username);
    Ok(created)
}

fn duplicate_message() -> String {
    "A user with that username or email already exists".to_string()
}

/// Rejects a username or email already held by an account other than
/// `exclude_id`.
async fn ensure_available(
    db: &DatabaseConnection,
    exclude_id: Option<i32>,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<()> {
    if let Some(username) = username {
        let mut query = user::Entity::find().filter(user::Column::Username.eq(username));
        if let Some(id) = exclude_id {
            query = query.filter(user::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            warn!("Username '{}' is already taken", username);
            return Err(DomainError::Conflict(
                "A user with that username already exists".to_string(),
            ));
        }
    }
    if let Some(email) = email {
        let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
        if let Some(id) = exclude_id {
            query = query.filter(user::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            warn!("Email '{}' is already taken", email);
            return Err(DomainError::Conflict(
                "A user with that email already exists".to_string(),
            ));
        }
    }
    Ok(())
}

async fn apply_changes(
    db: &DatabaseConnection,
    target: user::Model,
    changes: UserChanges,
) -> Result<user::Model> {
    changes.validate()?;
    ensure_available(
        db,
        Some(target.id),
        changes.username.as_deref(),
        changes.email.as_deref(),
    )
    .await?;

    let mut active: user::ActiveModel = target.clone().into();
    if let Some(username) = changes.username {
        active.username = Set(username);
    }
    if let Some(email) = changes.email {
        active.email = Set(email);
    }
    if let Some(first_name) = changes.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = changes.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(bio) = changes.bio {
        active.bio = Set(bio);
    }
    if let Some(role) = changes.role {
        active.role = Set(role);
    }

    if !active.is_changed() {
        return Ok(target);
    }
    active
        .update(db)
        .await
        .map_err(|err| DomainError::from_write(err, duplicate_message))
}
