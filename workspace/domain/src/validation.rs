//! Field validators shared by every write path.

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidateEmail;

use crate::error::{DomainError, Result};

pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PERSON_NAME_LEN: usize = 150;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_SLUG_LEN: usize = 50;
pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 10;

/// Usernames that collide with routes.
pub const FORBIDDEN_USERNAMES: &[&str] = &["me"];

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern compiles"));
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern compiles"));

pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(DomainError::validation("username", "This field may not be blank"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(
            "username",
            format!("Ensure this field has no more than {MAX_USERNAME_LEN} characters"),
        ));
    }
    if FORBIDDEN_USERNAMES
        .iter()
        .any(|forbidden| username.eq_ignore_ascii_case(forbidden))
    {
        return Err(DomainError::validation(
            "username",
            format!("The username '{username}' is reserved"),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(DomainError::validation(
            "username",
            "Only letters, digits and @/./+/-/_ characters are allowed",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(DomainError::validation(
            "email",
            format!("Ensure this field has no more than {MAX_EMAIL_LEN} characters"),
        ));
    }
    if !email.validate_email() {
        return Err(DomainError::validation("email", "Enter a valid email address"));
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > MAX_SLUG_LEN {
        return Err(DomainError::validation(
            "slug",
            format!("Slug must be between 1 and {MAX_SLUG_LEN} characters"),
        ));
    }
    if !SLUG_RE.is_match(slug) {
        return Err(DomainError::validation(
            "slug",
            "Only letters, digits, hyphens and underscores are allowed",
        ));
    }
    Ok(())
}

pub fn validate_not_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "This field may not be blank"));
    }
    Ok(())
}

/// Non-blank text of at most `max` characters.
pub fn validate_length(field: &str, value: &str, max: usize) -> Result<()> {
    validate_not_blank(field, value)?;
    if value.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("Ensure this field has no more than {max} characters"),
        ));
    }
    Ok(())
}

/// Optional profile text: may be empty, bounded by `max`.
pub fn validate_max_length(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("Ensure this field has no more than {max} characters"),
        ));
    }
    Ok(())
}

pub fn validate_year(year: i32, current_year: i32) -> Result<()> {
    if year > current_year {
        return Err(DomainError::validation(
            "year",
            format!("Year {year} is in the future (current year is {current_year})"),
        ));
    }
    Ok(())
}

pub fn validate_score(score: i32) -> Result<()> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(DomainError::validation(
            "score",
            format!("Score must be between {MIN_SCORE} and {MAX_SCORE}"),
        ));
    }
    Ok(())
}
