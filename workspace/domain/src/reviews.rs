//! Reviews of titles and comments on reviews.
//!
//! Reviews and comments are always addressed through their parents: a review
//! under the wrong title, or a comment under the wrong review, does not
//! exist. Writes to an existing object are allowed to its author and to
//! moderators and above.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use model::entities::{comment, review, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::catalog::find_title;
use crate::error::{DomainError, Result};
use crate::pagination::{Page, PageRequest, fetch_page};
use crate::policy::{Access, Principal, Rule};
use crate::validation::{validate_not_blank, validate_score};

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDetails {
    pub review: review::Model,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentDetails {
    pub comment: comment::Model,
    pub author: String,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub text: String,
    pub score: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewChanges {
    pub text: Option<String>,
    pub score: Option<i32>,
}

const REVIEW_RULE: Rule = Rule::AuthorModeratorAdminOrReadOnly;

fn require_writer(caller: Option<&Principal>) -> Result<&Principal> {
    REVIEW_RULE.check(caller, Access::Write, None)?;
    caller.ok_or(DomainError::Unauthenticated)
}

/// Tokens outlive accounts: the author named by a token must still exist
/// before anything is written under their id.
async fn require_live_author<C: ConnectionTrait>(db: &C, author: &Principal) -> Result<()> {
    if user::Entity::find_by_id(author.id).one(db).await?.is_none() {
        warn!("Token for deleted user {} used to write", author.id);
        return Err(DomainError::Unauthenticated);
    }
    Ok(())
}

/// Maps a failed insert of an authored row. A foreign-key failure here means
/// the author was deleted between the check and the insert.
fn authored_insert_failed(err: DbErr, conflict: impl FnOnce() -> String) -> DomainError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
            warn!(%detail, "Authored insert lost its author");
            DomainError::Unauthenticated
        }
        _ => DomainError::from_write(err, conflict),
    }
}

async fn usernames<C: ConnectionTrait>(db: &C, ids: BTreeSet<i32>) -> Result<HashMap<i32, String>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect())
}

async fn review_details<C: ConnectionTrait>(db: &C, reviews: Vec<review::Model>) -> Result<Vec<ReviewDetails>> {
    let names = usernames(db, reviews.iter().map(|r| r.author_id).collect()).await?;
    Ok(reviews
        .into_iter()
        .map(|review| ReviewDetails {
            author: names.get(&review.author_id).cloned().unwrap_or_default(),
            review,
        })
        .collect())
}

async fn comment_details<C: ConnectionTrait>(db: &C, comments: Vec<comment::Model>) -> Result<Vec<CommentDetails>> {
    let names = usernames(db, comments.iter().map(|c| c.author_id).collect()).await?;
    Ok(comments
        .into_iter()
        .map(|comment| CommentDetails {
            author: names.get(&comment.author_id).cloned().unwrap_or_default(),
            comment,
        })
        .collect())
}

async fn one_review(db: &DatabaseConnection, found: review::Model) -> Result<ReviewDetails> {
    review_details(db, vec![found])
        .await?
        .pop()
        .ok_or_else(|| DomainError::NotFound("Review not found".to_string()))
}

async fn one_comment(db: &DatabaseConnection, found: comment::Model) -> Result<CommentDetails> {
    comment_details(db, vec![found])
        .await?
        .pop()
        .ok_or_else(|| DomainError::NotFound("Comment not found".to_string()))
}

async fn find_review<C: ConnectionTrait>(db: &C, title_id: i32, review_id: i32) -> Result<review::Model> {
    find_title(db, title_id).await?;
    review::Entity::find_by_id(review_id)
        .filter(review::Column::TitleId.eq(title_id))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Review", review_id))
}

async fn find_comment<C: ConnectionTrait>(
    db: &C,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
) -> Result<comment::Model> {
    find_review(db, title_id, review_id).await?;
    comment::Entity::find_by_id(comment_id)
        .filter(comment::Column::ReviewId.eq(review_id))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Comment", comment_id))
}

// Reviews

#[instrument(skip(db))]
pub async fn list_reviews(
    db: &DatabaseConnection,
    title_id: i32,
    page: PageRequest,
) -> Result<Page<ReviewDetails>> {
    find_title(db, title_id).await?;
    let query = review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .order_by_asc(review::Column::Id);
    let page = fetch_page(db, query, page).await?;
    let details = review_details(db, page.items.clone()).await?;
    Ok(page.with_items(details))
}

#[instrument(skip(db))]
pub async fn get_review(db: &DatabaseConnection, title_id: i32, review_id: i32) -> Result<ReviewDetails> {
    let found = find_review(db, title_id, review_id).await?;
    one_review(db, found).await
}

/// Creates the caller's review of a title. A second review by the same author
/// is a conflict; the pre-check gives the friendly path, the unique index on
/// `(author_id, title_id)` settles concurrent submissions.
#[instrument(skip(db, caller, input), fields(score = input.score))]
pub async fn create_review(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    title_id: i32,
    input: NewReview,
) -> Result<ReviewDetails> {
    let author = require_writer(caller)?;
    require_live_author(db, author).await?;
    find_title(db, title_id).await?;
    validate_not_blank("text", &input.text)?;
    validate_score(input.score)?;

    let existing = review::Entity::find()
        .filter(review::Column::AuthorId.eq(author.id))
        .filter(review::Column::TitleId.eq(title_id))
        .one(db)
        .await?;
    if existing.is_some() {
        warn!("User {} already reviewed title {}", author.id, title_id);
        return Err(already_reviewed());
    }

    let created = review::ActiveModel {
        author_id: Set(author.id),
        title_id: Set(title_id),
        text: Set(input.text),
        score: Set(input.score),
        pub_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| authored_insert_failed(err, || already_reviewed().to_string()))?;

    info!("User {} reviewed title {} with score {}", author.id, title_id, created.score);
    Ok(ReviewDetails {
        review: created,
        author: author.username.clone(),
    })
}

fn already_reviewed() -> DomainError {
    DomainError::Conflict("You have already reviewed this title".to_string())
}

#[instrument(skip(db, caller))]
pub async fn update_review(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    title_id: i32,
    review_id: i32,
    changes: ReviewChanges,
) -> Result<ReviewDetails> {
    require_writer(caller)?;
    let found = find_review(db, title_id, review_id).await?;
    REVIEW_RULE.check(caller, Access::Write, Some(found.author_id))?;

    if let Some(text) = &changes.text {
        validate_not_blank("text", text)?;
    }
    if let Some(score) = changes.score {
        validate_score(score)?;
    }

    let mut active: review::ActiveModel = found.clone().into();
    if let Some(text) = changes.text {
        active.text = Set(text);
    }
    if let Some(score) = changes.score {
        active.score = Set(score);
    }
    let updated = if active.is_changed() {
        active.update(db).await?
    } else {
        found
    };

    debug!("Review {} updated", review_id);
    one_review(db, updated).await
}

#[instrument(skip(db, caller))]
pub async fn delete_review(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    title_id: i32,
    review_id: i32,
) -> Result<()> {
    require_writer(caller)?;
    let found = find_review(db, title_id, review_id).await?;
    REVIEW_RULE.check(caller, Access::Write, Some(found.author_id))?;

    let txn = db.begin().await?;
    let comments = comment::Entity::delete_many()
        .filter(comment::Column::ReviewId.eq(review_id))
        .exec(&txn)
        .await?;
    review::Entity::delete_by_id(review_id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted review {} with {} comments", review_id, comments.rows_affected);
    Ok(())
}

// Comments

#[instrument(skip(db))]
pub async fn list_comments(
    db: &DatabaseConnection,
    title_id: i32,
    review_id: i32,
    page: PageRequest,
) -> Result<Page<CommentDetails>> {
    find_review(db, title_id, review_id).await?;
    let query = comment::Entity::find()
        .filter(comment::Column::ReviewId.eq(review_id))
        .order_by_asc(comment::Column::Id);
    let page = fetch_page(db, query, page).await?;
    let details = comment_details(db, page.items.clone()).await?;
    Ok(page.with_items(details))
}

#[instrument(skip(db))]
pub async fn get_comment(
    db: &DatabaseConnection,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
) -> Result<CommentDetails> {
    let found = find_comment(db, title_id, review_id, comment_id).await?;
    one_comment(db, found).await
}

#[instrument(skip(db, caller, text))]
pub async fn create_comment(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    title_id: i32,
    review_id: i32,
    text: String,
) -> Result<CommentDetails> {
    let author = require_writer(caller)?;
    require_live_author(db, author).await?;
    find_review(db, title_id, review_id).await?;
    validate_not_blank("text", &text)?;

    let created = comment::ActiveModel {
        review_id: Set(review_id),
        author_id: Set(author.id),
        text: Set(text),
        pub_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| authored_insert_failed(err, || "Comment already exists".to_string()))?;

    info!("User {} commented on review {}", author.id, review_id);
    Ok(CommentDetails {
        comment: created,
        author: author.username.clone(),
    })
}

#[instrument(skip(db, caller, text))]
pub async fn update_comment(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
    text: Option<String>,
) -> Result<CommentDetails> {
    require_writer(caller)?;
    let found = find_comment(db, title_id, review_id, comment_id).await?;
    REVIEW_RULE.check(caller, Access::Write, Some(found.author_id))?;

    let updated = match text {
        Some(text) => {
            validate_not_blank("text", &text)?;
            let mut active: comment::ActiveModel = found.into();
            active.text = Set(text);
            active.update(db).await?
        }
        None => found,
    };

    debug!("Comment {} updated", comment_id);
    one_comment(db, updated).await
}

#[instrument(skip(db, caller))]
pub async fn delete_comment(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
) -> Result<()> {
    require_writer(caller)?;
    let found = find_comment(db, title_id, review_id, comment_id).await?;
    REVIEW_RULE.check(caller, Access::Write, Some(found.author_id))?;

    comment::Entity::delete_by_id(comment_id).exec(db).await?;
    info!("Deleted comment {}", comment_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_review_row, create_title_row, create_user_row, principal, setup_test_db};
    use model::Role;

    fn review_input(score: i32) -> NewReview {
        NewReview { text: "Worth a look".to_string(), score }
    }

    #[tokio::test]
    async fn test_create_review_and_read_back() {
        let db = setup_test_db().await;
        let alice = principal(&create_user_row(&db, "alice", Role::User).await);
        let t = create_title_row(&db, "Title", 2000, None).await;

        let created = create_review(&db, Some(&alice), t.id, review_input(7)).await.unwrap();
        assert_eq!(created.author, "alice");
        assert_eq!(created.review.score, 7);

        let listed = list_reviews(&db, t.id, PageRequest::default()).await.unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].author, "alice");
    }

    #[tokio::test]
    async fn test_deleted_author_cannot_write() {
        let db = setup_test_db().await;
        let writer = create_user_row(&db, "ghost", Role::User).await;
        let ghost = principal(&writer);
        let t = create_title_row(&db, "Title", 2000, None).await;
        let other = principal(&create_user_row(&db, "bob", Role::User).await);
        let r = create_review(&db, Some(&other), t.id, review_input(6)).await.unwrap();
        user::Entity::delete_by_id(writer.id).exec(&db).await.unwrap();

        assert!(matches!(
            create_review(&db, Some(&ghost), t.id, review_input(8)).await,
            Err(DomainError::Unauthenticated)
        ));
        assert!(matches!(
            create_comment(&db, Some(&ghost), t.id, r.review.id, "Boo".to_string()).await,
            Err(DomainError::Unauthenticated)
        ));
        assert_eq!(comment::Entity::find().all(&db).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_review_requires_title_and_valid_score() {
        let db = setup_test_db().await;
        let alice = principal(&create_user_row(&db, "alice", Role::User).await);
        let t = create_title_row(&db, "Title", 2000, None).await;

        assert!(matches!(
            create_review(&db, Some(&alice), 404, review_input(5)).await,
            Err(DomainError::NotFound(_))
        ));
        for score in [0, 11] {
            assert!(matches!(
                create_review(&db, Some(&alice), t.id, review_input(score)).await,
                Err(DomainError::Validation { .. })
            ));
        }
        assert!(matches!(
            create_review(&db, None, t.id, review_input(5)).await,
            Err(DomainError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_second_review_conflicts() {
        let db = setup_test_db().await;
        let alice = principal(&create_user_row(&db, "alice", Role::User).await);
        let t = create_title_row(&db, "Title", 2000, None).await;

        create_review(&db, Some(&alice), t.id, review_input(5)).await.unwrap();
        assert!(matches!(
            create_review(&db, Some(&alice), t.id, review_input(6)).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_reviews_only_one_wins() {
        let db = setup_test_db().await;
        let alice = principal(&create_user_row(&db, "alice", Role::User).await);
        let t = create_title_row(&db, "Title", 2000, None).await;

        let (first, second) = tokio::join!(
            create_review(&db, Some(&alice), t.id, review_input(5)),
            create_review(&db, Some(&alice), t.id, review_input(9)),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(DomainError::Conflict(_))))
                .count(),
            1
        );
        assert_eq!(review::Entity::find().all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_author_and_moderator_can_edit_others_cannot() {
        let db = setup_test_db().await;
        let author = create_user_row(&db, "author", Role::User).await;
        let stranger = principal(&create_user_row(&db, "stranger", Role::User).await);
        let moderator = principal(&create_user_row(&db, "moder", Role::Moderator).await);
        let t = create_title_row(&db, "Title", 2000, None).await;
        let r = create_review_row(&db, author.id, t.id, 4).await;

        let edit = ReviewChanges { score: Some(6), ..Default::default() };
        assert!(matches!(
            update_review(&db, Some(&stranger), t.id, r.id, edit.clone()).await,
            Err(DomainError::PermissionDenied(_))
        ));
        let by_author = update_review(&db, Some(&principal(&author)), t.id, r.id, edit).await.unwrap();
        assert_eq!(by_author.review.score, 6);
        assert_eq!(by_author.review.pub_date, r.pub_date);

        let by_moderator = update_review(
            &db,
            Some(&moderator),
            t.id,
            r.id,
            ReviewChanges { text: Some("Moderated".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(by_moderator.review.text, "Moderated");
        assert_eq!(by_moderator.author, "author");
    }

    #[tokio::test]
    async fn test_review_under_wrong_title_is_not_found() {
        let db = setup_test_db().await;
        let author = create_user_row(&db, "author", Role::User).await;
        let first = create_title_row(&db, "First", 2000, None).await;
        let second = create_title_row(&db, "Second", 2000, None).await;
        let r = create_review_row(&db, author.id, first.id, 4).await;

        assert!(matches!(get_review(&db, second.id, r.id).await, Err(DomainError::NotFound(_))));
        assert!(matches!(
            create_comment(&db, Some(&principal(&author)), second.id, r.id, "hi".into()).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_comment_lifecycle() {
        let db = setup_test_db().await;
        let author = create_user_row(&db, "author", Role::User).await;
        let commenter = principal(&create_user_row(&db, "commenter", Role::User).await);
        let admin = principal(&create_user_row(&db, "admin", Role::Admin).await);
        let t = create_title_row(&db, "Title", 2000, None).await;
        let r = create_review_row(&db, author.id, t.id, 4).await;

        let first = create_comment(&db, Some(&commenter), t.id, r.id, "Agreed".into()).await.unwrap();
        create_comment(&db, Some(&commenter), t.id, r.id, "Also this".into()).await.unwrap();
        assert_eq!(first.author, "commenter");

        let listed = list_comments(&db, t.id, r.id, PageRequest::default()).await.unwrap();
        assert_eq!(listed.total, 2);

        assert!(matches!(
            update_comment(&db, Some(&principal(&author)), t.id, r.id, first.comment.id, Some("x".into())).await,
            Err(DomainError::PermissionDenied(_))
        ));
        let edited = update_comment(&db, Some(&commenter), t.id, r.id, first.comment.id, Some("Edited".into()))
            .await
            .unwrap();
        assert_eq!(edited.comment.text, "Edited");

        delete_comment(&db, Some(&admin), t.id, r.id, first.comment.id).await.unwrap();
        assert!(matches!(
            get_comment(&db, t.id, r.id, first.comment.id).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_review_removes_comments() {
        let db = setup_test_db().await;
        let author = principal(&create_user_row(&db, "author", Role::User).await);
        let t = create_title_row(&db, "Title", 2000, None).await;
        let r = create_review(&db, Some(&author), t.id, review_input(8)).await.unwrap();
        create_comment(&db, Some(&author), t.id, r.review.id, "self-reply".into()).await.unwrap();

        delete_review(&db, Some(&author), t.id, r.review.id).await.unwrap();
        assert!(comment::Entity::find().all(&db).await.unwrap().is_empty());
        assert!(matches!(
            list_comments(&db, t.id, r.review.id, PageRequest::default()).await,
            Err(DomainError::NotFound(_))
        ));
    }
}
