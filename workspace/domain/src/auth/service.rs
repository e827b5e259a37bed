use std::sync::Arc;

use chrono::Utc;
use model::entities::user;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use super::codes::CodeGenerator;
use super::tokens::{IssuedToken, TokenSigner};
use crate::error::{DomainError, Result};
use crate::mail::{Email, Mailer};
use crate::policy::Principal;
use crate::validation::{validate_email, validate_username};

pub const CONFIRMATION_SUBJECT: &str = "Confirmation code";

/// Echo of an accepted signup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub username: String,
    pub email: String,
}

/// Signup and token exchange. Collaborators are injected so tests can swap in
/// deterministic codes and an in-memory outbox.
#[derive(Debug, Clone)]
pub struct AuthService {
    mailer: Arc<dyn Mailer>,
    codes: Arc<dyn CodeGenerator>,
    signer: TokenSigner,
    mail_from: String,
}

impl AuthService {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        codes: Arc<dyn CodeGenerator>,
        signer: TokenSigner,
        mail_from: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            codes,
            signer,
            mail_from: mail_from.into(),
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Resolves a bearer token to the caller it was issued for.
    pub fn authenticate(&self, token: &str) -> Result<Principal> {
        self.signer.verify(token).map(|claims| claims.principal())
    }

    /// Gets or creates the account for `(username, email)`, replaces its
    /// confirmation code and mails the new one.
    ///
    /// The whole operation runs in one transaction: if the email cannot be
    /// delivered nothing is persisted and the error is returned.
    #[instrument(skip(self, db))]
    pub async fn request_sign_up(
        &self,
        db: &DatabaseConnection,
        username: &str,
        email: &str,
    ) -> Result<SignUp> {
        validate_username(username)?;
        validate_email(email)?;

        let txn = db.begin().await?;

        let by_username = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&txn)
            .await?;
        let by_email = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&txn)
            .await?;

        let account = match (by_username, by_email) {
            (Some(existing), _) if existing.email != email => {
                warn!("Signup rejected: username '{}' belongs to another email", username);
                return Err(DomainError::Conflict(
                    "A user with that username already exists".to_string(),
                ));
            }
            (_, Some(existing)) if existing.username != username => {
                warn!("Signup rejected: email '{}' belongs to another user", email);
                return Err(DomainError::Conflict(
                    "A user with that email already exists".to_string(),
                ));
            }
            (Some(existing), _) => {
                debug!("Re-issuing confirmation code for existing user {}", existing.id);
                existing
            }
            (None, _) => create_account(&txn, username, email).await?,
        };

        let code = self.codes.generate();
        let user_id = account.id;
        let mut active: user::ActiveModel = account.into();
        active.confirmation_code = Set(Some(code.clone()));
        active.update(&txn).await?;

        let message = Email {
            from: self.mail_from.clone(),
            to: email.to_string(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            body: format!(
                "Hello {username},\n\nYour confirmation code: {code}\n\n\
                 Exchange it for an access token at /api/v1/auth/token."
            ),
        };
        self.mailer.send(&message).await.map_err(|err| {
            warn!("Confirmation email to {} failed: {}", email, err);
            DomainError::from(err)
        })?;

        txn.commit().await?;
        info!("Confirmation code sent to user {}", user_id);

        Ok(SignUp {
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    /// Trades a valid confirmation code for an access token. The code is
    /// consumed on success and left in place on failure.
    #[instrument(skip(self, db, confirmation_code))]
    pub async fn exchange_token(
        &self,
        db: &DatabaseConnection,
        username: &str,
        confirmation_code: &str,
    ) -> Result<IssuedToken> {
        let account = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await?
            .ok_or_else(|| DomainError::not_found("User", username))?;

        let matches = matches!(
            account.confirmation_code.as_deref(),
            Some(stored) if !stored.is_empty() && stored == confirmation_code
        );
        if !matches {
            warn!("Invalid confirmation code for user {}", account.id);
            return Err(DomainError::InvalidCredentials);
        }

        // Compare-and-clear: a concurrent exchange of the same code loses here.
        let cleared = user::Entity::update_many()
            .col_expr(
                user::Column::ConfirmationCode,
                Expr::value(Option::<String>::None),
            )
            .filter(user::Column::Id.eq(account.id))
            .filter(user::Column::ConfirmationCode.eq(confirmation_code))
            .exec(db)
            .await?;
        if cleared.rows_affected == 0 {
            warn!("Confirmation code for user {} was consumed concurrently", account.id);
            return Err(DomainError::InvalidCredentials);
        }

        let issued = self.signer.issue(&account)?;
        info!("Issued access token for user {} ({})", account.id, account.role);
        Ok(issued)
    }
}

async fn create_account<C: ConnectionTrait>(
    db: &C,
    username: &str,
    email: &str,
) -> Result<user::Model> {
    let account = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        bio: Set(String::new()),
        role: Set(Default::default()),
        confirmation_code: Set(None),
        date_joined: Set(Utc::now()),
        ..Default::default()
    };
    let created = account.insert(db).await.map_err(|err| {
        DomainError::from_write(err, || "A user with that username or email already exists".to_string())
    })?;
    debug!("Created user {} with id {}", created.username, created.id);
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SequenceCodeGenerator;
    use crate::mail::RecordingMailer;
    use crate::testing::setup_test_db;
    use chrono::Duration;
    use model::Role;

    fn service(mailer: &RecordingMailer) -> AuthService {
        AuthService::new(
            Arc::new(mailer.clone()),
            Arc::new(SequenceCodeGenerator::new()),
            TokenSigner::new(b"test-secret", Duration::hours(1)),
            "noreply@yamdb.local",
        )
    }

    async fn stored_code(db: &DatabaseConnection, username: &str) -> Option<String> {
        user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .confirmation_code
    }

    #[tokio::test]
    async fn test_sign_up_creates_user_and_sends_code() {
        let db = setup_test_db().await;
        let mailer = RecordingMailer::new();
        let auth = service(&mailer);

        let echo = auth.request_sign_up(&db, "alice", "alice@example.com").await.unwrap();
        assert_eq!(echo, SignUp { username: "alice".into(), email: "alice@example.com".into() });

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert_eq!(sent[0].subject, CONFIRMATION_SUBJECT);
        assert!(sent[0].body.contains("code-0001"));

        let account = user::Entity::find().one(&db).await.unwrap().unwrap();
        assert_eq!(account.role, Role::User);
        assert_eq!(account.confirmation_code.as_deref(), Some("code-0001"));
    }

    #[tokio::test]
    async fn test_repeated_sign_up_reissues_code_for_same_row() {
        let db = setup_test_db().await;
        let mailer = RecordingMailer::new();
        let auth = service(&mailer);

        auth.request_sign_up(&db, "alice", "alice@example.com").await.unwrap();
        auth.request_sign_up(&db, "alice", "alice@example.com").await.unwrap();

        assert_eq!(user::Entity::find().all(&db).await.unwrap().len(), 1);
        assert_eq!(mailer.sent().len(), 2);
        assert_eq!(stored_code(&db, "alice").await.as_deref(), Some("code-0002"));

        // The first code was superseded.
        assert!(matches!(
            auth.exchange_token(&db, "alice", "code-0001").await,
            Err(DomainError::InvalidCredentials)
        ));
        assert!(auth.exchange_token(&db, "alice", "code-0002").await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_up_conflicts() {
        let db = setup_test_db().await;
        let mailer = RecordingMailer::new();
        let auth = service(&mailer);
        auth.request_sign_up(&db, "alice", "alice@example.com").await.unwrap();

        let taken_email = auth.request_sign_up(&db, "bob", "alice@example.com").await;
        assert!(matches!(taken_email, Err(DomainError::Conflict(_))));

        let taken_name = auth.request_sign_up(&db, "alice", "other@example.com").await;
        assert!(matches!(taken_name, Err(DomainError::Conflict(_))));

        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let db = setup_test_db().await;
        let mailer = RecordingMailer::new();
        let auth = service(&mailer);

        for (username, email) in [("me", "me@example.com"), ("bad name", "x@example.com"), ("bob", "nope")] {
            let result = auth.request_sign_up(&db, username, email).await;
            assert!(matches!(result, Err(DomainError::Validation { .. })), "{username} {email}");
        }
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_rolls_back() {
        let db = setup_test_db().await;
        let mailer = RecordingMailer::new();
        mailer.set_failing(true);
        let auth = service(&mailer);

        let result = auth.request_sign_up(&db, "alice", "alice@example.com").await;
        assert!(matches!(result, Err(DomainError::Delivery(_))));
        assert!(user::Entity::find().one(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exchange_token_is_single_use() {
        let db = setup_test_db().await;
        let mailer = RecordingMailer::new();
        let auth = service(&mailer);
        auth.request_sign_up(&db, "alice", "alice@example.com").await.unwrap();

        let issued = auth.exchange_token(&db, "alice", "code-0001").await.unwrap();
        let principal = auth.authenticate(&issued.token).unwrap();
        assert_eq!(principal.username, "alice");
        assert_eq!(principal.role, Role::User);

        assert_eq!(stored_code(&db, "alice").await, None);
        assert!(matches!(
            auth.exchange_token(&db, "alice", "code-0001").await,
            Err(DomainError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_stored_code() {
        let db = setup_test_db().await;
        let mailer = RecordingMailer::new();
        let auth = service(&mailer);
        auth.request_sign_up(&db, "alice", "alice@example.com").await.unwrap();

        for attempt in ["wrong", ""] {
            assert!(matches!(
                auth.exchange_token(&db, "alice", attempt).await,
                Err(DomainError::InvalidCredentials)
            ));
        }
        assert_eq!(stored_code(&db, "alice").await.as_deref(), Some("code-0001"));
        assert!(auth.exchange_token(&db, "alice", "code-0001").await.is_ok());
    }

    #[tokio::test]
    async fn test_exchange_for_unknown_user() {
        let db = setup_test_db().await;
        let auth = service(&RecordingMailer::new());
        assert!(matches!(
            auth.exchange_token(&db, "ghost", "code-0001").await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_user_without_code_cannot_exchange() {
        let db = setup_test_db().await;
        let auth = service(&RecordingMailer::new());
        crate::testing::create_user_row(&db, "admin", Role::Admin).await;
        assert!(matches!(
            auth.exchange_token(&db, "admin", "").await,
            Err(DomainError::InvalidCredentials)
        ));
    }
}
