//! Shared fixtures for the HTTP integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, header::AUTHORIZATION};
use axum_test::TestServer;
use chrono::Utc;
use domain::auth::{AuthService, SequenceCodeGenerator, TokenSigner};
use domain::mail::RecordingMailer;
use migration::{Migrator, MigratorTrait};
use model::Role;
use model::entities::user;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::router::create_router;
use crate::schemas::AppState;

pub const TEST_JWT_SECRET: &[u8] = b"integration-test-secret";

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Create AppState for testing, with predictable confirmation codes
/// (`code-0001`, `code-0002`, ...) and an in-memory outbox.
pub async fn setup_test_app_state() -> (AppState, RecordingMailer) {
    let db = setup_test_db().await;
    let mailer = RecordingMailer::new();
    let auth = AuthService::new(
        Arc::new(mailer.clone()),
        Arc::new(SequenceCodeGenerator::new()),
        TokenSigner::new(TEST_JWT_SECRET, chrono::Duration::hours(1)),
        "noreply@yamdb.local",
    );

    let state = AppState {
        db,
        auth,
        default_page_size: 10,
        request_timeout: Duration::from_secs(30),
    };
    (state, mailer)
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level comes from RUST_LOG and defaults to WARN.
fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// A running test server plus handles on its state and outbox
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub mailer: RecordingMailer,
    _tracing: tracing::subscriber::DefaultGuard,
}

impl TestApp {
    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Inserts an account with the given role directly.
    pub async fn seed_user(&self, username: &str, role: Role) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            bio: Set(String::new()),
            role: Set(role),
            confirmation_code: Set(None),
            date_joined: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("Failed to seed user")
    }

    pub fn token_for(&self, account: &user::Model) -> String {
        self.state
            .auth
            .signer()
            .issue(account)
            .expect("Failed to issue token")
            .token
    }

    /// Seeds an account and returns it with a bearer header for it.
    pub async fn login_as(&self, username: &str, role: Role) -> (user::Model, HeaderValue) {
        let account = self.seed_user(username, role).await;
        let header = bearer(&self.token_for(&account));
        (account, header)
    }
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).expect("Invalid header value")
}

pub fn auth_header() -> HeaderName {
    AUTHORIZATION
}

/// Create a test server around a fresh database
pub async fn setup_test_app() -> TestApp {
    let guard = init_test_tracing();
    let (state, mailer) = setup_test_app_state().await;
    let router = create_router(state.clone());
    let server = TestServer::new(router).expect("Failed to start test server");
    TestApp {
        server,
        state,
        mailer,
        _tracing: guard,
    }
}
