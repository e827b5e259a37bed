use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ::config::{Config, Environment, File, FileFormat, FileSourceFile};
use domain::auth::{AuthService, CodeGenerator, RandomCodeGenerator, TokenSigner};
use domain::mail::{ConsoleMailer, FileMailer, Mailer};
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use tracing::{debug, error, info, trace, warn};

use crate::schemas::AppState;

/// Where confirmation emails go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// Log messages through tracing
    Console,
    /// Write one file per message under `mail_dir`
    File,
}

/// Application settings, layered from defaults, an optional TOML file,
/// `YAMDB_*` environment variables and command line flags.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    /// HMAC secret for access tokens. A random one is used when unset.
    pub jwt_secret: Option<String>,
    pub token_ttl_seconds: i64,
    pub confirmation_code_length: usize,
    pub mail_backend: MailBackend,
    pub mail_dir: String,
    pub mail_from: String,
    pub request_timeout_seconds: u64,
    pub default_page_size: u64,
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
}

impl AppConfig {
    /// Loads settings. `config_path` names a file that must exist; without it
    /// `yamdb.toml` in the working directory is used when present.
    pub fn load(config_path: Option<&str>, overrides: ConfigOverrides) -> Result<Self> {
        trace!("Loading configuration");
        dotenvy::dotenv().ok();

        let file = match config_path {
            Some(path) => {
                debug!("Using configuration file {}", path);
                File::with_name(path).required(true)
            }
            None => File::with_name("yamdb").required(false),
        };
        Self::from_sources(Some(file), Environment::with_prefix("YAMDB"), overrides)
    }

    fn from_sources(
        file: Option<File<FileSourceFile, FileFormat>>,
        environment: Environment,
        overrides: ConfigOverrides,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("database_url", "sqlite://yamdb.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("token_ttl_seconds", 86_400_i64)?
            .set_default("confirmation_code_length", 12_i64)?
            .set_default("mail_backend", "console")?
            .set_default("mail_dir", "sent_emails")?
            .set_default("mail_from", "noreply@yamdb.local")?
            .set_default("request_timeout_seconds", 30_i64)?
            .set_default("default_page_size", 10_i64)?;
        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        let settings = builder
            .add_source(environment)
            .set_override_option("database_url", overrides.database_url)?
            .set_override_option("bind_address", overrides.bind_address)?
            .build()
            .context("Failed to read configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        debug!(
            "Configuration loaded: database_url={}, bind_address={}, mail_backend={:?}",
            config.database_url, config.bind_address, config.mail_backend
        );
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn mailer(&self) -> Arc<dyn Mailer> {
        match self.mail_backend {
            MailBackend::Console => Arc::new(ConsoleMailer),
            MailBackend::File => Arc::new(FileMailer::new(PathBuf::from(&self.mail_dir))),
        }
    }

    fn signer(&self) -> TokenSigner {
        let secret = match self.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret.to_string(),
            None => {
                warn!("No jwt_secret configured; using a random secret, tokens will not survive a restart");
                RandomCodeGenerator::new(48).generate()
            }
        };
        TokenSigner::new(
            secret.as_bytes(),
            chrono::Duration::seconds(self.token_ttl_seconds),
        )
    }
}

/// Builds the shared state around an existing connection.
pub fn build_app_state(db: DatabaseConnection, config: &AppConfig) -> AppState {
    let auth = AuthService::new(
        config.mailer(),
        Arc::new(RandomCodeGenerator::new(config.confirmation_code_length)),
        config.signer(),
        config.mail_from.clone(),
    );
    AppState {
        db,
        auth,
        default_page_size: config.default_page_size,
        request_timeout: config.request_timeout(),
    }
}

/// Connects to the configured database and builds the shared state.
pub async fn initialize_app_state(config: &AppConfig) -> Result<AppState> {
    info!("Connecting to database: {}", config.database_url);
    let db = match Database::connect(&config.database_url).await {
        Ok(connection) => {
            debug!("Database connection established");
            connection
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", config.database_url, e);
            return Err(e.into());
        }
    };
    Ok(build_app_state(db, config))
}
