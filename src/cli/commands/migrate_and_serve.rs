use anyhow::Result;
use tracing::{debug, info, trace};

use super::initdb::{connect, run_migrations};
use super::serve::run_server;
use crate::config::{AppConfig, build_app_state};

pub async fn migrate_and_serve(config: &AppConfig) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");
    debug!("Bind address: {}", config.bind_address);

    let db = connect(&config.database_url).await?;
    run_migrations(&db).await?;

    let state = build_app_state(db, config);
    debug!("Application state initialized successfully");

    run_server(state, &config.bind_address).await
}
