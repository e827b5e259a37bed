use anyhow::Result;
use tracing::{error, info, trace};

use super::initdb::connect;

pub async fn create_superuser(database_url: &str, username: &str, email: &str) -> Result<()> {
    trace!("Entering create_superuser function");
    let db = connect(database_url).await?;

    match domain::users::create_superuser(&db, username, email).await {
        Ok(account) => {
            info!(
                "Superuser '{}' <{}> is ready; sign up with the same username and email to receive a confirmation code",
                account.username, account.email
            );
            Ok(())
        }
        Err(e) => {
            error!("Failed to create superuser '{}': {}", username, e);
            Err(e.into())
        }
    }
}
