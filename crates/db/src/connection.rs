use std::time::Duration;

use foodshare_config::{DatabaseSettings, Settings};
use mongodb::{Client, Database, options::ClientOptions};
use tracing::{info, warn};

const PING_ATTEMPTS: u32 = 5;

/// Connects to MongoDB and waits until the server answers a ping.
///
/// The server is retried with a doubling delay so the API can start
/// alongside its database container.
pub async fn connect(settings: &Settings) -> Result<Database, mongodb::error::Error> {
    let db_settings = &settings.database;
    let client = Client::with_options(client_options(db_settings).await?)?;

    let mut delay = Duration::from_millis(250);
    for attempt in 1..=PING_ATTEMPTS {
        match client
            .database("admin")
            .run_command(bson::doc! { "ping": 1 })
            .await
        {
            Ok(_) => break,
            Err(e) if attempt < PING_ATTEMPTS => {
                warn!(attempt, error = %e, "MongoDB not reachable yet, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    info!(db = %db_settings.name, "Connected to MongoDB");
    Ok(client.database(&db_settings.name))
}

async fn client_options(db: &DatabaseSettings) -> Result<ClientOptions, mongodb::error::Error> {
    let mut options = ClientOptions::parse(&db.url).await?;
    options.app_name = Some("foodshare".to_string());
    options.server_selection_timeout = Some(Duration::from_secs(5));
    if db.max_pool_size.is_some() {
        options.max_pool_size = db.max_pool_size;
    }
    if db.min_pool_size.is_some() {
        options.min_pool_size = db.min_pool_size;
    }
    Ok(options)
}
