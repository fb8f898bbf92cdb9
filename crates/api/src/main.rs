use std::sync::Arc;

use foodshare_api::{build_router, state::AppState};
use foodshare_config::{Settings, StoreBackend};
use foodshare_db::{connect, indexes::ensure_indexes, models::User};
use foodshare_services::{DocumentStore, MemoryStore, MongoStore};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "foodshare_api=debug,foodshare_services=debug,foodshare_db=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting FoodShare API on {}:{}", settings.app.host, settings.app.port);

    let store: Arc<dyn DocumentStore> = match settings.database.backend {
        StoreBackend::Mongo => {
            let db = connect(&settings).await?;
            ensure_indexes(&db).await?;
            Arc::new(MongoStore::new(db))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::new().with_unique_index(User::COLLECTION, "email"))
        }
    };

    let app_state = AppState::new(store, settings.clone())?;
    let effects = app_state.effects.clone();
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining queued notifications");
    effects.flush().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
