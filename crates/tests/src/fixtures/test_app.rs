use std::net::SocketAddr;
use std::sync::Arc;

use foodshare_api::{build_router, state::AppState};
use foodshare_config::{
    AppSettings, AuthSettings, DatabaseSettings, GeocodingSettings, JwtSettings, Settings,
    StatisticsSettings, StoreBackend,
};
use foodshare_db::{connect, indexes::ensure_indexes, models::User};
use foodshare_services::{
    DocumentStore, EffectQueue, MemoryStore, MongoStore,
    auth::OutboxMailer,
    stats::SystemClock,
};
use mongodb::Database;
use tokio::net::TcpListener;

const MONGO_URL_VAR: &str = "FOODSHARE__DATABASE__URL";

/// Storage behind a running test application.
pub enum TestStore {
    Memory(Arc<MemoryStore>),
    /// A throwaway database, dropped with the app.
    Mongo(Database),
}

/// A running test application over its own store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub store: TestStore,
    pub mailer: Arc<OutboxMailer>,
    pub effects: EffectQueue,
    pub settings: Settings,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test server on a random port. Every app gets a fresh
    /// store, so tests are isolated without any external database.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = test_settings();
        mutator(&mut settings);

        let store = Arc::new(MemoryStore::new().with_unique_index(User::COLLECTION, "email"));
        Self::serve(store.clone(), TestStore::Memory(store), settings).await
    }

    /// Spawn a test server backed by MongoDB, or `None` when
    /// `FOODSHARE__DATABASE__URL` is not set.
    ///
    /// Each app gets a uniquely named database with all indexes in place.
    pub async fn spawn_mongo() -> Option<Self> {
        let url = std::env::var(MONGO_URL_VAR).ok().filter(|u| !u.is_empty())?;

        let mut settings = test_settings();
        settings.database.backend = StoreBackend::Mongo;
        settings.database.url = url;
        settings.database.name = format!("foodshare_test_{}", mongodb::bson::oid::ObjectId::new());
        settings.database.max_pool_size = Some(5);
        settings.database.min_pool_size = Some(1);

        let db = connect(&settings).await.expect("Failed to connect to MongoDB");
        ensure_indexes(&db).await.expect("Failed to create indexes");

        let store = Arc::new(MongoStore::new(db.clone()));
        Some(Self::serve(store, TestStore::Mongo(db), settings).await)
    }

    async fn serve(store: Arc<dyn DocumentStore>, backing: TestStore, settings: Settings) -> Self {
        let mailer = Arc::new(OutboxMailer::new());

        let app_state = AppState::build(
            store,
            settings.clone(),
            mailer.clone(),
            Arc::new(SystemClock),
        )
        .expect("Failed to create AppState");
        let effects = app_state.effects.clone();
        let app = build_router(app_state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            store: backing,
            mailer,
            effects,
            settings,
            client,
        }
    }

    /// The in-memory store, for fault injection and read counters.
    pub fn memory(&self) -> &MemoryStore {
        match &self.store {
            TestStore::Memory(store) => store.as_ref(),
            TestStore::Mongo(_) => panic!("fault injection needs the in-memory store"),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Waits for queued notifications and history writes.
    pub async fn settle(&self) {
        self.effects.flush().await;
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let TestStore::Mongo(db) = &self.store {
            let db = db.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = db.drop().await;
                });
            }
        }
    }
}

fn test_settings() -> Settings {
    Settings {
        app: AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
        database: DatabaseSettings {
            backend: StoreBackend::Memory,
            url: String::new(),
            name: "foodshare_test".to_string(),
            max_pool_size: None,
            min_pool_size: None,
        },
        jwt: JwtSettings {
            secret: "test-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_secs: 604800,
            issuer: "foodshare".to_string(),
        },
        auth: AuthSettings {
            min_password_length: 6,
            email_cooldown_secs: 60,
            link_ttl_secs: 3600,
            public_base_url: "http://localhost:5173".to_string(),
        },
        geocoding: GeocodingSettings {
            enabled: false,
            reverse_url: "http://127.0.0.1:9/reverse".to_string(),
            user_agent: "foodshare-tests".to_string(),
            timeout_secs: 1,
        },
        statistics: StatisticsSettings { cache_ttl_secs: 60 },
    }
}
