use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub auth: AuthSettings,
    pub geocoding: GeocodingSettings,
    pub statistics: StatisticsSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub backend: StoreBackend,
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub min_password_length: u64,
    /// Minimum spacing between verification / password-reset emails per address.
    pub email_cooldown_secs: u64,
    /// Lifetime of verification and password-reset links.
    pub link_ttl_secs: u64,
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocodingSettings {
    pub enabled: bool,
    pub reverse_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatisticsSettings {
    pub cache_ttl_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("FOODSHARE"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.backend", "mongo")?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "foodshare")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.refresh_token_ttl_secs", 604800)?
            .set_default("jwt.issuer", "foodshare")?
            .set_default("auth.min_password_length", 6)?
            .set_default("auth.email_cooldown_secs", 60)?
            .set_default("auth.link_ttl_secs", 86400)?
            .set_default("auth.public_base_url", "http://localhost:5173")?
            .set_default("geocoding.enabled", true)?
            .set_default(
                "geocoding.reverse_url",
                "https://nominatim.openstreetmap.org/reverse",
            )?
            .set_default("geocoding.user_agent", "foodshare/0.1")?
            .set_default("geocoding.timeout_secs", 5)?
            .set_default("statistics.cache_ttl_secs", 60)?
            .build()?;

        config.try_deserialize()
    }
}

