pub mod access;
pub mod auth;
pub mod browse;
pub mod dao;
pub mod donations;
pub mod effects;
pub mod geo;
pub mod geocoding;
pub mod stats;
pub mod store;
pub mod workflow;

pub use auth::{AccountService, AuthService};
pub use dao::*;
pub use donations::{DonationService, ServiceError};
pub use effects::EffectQueue;
pub use geocoding::GeocodingService;
pub use stats::StatisticsCache;
pub use store::{DocumentStore, MemoryStore, MongoStore};
