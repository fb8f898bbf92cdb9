use std::sync::Arc;
use std::time::Duration;

use foodshare_config::Settings;
use foodshare_services::{
    AccountService, AuthService, Daos, DocumentStore, DonationService, EffectQueue,
    GeocodingService, StatisticsCache,
    auth::{LogMailer, Mailer},
    stats::{Clock, SystemClock},
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub donations: Arc<DonationService>,
    pub daos: Daos,
    pub geocoding: Arc<GeocodingService>,
    pub effects: EffectQueue,
}

impl AppState {
    /// Production wiring: system clock and log-only mail delivery.
    pub fn new(store: Arc<dyn DocumentStore>, settings: Settings) -> anyhow::Result<Self> {
        Self::build(store, settings, Arc::new(LogMailer), Arc::new(SystemClock))
    }

    /// Must be called inside a Tokio runtime; it starts the effect worker.
    pub fn build(
        store: Arc<dyn DocumentStore>,
        settings: Settings,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let daos = Daos::new(store);
        let stats = Arc::new(StatisticsCache::new(
            Duration::from_secs(settings.statistics.cache_ttl_secs),
            clock.clone(),
        ));
        let effects = EffectQueue::spawn();
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));

        let accounts = Arc::new(AccountService::new(
            daos.users.clone(),
            auth.clone(),
            stats.clone(),
            mailer,
            clock,
            settings.auth.clone(),
        ));
        let donations = Arc::new(DonationService::new(daos.clone(), stats, effects.clone()));
        let geocoding = Arc::new(GeocodingService::new(settings.geocoding.clone())?);

        Ok(Self {
            settings,
            auth,
            accounts,
            donations,
            daos,
            geocoding,
            effects,
        })
    }
}
