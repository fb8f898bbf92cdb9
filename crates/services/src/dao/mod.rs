pub mod base;
pub mod donation;
pub mod fallback;
pub mod notification;
pub mod status_history;
pub mod user;

pub use base::BaseDao;
pub use fallback::Fallback;

use std::sync::Arc;

use crate::store::DocumentStore;

/// Every DAO over one store, shared behind `Arc`s.
#[derive(Clone)]
pub struct Daos {
    pub donations: Arc<donation::DonationDao>,
    pub users: Arc<user::UserDao>,
    pub notifications: Arc<notification::NotificationDao>,
    pub history: Arc<status_history::StatusHistoryDao>,
}

impl Daos {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            donations: Arc::new(donation::DonationDao::new(store.clone())),
            users: Arc::new(user::UserDao::new(store.clone())),
            notifications: Arc::new(notification::NotificationDao::new(store.clone())),
            history: Arc::new(status_history::StatusHistoryDao::new(store)),
        }
    }
}
