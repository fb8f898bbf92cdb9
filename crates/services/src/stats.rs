use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, TimeZone, Utc};
use foodshare_db::models::{Donation, DonationStatus, Role, User};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

/// Time source for cache expiry and month boundaries.
pub trait Clock: Send + Sync {
    fn now(&self) -> chrono::DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
pub struct ManualClock {
    now: Mutex<chrono::DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: chrono::DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> chrono::DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformStatistics {
    pub total_donations: u64,
    pub active_donations: u64,
    pub completed_donations: u64,
    pub cancelled_donations: u64,
    pub total_meals_served: u64,
    pub total_quantity_donated: u64,
    pub registered_users: u64,
    pub registered_ngos: u64,
    pub verified_ngos: u64,
    pub success_rate: u32,
    pub average_donation_size: u64,
    pub this_month_donations: u64,
    pub this_month_users: u64,
    pub computed_at: chrono::DateTime<Utc>,
    /// Set when a recomputation failed and this is the last good value.
    pub stale: bool,
}

/// Meals credited for a completed donation. Fixed policy table by category.
pub fn meals_for(category: &str, quantity: u32) -> u64 {
    let quantity = f64::from(quantity);
    let meals = match category.trim().to_lowercase().as_str() {
        "cooked food" | "prepared food" | "cooked" | "prepared" => quantity,
        "raw ingredients" | "raw" | "produce" | "fresh produce" => quantity * 0.5,
        "packaged food" | "packaged" | "canned" | "canned goods" => quantity * 2.0,
        _ => quantity * 1.5,
    };
    meals.floor() as u64
}

/// First instant of the current calendar month on the local clock.
pub fn local_month_start(now: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    let local = now.with_timezone(&Local);
    Local
        .with_ymd_and_hms(local.year(), local.month(), 1, 0, 0, 0)
        .earliest()
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Aggregates platform statistics from full record sets.
///
/// `users` is `None` when the user collection could not be read; user counts
/// then degrade to zero instead of failing the whole computation.
pub fn compute_statistics(
    donations: &[Donation],
    users: Option<&[User]>,
    now: chrono::DateTime<Utc>,
    month_start: chrono::DateTime<Utc>,
) -> PlatformStatistics {
    let month_start = bson::DateTime::from_chrono(month_start);

    let mut active = 0;
    let mut completed = 0;
    let mut cancelled = 0;
    let mut meals = 0;
    let mut quantity = 0;
    let mut this_month_donations = 0;

    for donation in donations {
        match donation.status {
            DonationStatus::Available | DonationStatus::Claimed | DonationStatus::OnTheWay => {
                active += 1
            }
            DonationStatus::Completed | DonationStatus::PickedUp => {
                completed += 1;
                meals += meals_for(&donation.category, donation.quantity);
                quantity += u64::from(donation.quantity);
            }
            DonationStatus::Cancelled => cancelled += 1,
        }
        if donation.created_at >= month_start {
            this_month_donations += 1;
        }
    }

    let users = users.unwrap_or_default();
    let registered_ngos = users.iter().filter(|u| u.role == Role::Ngo).count() as u64;
    let verified_ngos = users
        .iter()
        .filter(|u| u.role == Role::Ngo && u.is_verified)
        .count() as u64;
    let this_month_users = users
        .iter()
        .filter(|u| u.created_at >= month_start)
        .count() as u64;

    let total = donations.len() as u64;
    let success_rate = if total == 0 {
        0
    } else {
        (completed as f64 / total as f64 * 100.0).round() as u32
    };
    let average_donation_size = if completed == 0 {
        0
    } else {
        (quantity as f64 / completed as f64).round() as u64
    };

    PlatformStatistics {
        total_donations: total,
        active_donations: active,
        completed_donations: completed,
        cancelled_donations: cancelled,
        total_meals_served: meals,
        total_quantity_donated: quantity,
        registered_users: users.len() as u64,
        registered_ngos,
        verified_ngos,
        success_rate,
        average_donation_size,
        this_month_donations,
        this_month_users,
        computed_at: now,
        stale: false,
    }
}

struct CacheEntry {
    stats: PlatformStatistics,
    computed_at: chrono::DateTime<Utc>,
    fresh: bool,
}

/// Time-bounded cache of the last computed statistics.
///
/// `invalidate` only marks the entry stale; the value is kept so a failed
/// recomputation can still serve the last good result.
pub struct StatisticsCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: RwLock<Option<CacheEntry>>,
}

impl StatisticsCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: RwLock::new(None),
        }
    }

    pub fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }

    /// Cached value if it is fresh and younger than the TTL.
    pub fn get(&self) -> Option<PlatformStatistics> {
        let now = self.clock.now();
        let entry = self.entry.read();
        let entry = entry.as_ref()?;
        let age = (now - entry.computed_at).to_std().unwrap_or(Duration::ZERO);
        (entry.fresh && age < self.ttl).then(|| entry.stats.clone())
    }

    pub fn store(&self, stats: PlatformStatistics) {
        *self.entry.write() = Some(CacheEntry {
            computed_at: stats.computed_at,
            stats,
            fresh: true,
        });
    }

    pub fn invalidate(&self) {
        if let Some(entry) = self.entry.write().as_mut() {
            entry.fresh = false;
        }
    }

    /// Last successfully computed value, marked stale.
    pub fn last_good(&self) -> Option<PlatformStatistics> {
        self.entry.read().as_ref().map(|entry| PlatformStatistics {
            stale: true,
            ..entry.stats.clone()
        })
    }
}
