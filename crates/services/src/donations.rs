use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bson::{DateTime, oid::ObjectId};
use foodshare_db::models::{
    Donation, DonationStatus, NotificationType, Role, StatusHistory, User,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::browse::{BrowseFilter, BrowseItem, browse};
use crate::dao::Daos;
use crate::dao::base::DaoError;
use crate::dao::donation::{ClaimRecord, DonationPatch, NewDonation};
use crate::effects::EffectQueue;
use crate::stats::{PlatformStatistics, StatisticsCache, compute_statistics, local_month_start};
use crate::workflow::{Actor, DonationAction, WorkflowError, donor_notice, plan_transition};

pub const MAX_IMAGES: usize = 5;
pub const MAX_IMAGE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Dao(#[from] DaoError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Donation operations: listing, browsing, the claim/status workflow and
/// platform statistics. Primary writes are awaited; notifications and status
/// history are handed to the [`EffectQueue`].
pub struct DonationService {
    daos: Daos,
    stats: Arc<StatisticsCache>,
    effects: EffectQueue,
}

impl DonationService {
    pub fn new(daos: Daos, stats: Arc<StatisticsCache>, effects: EffectQueue) -> Self {
        Self {
            daos,
            stats,
            effects,
        }
    }

    pub fn effects(&self) -> &EffectQueue {
        &self.effects
    }

    pub async fn create_donation(&self, donor: &User, input: NewDonation) -> ServiceResult<Donation> {
        if donor.role != Role::Donor {
            return Err(ServiceError::Forbidden(
                "Only donor accounts can list donations".to_string(),
            ));
        }
        let donor_id = donor.id.ok_or(DaoError::NotFound)?;
        validate_new_donation(&input, DateTime::now())?;

        let donation = self
            .daos
            .donations
            .create(donor_id, donor.display_name.clone(), donor.phone.clone(), input)
            .await?;
        self.stats.invalidate();
        info!(donation_id = ?donation.id, %donor_id, "donation listed");

        self.fan_out_new_donation(&donation);
        Ok(donation)
    }

    /// Notifies every NGO about a new available donation. No geographic or
    /// preference filtering is applied.
    fn fan_out_new_donation(&self, donation: &Donation) {
        let users = Arc::clone(&self.daos.users);
        let notifications = Arc::clone(&self.daos.notifications);
        let donation_id = donation.id;
        let message = format!(
            "{} listed {} {} of {}.",
            donation.donor_name, donation.quantity, donation.unit, donation.food_name
        );

        self.effects.enqueue("notify_ngos_new_donation", async move {
            let ngos = users.find_by_role(Role::Ngo).await?;
            for ngo_id in ngos.iter().filter_map(|u| u.id) {
                if let Err(e) = notifications
                    .create(
                        ngo_id,
                        "New Donation Available",
                        message.clone(),
                        NotificationType::NewDonation,
                        donation_id,
                    )
                    .await
                {
                    warn!(%ngo_id, error = %e, "failed to notify NGO of new donation");
                }
            }
            Ok(())
        });
    }

    pub async fn get_donation(&self, id: ObjectId) -> ServiceResult<Donation> {
        Ok(self.daos.donations.find_by_id(id).await?)
    }

    pub async fn update_donation(
        &self,
        id: ObjectId,
        editor: &User,
        patch: DonationPatch,
    ) -> ServiceResult<Donation> {
        let mut donation = self.daos.donations.find_by_id(id).await?;
        if Some(donation.donor_id) != editor.id {
            return Err(ServiceError::Forbidden(
                "Only the donor who listed this donation can edit it".to_string(),
            ));
        }
        if donation.status != DonationStatus::Available {
            return Err(ServiceError::Validation(
                "Only available donations can be edited".to_string(),
            ));
        }
        if patch.is_empty() {
            return Ok(donation);
        }

        // The merged listing must still pass the create-time checks.
        patch.apply_to(&mut donation);
        validate_listing(&ListingFields::from(&donation), DateTime::now())?;
        if patch.images.is_some() {
            validate_images(&donation.images)?;
        }

        let updated_at = self.daos.donations.update(id, &patch).await?;
        self.stats.invalidate();

        donation.updated_at = updated_at;
        Ok(donation)
    }

    /// Deletes a donation that nobody has claimed yet.
    pub async fn delete_donation(&self, id: ObjectId, donor: &User) -> ServiceResult<()> {
        let donation = self.daos.donations.find_by_id(id).await?;
        if Some(donation.donor_id) != donor.id {
            return Err(ServiceError::Forbidden(
                "Only the donor who listed this donation can delete it".to_string(),
            ));
        }
        if donation.status != DonationStatus::Available {
            return Err(ServiceError::Validation(
                "Claimed donations cannot be deleted; cancel instead".to_string(),
            ));
        }
        self.daos.donations.delete(id).await?;
        self.stats.invalidate();
        Ok(())
    }

    pub async fn get_available_donations(&self) -> ServiceResult<Vec<Donation>> {
        Ok(self.daos.donations.find_available().await?)
    }

    pub async fn get_donations_by_claimer(&self, claimer_id: ObjectId) -> ServiceResult<Vec<Donation>> {
        Ok(self.daos.donations.find_by_claimer(claimer_id).await?)
    }

    pub async fn get_donations_by_donor(&self, donor_id: ObjectId) -> ServiceResult<Vec<Donation>> {
        Ok(self.daos.donations.find_by_donor(donor_id).await?)
    }

    /// Available donations run through the browse pipeline for one viewer.
    pub async fn browse(&self, viewer: &User, filter: &BrowseFilter) -> ServiceResult<Vec<BrowseItem>> {
        let available = self.get_available_donations().await?;
        Ok(browse(available, filter, viewer.coordinates(), DateTime::now()))
    }

    pub async fn get_status_history(&self, donation_id: ObjectId) -> ServiceResult<Vec<StatusHistory>> {
        Ok(self.daos.history.find_for_donation(donation_id).await?)
    }

    /// Claims an available donation for an NGO.
    ///
    /// Only the claim write decides success. The donor notification and the
    /// history entry are queued and their failures never reach the caller.
    pub async fn claim_donation(&self, id: ObjectId, ngo: &User) -> ServiceResult<Donation> {
        let actor = actor_for(ngo)?;
        let mut donation = self.daos.donations.find_by_id(id).await?;
        plan_transition(&donation, &actor, DonationAction::Claim)?;

        let claim = ClaimRecord {
            claimed_by: actor.id,
            claimed_by_name: actor.name.clone(),
            claimed_at: DateTime::now(),
        };
        if !self.daos.donations.record_claim(id, &claim).await? {
            return Err(ServiceError::Conflict(
                "This donation is no longer available".to_string(),
            ));
        }
        self.stats.invalidate();
        info!(donation_id = %id, ngo_id = %actor.id, "donation claimed");

        donation.status = DonationStatus::Claimed;
        donation.claimed_by = Some(claim.claimed_by);
        donation.claimed_by_name = Some(claim.claimed_by_name);
        donation.claimed_at = Some(claim.claimed_at);
        donation.updated_at = claim.claimed_at;

        self.record_history(id, DonationStatus::Claimed, &actor, "Donation claimed".to_string());
        self.notify_donor(&donation, &actor);
        Ok(donation)
    }

    /// Applies a workflow action on behalf of `user`.
    pub async fn apply_action(
        &self,
        id: ObjectId,
        user: &User,
        action: DonationAction,
        notes: Option<String>,
    ) -> ServiceResult<Donation> {
        if action == DonationAction::Claim {
            return self.claim_donation(id, user).await;
        }
        let actor = actor_for(user)?;
        let donation = self.daos.donations.find_by_id(id).await?;
        let target = plan_transition(&donation, &actor, action)?;
        self.update_donation_status_and_notify(
            id,
            target,
            actor.id,
            actor.name,
            notes.unwrap_or_default(),
        )
        .await
    }

    /// Writes a new status, then queues a history entry and a donor
    /// notification. The side effects are not transactional with the write.
    pub async fn update_donation_status_and_notify(
        &self,
        id: ObjectId,
        new_status: DonationStatus,
        actor_id: ObjectId,
        actor_name: String,
        notes: String,
    ) -> ServiceResult<Donation> {
        let mut donation = self.daos.donations.find_by_id(id).await?;
        if new_status.requires_claimer() && donation.claimed_by.is_none() {
            return Err(ServiceError::Validation(format!(
                "A donation must be claimed before it can be {new_status}"
            )));
        }

        let updated_at = self.daos.donations.write_status(id, new_status).await?;
        self.stats.invalidate();
        info!(donation_id = %id, status = %new_status, %actor_id, "donation status changed");

        donation.status = new_status;
        donation.updated_at = updated_at;
        if !new_status.requires_claimer() {
            donation.claimed_by = None;
            donation.claimed_by_name = None;
            donation.claimed_at = None;
        }

        let actor = Actor {
            id: actor_id,
            role: if actor_id == donation.donor_id { Role::Donor } else { Role::Ngo },
            name: actor_name,
        };
        self.record_history(id, new_status, &actor, notes);
        self.notify_donor(&donation, &actor);
        Ok(donation)
    }

    fn record_history(&self, donation_id: ObjectId, status: DonationStatus, actor: &Actor, notes: String) {
        let history = Arc::clone(&self.daos.history);
        let actor_id = actor.id;
        let actor_name = actor.name.clone();
        self.effects.enqueue("append_status_history", async move {
            history
                .append(donation_id, status, actor_id, actor_name, notes)
                .await
                .map(|_| ())
        });
    }

    /// Tells the donor about a status change made by someone else.
    fn notify_donor(&self, donation: &Donation, actor: &Actor) {
        if actor.id == donation.donor_id {
            return;
        }
        let Some(notice) = donor_notice(donation.status, &donation.food_name, &actor.name) else {
            return;
        };
        let notifications = Arc::clone(&self.daos.notifications);
        let donor_id = donation.donor_id;
        let donation_id = donation.id;
        self.effects.enqueue("notify_donor_status", async move {
            notifications
                .create(
                    donor_id,
                    notice.title,
                    notice.message,
                    notice.notification_type,
                    donation_id,
                )
                .await
                .map(|_| ())
        });
    }

    /// Platform statistics, served from the cache while it is fresh.
    ///
    /// A failed recomputation falls back to the last good value marked stale.
    pub async fn get_statistics(&self, use_cache: bool) -> ServiceResult<PlatformStatistics> {
        if use_cache {
            if let Some(cached) = self.stats.get() {
                return Ok(cached);
            }
        }

        match self.compute_statistics().await {
            Ok(stats) => {
                self.stats.store(stats.clone());
                Ok(stats)
            }
            Err(e) => {
                warn!(error = %e, "statistics computation failed");
                self.stats.last_good().ok_or(ServiceError::Dao(e))
            }
        }
    }

    async fn compute_statistics(&self) -> Result<PlatformStatistics, DaoError> {
        let donations = self.daos.donations.find_all().await?;
        let users = match self.daos.users.find_all().await {
            Ok(users) => Some(users),
            Err(e) => {
                warn!(error = %e, "user scan failed, user statistics degrade to zero");
                None
            }
        };
        let now = self.stats.now();
        Ok(compute_statistics(
            &donations,
            users.as_deref(),
            now,
            local_month_start(now),
        ))
    }
}

fn actor_for(user: &User) -> ServiceResult<Actor> {
    Actor::from_user(user).ok_or_else(|| ServiceError::Validation("Profile is not loaded".to_string()))
}

/// Fields checked on every write of a listing, new or edited.
struct ListingFields<'a> {
    food_name: &'a str,
    quantity: u32,
    unit: &'a str,
    category: &'a str,
    pickup_start: DateTime,
    pickup_end: DateTime,
    expiry_time: DateTime,
}

impl<'a> From<&'a NewDonation> for ListingFields<'a> {
    fn from(d: &'a NewDonation) -> Self {
        Self {
            food_name: &d.food_name,
            quantity: d.quantity,
            unit: &d.unit,
            category: &d.category,
            pickup_start: d.pickup_start,
            pickup_end: d.pickup_end,
            expiry_time: d.expiry_time,
        }
    }
}

impl<'a> From<&'a Donation> for ListingFields<'a> {
    fn from(d: &'a Donation) -> Self {
        Self {
            food_name: &d.food_name,
            quantity: d.quantity,
            unit: &d.unit,
            category: &d.category,
            pickup_start: d.pickup_start,
            pickup_end: d.pickup_end,
            expiry_time: d.expiry_time,
        }
    }
}

fn validate_new_donation(input: &NewDonation, now: DateTime) -> ServiceResult<()> {
    validate_listing(&ListingFields::from(input), now)?;
    validate_images(&input.images)
}

fn validate_listing(input: &ListingFields<'_>, now: DateTime) -> ServiceResult<()> {
    if input.food_name.trim().is_empty() {
        return Err(ServiceError::Validation("Food name is required".to_string()));
    }
    if input.quantity == 0 {
        return Err(ServiceError::Validation("Quantity must be at least 1".to_string()));
    }
    if input.unit.trim().is_empty() || input.category.trim().is_empty() {
        return Err(ServiceError::Validation("Unit and category are required".to_string()));
    }
    if input.pickup_end <= input.pickup_start {
        return Err(ServiceError::Validation(
            "Pickup window must end after it starts".to_string(),
        ));
    }
    if input.expiry_time <= now {
        return Err(ServiceError::Validation("Expiry time must be in the future".to_string()));
    }
    Ok(())
}

/// Images are base64 data URLs embedded on the record.
fn validate_images(images: &[String]) -> ServiceResult<()> {
    if images.len() > MAX_IMAGES {
        return Err(ServiceError::Validation(format!(
            "At most {MAX_IMAGES} images can be attached"
        )));
    }
    for image in images {
        let payload = image
            .strip_prefix("data:image/")
            .and_then(|rest| rest.split_once(";base64,"))
            .map(|(_, data)| data)
            .ok_or_else(|| ServiceError::Validation("Images must be base64 data URLs".to_string()))?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|_| ServiceError::Validation("Image payload is not valid base64".to_string()))?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ServiceError::Validation("Each image must be at most 1 MB".to_string()));
        }
    }
    Ok(())
}
