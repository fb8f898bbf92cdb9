use std::sync::Arc;

use bson::{DateTime, Document, doc, oid::ObjectId};
use foodshare_db::models::{Donation, DonationStatus};
use serde::{Deserialize, Serialize};

use super::base::{BaseDao, DaoError, DaoResult};
use super::fallback::Fallback;
use crate::store::DocumentStore;

/// Fields a donor supplies when listing food.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDonation {
    pub food_name: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    pub unit: String,
    pub category: String,
    #[serde(default)]
    pub allergens: Vec<String>,
    pub expiry_time: DateTime,
    pub pickup_start: DateTime,
    pub pickup_end: DateTime,
    #[serde(default)]
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub images: Vec<String>,
    pub special_instructions: Option<String>,
}

/// Partial update of the donor-editable fields. Status and claim fields are
/// only written through the status workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DonationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergens: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_start: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_end: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl DonationPatch {
    pub fn is_empty(&self) -> bool {
        bson::to_document(self).map(|d| d.is_empty()).unwrap_or(true)
    }

    /// Applies the patch to an in-memory copy.
    pub fn apply_to(&self, donation: &mut Donation) {
        let patch = self.clone();
        if let Some(v) = patch.food_name {
            donation.food_name = v;
        }
        if let Some(v) = patch.description {
            donation.description = v;
        }
        if let Some(v) = patch.quantity {
            donation.quantity = v;
        }
        if let Some(v) = patch.unit {
            donation.unit = v;
        }
        if let Some(v) = patch.category {
            donation.category = v;
        }
        if let Some(v) = patch.allergens {
            donation.allergens = v;
        }
        if let Some(v) = patch.expiry_time {
            donation.expiry_time = v;
        }
        if let Some(v) = patch.pickup_start {
            donation.pickup_start = v;
        }
        if let Some(v) = patch.pickup_end {
            donation.pickup_end = v;
        }
        if let Some(v) = patch.address {
            donation.address = v;
        }
        if patch.latitude.is_some() {
            donation.latitude = patch.latitude;
        }
        if patch.longitude.is_some() {
            donation.longitude = patch.longitude;
        }
        if let Some(v) = patch.images {
            donation.images = v;
        }
        if patch.special_instructions.is_some() {
            donation.special_instructions = patch.special_instructions;
        }
    }
}

/// Claim fields written together with the `claimed` status.
#[derive(Debug, Clone)]
pub struct ClaimRecord {
    pub claimed_by: ObjectId,
    pub claimed_by_name: String,
    pub claimed_at: DateTime,
}

pub struct DonationDao {
    pub base: BaseDao<Donation>,
}

impl DonationDao {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            base: BaseDao::new(store, Donation::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        donor_id: ObjectId,
        donor_name: String,
        donor_phone: String,
        input: NewDonation,
    ) -> DaoResult<Donation> {
        let now = DateTime::now();
        let mut donation = Donation {
            id: None,
            donor_id,
            donor_name,
            donor_phone,
            food_name: input.food_name,
            description: input.description,
            quantity: input.quantity,
            unit: input.unit,
            category: input.category,
            allergens: input.allergens,
            expiry_time: input.expiry_time,
            pickup_start: input.pickup_start,
            pickup_end: input.pickup_end,
            address: input.address,
            latitude: input.latitude,
            longitude: input.longitude,
            images: input.images,
            special_instructions: input.special_instructions,
            status: DonationStatus::Available,
            claimed_by: None,
            claimed_by_name: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&donation).await?;
        donation.id = Some(id);
        Ok(donation)
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<Donation> {
        self.base.find_by_id(id).await
    }

    /// Writes the patched fields and a fresh `updated_at`. Last writer wins.
    pub async fn update(&self, id: ObjectId, patch: &DonationPatch) -> DaoResult<DateTime> {
        let mut set = bson::to_document(patch)?;
        let now = DateTime::now();
        set.insert("updated_at", now);

        if !self.base.update_by_id(id, doc! { "$set": set }).await? {
            return Err(DaoError::NotFound);
        }
        Ok(now)
    }

    /// Writes a new status. Leaving a claimed state for `cancelled` clears the
    /// claim fields so the claimer invariant keeps holding.
    pub async fn write_status(&self, id: ObjectId, status: DonationStatus) -> DaoResult<DateTime> {
        let now = DateTime::now();
        let mut set = doc! {
            "status": status.as_str(),
            "updated_at": now,
        };
        if !status.requires_claimer() {
            set.insert("claimed_by", bson::Bson::Null);
            set.insert("claimed_by_name", bson::Bson::Null);
            set.insert("claimed_at", bson::Bson::Null);
        }

        if !self.base.update_by_id(id, doc! { "$set": set }).await? {
            return Err(DaoError::NotFound);
        }
        Ok(now)
    }

    /// Records a claim, but only while the donation is still `available`.
    /// Returns `false` when another writer got there first.
    pub async fn record_claim(&self, id: ObjectId, claim: &ClaimRecord) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "_id": id, "status": DonationStatus::Available.as_str() },
                doc! {
                    "$set": {
                        "status": DonationStatus::Claimed.as_str(),
                        "claimed_by": claim.claimed_by,
                        "claimed_by_name": claim.claimed_by_name.clone(),
                        "claimed_at": claim.claimed_at,
                        "updated_at": claim.claimed_at,
                    }
                },
            )
            .await
    }

    pub async fn delete(&self, id: ObjectId) -> DaoResult<bool> {
        Ok(self.base.hard_delete(doc! { "_id": id }).await? > 0)
    }

    pub async fn find_all(&self) -> DaoResult<Vec<Donation>> {
        self.base.find_all().await
    }

    pub async fn find_available(&self) -> DaoResult<Vec<Donation>> {
        self.newest_first(
            "available_donations",
            doc! { "status": DonationStatus::Available.as_str() },
            |d| d.status == DonationStatus::Available,
        )
        .await
    }

    pub async fn find_by_claimer(&self, claimer_id: ObjectId) -> DaoResult<Vec<Donation>> {
        self.newest_first(
            "donations_by_claimer",
            doc! { "claimed_by": claimer_id },
            move |d| d.claimed_by == Some(claimer_id),
        )
        .await
    }

    pub async fn find_by_donor(&self, donor_id: ObjectId) -> DaoResult<Vec<Donation>> {
        self.newest_first(
            "donations_by_donor",
            doc! { "donor_id": donor_id },
            move |d| d.donor_id == donor_id,
        )
        .await
    }

    /// Filtered query ordered by `created_at` descending, degrading from an
    /// indexed sort, to an unordered filter plus in-memory sort, to a full
    /// scan filtered in memory. Every tier yields the same ordering.
    async fn newest_first<P>(
        &self,
        query: &'static str,
        filter: Document,
        keep: P,
    ) -> DaoResult<Vec<Donation>>
    where
        P: Fn(&Donation) -> bool + Send + Sync,
    {
        let indexed_filter = filter.clone();
        Fallback::new(query)
            .tier("indexed", async move {
                self.base
                    .find_many(indexed_filter, Some(doc! { "created_at": -1, "_id": -1 }))
                    .await
            })
            .tier("unordered", async move {
                let mut found = self.base.find_many(filter, None).await?;
                sort_newest_first(&mut found);
                Ok(found)
            })
            .tier("scan", async move {
                let mut found = self.base.find_all().await?;
                found.retain(|d| keep(d));
                sort_newest_first(&mut found);
                Ok(found)
            })
            .run()
            .await
    }
}

pub fn sort_newest_first(donations: &mut [Donation]) {
    donations.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
