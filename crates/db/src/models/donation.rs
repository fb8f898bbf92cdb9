use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Sentinel allergen meaning "contains no listed allergens".
pub const NO_ALLERGENS: &str = "None";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Donation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub donor_id: ObjectId,
    pub donor_name: String,
    #[serde(default)]
    pub donor_phone: String,
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
    /// Base64 data URLs stored inline on the record.
    #[serde(default)]
    pub images: Vec<String>,
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub status: DonationStatus,
    pub claimed_by: Option<ObjectId>,
    pub claimed_by_name: Option<String>,
    pub claimed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    #[default]
    Available,
    Claimed,
    OnTheWay,
    PickedUp,
    Completed,
    Cancelled,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Claimed => "claimed",
            Self::OnTheWay => "on_the_way",
            Self::PickedUp => "picked_up",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// States in which a claimer must be recorded on the donation.
    pub fn requires_claimer(&self) -> bool {
        matches!(
            self,
            Self::Claimed | Self::OnTheWay | Self::PickedUp | Self::Completed
        )
    }
}

impl std::fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Donation {
    pub const COLLECTION: &'static str = "donations";

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn is_expired(&self, now: DateTime) -> bool {
        self.expiry_time < now
    }

    /// Allergens that count for exclusion filters (the "None" sentinel is dropped).
    pub fn listed_allergens(&self) -> impl Iterator<Item = &str> {
        self.allergens
            .iter()
            .map(String::as_str)
            .filter(|a| !a.eq_ignore_ascii_case(NO_ALLERGENS))
    }

    pub fn claim_state_consistent(&self) -> bool {
        self.claimed_by.is_some() == self.status.requires_claimer()
    }
}
