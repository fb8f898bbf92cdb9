use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

use super::DonationStatus;

/// Append-only audit entry, one per donation status transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistory {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub donation_id: ObjectId,
    pub status: DonationStatus,
    pub changed_by: ObjectId,
    pub changed_by_name: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime,
}

impl StatusHistory {
    pub const COLLECTION: &'static str = "status_history";
}
