use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub role: Role,
    pub display_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<PendingToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset: Option<PendingToken>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Donor,
    Ngo,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donor => "donor",
            Role::Ngo => "ngo",
        }
    }

    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Donor => "/donor/dashboard",
            Role::Ngo => "/ngo/dashboard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub name: String,
    pub registration_number: Option<String>,
    pub description: Option<String>,
}

/// One-shot token for email verification or password reset links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingToken {
    pub token: String,
    pub expires_at: DateTime,
}

impl User {
    pub const COLLECTION: &'static str = "users";

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn is_ngo(&self) -> bool {
        self.role == Role::Ngo
    }
}
