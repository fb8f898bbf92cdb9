use std::sync::Arc;

use bson::{DateTime, Document, doc, oid::ObjectId};
use foodshare_db::models::{Organization, PendingToken, Role, User};
use serde::{Deserialize, Serialize};

use super::base::{BaseDao, DaoError, DaoResult};
use crate::store::DocumentStore;

/// Profile fields collected at signup.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub role: Role,
    pub display_name: String,
    pub phone: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub organization: Option<Organization>,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
}

/// Which pending-token slot on the user record a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSlot {
    Verification,
    PasswordReset,
}

impl TokenSlot {
    fn field(&self) -> &'static str {
        match self {
            TokenSlot::Verification => "verification",
            TokenSlot::PasswordReset => "password_reset",
        }
    }
}

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            base: BaseDao::new(store, User::COLLECTION),
        }
    }

    pub async fn create(&self, input: NewUser) -> DaoResult<User> {
        match self.find_by_email(&input.email).await {
            Ok(_) => {
                return Err(DaoError::DuplicateKey("email already registered".to_string()));
            }
            Err(DaoError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let now = DateTime::now();
        let mut user = User {
            id: None,
            email: input.email.trim().to_lowercase(),
            role: input.role,
            display_name: input.display_name,
            phone: input.phone,
            address: input.address,
            latitude: input.latitude,
            longitude: input.longitude,
            profile_picture: None,
            organization: input.organization,
            is_verified: false,
            email_verified: false,
            password_hash: Some(input.password_hash),
            verification: None,
            password_reset: None,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&user).await?;
        user.id = Some(id);
        Ok(user)
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<User> {
        self.base.find_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<User> {
        self.base
            .find_one(doc! { "email": email.to_lowercase() })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_by_token(&self, slot: TokenSlot, token: &str) -> DaoResult<User> {
        let mut filter = Document::new();
        filter.insert(format!("{}.token", slot.field()), token);
        self.base
            .find_one(filter)
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_by_role(&self, role: Role) -> DaoResult<Vec<User>> {
        self.base
            .find_many(doc! { "role": role.as_str() }, None)
            .await
    }

    pub async fn find_all(&self) -> DaoResult<Vec<User>> {
        self.base.find_all().await
    }

    pub async fn update_profile(&self, user_id: ObjectId, patch: &ProfilePatch) -> DaoResult<bool> {
        let mut set = bson::to_document(patch)?;
        if set.is_empty() {
            return Ok(false);
        }
        set.insert("updated_at", DateTime::now());

        self.base.update_by_id(user_id, doc! { "$set": set }).await
    }

    pub async fn set_pending_token(
        &self,
        user_id: ObjectId,
        slot: TokenSlot,
        token: &PendingToken,
    ) -> DaoResult<bool> {
        let mut set = Document::new();
        set.insert(slot.field(), bson::to_bson(token)?);
        self.base.update_by_id(user_id, doc! { "$set": set }).await
    }

    pub async fn mark_email_verified(&self, user_id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_by_id(
                user_id,
                doc! {
                    "$set": { "email_verified": true, "updated_at": DateTime::now() },
                    "$unset": { "verification": "" },
                },
            )
            .await
    }

    pub async fn set_password(&self, user_id: ObjectId, password_hash: String) -> DaoResult<bool> {
        self.base
            .update_by_id(
                user_id,
                doc! {
                    "$set": { "password_hash": password_hash, "updated_at": DateTime::now() },
                    "$unset": { "password_reset": "" },
                },
            )
            .await
    }
}
