use std::sync::Arc;

use bson::{DateTime, doc, oid::ObjectId};
use foodshare_db::models::{DonationStatus, StatusHistory};

use super::base::{BaseDao, DaoResult};
use super::fallback::Fallback;
use crate::store::DocumentStore;

pub struct StatusHistoryDao {
    pub base: BaseDao<StatusHistory>,
}

impl StatusHistoryDao {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            base: BaseDao::new(store, StatusHistory::COLLECTION),
        }
    }

    pub async fn append(
        &self,
        donation_id: ObjectId,
        status: DonationStatus,
        changed_by: ObjectId,
        changed_by_name: String,
        notes: String,
    ) -> DaoResult<StatusHistory> {
        let mut entry = StatusHistory {
            id: None,
            donation_id,
            status,
            changed_by,
            changed_by_name,
            notes,
            created_at: DateTime::now(),
        };
        let id = self.base.insert_one(&entry).await?;
        entry.id = Some(id);
        Ok(entry)
    }

    /// Transitions for one donation, oldest first.
    pub async fn find_for_donation(&self, donation_id: ObjectId) -> DaoResult<Vec<StatusHistory>> {
        let base = &self.base;
        Fallback::new("status_history_for_donation")
            .tier("indexed", async move {
                base.find_many(
                    doc! { "donation_id": donation_id },
                    Some(doc! { "created_at": 1, "_id": 1 }),
                )
                .await
            })
            .tier("unordered", async move {
                let mut found = base
                    .find_many(doc! { "donation_id": donation_id }, None)
                    .await?;
                found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
                Ok(found)
            })
            .run()
            .await
    }
}
