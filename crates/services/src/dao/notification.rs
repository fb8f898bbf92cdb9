use std::sync::Arc;

use bson::{DateTime, doc, oid::ObjectId};
use foodshare_db::models::{Notification, NotificationType};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::base::{BaseDao, DaoResult};
use super::fallback::Fallback;
use crate::store::DocumentStore;

const FEED_CAPACITY: usize = 256;

/// Change events published to live subscriptions in this process.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Created(Notification),
    ReadStateChanged { user_id: ObjectId },
}

pub struct NotificationDao {
    pub base: BaseDao<Notification>,
    feed: broadcast::Sender<FeedEvent>,
}

impl NotificationDao {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            base: BaseDao::new(store, Notification::COLLECTION),
            feed,
        }
    }

    pub async fn create(
        &self,
        user_id: ObjectId,
        title: impl Into<String>,
        message: impl Into<String>,
        notification_type: NotificationType,
        related_donation_id: Option<ObjectId>,
    ) -> DaoResult<Notification> {
        let mut notification = Notification {
            id: None,
            user_id,
            title: title.into(),
            message: message.into(),
            notification_type,
            is_read: false,
            related_donation_id,
            created_at: DateTime::now(),
        };

        let id = self.base.insert_one(&notification).await?;
        notification.id = Some(id);
        // No receivers is fine.
        let _ = self.feed.send(FeedEvent::Created(notification.clone()));
        Ok(notification)
    }

    /// The user's notifications, newest first.
    pub async fn find_for_user(&self, user_id: ObjectId) -> DaoResult<Vec<Notification>> {
        list_newest_first(&self.base, user_id).await
    }

    pub async fn unread_count(&self, user_id: ObjectId) -> DaoResult<u64> {
        self.base
            .count(doc! { "user_id": user_id, "is_read": false })
            .await
    }

    /// Marks one notification read. Scoped to its recipient.
    pub async fn mark_read(&self, id: ObjectId, user_id: ObjectId) -> DaoResult<bool> {
        let matched = self
            .base
            .update_one(
                doc! { "_id": id, "user_id": user_id },
                doc! { "$set": { "is_read": true } },
            )
            .await?;
        if matched {
            let _ = self.feed.send(FeedEvent::ReadStateChanged { user_id });
        }
        Ok(matched)
    }

    pub async fn mark_all_read(&self, user_id: ObjectId) -> DaoResult<u64> {
        let matched = self
            .base
            .update_many(
                doc! { "user_id": user_id, "is_read": false },
                doc! { "$set": { "is_read": true } },
            )
            .await?;
        if matched > 0 {
            let _ = self.feed.send(FeedEvent::ReadStateChanged { user_id });
        }
        Ok(matched)
    }

    /// Live view of one user's notifications.
    ///
    /// The receiver is registered before the initial snapshot is read so no
    /// notification created in between is missed.
    pub async fn subscribe(&self, user_id: ObjectId) -> DaoResult<NotificationSubscription> {
        let events = self.feed.subscribe();
        let snapshot = list_newest_first(&self.base, user_id).await?;
        debug!(%user_id, count = snapshot.len(), "notification subscription opened");
        Ok(NotificationSubscription {
            user_id,
            base: self.base.clone(),
            snapshot,
            events,
        })
    }
}

pub struct NotificationSubscription {
    user_id: ObjectId,
    base: BaseDao<Notification>,
    snapshot: Vec<Notification>,
    events: broadcast::Receiver<FeedEvent>,
}

impl NotificationSubscription {
    pub fn current(&self) -> &[Notification] {
        &self.snapshot
    }

    /// Waits for the next change to this user's notifications and returns the
    /// full list, newest first. Returns `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<Vec<Notification>> {
        loop {
            match self.events.recv().await {
                Ok(FeedEvent::Created(n)) if n.user_id == self.user_id => {
                    if self.snapshot.iter().all(|existing| existing.id != n.id) {
                        self.snapshot.push(n);
                        sort_newest_first(&mut self.snapshot);
                    }
                    return Some(self.snapshot.clone());
                }
                Ok(FeedEvent::ReadStateChanged { user_id }) if user_id == self.user_id => {
                    if self.resync().await {
                        return Some(self.snapshot.clone());
                    }
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(user_id = %self.user_id, skipped, "notification feed lagged, resyncing");
                    if self.resync().await {
                        return Some(self.snapshot.clone());
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn resync(&mut self) -> bool {
        match list_newest_first(&self.base, self.user_id).await {
            Ok(fresh) => {
                self.snapshot = fresh;
                true
            }
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "notification resync failed");
                false
            }
        }
    }
}

/// Ordered query, retried unordered with a client-side sort when the store
/// cannot serve the ordered one.
async fn list_newest_first(
    base: &BaseDao<Notification>,
    user_id: ObjectId,
) -> DaoResult<Vec<Notification>> {
    Fallback::new("notifications_for_user")
        .tier("indexed", async move {
            base.find_many(
                doc! { "user_id": user_id },
                Some(doc! { "created_at": -1, "_id": -1 }),
            )
            .await
        })
        .tier("unordered", async move {
            let mut found = base.find_many(doc! { "user_id": user_id }, None).await?;
            sort_newest_first(&mut found);
            Ok(found)
        })
        .run()
        .await
}

fn sort_newest_first(notifications: &mut [Notification]) {
    notifications.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
