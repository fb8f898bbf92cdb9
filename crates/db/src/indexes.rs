use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{Donation, Notification, StatusHistory, User};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(
        db,
        User::COLLECTION,
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index(bson::doc! { "role": 1, "is_verified": 1 }),
            index(bson::doc! { "verification.token": 1 }),
            index(bson::doc! { "password_reset.token": 1 }),
        ],
    )
    .await?;

    // Donations
    create_indexes(
        db,
        Donation::COLLECTION,
        vec![
            index(bson::doc! { "status": 1, "created_at": -1 }),
            index(bson::doc! { "donor_id": 1, "created_at": -1 }),
            index(bson::doc! { "claimed_by": 1, "created_at": -1 }),
        ],
    )
    .await?;

    // Notifications
    create_indexes(
        db,
        Notification::COLLECTION,
        vec![
            index(bson::doc! { "user_id": 1, "created_at": -1 }),
            index(bson::doc! { "user_id": 1, "is_read": 1 }),
        ],
    )
    .await?;

    // Status history
    create_indexes(
        db,
        StatusHistory::COLLECTION,
        vec![index(bson::doc! { "donation_id": 1, "created_at": 1 })],
    )
    .await?;

    info!("All MongoDB indexes ensured");
    Ok(())
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    let coll = db.collection::<bson::Document>(collection);
    coll.create_indexes(indexes).await?;
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}
