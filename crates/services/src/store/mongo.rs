use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{Collection, Database};

use super::DocumentStore;
use crate::dao::base::{DaoError, DaoResult};

/// [`DocumentStore`] backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_one(&self, collection: &str, mut doc: Document) -> DaoResult<ObjectId> {
        if !doc.contains_key("_id") {
            doc.insert("_id", ObjectId::new());
        }
        let result = self.collection(collection).insert_one(doc).await.map_err(|e| {
            if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(
                ref write_error,
            )) = *e.kind
            {
                if write_error.code == 11000 {
                    return DaoError::DuplicateKey(write_error.message.clone());
                }
            }
            DaoError::Mongo(e)
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| DaoError::Store("inserted id is not an ObjectId".to_string()))
    }

    async fn find_one(&self, collection: &str, filter: Document) -> DaoResult<Option<Document>> {
        Ok(self.collection(collection).find_one(filter).await?)
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> DaoResult<Vec<Document>> {
        let coll = self.collection(collection);
        let cursor = match sort {
            Some(sort) => coll.find(filter).sort(sort).await?,
            None => coll.find(filter).await?,
        };
        Ok(cursor.try_collect::<Vec<_>>().await?)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DaoResult<bool> {
        let result = self.collection(collection).update_one(filter, update).await?;
        Ok(result.matched_count > 0)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DaoResult<u64> {
        let result = self.collection(collection).update_many(filter, update).await?;
        Ok(result.matched_count)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DaoResult<u64> {
        let result = self.collection(collection).delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    async fn count(&self, collection: &str, filter: Document) -> DaoResult<u64> {
        Ok(self.collection(collection).count_documents(filter).await?)
    }
}
