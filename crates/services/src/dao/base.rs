use std::marker::PhantomData;
use std::sync::Arc;

use bson::{Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::store::DocumentStore;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
    #[error("Store operation failed: {0}")]
    Store(String),
    #[error("Entity not found")]
    NotFound,
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
}

pub type DaoResult<T> = Result<T, DaoError>;

/// Typed view of one collection in a [`DocumentStore`].
pub struct BaseDao<T> {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for BaseDao<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection,
            _marker: PhantomData,
        }
    }
}

impl<T> BaseDao<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Send + Sync,
{
    pub fn new(store: Arc<dyn DocumentStore>, collection: &'static str) -> Self {
        Self {
            store,
            collection,
            _marker: PhantomData,
        }
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<T> {
        self.find_one(doc! { "_id": id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_one(&self, filter: Document) -> DaoResult<Option<T>> {
        self.store
            .find_one(self.collection, filter)
            .await?
            .map(|d| bson::from_document(d).map_err(DaoError::from))
            .transpose()
    }

    pub async fn find_many(&self, filter: Document, sort: Option<Document>) -> DaoResult<Vec<T>> {
        let docs = self.store.find_many(self.collection, filter, sort).await?;
        debug!(collection = self.collection, count = docs.len(), "find_many");
        docs.into_iter()
            .map(|d| bson::from_document(d).map_err(DaoError::from))
            .collect()
    }

    /// Unfiltered, unordered scan of the whole collection.
    pub async fn find_all(&self) -> DaoResult<Vec<T>> {
        self.find_many(doc! {}, None).await
    }

    pub async fn insert_one(&self, entity: &T) -> DaoResult<ObjectId> {
        let mut document = bson::to_document(entity)?;
        if matches!(document.get("_id"), Some(bson::Bson::Null)) {
            document.remove("_id");
        }
        self.store.insert_one(self.collection, document).await
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> DaoResult<bool> {
        self.store.update_one(self.collection, filter, update).await
    }

    pub async fn update_by_id(&self, id: ObjectId, update: Document) -> DaoResult<bool> {
        self.update_one(doc! { "_id": id }, update).await
    }

    pub async fn update_many(&self, filter: Document, update: Document) -> DaoResult<u64> {
        self.store.update_many(self.collection, filter, update).await
    }

    pub async fn hard_delete(&self, filter: Document) -> DaoResult<u64> {
        self.store.delete_many(self.collection, filter).await
    }

    pub async fn count(&self, filter: Document) -> DaoResult<u64> {
        self.store.count(self.collection, filter).await
    }
}
