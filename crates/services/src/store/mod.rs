//! Untyped document storage behind the DAOs.
//!
//! Every DAO talks to a [`DocumentStore`] instead of a concrete driver so the
//! same query code runs against MongoDB in production and against
//! [`MemoryStore`] in tests and local runs.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};

use crate::dao::base::DaoResult;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document, assigning an `_id` when absent.
    async fn insert_one(&self, collection: &str, doc: Document) -> DaoResult<ObjectId>;

    async fn find_one(&self, collection: &str, filter: Document) -> DaoResult<Option<Document>>;

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> DaoResult<Vec<Document>>;

    /// Applies `update` to the first match. Returns whether a document matched.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DaoResult<bool>;

    /// Returns the number of matched documents.
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DaoResult<u64>;

    async fn delete_many(&self, collection: &str, filter: Document) -> DaoResult<u64>;

    async fn count(&self, collection: &str, filter: Document) -> DaoResult<u64>;
}
