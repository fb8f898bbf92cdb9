use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::DocumentStore;
use crate::dao::base::{DaoError, DaoResult};

/// In-process [`DocumentStore`].
///
/// Understands the subset of the MongoDB query language the DAOs use:
/// equality (including array membership), `$in`, `$nin`, `$ne`, `$gt`,
/// `$gte`, `$lt`, `$lte`, `$exists`, multi-key sorts, and `$set`/`$unset`
/// updates with dotted paths.
///
/// Faults can be switched on to mimic a hosted store without composite
/// indexes (`fail_sorted_queries`, `fail_filtered_queries`) or with a
/// collection that rejects writes (`fail_writes_to`) or reads
/// (`fail_reads_from`).
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    unique: RwLock<Vec<(String, String)>>,
    faults: Faults,
    reads: DashMap<String, u64>,
}

#[derive(Default)]
struct Faults {
    sorted_queries: AtomicBool,
    filtered_queries: AtomicBool,
    writes: RwLock<HashSet<String>>,
    reads: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unique_index(self, collection: &str, field: &str) -> Self {
        self.unique
            .write()
            .push((collection.to_string(), field.to_string()));
        self
    }

    /// Makes every `find_many` that carries a sort fail.
    pub fn fail_sorted_queries(&self, fail: bool) {
        self.faults.sorted_queries.store(fail, AtomicOrdering::SeqCst);
    }

    /// Makes every `find_many` with a non-empty filter fail.
    pub fn fail_filtered_queries(&self, fail: bool) {
        self.faults.filtered_queries.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn fail_writes_to(&self, collection: &str, fail: bool) {
        let mut writes = self.faults.writes.write();
        if fail {
            writes.insert(collection.to_string());
        } else {
            writes.remove(collection);
        }
    }

    /// Makes every `find_many` against `collection` fail, full scans included.
    pub fn fail_reads_from(&self, collection: &str, fail: bool) {
        let mut reads = self.faults.reads.write();
        if fail {
            reads.insert(collection.to_string());
        } else {
            reads.remove(collection);
        }
    }

    /// Number of `find_many` calls issued against `collection`.
    pub fn reads(&self, collection: &str) -> u64 {
        self.reads.get(collection).map(|r| *r).unwrap_or(0)
    }

    /// Snapshot of every stored document in `collection`, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn check_writable(&self, collection: &str) -> DaoResult<()> {
        if self.faults.writes.read().contains(collection) {
            return Err(DaoError::Store(format!(
                "writes to '{collection}' are unavailable"
            )));
        }
        Ok(())
    }

    fn check_unique(&self, collection: &str, existing: &[Document], doc: &Document) -> DaoResult<()> {
        for (coll, field) in self.unique.read().iter() {
            if coll != collection {
                continue;
            }
            let Some(value) = lookup(doc, field) else {
                continue;
            };
            let clash = existing.iter().any(|other| {
                other.get("_id") != doc.get("_id")
                    && lookup(other, field).is_some_and(|v| bson_eq(v, value))
            });
            if clash {
                return Err(DaoError::DuplicateKey(format!("{field} already exists")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, mut doc: Document) -> DaoResult<ObjectId> {
        self.check_writable(collection)?;
        let id = match doc.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            _ => {
                let id = ObjectId::new();
                doc.insert("_id", id);
                id
            }
        };

        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        self.check_unique(collection, docs, &doc)?;
        docs.push(doc);
        Ok(id)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> DaoResult<Option<Document>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, &filter)).cloned()))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> DaoResult<Vec<Document>> {
        *self.reads.entry(collection.to_string()).or_insert(0) += 1;

        if self.faults.reads.read().contains(collection) {
            return Err(DaoError::Store(format!(
                "reads from '{collection}' are unavailable"
            )));
        }

        if sort.is_some() && self.faults.sorted_queries.load(AtomicOrdering::SeqCst) {
            return Err(DaoError::Store(format!(
                "sorted query on '{collection}' requires a composite index"
            )));
        }
        if !filter.is_empty() && self.faults.filtered_queries.load(AtomicOrdering::SeqCst) {
            return Err(DaoError::Store(format!(
                "filtered query on '{collection}' requires an index"
            )));
        }

        let mut found: Vec<Document> = {
            let collections = self.collections.read();
            collections
                .get(collection)
                .map(|docs| docs.iter().filter(|d| matches(d, &filter)).cloned().collect())
                .unwrap_or_default()
        };

        if let Some(sort) = sort {
            let keys: Vec<(String, bool)> = sort
                .iter()
                .map(|(k, dir)| (k.clone(), as_f64(dir).is_some_and(|d| d < 0.0)))
                .collect();
            found.sort_by(|a, b| {
                for (key, descending) in &keys {
                    let ord = sort_cmp(lookup(a, key), lookup(b, key));
                    if ord != Ordering::Equal {
                        return if *descending { ord.reverse() } else { ord };
                    }
                }
                Ordering::Equal
            });
        }

        debug!(collection, count = found.len(), "memory find_many");
        Ok(found)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DaoResult<bool> {
        self.check_writable(collection)?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(pos) = docs.iter().position(|d| matches(d, &filter)) else {
            return Ok(false);
        };

        let mut updated = docs[pos].clone();
        apply_update(&mut updated, &update)?;
        self.check_unique(collection, docs, &updated)?;
        docs[pos] = updated;
        Ok(true)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DaoResult<u64> {
        self.check_writable(collection)?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut matched = 0;
        for doc in docs.iter_mut().filter(|d| matches(d, &filter)) {
            apply_update(doc, &update)?;
            matched += 1;
        }
        Ok(matched)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DaoResult<u64> {
        self.check_writable(collection)?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !matches(d, &filter));
        Ok((before - docs.len()) as u64)
    }

    async fn count(&self, collection: &str, filter: Document) -> DaoResult<u64> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, &filter)).count() as u64)
            .unwrap_or(0))
    }
}

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_document()?.get(part)?;
    }
    Some(current)
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, cond)| {
        let value = lookup(doc, key);
        match cond {
            Bson::Document(ops) if is_operator_doc(ops) => {
                ops.iter().all(|(op, arg)| apply_operator(op, value, arg))
            }
            expected => values_equal(value, expected),
        }
    })
}

fn is_operator_doc(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

fn apply_operator(op: &str, value: Option<&Bson>, arg: &Bson) -> bool {
    let ordered = |accept: fn(Ordering) -> bool| {
        value
            .and_then(|v| compare(v, arg))
            .is_some_and(accept)
    };
    match op {
        "$in" => arg
            .as_array()
            .is_some_and(|candidates| candidates.iter().any(|c| values_equal(value, c))),
        "$nin" => arg
            .as_array()
            .is_none_or(|candidates| !candidates.iter().any(|c| values_equal(value, c))),
        "$ne" => !values_equal(value, arg),
        "$gt" => ordered(|o| o == Ordering::Greater),
        "$gte" => ordered(|o| o != Ordering::Less),
        "$lt" => ordered(|o| o == Ordering::Less),
        "$lte" => ordered(|o| o != Ordering::Greater),
        "$exists" => value.is_some() == arg.as_bool().unwrap_or(true),
        _ => false,
    }
}

fn values_equal(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None | Some(Bson::Null) => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| bson_eq(item, expected))
        }
        Some(v) => bson_eq(v, expected),
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Missing and null values sort before everything else, as in MongoDB.
fn sort_cmp(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let a = a.filter(|v| !matches!(v, Bson::Null));
    let b = b.filter(|v| !matches!(v, Bson::Null));
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
    }
}

fn apply_update(doc: &mut Document, update: &Document) -> DaoResult<()> {
    for (op, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| DaoError::Store(format!("{op} expects a document")))?;
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(doc, path, value.clone());
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    unset_path(doc, path);
                }
            }
            other => {
                return Err(DaoError::Store(format!(
                    "unsupported update operator {other}"
                )));
            }
        }
    }
    Ok(())
}

fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

fn unset_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}
