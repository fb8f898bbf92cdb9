//! Ordered query strategies for stores that may lack composite indexes.
//!
//! A [`Fallback`] holds a list of named tiers. Tiers are lazy futures; each one
//! is only polled after every tier before it has failed. The first success
//! wins; if every tier fails the last error is returned.

use std::future::Future;

use futures::future::BoxFuture;
use tracing::warn;

use super::base::{DaoError, DaoResult};

pub struct Fallback<'a, T> {
    query: &'static str,
    tiers: Vec<(&'static str, BoxFuture<'a, DaoResult<T>>)>,
}

impl<'a, T> Fallback<'a, T> {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            tiers: Vec::new(),
        }
    }

    pub fn tier<F>(mut self, name: &'static str, attempt: F) -> Self
    where
        F: Future<Output = DaoResult<T>> + Send + 'a,
    {
        self.tiers.push((name, Box::pin(attempt)));
        self
    }

    pub async fn run(self) -> DaoResult<T> {
        self.run_traced().await.map(|(value, _)| value)
    }

    /// Like [`run`](Self::run), also reporting which tier produced the value.
    pub async fn run_traced(self) -> DaoResult<(T, &'static str)> {
        let mut last_error = None;
        for (name, attempt) in self.tiers {
            match attempt.await {
                Ok(value) => return Ok((value, name)),
                Err(e) => {
                    warn!(query = self.query, tier = name, error = %e, "query tier failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            DaoError::Store(format!("no query strategy configured for {}", self.query))
        }))
    }
}
