//! Fire-and-forget queue for secondary writes (notifications, status history).
//!
//! Callers enqueue and return immediately. A worker task spawns each effect
//! concurrently; failures are logged and never reach the caller.

use std::future::Future;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::dao::base::DaoResult;

enum Job {
    Run {
        name: &'static str,
        effect: BoxFuture<'static, DaoResult<()>>,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct EffectQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl EffectQueue {
    /// Starts the worker. Must be called inside a Tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(rx));
        Self { tx }
    }

    pub fn enqueue<F>(&self, name: &'static str, effect: F)
    where
        F: Future<Output = DaoResult<()>> + Send + 'static,
    {
        let job = Job::Run {
            name,
            effect: Box::pin(effect),
        };
        if self.tx.send(job).is_err() {
            warn!(effect = name, "effect queue closed, dropping effect");
        }
    }

    /// Waits until every effect enqueued before this call has finished.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Job::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Job>) {
    let mut running = JoinSet::new();
    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(Job::Run { name, effect }) => {
                    running.spawn(async move {
                        match effect.await {
                            Ok(()) => debug!(effect = name, "secondary effect done"),
                            Err(e) => warn!(effect = name, error = %e, "secondary effect failed"),
                        }
                    });
                }
                Some(Job::Flush(done)) => {
                    while let Some(result) = running.join_next().await {
                        log_join(result);
                    }
                    let _ = done.send(());
                }
                None => break,
            },
            Some(result) = running.join_next(), if !running.is_empty() => log_join(result),
        }
    }
    while let Some(result) = running.join_next().await {
        log_join(result);
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        warn!(error = %e, "secondary effect task aborted");
    }
}
