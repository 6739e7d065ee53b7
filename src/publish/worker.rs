// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Publish Queue
//!
//! Publish work triggered by an edit runs detached from the request on a
//! small fixed pool of workers fed by a bounded channel.
//!
//! - `submit` never waits: a full queue rejects the job
//! - Jobs are not retried; every failure is logged with the title hash so
//!   the job can be replayed by hand
//! - Workers stop when the shared `CancellationToken` fires and log any
//!   jobs still queued
//!
//! Concurrent jobs for one page race; the last publish wins.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::controller::{PublishOutcome, Publisher};

/// Default number of publish workers.
pub const DEFAULT_PUBLISH_WORKERS: usize = 2;

/// Default queue depth.
pub const DEFAULT_PUBLISH_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishJob {
    /// Re-render the artifact of a public page after an edit.
    Republish { title_hash: String },
    SetPublic { title_hash: String, public: bool },
}

impl PublishJob {
    pub fn title_hash(&self) -> &str {
        match self {
            PublishJob::Republish { title_hash } | PublishJob::SetPublic { title_hash, .. } => {
                title_hash
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PublishJob::Republish { .. } => "republish",
            PublishJob::SetPublic { .. } => "set_public",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("publish queue is full, {kind} job for {title_hash} rejected")]
    Full {
        kind: &'static str,
        title_hash: String,
    },

    #[error("publish queue is closed, {kind} job for {title_hash} rejected")]
    Closed {
        kind: &'static str,
        title_hash: String,
    },
}

/// Sending half of the publish queue.
#[derive(Debug, Clone)]
pub struct PublishQueue {
    tx: mpsc::Sender<PublishJob>,
}

impl PublishQueue {
    /// Enqueue `job` without waiting.
    pub fn submit(&self, job: PublishJob) -> Result<(), QueueError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    kind = job.kind(),
                    title_hash = %job.title_hash(),
                    job = ?job,
                    "Publish queue full: job rejected"
                );
                Err(QueueError::Full {
                    kind: job.kind(),
                    title_hash: job.title_hash().to_string(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(
                    kind = job.kind(),
                    title_hash = %job.title_hash(),
                    job = ?job,
                    "Publish queue closed: job rejected"
                );
                Err(QueueError::Closed {
                    kind: job.kind(),
                    title_hash: job.title_hash().to_string(),
                })
            }
        }
    }
}

/// Handles of the running workers.
pub struct PublishWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl PublishWorkers {
    /// Wait for every worker to stop. Call after cancelling the token.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Publish worker panicked");
            }
        }
    }
}

/// Start `workers` workers over a queue of `depth` jobs.
pub fn spawn_workers(
    publisher: Publisher,
    workers: usize,
    depth: usize,
    shutdown: CancellationToken,
) -> (PublishQueue, PublishWorkers) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    let rx = Arc::new(Mutex::new(rx));

    let handles = (0..workers.max(1))
        .map(|worker| {
            tokio::spawn(run_worker(
                worker,
                publisher.clone(),
                Arc::clone(&rx),
                shutdown.clone(),
            ))
        })
        .collect();

    (PublishQueue { tx }, PublishWorkers { handles })
}

async fn run_worker(
    worker: usize,
    publisher: Publisher,
    rx: Arc<Mutex<mpsc::Receiver<PublishJob>>>,
    shutdown: CancellationToken,
) {
    info!(worker, "Publish worker starting");

    loop {
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };
        execute(worker, &publisher, job).await;
    }

    let mut rx = rx.lock().await;
    while let Ok(job) = rx.try_recv() {
        warn!(
            worker,
            kind = job.kind(),
            title_hash = %job.title_hash(),
            job = ?job,
            "Publish job not run before shutdown"
        );
    }
    info!(worker, "Publish worker shutting down");
}

async fn execute(worker: usize, publisher: &Publisher, job: PublishJob) {
    let result = match &job {
        PublishJob::Republish { title_hash } => publisher.republish(title_hash).await,
        PublishJob::SetPublic { title_hash, public } => {
            publisher.set_public(title_hash, *public).await
        }
    };

    match result {
        Ok(PublishOutcome::Skipped | PublishOutcome::Unchanged) => {}
        Ok(outcome) => {
            info!(
                worker,
                kind = job.kind(),
                title_hash = %job.title_hash(),
                outcome = ?outcome,
                "Publish job finished"
            );
        }
        Err(e) if e.is_not_found() => {
            warn!(
                worker,
                kind = job.kind(),
                title_hash = %job.title_hash(),
                "Publish job target no longer exists"
            );
        }
        Err(e) => {
            error!(
                worker,
                kind = job.kind(),
                title_hash = %job.title_hash(),
                job = ?job,
                error = %e,
                "Publish job failed"
            );
        }
    }
}
