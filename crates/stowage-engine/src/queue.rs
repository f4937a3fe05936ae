//! Deferred derivative generation.
//!
//! The queue hands "generate derivatives for file X" units of work to a
//! single background worker. One worker means at most one reconciliation in
//! flight per queue, which is what keeps the engine's no-internal-locking
//! contract honest for deferred jobs. Jobs are at-least-once: a job that
//! finds its work already done is a no-op by reconciliation's idempotence.

use std::sync::Arc;

use async_trait::async_trait;
use stowage_core::FileRepository;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::thumbnails::ThumbnailEngine;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Derivative queue is closed")]
    Closed,
}

/// Anything that can accept a deferred-generation job. Implement this to
/// bridge into an external job system; [`DerivativeQueue`] is the in-process
/// implementation.
#[async_trait]
pub trait DerivativeDispatcher: Send + Sync {
    async fn dispatch(&self, file_id: Uuid) -> Result<(), DispatchError>;
}

/// In-process queue backed by a tokio channel and one worker task.
pub struct DerivativeQueue {
    tx: mpsc::Sender<Uuid>,
    shutdown_tx: mpsc::Sender<()>,
}

impl DerivativeQueue {
    /// Spawn the worker and return the handle used to submit jobs.
    pub fn start(
        engine: Arc<ThumbnailEngine>,
        repository: Arc<dyn FileRepository>,
        capacity: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Uuid>(capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Derivative queue worker stopping");
                        break;
                    }
                    job = rx.recv() => {
                        let Some(file_id) = job else { break };
                        Self::run_job(&engine, &repository, file_id).await;
                    }
                }
            }
        });

        DerivativeQueue { tx, shutdown_tx }
    }

    async fn run_job(
        engine: &ThumbnailEngine,
        repository: &Arc<dyn FileRepository>,
        file_id: Uuid,
    ) {
        let start = std::time::Instant::now();

        match repository.find(file_id).await {
            Ok(Some(mut file)) => {
                if let Err(e) = engine.reconcile(&mut file).await {
                    tracing::error!(
                        file_id = %file_id,
                        error = %e,
                        "Deferred derivative generation failed"
                    );
                } else {
                    tracing::info!(
                        file_id = %file_id,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Deferred derivative generation finished"
                    );
                }
            }
            Ok(None) => {
                tracing::warn!(file_id = %file_id, "Derivative job for unknown file");
            }
            Err(e) => {
                tracing::error!(file_id = %file_id, error = %e, "Derivative job lookup failed");
            }
        }
    }

    /// Signal the worker to stop. In-flight work runs to completion; queued
    /// jobs are dropped.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[async_trait]
impl DerivativeDispatcher for DerivativeQueue {
    async fn dispatch(&self, file_id: Uuid) -> Result<(), DispatchError> {
        self.tx
            .send(file_id)
            .await
            .map_err(|_| DispatchError::Closed)
    }
}
