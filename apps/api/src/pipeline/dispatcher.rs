//! The bounded worker pool behind the pipeline.
//!
//! Uploads enqueue application ids onto a bounded channel; a fixed number of
//! workers drain it, so the number of in-flight processor runs (and therefore
//! concurrent engine invocations) can never exceed `worker_concurrency`.
//! A sweeper task periodically reclaims rows left in `processing` by a crash
//! and feeds them back through the queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::engines::CvEngine;
use crate::pipeline::processor::process_application;
use crate::pipeline::store::PipelineStore;

/// Ids waiting in the queue beyond the ones workers are busy with.
const QUEUE_DEPTH: usize = 1024;

/// Cloneable entry point handlers use to schedule processing.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<Uuid>,
}

impl PipelineHandle {
    /// Schedules one processor run for `application_id`. Fire-and-forget:
    /// completion is observed by polling the application row.
    pub async fn enqueue(&self, application_id: Uuid) -> bool {
        if self.tx.send(application_id).await.is_err() {
            error!(application_id = %application_id, "Pipeline queue is closed; dropping id");
            return false;
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub workers: usize,
    pub engine_timeout: Duration,
    pub stale_processing_after: Duration,
    pub sweep_interval: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.worker_concurrency.max(1),
            engine_timeout: config.engine_timeout,
            stale_processing_after: config.stale_processing_after,
            sweep_interval: config.sweep_interval,
        }
    }
}

/// Starts the worker pool and the staleness sweeper, returning the handle
/// used to enqueue work.
pub fn spawn(
    store: Arc<dyn PipelineStore>,
    engine: Arc<dyn CvEngine>,
    settings: PipelineSettings,
) -> PipelineHandle {
    let (tx, rx) = mpsc::channel::<Uuid>(QUEUE_DEPTH);
    let rx = Arc::new(Mutex::new(rx));

    for worker_id in 0..settings.workers.max(1) {
        tokio::spawn(worker_loop(
            worker_id,
            Arc::clone(&rx),
            Arc::clone(&store),
            Arc::clone(&engine),
            settings.engine_timeout,
        ));
    }

    let handle = PipelineHandle { tx };
    tokio::spawn(sweep_loop(
        store,
        handle.clone(),
        settings.stale_processing_after,
        settings.sweep_interval,
    ));

    handle
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    store: Arc<dyn PipelineStore>,
    engine: Arc<dyn CvEngine>,
    engine_timeout: Duration,
) {
    info!(worker_id, "CV worker started");

    loop {
        // Hold the lock only while waiting for the next id, never while
        // processing, so other workers keep draining the queue.
        let next = { rx.lock().await.recv().await };
        let Some(application_id) = next else { break };

        if let Err(error) =
            process_application(store.as_ref(), engine.as_ref(), engine_timeout, application_id)
                .await
        {
            // Store failure mid-run: no terminal write happened. The row
            // stays in `processing` until the sweeper reclaims it.
            error!(
                worker_id,
                application_id = %application_id,
                error = %error,
                "Pipeline run aborted without a terminal state"
            );
        }
    }

    info!(worker_id, "CV worker stopped");
}

async fn sweep_loop(
    store: Arc<dyn PipelineStore>,
    handle: PipelineHandle,
    stale_after: Duration,
    sweep_interval: Duration,
) {
    let stale_after = chrono::Duration::from_std(stale_after)
        .unwrap_or_else(|_| chrono::Duration::seconds(600));

    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match store.requeue_stale(Utc::now() - stale_after).await {
            Ok(ids) if ids.is_empty() => {}
            Ok(ids) => {
                warn!(count = ids.len(), "Re-queueing applications stuck in processing");
                for id in ids {
                    handle.enqueue(id).await;
                }
            }
            Err(error) => error!(error = %error, "Staleness sweep failed"),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_handle(depth: usize) -> (PipelineHandle, mpsc::Receiver<Uuid>) {
    let (tx, rx) = mpsc::channel(depth);
    (PipelineHandle { tx }, rx)
}
