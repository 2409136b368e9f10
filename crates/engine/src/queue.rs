// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue + workers (C9): two named queues (`scan-queue`, `render-queue`),
//! each with a persistent-by-id job record, a retry/back-off policy, a
//! concurrency cap enforced with a [`Semaphore`], and (render only) a
//! per-minute throughput cap implemented by reusing `bc-kv`'s counter +
//! `EXPIRE` the same way the breaker reuses it for its failure window.

use async_trait::async_trait;
use bc_core::{Clock, FindingId, JobId};
use bc_kv::KvStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Scan,
    Render,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub finding_id: FindingId,
    pub url: String,
    pub attempt: u32,
}

#[derive(Debug, Error)]
pub enum JobError {
    /// Worth retrying, up to the queue's attempt cap.
    #[error("{0}")]
    Retryable(String),
    /// Not worth retrying; fails the job on the first attempt.
    #[error("{0}")]
    Fatal(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,
}

/// What a queue does with one job, and what happens once attempts are
/// exhausted (§4.9: "failure after the final attempt marks the Finding
/// `failed`").
#[async_trait]
pub trait JobProcessor: Send + Sync + 'static {
    async fn process(&self, job: &Job) -> Result<(), JobError>;
    async fn on_exhausted(&self, job: &Job, error: &JobError);
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub concurrency: usize,
    pub throughput_per_minute: Option<u32>,
}

impl QueueConfig {
    /// scan-queue: effectively unbounded concurrency, no throughput cap.
    pub fn scan() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            concurrency: 10_000,
            throughput_per_minute: None,
        }
    }

    /// render-queue: capped at 2 concurrent captures, 10/minute.
    pub fn render() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            concurrency: 2,
            throughput_per_minute: Some(10),
        }
    }
}

/// `2s * 2^attempt`, capped. `attempt` is 0-based (the delay before the
/// *next* try, after `attempt` has already failed once).
fn backoff_for_attempt(config: &QueueConfig, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
    config.base_backoff.saturating_mul(factor).min(config.max_backoff)
}

/// A named queue (`scan-queue` or `render-queue`): an in-process channel
/// feeding a bounded pool of workers, backed by a [`JobProcessor`].
pub struct JobQueue<P: JobProcessor, K: KvStore, C: Clock> {
    name: &'static str,
    processor: Arc<P>,
    kv: Arc<K>,
    clock: Arc<C>,
    config: QueueConfig,
    semaphore: Arc<Semaphore>,
    sender: mpsc::UnboundedSender<Job>,
    receiver: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
}

impl<P: JobProcessor, K: KvStore, C: Clock> JobQueue<P, K, C> {
    pub fn new(name: &'static str, processor: Arc<P>, kv: Arc<K>, clock: Arc<C>, config: QueueConfig) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            name,
            processor,
            kv,
            clock,
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            config,
            sender,
            receiver: parking_lot::Mutex::new(Some(receiver)),
        })
    }

    pub fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.sender.send(job).map_err(|_| QueueError::Closed)
    }

    fn throughput_key(&self, now_ms: i64) -> String {
        let minute_bucket = now_ms / 60_000;
        format!("queue:{}:throughput:{minute_bucket}", self.name)
    }

    /// Checks (and, on the first hit of the minute, arms) the per-minute
    /// throughput counter. KV failures fail open — a flaky KV must not stall
    /// the render queue entirely.
    async fn throughput_admits(&self) -> bool {
        let Some(cap) = self.config.throughput_per_minute else {
            return true;
        };
        let key = self.throughput_key(self.clock.epoch_ms());
        match self.kv.incr(&key).await {
            Ok(count) => {
                if count == 1 {
                    if let Err(e) = self.kv.expire(&key, Duration::from_secs(60)).await {
                        tracing::warn!(queue = self.name, error = %e, "failed to arm throughput window expiry");
                    }
                }
                count <= cap as i64
            }
            Err(e) => {
                tracing::warn!(queue = self.name, error = %e, "throughput check failed, admitting job");
                true
            }
        }
    }

    /// Drains the queue, running up to `config.concurrency` jobs at once.
    /// Takes the channel's receiver on first call; calling it twice on the
    /// same queue would race two drain loops over ordering, so the second
    /// call logs and returns instead of draining anything.
    pub async fn run(self: Arc<Self>) {
        let Some(mut receiver) = self.receiver.lock().take() else {
            tracing::error!(queue = self.name, "JobQueue::run called more than once, ignoring");
            return;
        };

        while let Some(job) = receiver.recv().await {
            if !self.throughput_admits().await {
                // Over the per-minute cap: park the job briefly and retry
                // admission rather than dropping it.
                let requeue = self.sender.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    let _ = requeue.send(job);
                });
                continue;
            }

            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(queue = self.name, error = %e, "semaphore closed, dropping job");
                    continue;
                }
            };
            let this = self.clone();
            tokio::spawn(async move {
                this.run_job(job).await;
                drop(permit);
            });
        }
    }

    /// Runs one job to completion (success, fatal failure, or attempts
    /// exhausted), including its own retry/back-off loop. Exposed directly so
    /// tests can drive a single job deterministically without a `run()` loop.
    pub async fn run_job(&self, mut job: Job) {
        loop {
            job.attempt += 1;
            match self.processor.process(&job).await {
                Ok(()) => return,
                Err(err @ JobError::Fatal(_)) => {
                    self.processor.on_exhausted(&job, &err).await;
                    return;
                }
                Err(err) => {
                    if job.attempt >= self.config.max_attempts {
                        self.processor.on_exhausted(&job, &err).await;
                        return;
                    }
                    let delay = backoff_for_attempt(&self.config, job.attempt - 1);
                    tracing::debug!(queue = self.name, job_id = %job.id, attempt = job.attempt, delay_ms = delay.as_millis() as u64, "job failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Seam so `lifecycle`/`reverify` can enqueue a scan job without depending on
/// the full `JobQueue<ScanProcessor, K, C>` generic signature.
#[async_trait]
pub trait ScanEnqueuer: Send + Sync + 'static {
    async fn enqueue_scan(&self, finding_id: FindingId, url: String) -> Result<JobId, QueueError>;
}

#[async_trait]
impl<P: JobProcessor, K: KvStore, C: Clock> ScanEnqueuer for JobQueue<P, K, C> {
    async fn enqueue_scan(&self, finding_id: FindingId, url: String) -> Result<JobId, QueueError> {
        let id = JobId::generate();
        self.enqueue(Job {
            id: id.clone(),
            kind: JobKind::Scan,
            finding_id,
            url,
            attempt: 0,
        })?;
        Ok(id)
    }
}

/// Seam for enqueuing onto the render queue, mirroring [`ScanEnqueuer`].
#[async_trait]
pub trait RenderEnqueuer: Send + Sync + 'static {
    async fn enqueue_render(&self, finding_id: FindingId, url: String) -> Result<JobId, QueueError>;
}

#[async_trait]
impl<P: JobProcessor, K: KvStore, C: Clock> RenderEnqueuer for JobQueue<P, K, C> {
    async fn enqueue_render(&self, finding_id: FindingId, url: String) -> Result<JobId, QueueError> {
        let id = JobId::generate();
        self.enqueue(Job {
            id: id.clone(),
            kind: JobKind::Render,
            finding_id,
            url,
            attempt: 0,
        })?;
        Ok(id)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
