// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bc_core::FakeClock;
use bc_kv::InMemoryKv;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

fn fake_kv() -> Arc<InMemoryKv<FakeClock>> {
    Arc::new(InMemoryKv::new(FakeClock::default()))
}

struct FlakyProcessor {
    fail_until_attempt: u32,
    attempts_seen: AtomicU32,
    exhausted: Mutex<Vec<JobId>>,
}

impl FlakyProcessor {
    fn new(fail_until_attempt: u32) -> Self {
        Self {
            fail_until_attempt,
            attempts_seen: AtomicU32::new(0),
            exhausted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl JobProcessor for FlakyProcessor {
    async fn process(&self, job: &Job) -> Result<(), JobError> {
        self.attempts_seen.fetch_add(1, Ordering::SeqCst);
        if job.attempt < self.fail_until_attempt {
            Err(JobError::Retryable("not yet".to_string()))
        } else {
            Ok(())
        }
    }

    async fn on_exhausted(&self, job: &Job, _error: &JobError) {
        self.exhausted.lock().push(job.id.clone());
    }
}

struct FatalProcessor;

#[async_trait]
impl JobProcessor for FatalProcessor {
    async fn process(&self, _job: &Job) -> Result<(), JobError> {
        Err(JobError::Fatal("never retry this".to_string()))
    }

    async fn on_exhausted(&self, _job: &Job, _error: &JobError) {}
}

fn job(kind: JobKind) -> Job {
    Job {
        id: JobId::generate(),
        kind,
        finding_id: FindingId::generate(),
        url: "https://example.com/".to_string(),
        attempt: 0,
    }
}

#[tokio::test(start_paused = true)]
async fn succeeds_on_first_attempt_without_retrying() {
    let processor = Arc::new(FlakyProcessor::new(0));
    let kv = fake_kv();
    let clock = Arc::new(FakeClock::default());
    let queue = JobQueue::new("scan-queue", processor.clone(), kv, clock, QueueConfig::scan());

    queue.run_job(job(JobKind::Scan)).await;

    assert_eq!(processor.attempts_seen.load(Ordering::SeqCst), 1);
    assert!(processor.exhausted.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn retries_up_to_max_attempts_then_marks_exhausted() {
    let processor = Arc::new(FlakyProcessor::new(u32::MAX));
    let kv = fake_kv();
    let clock = Arc::new(FakeClock::default());
    let queue = JobQueue::new("render-queue", processor.clone(), kv, clock, QueueConfig::render());

    let j = job(JobKind::Render);
    let id = j.id.clone();
    queue.run_job(j).await;

    assert_eq!(processor.attempts_seen.load(Ordering::SeqCst), 3);
    assert_eq!(processor.exhausted.lock().as_slice(), &[id]);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_skips_remaining_retries() {
    let processor = Arc::new(FatalProcessor);
    let kv = fake_kv();
    let clock = Arc::new(FakeClock::default());
    let queue = JobQueue::new("scan-queue", processor, kv, clock, QueueConfig::scan());

    // Should return immediately without sleeping through any backoff.
    queue.run_job(job(JobKind::Scan)).await;
}

#[tokio::test]
async fn backoff_doubles_and_caps_at_max() {
    let config = QueueConfig::scan();
    assert_eq!(backoff_for_attempt(&config, 0), Duration::from_secs(2));
    assert_eq!(backoff_for_attempt(&config, 1), Duration::from_secs(4));
    assert_eq!(backoff_for_attempt(&config, 10), Duration::from_secs(30));
}

#[tokio::test]
async fn throughput_cap_admits_up_to_the_configured_rate_then_rejects() {
    let kv = fake_kv();
    let clock = Arc::new(FakeClock::default());
    let processor = Arc::new(FlakyProcessor::new(0));
    let queue = JobQueue::new("render-queue", processor, kv, clock, QueueConfig::render());

    for _ in 0..10 {
        assert!(queue.throughput_admits().await);
    }
    assert!(!queue.throughput_admits().await);
}

#[tokio::test]
async fn scan_enqueuer_seam_delivers_a_job_kind_scan() {
    let kv = fake_kv();
    let clock = Arc::new(FakeClock::default());
    let processor = Arc::new(FlakyProcessor::new(0));
    let queue = JobQueue::new("scan-queue", processor, kv, clock, QueueConfig::scan());

    let finding_id = FindingId::generate();
    ScanEnqueuer::enqueue_scan(queue.as_ref(), finding_id, "https://example.com/".to_string())
        .await
        .unwrap();
}
