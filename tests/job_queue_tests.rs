//! Durable job queue tests: retries, exhaustion, pooling and failure bookkeeping

#[path = "test_utils/mod.rs"]
mod test_utils;

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{Duration, Utc};
use image::{ImageFormat, Rgb, RgbImage};
use sea_orm::DatabaseConnection;
use test_utils::*;
use timetrack::config::WorkerConfig;
use timetrack::jobs::{
    self, JobFailure, JobHandler, QueuePolicy, SCREENSHOTS_QUEUE, ScreenshotHandler, ScreenshotJob,
    Worker,
};
use timetrack::models::{job, screenshot, user::Role};
use timetrack::repositories::{ActivityRepository, JobRepository, NewScreenshot, NewTimeEntry};
use timetrack::storage::{self, Bucket, MemoryStorage, ObjectStorage, StorageError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Fails the first `failures` original uploads, then stores in memory
struct FlakyStorage {
    inner: MemoryStorage,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyStorage {
    fn new(failures: usize) -> Self {
        Self {
            inner: MemoryStorage::new(),
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ObjectStorage for FlakyStorage {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if bucket == Bucket::Original && self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(StorageError::Backend(
                opendal::Error::new(opendal::ErrorKind::RateLimited, "slow down").set_temporary(),
            ));
        }
        self.inner.put(bucket, key, body, content_type).await
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StorageError> {
        self.inner.delete(bucket, key).await
    }
}

fn png_base64() -> String {
    let img = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 128]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .expect("encode png");
    STANDARD.encode(bytes.into_inner())
}

fn fast_workers() -> WorkerConfig {
    WorkerConfig {
        jitter_factor: 0.0,
        ..WorkerConfig::default()
    }
}

async fn pending_screenshot(
    db: &DatabaseConnection,
    should_blur: bool,
) -> Result<(screenshot::Model, job::Model)> {
    let org = create_org_with_user(db, None, Role::Employee, should_blur).await?;
    let activity = ActivityRepository::new(db.clone());
    let now = Utc::now();
    let entry = activity
        .create_time_entry(NewTimeEntry {
            user_id: org.user_id,
            start_time: now - Duration::minutes(10),
            end_time: Some(now),
            activity_percentage: 50.0,
            mouse_clicks: 10,
            keyboard_strokes: 20,
        })
        .await?;
    let shot = activity
        .create_screenshot(NewScreenshot {
            time_entry_id: entry.id,
            user_id: org.user_id,
            timestamp: now,
            key_original: storage::screenshot_key(org.user_id, now),
            is_blurred: should_blur,
            window_title: Some("Editor".to_string()),
            application_name: None,
            metadata: None,
        })
        .await?;
    let queued = jobs::enqueue(
        &JobRepository::new(db.clone()),
        &QueuePolicy::screenshots(),
        &ScreenshotJob {
            screenshot_id: shot.id,
            user_id: org.user_id,
            image_base64: png_base64(),
            should_blur,
        },
    )
    .await?;
    Ok((shot, queued))
}

async fn reload_screenshot(db: &DatabaseConnection, id: Uuid) -> Result<screenshot::Model> {
    Ok(ActivityRepository::new(db.clone())
        .find_screenshot(id)
        .await?
        .expect("screenshot row"))
}

#[tokio::test]
async fn screenshot_upload_succeeds_on_third_attempt() -> Result<()> {
    let db = setup_test_db().await?;
    let (shot, queued) = pending_screenshot(&db, true).await?;
    let storage = Arc::new(FlakyStorage::new(2));
    let worker = Worker::new(
        db.clone(),
        Arc::new(ScreenshotHandler::new(db.clone(), storage.clone())),
        fast_workers(),
    );
    let jobs = JobRepository::new(db.clone());

    assert_eq!(worker.process_due_at(Utc::now()).await?, 1);
    let after_first = jobs.find(queued.id).await?.expect("job");
    assert_eq!(after_first.status, job::STATUS_QUEUED);
    assert_eq!(after_first.attempts, 1);
    assert!(after_first.last_error.is_some());

    // Backoff keeps the retry out of an immediate pass
    assert_eq!(worker.process_due_at(Utc::now()).await?, 0);

    assert_eq!(worker.process_due_at(Utc::now() + Duration::hours(1)).await?, 1);
    assert_eq!(worker.process_due_at(Utc::now() + Duration::hours(1)).await?, 1);

    let done = jobs.find(queued.id).await?.expect("job");
    assert_eq!(done.status, job::STATUS_COMPLETED);
    assert_eq!(done.attempts, 3);

    let stored = reload_screenshot(&db, shot.id).await?;
    assert_eq!(stored.upload_status, screenshot::UPLOAD_UPLOADED);
    let blurred_key = stored.key_blurred.expect("blurred key");
    assert_eq!(blurred_key, storage::blurred_key(&shot.key_original));

    let original = storage
        .inner
        .get(Bucket::Original, &shot.key_original)
        .expect("original object");
    assert_eq!(original.content_type, storage::JPEG_CONTENT_TYPE);
    assert!(storage.inner.get(Bucket::Blurred, &blurred_key).is_some());
    Ok(())
}

#[tokio::test]
async fn exhausted_screenshot_job_marks_upload_failed() -> Result<()> {
    let db = setup_test_db().await?;
    let (shot, queued) = pending_screenshot(&db, false).await?;
    let storage = Arc::new(FlakyStorage::new(usize::MAX));
    let worker = Worker::new(
        db.clone(),
        Arc::new(ScreenshotHandler::new(db.clone(), storage.clone())),
        fast_workers(),
    );

    for _ in 0..3 {
        assert_eq!(worker.process_due_at(Utc::now() + Duration::hours(1)).await?, 1);
    }
    assert_eq!(worker.process_due_at(Utc::now() + Duration::hours(2)).await?, 0);

    let jobs = JobRepository::new(db.clone());
    let failed = jobs.find(queued.id).await?.expect("job");
    assert_eq!(failed.status, job::STATUS_FAILED);
    assert_eq!(failed.attempts, 3);
    assert!(failed.finished_at.is_some());

    let listed = jobs.list_failed(Some(SCREENSHOTS_QUEUE), 10).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, queued.id);

    let stored = reload_screenshot(&db, shot.id).await?;
    assert_eq!(stored.upload_status, screenshot::UPLOAD_FAILED);
    assert!(storage.inner.is_empty());
    Ok(())
}

/// Counts calls and fails every attempt with the configured failure
struct FailingHandler {
    failure: JobFailure,
    calls: AtomicUsize,
}

#[async_trait]
impl JobHandler for FailingHandler {
    fn policy(&self) -> QueuePolicy {
        QueuePolicy::resource_sync()
    }

    async fn handle(&self, _job: &job::Model) -> Result<(), JobFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.failure.clone())
    }
}

#[tokio::test]
async fn unauthorized_failures_are_not_retried() -> Result<()> {
    let db = setup_test_db().await?;
    let jobs = JobRepository::new(db.clone());
    let queued = jobs::enqueue(
        &jobs,
        &QueuePolicy::resource_sync(),
        &serde_json::json!({"integration_id": Uuid::new_v4()}),
    )
    .await?;

    let handler = Arc::new(FailingHandler {
        failure: JobFailure::unauthorized("Token invalid"),
        calls: AtomicUsize::new(0),
    });
    let worker = Worker::new(db.clone(), handler.clone(), fast_workers());

    assert_eq!(worker.process_due_at(Utc::now()).await?, 1);
    assert_eq!(worker.process_due_at(Utc::now() + Duration::hours(1)).await?, 0);

    let failed = jobs.find(queued.id).await?.expect("job");
    assert_eq!(failed.status, job::STATUS_FAILED);
    assert_eq!(failed.attempts, 1);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn rate_limited_retry_waits_for_retry_after() -> Result<()> {
    let db = setup_test_db().await?;
    let jobs = JobRepository::new(db.clone());
    let queued = jobs::enqueue(
        &jobs,
        &QueuePolicy::resource_sync(),
        &serde_json::json!({"integration_id": Uuid::new_v4()}),
    )
    .await?;

    let handler = Arc::new(FailingHandler {
        failure: JobFailure::rate_limited(Some(120), "rate limit exceeded"),
        calls: AtomicUsize::new(0),
    });
    let worker = Worker::new(db.clone(), handler, fast_workers());
    let before = Utc::now();

    assert_eq!(worker.process_due_at(before).await?, 1);

    let retried = jobs.find(queued.id).await?.expect("job");
    assert_eq!(retried.status, job::STATUS_QUEUED);
    assert!(retried.run_at.with_timezone(&Utc) >= before + Duration::seconds(119));

    // Past the exponential backoff, still inside the retry-after window
    assert_eq!(worker.process_due_at(Utc::now() + Duration::seconds(30)).await?, 0);
    assert_eq!(worker.process_due_at(Utc::now() + Duration::seconds(130)).await?, 1);
    Ok(())
}

/// Sleeps for the payload's `delay_ms` before succeeding
struct SleepyHandler;

#[async_trait]
impl JobHandler for SleepyHandler {
    fn policy(&self) -> QueuePolicy {
        QueuePolicy::resource_sync()
    }

    async fn handle(&self, job: &job::Model) -> Result<(), JobFailure> {
        let delay = job
            .payload
            .get("delay_ms")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        Ok(())
    }
}

#[tokio::test]
async fn slow_job_does_not_block_later_jobs() -> Result<()> {
    let db = setup_test_db().await?;
    let jobs = JobRepository::new(db.clone());
    let policy = QueuePolicy::resource_sync();
    let slow = jobs::enqueue(&jobs, &policy, &serde_json::json!({"delay_ms": 1500})).await?;

    let worker = Worker::new(
        db.clone(),
        Arc::new(SleepyHandler),
        WorkerConfig {
            tick_ms: 50,
            ..fast_workers()
        },
    );
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(worker.run(shutdown.clone()));

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let fast = jobs::enqueue(&jobs, &policy, &serde_json::json!({"delay_ms": 0})).await?;
    tokio::time::sleep(std::time::Duration::from_millis(700)).await;

    assert_eq!(
        jobs.find(fast.id).await?.expect("job").status,
        job::STATUS_COMPLETED
    );
    assert_eq!(
        jobs.find(slow.id).await?.expect("job").status,
        job::STATUS_RUNNING
    );

    // Shutdown waits for the slow job instead of abandoning it
    shutdown.cancel();
    running.await?;
    assert_eq!(
        jobs.find(slow.id).await?.expect("job").status,
        job::STATUS_COMPLETED
    );
    Ok(())
}
