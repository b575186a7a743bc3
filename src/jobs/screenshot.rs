//! Screenshot processing job

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use super::{JobFailure, JobHandler, QueuePolicy, ScreenshotJob};
use crate::imaging::{self, ProcessedScreenshot};
use crate::models::job;
use crate::repositories::ActivityRepository;
use crate::storage::{self, Bucket, JPEG_CONTENT_TYPE, ObjectStorage};

/// Resizes, optionally blurs, and uploads a captured screenshot
pub struct ScreenshotHandler {
    activity: ActivityRepository,
    storage: Arc<dyn ObjectStorage>,
}

impl ScreenshotHandler {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            activity: ActivityRepository::new(db),
            storage,
        }
    }
}

#[async_trait]
impl JobHandler for ScreenshotHandler {
    fn policy(&self) -> QueuePolicy {
        QueuePolicy::screenshots()
    }

    async fn handle(&self, job: &job::Model) -> Result<(), JobFailure> {
        let payload: ScreenshotJob = serde_json::from_value(job.payload.clone())?;

        let shot = self
            .activity
            .find_screenshot(payload.screenshot_id)
            .await?
            .ok_or_else(|| JobFailure::permanent("Screenshot not found"))?;

        let bytes = imaging::decode_base64_image(&payload.image_base64)?;
        let should_blur = payload.should_blur;
        let processed: ProcessedScreenshot =
            tokio::task::spawn_blocking(move || imaging::process_screenshot(&bytes, should_blur))
                .await
                .map_err(|e| JobFailure::transient(format!("image task failed: {e}")))??;

        let original_size = processed.original.len();
        self.storage
            .put(
                Bucket::Original,
                &shot.key_original,
                processed.original,
                JPEG_CONTENT_TYPE,
            )
            .await?;

        let key_blurred = match processed.blurred {
            Some(blurred) => {
                let key = storage::blurred_key(&shot.key_original);
                self.storage
                    .put(Bucket::Blurred, &key, blurred, JPEG_CONTENT_TYPE)
                    .await?;
                Some(key)
            }
            None => None,
        };

        self.activity
            .mark_uploaded(shot.id, key_blurred.clone())
            .await?;

        info!(
            screenshot_id = %shot.id,
            user_id = %payload.user_id,
            width = processed.width,
            height = processed.height,
            original_size,
            blurred = key_blurred.is_some(),
            "Screenshot uploaded"
        );
        Ok(())
    }

    async fn on_exhausted(&self, job: &job::Model, failure: &JobFailure) {
        let Ok(payload) = serde_json::from_value::<ScreenshotJob>(job.payload.clone()) else {
            return;
        };
        if let Err(e) = self.activity.mark_upload_failed(payload.screenshot_id).await {
            warn!(
                screenshot_id = %payload.screenshot_id,
                error = %e,
                reason = %failure,
                "Failed to mark screenshot upload as failed"
            );
        }
    }
}
