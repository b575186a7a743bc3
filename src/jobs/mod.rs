//! # Background Jobs
//!
//! Durable queues on the `jobs` table. Each queue has a [`QueuePolicy`] and a
//! [`JobHandler`]; [`executor::Worker`] claims due rows and applies the retry
//! policy to whatever the handler returns.

pub mod clickup_sync;
pub mod executor;
pub mod resource_sync;
pub mod screenshot;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::imaging::ImageError;
use crate::models::job;
use crate::providers::{IntegrationError, RegistryError};
use crate::repositories::JobRepository;
use crate::storage::StorageError;
use crate::sync::SyncError;

pub use clickup_sync::ClickUpSyncHandler;
pub use executor::Worker;
pub use resource_sync::ResourceSyncHandler;
pub use screenshot::ScreenshotHandler;

pub const SCREENSHOTS_QUEUE: &str = "screenshots";
pub const CLICKUP_SYNC_QUEUE: &str = "clickup-sync";
pub const RESOURCE_SYNC_QUEUE: &str = "resource-sync";

/// Concurrency, retry and retention settings of one queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePolicy {
    pub queue: &'static str,
    pub concurrency: usize,
    pub max_attempts: i32,
    pub base_backoff: Duration,
    pub keep_completed: u64,
    pub keep_failed: u64,
}

impl QueuePolicy {
    pub fn screenshots() -> Self {
        Self {
            queue: SCREENSHOTS_QUEUE,
            concurrency: 5,
            max_attempts: 3,
            base_backoff: Duration::from_secs(2),
            keep_completed: 100,
            keep_failed: 500,
        }
    }

    pub fn clickup_sync() -> Self {
        Self {
            queue: CLICKUP_SYNC_QUEUE,
            concurrency: 3,
            max_attempts: 5,
            base_backoff: Duration::from_secs(5),
            keep_completed: 50,
            keep_failed: 200,
        }
    }

    pub fn resource_sync() -> Self {
        Self {
            queue: RESOURCE_SYNC_QUEUE,
            concurrency: 3,
            max_attempts: 5,
            base_backoff: Duration::from_secs(5),
            keep_completed: 50,
            keep_failed: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenshotJob {
    pub screenshot_id: Uuid,
    pub user_id: Uuid,
    pub image_base64: String,
    pub should_blur: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClickUpSyncJob {
    /// Row id in `clickup_workspaces`
    pub workspace_id: Uuid,
    pub organization_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSyncJob {
    pub integration_id: Uuid,
    pub organization_id: Uuid,
    #[serde(default)]
    pub full: bool,
}

/// How the worker should treat a failed attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    /// Credentials rejected; retrying cannot help
    Unauthorized,
    RateLimited {
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after_secs: Option<u64>,
    },
    Transient,
    Permanent,
}

/// Error returned by a [`JobHandler`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unauthorized,
            message: message.into(),
        }
    }

    pub fn rate_limited(retry_after_secs: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::RateLimited { retry_after_secs },
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::Transient | FailureKind::RateLimited { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            FailureKind::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }
}

impl From<IntegrationError> for JobFailure {
    fn from(err: IntegrationError) -> Self {
        let message = err.to_string();
        match err {
            IntegrationError::Authentication { .. } => Self::unauthorized(message),
            IntegrationError::RateLimit { retry_after, .. } => {
                Self::rate_limited(retry_after, message)
            }
            ref other if other.is_retryable() => Self::transient(message),
            _ => Self::permanent(message),
        }
    }
}

impl From<SyncError> for JobFailure {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Provider(inner) => inner.into(),
            SyncError::Database(inner) => inner.into(),
            SyncError::Internal(inner) => Self::transient(inner.to_string()),
            other => Self::permanent(other.to_string()),
        }
    }
}

impl From<RegistryError> for JobFailure {
    fn from(err: RegistryError) -> Self {
        Self::permanent(err.to_string())
    }
}

impl From<DbErr> for JobFailure {
    fn from(err: DbErr) -> Self {
        Self::transient(format!("database error: {err}"))
    }
}

impl From<StorageError> for JobFailure {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotConfigured(_) | StorageError::InvalidEndpoint(_) => {
                Self::permanent(err.to_string())
            }
            StorageError::Backend(ref source)
                if source.kind() == opendal::ErrorKind::ConfigInvalid =>
            {
                Self::permanent(err.to_string())
            }
            StorageError::Backend(_) => Self::transient(err.to_string()),
        }
    }
}

impl From<ImageError> for JobFailure {
    fn from(err: ImageError) -> Self {
        Self::permanent(err.to_string())
    }
}

impl From<serde_json::Error> for JobFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::permanent(format!("invalid job payload: {err}"))
    }
}

impl From<anyhow::Error> for JobFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::transient(err.to_string())
    }
}

/// Work performed for one queue
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn policy(&self) -> QueuePolicy;

    async fn handle(&self, job: &job::Model) -> Result<(), JobFailure>;

    /// Called once when a job is marked failed for good
    async fn on_exhausted(&self, _job: &job::Model, _failure: &JobFailure) {}
}

/// Enqueue a payload on the policy's queue, due immediately
pub async fn enqueue<T: Serialize>(
    jobs: &JobRepository,
    policy: &QueuePolicy,
    payload: &T,
) -> anyhow::Result<job::Model> {
    let payload = serde_json::to_value(payload)?;
    Ok(jobs
        .enqueue(policy.queue, payload, policy.max_attempts, Utc::now())
        .await?)
}
