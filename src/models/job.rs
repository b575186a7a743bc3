//! Job entity model
//!
//! A unit of background work on a named durable queue. Rows move
//! `queued -> running -> completed`, or back to `queued` with a later `run_at`
//! after a retryable failure, and finally to `failed` once attempts run out.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

/// Job entity representing one queued unit of work
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    /// Unique identifier for the job (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Queue name (e.g. `screenshots`, `clickup-sync`)
    pub queue: String,

    /// Handler input, shape defined by the queue
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: JsonValue,

    /// Current status: queued, running, completed or failed
    pub status: String,

    /// Number of attempts started so far
    pub attempts: i32,

    /// Attempts allowed before the job is marked failed
    pub max_attempts: i32,

    /// Earliest time the job may be claimed
    pub run_at: DateTimeWithTimeZone,

    /// Token of the claim that moved the job to running
    pub claim_token: Option<Uuid>,

    /// Structured details of the most recent failure
    #[sea_orm(column_type = "JsonBinary")]
    pub last_error: Option<JsonValue>,

    /// Timestamp when the current attempt started
    pub started_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the job reached a terminal status
    pub finished_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// API view of a job, used for failed job inspection
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: Uuid,
    pub queue: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    #[schema(value_type = Object)]
    pub last_error: Option<JsonValue>,
    pub created_at: String,
    pub finished_at: Option<String>,
}

impl From<Model> for JobInfo {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            queue: model.queue,
            status: model.status,
            attempts: model.attempts,
            max_attempts: model.max_attempts,
            last_error: model.last_error,
            created_at: model.created_at.to_rfc3339(),
            finished_at: model.finished_at.map(|ts| ts.to_rfc3339()),
        }
    }
}
