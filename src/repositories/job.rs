//! Job repository
//!
//! Durable queue operations on the `jobs` table: enqueue, transactional
//! claiming under a claim token, completion/retry bookkeeping, pruning and
//! recovery of stale running rows.

use chrono::{DateTime, Utc};
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait, TryIntoModel,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::job::{
    self, Entity as Job, STATUS_COMPLETED, STATUS_FAILED, STATUS_QUEUED, STATUS_RUNNING,
};

/// Upper bound of rows removed by a single prune pass
const PRUNE_SCAN_LIMIT: u64 = 10_000;

/// Repository for job queue operations
#[derive(Debug, Clone)]
pub struct JobRepository {
    db: DatabaseConnection,
}

impl JobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a queued job due at `run_at`
    pub async fn enqueue(
        &self,
        queue: &str,
        payload: JsonValue,
        max_attempts: i32,
        run_at: DateTime<Utc>,
    ) -> Result<job::Model, DbErr> {
        let now = Utc::now();
        let row = job::ActiveModel {
            id: Set(Uuid::new_v4()),
            queue: Set(queue.to_string()),
            payload: Set(payload),
            status: Set(STATUS_QUEUED.to_string()),
            attempts: Set(0),
            max_attempts: Set(max_attempts),
            run_at: Set(run_at.into()),
            claim_token: Set(None),
            last_error: Set(None),
            started_at: Set(None),
            finished_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let model = row.clone().try_into_model()?;
        Job::insert(row).exec_without_returning(&self.db).await?;
        Ok(model)
    }

    /// Claim up to `limit` due jobs of a queue.
    ///
    /// Selects due queued rows and flips them to running under a fresh claim
    /// token inside one transaction; only rows still queued are taken, so two
    /// workers never claim the same job.
    pub async fn claim(
        &self,
        queue: &str,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<job::Model>, DbErr> {
        let now_tz: DateTimeWithTimeZone = now.into();
        let txn = self.db.begin().await?;

        let due: Vec<Uuid> = Job::find()
            .select_only()
            .column(job::Column::Id)
            .filter(job::Column::Queue.eq(queue))
            .filter(job::Column::Status.eq(STATUS_QUEUED))
            .filter(job::Column::RunAt.lte(now_tz))
            .order_by_asc(job::Column::RunAt)
            .order_by_asc(job::Column::CreatedAt)
            .limit(Some(limit))
            .into_tuple::<Uuid>()
            .all(&txn)
            .await?;

        if due.is_empty() {
            txn.commit().await?;
            return Ok(Vec::new());
        }

        let claim_token = Uuid::new_v4();
        Job::update_many()
            .col_expr(job::Column::Status, Expr::value(STATUS_RUNNING))
            .col_expr(job::Column::ClaimToken, Expr::value(claim_token))
            .col_expr(job::Column::StartedAt, Expr::value(now_tz))
            .col_expr(job::Column::UpdatedAt, Expr::value(now_tz))
            .col_expr(
                job::Column::Attempts,
                Expr::col(job::Column::Attempts).add(1),
            )
            .filter(job::Column::Id.is_in(due))
            .filter(job::Column::Status.eq(STATUS_QUEUED))
            .exec(&txn)
            .await?;

        let claimed = Job::find()
            .filter(job::Column::ClaimToken.eq(claim_token))
            .filter(job::Column::Status.eq(STATUS_RUNNING))
            .order_by_asc(job::Column::RunAt)
            .all(&txn)
            .await?;

        txn.commit().await?;
        Ok(claimed)
    }

    pub async fn complete(&self, job_id: Uuid) -> Result<(), DbErr> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        Job::update_many()
            .col_expr(job::Column::Status, Expr::value(STATUS_COMPLETED))
            .col_expr(job::Column::FinishedAt, Expr::value(now))
            .col_expr(job::Column::UpdatedAt, Expr::value(now))
            .col_expr(job::Column::LastError, Expr::value(Option::<JsonValue>::None))
            .filter(job::Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Return the job to the queue, due again at `run_at`
    pub async fn retry(
        &self,
        job_id: Uuid,
        run_at: DateTime<Utc>,
        error: JsonValue,
    ) -> Result<(), DbErr> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let run_at: DateTimeWithTimeZone = run_at.into();
        Job::update_many()
            .col_expr(job::Column::Status, Expr::value(STATUS_QUEUED))
            .col_expr(job::Column::RunAt, Expr::value(run_at))
            .col_expr(job::Column::ClaimToken, Expr::value(Option::<Uuid>::None))
            .col_expr(job::Column::LastError, Expr::value(error))
            .col_expr(job::Column::UpdatedAt, Expr::value(now))
            .filter(job::Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Mark the job as failed for good; the row is kept for inspection
    pub async fn fail(&self, job_id: Uuid, error: JsonValue) -> Result<(), DbErr> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        Job::update_many()
            .col_expr(job::Column::Status, Expr::value(STATUS_FAILED))
            .col_expr(job::Column::FinishedAt, Expr::value(now))
            .col_expr(job::Column::LastError, Expr::value(error))
            .col_expr(job::Column::UpdatedAt, Expr::value(now))
            .filter(job::Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Keep only the newest `keep` rows with the given terminal status
    pub async fn prune(&self, queue: &str, status: &str, keep: u64) -> Result<u64, DbErr> {
        let stale: Vec<Uuid> = Job::find()
            .select_only()
            .column(job::Column::Id)
            .filter(job::Column::Queue.eq(queue))
            .filter(job::Column::Status.eq(status))
            .order_by_desc(job::Column::FinishedAt)
            .order_by_desc(job::Column::CreatedAt)
            .offset(keep)
            .limit(Some(PRUNE_SCAN_LIMIT))
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await?;

        if stale.is_empty() {
            return Ok(0);
        }

        let result = Job::delete_many()
            .filter(job::Column::Id.is_in(stale))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Requeue running rows started before `started_before`; returns the count
    pub async fn recover_stale(
        &self,
        queue: &str,
        started_before: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let cutoff: DateTimeWithTimeZone = started_before.into();
        let now: DateTimeWithTimeZone = Utc::now().into();
        let result = Job::update_many()
            .col_expr(job::Column::Status, Expr::value(STATUS_QUEUED))
            .col_expr(job::Column::ClaimToken, Expr::value(Option::<Uuid>::None))
            .col_expr(job::Column::RunAt, Expr::value(now))
            .col_expr(job::Column::UpdatedAt, Expr::value(now))
            .filter(job::Column::Queue.eq(queue))
            .filter(job::Column::Status.eq(STATUS_RUNNING))
            .filter(job::Column::StartedAt.lt(cutoff))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn find(&self, job_id: Uuid) -> Result<Option<job::Model>, DbErr> {
        Job::find_by_id(job_id).one(&self.db).await
    }

    /// Failed jobs, newest first, optionally for one queue
    pub async fn list_failed(&self, queue: Option<&str>, limit: u64) -> Result<Vec<job::Model>, DbErr> {
        let mut query = Job::find().filter(job::Column::Status.eq(STATUS_FAILED));
        if let Some(queue) = queue {
            query = query.filter(job::Column::Queue.eq(queue));
        }
        query
            .order_by_desc(job::Column::FinishedAt)
            .limit(Some(limit))
            .all(&self.db)
            .await
    }

    /// Count of jobs in a queue with the given status
    pub async fn count(&self, queue: &str, status: &str) -> Result<u64, DbErr> {
        Job::find()
            .filter(job::Column::Queue.eq(queue))
            .filter(job::Column::Status.eq(status))
            .count(&self.db)
            .await
    }
}
