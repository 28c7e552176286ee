//! Repository for the `jobs` table.
//!
//! Every scheduler-driven write carries a status guard in its `WHERE`
//! clause so that the poller and the executors can race without
//! clobbering each other (see the individual methods).

use linguist_core::types::DbId;
use linguist_core::validation::{clamp_page, clamp_page_size, page_offset};
use sqlx::PgPool;

use crate::models::job::{CreateJob, Job, JobListQuery, JobPage, PatchJobStatus};
use crate::models::status::{JobStatus, StatusId};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, name, catalog_id, from_locale, to_locale, payload, \
    status_id, progress_percent, current_step, worker_id, \
    error_message, results, retry_of_job_id, \
    created_at, started_at, completed_at, updated_at";

/// Statuses the scheduler may still finalize.
const ACTIVE_STATUSES: [StatusId; 2] = [JobStatus::Pending as StatusId, JobStatus::Running as StatusId];

/// Provides queries and guarded state transitions for localization jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job.
    pub async fn create(pool: &PgPool, input: &CreateJob) -> Result<Job, sqlx::Error> {
        Self::insert(pool, input, None).await
    }

    async fn insert(
        pool: &PgPool,
        input: &CreateJob,
        retry_of: Option<DbId>,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (name, catalog_id, from_locale, to_locale, payload, status_id, retry_of_job_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&input.name)
            .bind(&input.catalog_id)
            .bind(&input.from_locale)
            .bind(&input.to_locale)
            .bind(&input.payload)
            .bind(JobStatus::Pending.id())
            .bind(retry_of)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Oldest pending jobs first, at most `limit` rows.
    pub async fn fetch_pending(pool: &PgPool, limit: i64) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = $1 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Pending.id())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Move a pending job to running on `worker_id`.
    ///
    /// Returns `false` when the row is no longer pending (the executor may
    /// already have finalized it), in which case nothing is written.
    pub async fn mark_running(
        pool: &PgPool,
        job_id: DbId,
        worker_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, worker_id = $3, \
                 started_at = COALESCE(started_at, NOW()), updated_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Running.id())
        .bind(worker_id)
        .bind(JobStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a progress checkpoint on a running job.
    ///
    /// Progress never decreases: the stored value is the max of the old and
    /// new percentages.
    pub async fn update_progress(
        pool: &PgPool,
        job_id: DbId,
        percent: i16,
        step: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET progress_percent = GREATEST(progress_percent, $2), \
                 current_step = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(percent)
        .bind(step)
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a job as completed with its result payload.
    ///
    /// Fills `worker_id` and `started_at` if the running transition has
    /// not been persisted yet.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        worker_id: &str,
        results: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, results = $3, progress_percent = 100, \
                 worker_id = COALESCE(worker_id, $4), \
                 started_at = COALESCE(started_at, NOW()), \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($5, $6)",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.id())
        .bind(results)
        .bind(worker_id)
        .bind(ACTIVE_STATUSES[0])
        .bind(ACTIVE_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a job as failed with an error message.
    ///
    /// No automatic retry is performed; see [`JobRepo::retry`].
    pub async fn fail(
        pool: &PgPool,
        job_id: DbId,
        worker_id: &str,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, \
                 worker_id = COALESCE(worker_id, $4), \
                 started_at = COALESCE(started_at, NOW()), \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($5, $6)",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(worker_id)
        .bind(ACTIVE_STATUSES[0])
        .bind(ACTIVE_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a running job whose worker assignment was cancelled.
    ///
    /// Only running rows are touched, so a manual override that already
    /// moved the job to a terminal status is preserved.
    pub async fn cancel_running(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(job_id)
        .bind(JobStatus::Cancelled.id())
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel every running job. Called once at startup, before any worker
    /// exists, so each running row belongs to a previous process.
    pub async fn cancel_orphaned(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $1, completed_at = NOW(), updated_at = NOW() \
             WHERE status_id = $2",
        )
        .bind(JobStatus::Cancelled.id())
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Apply a manual status override.
    ///
    /// `expected` is the status the caller validated the transition
    /// against; returns `None` if the row changed status in between.
    /// Progress only moves forward unless the new status is terminal.
    pub async fn override_status(
        pool: &PgPool,
        job_id: DbId,
        expected: JobStatus,
        patch: &PatchJobStatus,
    ) -> Result<Option<Job>, sqlx::Error> {
        let terminal = patch.status.is_terminal();
        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, \
                 progress_percent = CASE WHEN $6 THEN COALESCE($3, progress_percent) \
                     ELSE GREATEST(progress_percent, COALESCE($3, progress_percent)) END, \
                 current_step = COALESCE($4, current_step), \
                 error_message = COALESCE($5, error_message), \
                 completed_at = CASE WHEN $6 THEN COALESCE(completed_at, NOW()) ELSE completed_at END, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $7 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(patch.status.id())
            .bind(patch.progress_percent)
            .bind(patch.current_step.as_deref())
            .bind(patch.error_message.as_deref())
            .bind(terminal)
            .bind(expected.id())
            .fetch_optional(pool)
            .await
    }

    /// Create a new pending job from an existing job's parameters.
    ///
    /// The new job has `retry_of_job_id` pointing to the original.
    pub async fn retry(pool: &PgPool, original: &Job) -> Result<Job, sqlx::Error> {
        let input = CreateJob {
            name: original.name.clone(),
            catalog_id: original.catalog_id.clone(),
            from_locale: original.from_locale.clone(),
            to_locale: original.to_locale.clone(),
            payload: original.payload.clone(),
        };
        Self::insert(pool, &input, Some(original.id)).await
    }

    /// List jobs newest first with an optional status filter.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<JobPage, sqlx::Error> {
        let page = clamp_page(params.page);
        let page_size = clamp_page_size(params.page_size);
        let offset = page_offset(page, page_size);
        let status_id = params.status.map(JobStatus::id);

        // `$1 IS NULL` keeps a single statement for the filtered and
        // unfiltered cases.
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE ($1::SMALLINT IS NULL OR status_id = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        let items = sqlx::query_as::<_, Job>(&query)
            .bind(status_id)
            .bind(page_size)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM jobs WHERE ($1::SMALLINT IS NULL OR status_id = $1)",
        )
        .bind(status_id)
        .fetch_one(pool)
        .await?;

        Ok(JobPage {
            items,
            page,
            page_size,
            total,
        })
    }
}
