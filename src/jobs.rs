use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Job, NewJob};
use crate::schema::jobs;

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_FAILED: &str = "failed";

pub const JOB_GENERATE_THUMBNAIL: &str = "generate-thumbnail";

/// Deliveries after which a retrying job is marked failed instead.
pub const MAX_ATTEMPTS: i32 = 5;

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type JobQueueResult<T> = Result<T, JobQueueError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailPayload {
    pub kind: String,
    pub record_id: Uuid,
    pub storage_key: String,
}

pub fn enqueue_thumbnail(
    conn: &mut PgConnection,
    kind: &str,
    record_id: Uuid,
    storage_key: &str,
) -> JobQueueResult<Job> {
    let payload = ThumbnailPayload {
        kind: kind.to_string(),
        record_id,
        storage_key: storage_key.to_string(),
    };
    let payload = serde_json::to_value(&payload)?;
    enqueue_job(conn, JOB_GENERATE_THUMBNAIL, payload, None)
}

pub fn enqueue_job(
    conn: &mut PgConnection,
    job_type: &str,
    payload: Value,
    run_after: Option<NaiveDateTime>,
) -> JobQueueResult<Job> {
    let new_job = NewJob {
        id: Uuid::new_v4(),
        job_type: job_type.to_string(),
        payload,
        status: STATUS_QUEUED.to_string(),
        run_after: run_after.unwrap_or_else(|| Utc::now().naive_utc()),
    };

    Ok(diesel::insert_into(jobs::table)
        .values(&new_job)
        .get_result::<Job>(conn)?)
}

/// Claims the oldest due job of one of `job_types`. Rows locked by another
/// worker are skipped, so concurrent workers never claim the same job.
pub fn reserve_job(conn: &mut PgConnection, job_types: &[&str]) -> JobQueueResult<Option<Job>> {
    let now = Utc::now().naive_utc();

    let reserved = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let Some(job) = jobs::table
            .filter(jobs::status.eq(STATUS_QUEUED))
            .filter(jobs::run_after.le(now))
            .filter(jobs::job_type.eq_any(job_types))
            .order((jobs::run_after.asc(), jobs::created_at.asc()))
            .for_update()
            .skip_locked()
            .first::<Job>(conn)
            .optional()?
        else {
            return Ok(None);
        };

        diesel::update(jobs::table.find(job.id))
            .set((
                jobs::status.eq(STATUS_PROCESSING),
                jobs::attempts.eq(jobs::attempts + 1),
                jobs::updated_at.eq(now),
            ))
            .get_result::<Job>(conn)
            .map(Some)
    })?;
    Ok(reserved)
}

fn settle(
    conn: &mut PgConnection,
    job_id: Uuid,
    status: &str,
    last_error: Option<&str>,
) -> JobQueueResult<()> {
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(status),
            jobs::last_error.eq(last_error),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn mark_job_succeeded(conn: &mut PgConnection, job_id: Uuid) -> JobQueueResult<()> {
    settle(conn, job_id, STATUS_SUCCEEDED, None)
}

pub fn mark_job_failed(
    conn: &mut PgConnection,
    job_id: Uuid,
    error_message: &str,
) -> JobQueueResult<()> {
    settle(conn, job_id, STATUS_FAILED, Some(error_message))
}

/// Puts the job back in the queue, due after `delay`.
pub fn retry_job_after(
    conn: &mut PgConnection,
    job_id: Uuid,
    delay: Duration,
    error_message: &str,
) -> JobQueueResult<()> {
    let delay = ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(30));
    let next_run = (Utc::now() + delay).naive_utc();

    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_QUEUED),
            jobs::run_after.eq(next_run),
            jobs::last_error.eq(error_message),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn attempts_exhausted(job: &Job) -> bool {
    job.attempts >= MAX_ATTEMPTS
}

/// Requeues `job` after `delay` unless it has used up its attempts, in which
/// case it is marked failed. Returns `true` when the job was requeued.
pub fn retry_or_fail(
    conn: &mut PgConnection,
    job: &Job,
    delay: Duration,
    error_message: &str,
) -> JobQueueResult<bool> {
    if attempts_exhausted(job) {
        mark_job_failed(conn, job.id, error_message)?;
        Ok(false)
    } else {
        retry_job_after(conn, job.id, delay, error_message)?;
        Ok(true)
    }
}
