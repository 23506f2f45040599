use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use diesel::pg::PgConnection;
use thiserror::Error;
use tokio::{task, time::sleep};
use tracing::{error, info, warn};

use crate::{
    jobs::{mark_job_failed, mark_job_succeeded, reserve_job, retry_or_fail, JobQueueError},
    models::Job,
    state::AppState,
};

pub mod thumbnails;

#[derive(Debug)]
pub enum JobExecution {
    Success,
    Retry { delay: Duration, error: String },
    Failed { error: String },
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> &'static str;
    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution;
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] JobQueueError),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("queue task failed: {0}")]
    Task(#[from] task::JoinError),
}

pub struct Worker {
    state: Arc<AppState>,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        state: Arc<AppState>,
        handlers: Vec<Arc<dyn JobHandler>>,
        poll_interval: Duration,
    ) -> Self {
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.job_type(), handler))
            .collect();
        Self {
            state,
            handlers,
            poll_interval,
        }
    }

    /// Polls until the task is dropped. Sleeps only when the queue is empty
    /// or a tick failed.
    pub async fn run(&self) {
        info!(job_types = ?self.job_types(), "worker started");
        loop {
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => sleep(self.poll_interval).await,
                Err(err) => {
                    error!(error = %err, "worker tick failed");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Runs at most one job. Returns `true` when a job was processed.
    pub async fn tick(&self) -> Result<bool, WorkerError> {
        let job_types = self.job_types();
        if job_types.is_empty() {
            return Ok(false);
        }

        let Some(job) = self
            .with_conn(move |conn| reserve_job(conn, &job_types))
            .await?
        else {
            return Ok(false);
        };

        let outcome = match self.handlers.get(job.job_type.as_str()) {
            Some(handler) => handler.handle(self.state.clone(), job.clone()).await,
            None => JobExecution::Failed {
                error: "no handler registered".into(),
            },
        };
        self.settle(job, outcome).await?;
        Ok(true)
    }

    fn job_types(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    async fn settle(&self, job: Job, outcome: JobExecution) -> Result<(), WorkerError> {
        self.with_conn(move |conn| {
            match outcome {
                JobExecution::Success => {
                    mark_job_succeeded(conn, job.id)?;
                    info!(job_id = %job.id, job_type = %job.job_type, "job completed");
                }
                JobExecution::Retry { delay, error } => {
                    if retry_or_fail(conn, &job, delay, &error)? {
                        warn!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, %error, "job will retry");
                    } else {
                        error!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, %error, "job exhausted its attempts");
                    }
                }
                JobExecution::Failed { error } => {
                    error!(job_id = %job.id, job_type = %job.job_type, %error, "job failed");
                    mark_job_failed(conn, job.id, &error)?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, WorkerError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, JobQueueError> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.state.clone();
        task::spawn_blocking(move || -> Result<T, WorkerError> {
            let mut conn = state
                .pool
                .get()
                .map_err(|err| WorkerError::Pool(err.to_string()))?;
            Ok(f(&mut conn)?)
        })
        .await?
    }
}

pub fn default_handlers() -> Vec<Arc<dyn JobHandler>> {
    vec![Arc::new(thumbnails::GenerateThumbnailJob::new())]
}
