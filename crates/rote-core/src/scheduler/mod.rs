//! Per-learner review scheduling.
//!
//! Uses tokio-cron-scheduler for the repeated review jobs. Each active
//! learner owns exactly one job; activating again replaces the previous
//! job, so interval changes take effect immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::engine::ReviewEngine;
use crate::error::{RoteError, RoteResult};

/// Scheduler driving periodic review ticks, one job per active learner.
pub struct ReviewScheduler {
    /// The job scheduler.
    scheduler: JobScheduler,
    /// The engine each job ticks against.
    engine: Arc<ReviewEngine>,
    /// Map of learner ID to job UUID.
    job_map: RwLock<HashMap<Uuid, uuid::Uuid>>,
    /// Whether scheduler is running.
    running: RwLock<bool>,
}

impl ReviewScheduler {
    /// Create a new scheduler over the given engine.
    pub async fn new(engine: Arc<ReviewEngine>) -> RoteResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| RoteError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            engine,
            job_map: RwLock::new(HashMap::new()),
            running: RwLock::new(false),
        })
    }

    /// Start the scheduler.
    pub async fn start(&self) -> RoteResult<()> {
        let mut running = self.running.write().await;
        if !*running {
            self.scheduler
                .start()
                .await
                .map_err(|e| RoteError::internal(format!("Failed to start scheduler: {}", e)))?;
            *running = true;
        }
        Ok(())
    }

    /// Stop the scheduler.
    pub async fn shutdown(&mut self) -> RoteResult<()> {
        let mut running = self.running.write().await;
        if *running {
            self.scheduler
                .shutdown()
                .await
                .map_err(|e| RoteError::internal(format!("Failed to shutdown scheduler: {}", e)))?;
            *running = false;
        }
        Ok(())
    }

    /// Check if scheduler is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Get the number of scheduled jobs.
    pub async fn job_count(&self) -> usize {
        self.job_map.read().await.len()
    }

    /// Turn on periodic reviews for a learner.
    ///
    /// Marks the learner active, stores the interval (when one is given),
    /// replaces any existing job, and runs the first tick right away so
    /// the learner does not wait a full interval for their first question.
    /// Suppression still applies to that first tick.
    pub async fn activate(
        &self,
        learner_id: Uuid,
        interval_minutes: Option<u32>,
    ) -> RoteResult<()> {
        let repository = self.engine.repository();
        let mut learner = repository
            .get_learner(learner_id)?
            .ok_or_else(|| RoteError::learner_not_found(learner_id))?;

        if let Some(minutes) = interval_minutes {
            learner.interval_minutes = minutes;
        }
        if learner.interval_minutes == 0 {
            return Err(RoteError::Configuration(
                "review interval must be at least one minute".to_string(),
            ));
        }

        learner.active = true;
        repository.update_learner(&learner)?;

        self.unschedule(learner_id).await?;
        self.schedule_job(learner_id, learner.interval_minutes)
            .await?;
        info!(
            %learner_id,
            interval_minutes = learner.interval_minutes,
            "review schedule activated"
        );

        // Immediate first tick
        match self.engine.tick(learner_id).await {
            Ok(outcome) => debug!(%learner_id, ?outcome, "activation tick"),
            Err(e) => error!(%learner_id, error = %e, "activation tick failed"),
        }
        Ok(())
    }

    /// Turn off periodic reviews for a learner and drop their job.
    pub async fn deactivate(&self, learner_id: Uuid) -> RoteResult<()> {
        let repository = self.engine.repository();
        let mut learner = repository
            .get_learner(learner_id)?
            .ok_or_else(|| RoteError::learner_not_found(learner_id))?;
        learner.active = false;
        repository.update_learner(&learner)?;

        self.unschedule(learner_id).await?;
        info!(%learner_id, "review schedule deactivated");
        Ok(())
    }

    /// Silence a learner's ticks until the given time. The job keeps
    /// firing; ticks inside the window are no-ops.
    pub async fn set_suppressed_until(
        &self,
        learner_id: Uuid,
        until: DateTime<Utc>,
    ) -> RoteResult<()> {
        let repository = self.engine.repository();
        let mut learner = repository
            .get_learner(learner_id)?
            .ok_or_else(|| RoteError::learner_not_found(learner_id))?;
        learner.suppressed_until = Some(until);
        repository.update_learner(&learner)?;
        info!(%learner_id, until = %until.to_rfc3339(), "reviews suppressed");
        Ok(())
    }

    /// Lift a learner's do-not-disturb window.
    pub async fn clear_suppression(&self, learner_id: Uuid) -> RoteResult<()> {
        let repository = self.engine.repository();
        let mut learner = repository
            .get_learner(learner_id)?
            .ok_or_else(|| RoteError::learner_not_found(learner_id))?;
        learner.suppressed_until = None;
        repository.update_learner(&learner)?;
        Ok(())
    }

    /// Recreate jobs for every active learner. Called once at startup;
    /// no immediate tick is run here.
    pub async fn restore(&self) -> RoteResult<usize> {
        let learners = self.engine.repository().list_active_learners()?;
        let mut count = 0;

        for learner in learners {
            if learner.interval_minutes == 0 {
                error!(learner_id = %learner.id, "skipping learner with zero interval");
                continue;
            }
            self.unschedule(learner.id).await?;
            self.schedule_job(learner.id, learner.interval_minutes).await?;
            count += 1;
        }

        info!(count, "review schedules restored");
        Ok(count)
    }

    async fn schedule_job(&self, learner_id: Uuid, interval_minutes: u32) -> RoteResult<()> {
        let engine = self.engine.clone();
        let period = Duration::from_secs(u64::from(interval_minutes) * 60);

        let job = Job::new_repeated_async(period, move |_uuid, _lock| {
            let engine = engine.clone();
            Box::pin(async move {
                // Tick failures are logged, never fatal to the job.
                match engine.tick(learner_id).await {
                    Ok(outcome) => debug!(%learner_id, ?outcome, "review tick"),
                    Err(e) => error!(%learner_id, error = %e, "review tick failed"),
                }
            })
        })
        .map_err(|e| RoteError::internal(format!("Failed to create repeated job: {}", e)))?;

        let job_id = job.guid();
        self.scheduler
            .add(job)
            .await
            .map_err(|e| RoteError::internal(format!("Failed to add job: {}", e)))?;

        self.job_map.write().await.insert(learner_id, job_id);
        Ok(())
    }

    async fn unschedule(&self, learner_id: Uuid) -> RoteResult<()> {
        let mut job_map = self.job_map.write().await;
        if let Some(job_id) = job_map.remove(&learner_id) {
            self.scheduler
                .remove(&job_id)
                .await
                .map_err(|e| RoteError::internal(format!("Failed to remove job: {}", e)))?;
        }
        Ok(())
    }
}
