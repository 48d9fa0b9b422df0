//! Periodic job runner.
//!
//! Each job gets its own task, so a job never overlaps itself. A failing run is
//! logged and the job stays on its schedule.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::Clock;

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Fixed period, first run one period after start.
    Every(Duration),
    /// Once a day at this UTC time.
    DailyAt(NaiveTime),
}

impl JobSchedule {
    /// How long to wait from `now` until the next run.
    pub fn delay_after(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            JobSchedule::Every(period) => period,
            JobSchedule::DailyAt(at) => {
                let today = now.date_naive().and_time(at).and_utc();
                let next = if today > now {
                    today
                } else {
                    today + chrono::Duration::days(1)
                };
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

pub struct Scheduler {
    jobs: Vec<(Arc<dyn Job>, JobSchedule)>,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Vec::new(),
            clock,
        }
    }

    pub fn add(mut self, job: Arc<dyn Job>, schedule: JobSchedule) -> Self {
        self.jobs.push((job, schedule));
        self
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|(job, _)| job.name()).collect()
    }

    /// Run one job immediately on the caller's task.
    pub async fn run_now(&self, name: &str) -> anyhow::Result<()> {
        let (job, _) = self
            .jobs
            .iter()
            .find(|(job, _)| job.name() == name)
            .ok_or_else(|| anyhow::anyhow!("unknown job '{}'", name))?;
        job.run().await
    }

    /// Spawn one task per job. Jobs keep running until the handle is shut down.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = self
            .jobs
            .into_iter()
            .map(|(job, schedule)| {
                tracing::info!(job = job.name(), schedule = ?schedule, "Job scheduled");
                tokio::spawn(run_job(
                    job,
                    schedule,
                    self.clock.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        SchedulerHandle { shutdown_tx, tasks }
    }
}

async fn run_job(
    job: Arc<dyn Job>,
    schedule: JobSchedule,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let delay = schedule.delay_after(clock.now());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }

        let started = std::time::Instant::now();
        match job.run().await {
            Ok(()) => tracing::debug!(
                job = job.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job completed"
            ),
            Err(e) => tracing::error!(job = job.name(), error = %e, "Job failed"),
        }
    }

    tracing::info!(job = job.name(), "Job stopped");
}

pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop every job. A run already in progress finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Job task panicked");
            }
        }
    }
}
