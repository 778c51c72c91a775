//! Cron-driven background jobs.
//!
//! A [`Scheduler`] is constructed once and shared (`Arc<Scheduler>`) with
//! whatever controls it. While running, each [`ScheduledJob`] gets its own
//! tokio task that sleeps until the next cron tick in local time and then
//! runs the job inline. [`Scheduler::stop`] signals every task through a
//! watch channel and waits for them to exit, so no timer fires after it
//! returns.
//!
//! Default jobs:
//!
//! | Job | Cron (sec min hour dom mon dow) | Work |
//! |-----|------|------|
//! | general fetch | `0 0 */6 * * *` | 5 tech articles |
//! | business fetch | `0 0 9-21/2 * * *` | 5 business articles |
//! | retention sweep | `0 0 2 * * *` | trim ingested posts to 50 |

use crate::error::{IngestError, SchedulerError};
use crate::models::{Category, IngestReport};
use crate::pipeline::{DedupeMode, Ingestor};
use chrono::{DateTime, Local};
use cron::Schedule;
use futures::future::join_all;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const GENERAL_FETCH_CRON: &str = "0 0 */6 * * *";
pub const BUSINESS_FETCH_CRON: &str = "0 0 9-21/2 * * *";
pub const SWEEP_CRON: &str = "0 0 2 * * *";

/// Articles fetched per scheduled run.
pub const SCHEDULED_FETCH_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Fetch { category: Category, limit: u32 },
    Sweep,
}

/// A job paired with the cron expression that triggers it.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub name: &'static str,
    pub job: Job,
    schedule: Schedule,
}

impl ScheduledJob {
    pub fn new(name: &'static str, expression: &str, job: Job) -> Result<Self, SchedulerError> {
        let schedule = Schedule::from_str(expression).map_err(|source| SchedulerError::Cron {
            expression: expression.to_string(),
            source,
        })?;
        Ok(Self {
            name,
            job,
            schedule,
        })
    }

    /// Next tick strictly after now, in local time.
    pub fn next_run(&self) -> Option<DateTime<Local>> {
        self.schedule.upcoming(Local).next()
    }
}

/// The three jobs the service runs by default.
pub fn default_jobs() -> Result<Vec<ScheduledJob>, SchedulerError> {
    Ok(vec![
        ScheduledJob::new(
            "general-fetch",
            GENERAL_FETCH_CRON,
            Job::Fetch {
                category: Category::Tech,
                limit: SCHEDULED_FETCH_LIMIT,
            },
        )?,
        ScheduledJob::new(
            "business-fetch",
            BUSINESS_FETCH_CRON,
            Job::Fetch {
                category: Category::Business,
                limit: SCHEDULED_FETCH_LIMIT,
            },
        )?,
        ScheduledJob::new("retention-sweep", SWEEP_CRON, Job::Sweep)?,
    ])
}

struct Running {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

pub struct Scheduler {
    ingestor: Arc<Ingestor>,
    jobs: Vec<ScheduledJob>,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    /// A stopped scheduler with the [`default_jobs`].
    pub fn new(ingestor: Arc<Ingestor>) -> Result<Self, SchedulerError> {
        Ok(Self::with_jobs(ingestor, default_jobs()?))
    }

    pub fn with_jobs(ingestor: Arc<Ingestor>, jobs: Vec<ScheduledJob>) -> Self {
        Self {
            ingestor,
            jobs,
            running: Mutex::new(None),
        }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Spawn one timer task per job. Returns `false` if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            info!("Scheduler already running");
            return false;
        }

        let (shutdown, rx) = watch::channel(false);
        let handles = self
            .jobs
            .iter()
            .map(|job| {
                tokio::spawn(run_timer(
                    Arc::clone(&self.ingestor),
                    job.clone(),
                    rx.clone(),
                ))
            })
            .collect();
        *running = Some(Running { shutdown, handles });
        info!(jobs = self.jobs.len(), "Scheduler started");
        true
    }

    /// Cancel every timer and wait for the tasks to exit. Returns `false` if
    /// the scheduler was not running.
    ///
    /// A job already mid-run finishes its current batch first.
    pub async fn stop(&self) -> bool {
        let taken = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Running { shutdown, handles }) = taken else {
            info!("Scheduler is not running");
            return false;
        };

        let _ = shutdown.send(true);
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Timer task ended abnormally");
            }
        }
        info!("Scheduler stopped");
        true
    }

    /// Run one ingestion batch right away, whether or not timers are running.
    pub async fn fetch_news_now(
        &self,
        category: Category,
        limit: u32,
    ) -> Result<IngestReport, IngestError> {
        info!(%category, limit, "Manual fetch triggered");
        self.ingestor
            .ingest(category, limit, DedupeMode::TitleOrSource)
            .await
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            let _ = running.shutdown.send(true);
        }
    }
}

async fn run_timer(ingestor: Arc<Ingestor>, job: ScheduledJob, mut shutdown: watch::Receiver<bool>) {
    loop {
        let Some(next) = job.next_run() else {
            warn!(job = job.name, "Schedule has no upcoming runs");
            return;
        };
        let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => return,
        }
        if *shutdown.borrow() {
            return;
        }

        info!(job = job.name, "Running scheduled job");
        run_job(&ingestor, job.job).await;
    }
}

async fn run_job(ingestor: &Ingestor, job: Job) {
    match job {
        Job::Fetch { category, limit } => {
            match ingestor.ingest(category, limit, DedupeMode::TitleOrSource).await {
                Ok(report) => info!(
                    %category,
                    saved = report.saved_count(),
                    errors = report.errors.len(),
                    "Scheduled fetch done"
                ),
                Err(e) => error!(%category, error = %e, "Scheduled fetch failed"),
            }
        }
        Job::Sweep => match ingestor.sweep().await {
            Ok(report) => info!(deleted = report.deleted, "Scheduled sweep done"),
            Err(e) => error!(error = %e, "Scheduled sweep failed"),
        },
    }
}
