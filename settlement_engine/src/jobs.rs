//! The background job engine: a bounded queue drained by a fixed pool of worker tasks, with
//! per-job cooperative cancellation and sticky terminal states.
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex as StdMutex},
    time::Instant,
};

use log::{debug, error, info, warn};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError, Receiver},
        Mutex as AsyncMutex,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    db_types::{Job, JobType, SettlementParams},
    metrics,
    settlement::{parse_window, SettlementAggregator},
    traits::{PlatformDatabase, PlatformError},
};

/// Tokens for in-flight jobs, so `cancel` can reach the run that owns the job id. Write-once per
/// job id; removed when the run finishes.
type CancelMap = Arc<StdMutex<HashMap<Uuid, CancellationToken>>>;

#[derive(Debug, Clone)]
pub struct JobEngineConfig {
    /// Parallel job slots.
    pub workers: usize,
    /// Transactions per page handed to the aggregator.
    pub batch_size: i64,
    /// Bounded submission backlog.
    pub queue_size: usize,
    /// Directory settlement reports are written to.
    pub output_dir: PathBuf,
}

impl Default for JobEngineConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            batch_size: 10_000,
            queue_size: 100,
            output_dir: PathBuf::from("/tmp/settlements"),
        }
    }
}

/// `JobEngine` owns job lifecycle management: submission, bounded concurrency, progress-bearing
/// execution and cancellation routing.
pub struct JobEngine<B> {
    db: Arc<B>,
    config: JobEngineConfig,
    queue_tx: mpsc::Sender<Job>,
    // Taken once by `start`.
    queue_rx: StdMutex<Option<Receiver<Job>>>,
    shutdown: CancellationToken,
    cancel_map: CancelMap,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

impl<B> JobEngine<B>
where
    B: PlatformDatabase + 'static,
{
    pub fn new(db: Arc<B>, config: JobEngineConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_size.max(1));
        Self {
            db,
            config,
            queue_tx,
            queue_rx: StdMutex::new(Some(queue_rx)),
            shutdown: CancellationToken::new(),
            cancel_map: Arc::new(StdMutex::new(HashMap::new())),
            workers: StdMutex::new(Vec::new()),
        }
    }

    /// Launches the worker pool. Idempotent; only the first call spawns anything.
    pub fn start(&self) {
        let Some(queue_rx) = self.queue_rx.lock().expect("queue receiver lock").take() else {
            warn!("⚙️ Job engine start called twice; ignoring");
            return;
        };
        info!(
            "⚙️ Starting job engine: {} workers, batch size {}, queue size {}",
            self.config.workers, self.config.batch_size, self.config.queue_size
        );
        let queue = Arc::new(AsyncMutex::new(queue_rx));
        let mut handles = self.workers.lock().expect("worker handle lock");
        for worker_id in 0..self.config.workers {
            handles.push(tokio::spawn(run_worker(
                worker_id,
                Arc::clone(&self.db),
                Arc::clone(&queue),
                self.shutdown.clone(),
                Arc::clone(&self.cancel_map),
                self.config.clone(),
            )));
        }
    }

    /// Validates the date range, persists a QUEUED job row and enqueues it without blocking.
    ///
    /// A full queue fails with [`PlatformError::QueueFull`]; a shut-down engine fails with
    /// [`PlatformError::Cancelled`]. In both cases the persisted row stays QUEUED.
    pub async fn submit_settlement(&self, params: SettlementParams) -> Result<Job, PlatformError> {
        parse_window(&params)?;
        if self.shutdown.is_cancelled() {
            return Err(PlatformError::Cancelled);
        }
        let job = Job::new_settlement(&params)?;
        self.db.create_job(&job).await?;
        match self.queue_tx.try_send(job.clone()) {
            Ok(()) => {
                metrics::JOBS_CREATED.with_label_values(&[&job.job_type.to_string()]).inc();
                info!("⚙️ Settlement job [{}] queued ({} to {})", job.id, params.from, params.to);
                Ok(job)
            },
            Err(TrySendError::Full(_)) => Err(PlatformError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(PlatformError::Cancelled),
        }
    }

    pub async fn job(&self, id: Uuid) -> Result<Job, PlatformError> {
        self.db.fetch_job(id).await
    }

    /// Requests cancellation of a job.
    ///
    /// The persisted status flips to CANCELLED only from QUEUED or RUNNING; anything else surfaces
    /// [`PlatformError::JobAlreadyCancelled`], which callers must treat as non-fatal (the job may
    /// simply have finished first). If the job is in flight, its token is triggered so the run
    /// aborts at its next check.
    pub async fn cancel(&self, id: Uuid) -> Result<(), PlatformError> {
        self.db.cancel_job(id).await?;
        if let Some(token) = self.cancel_map.lock().expect("cancel map lock").get(&id) {
            token.cancel();
        }
        info!("⚙️ Cancellation requested for job [{id}]");
        Ok(())
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.config.output_dir
    }

    /// Stops accepting submissions, signals every worker and in-flight job, and joins the pool.
    /// Queued-but-unstarted jobs remain QUEUED in storage.
    pub async fn shutdown(&self) {
        info!("⚙️ Shutting down job engine");
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().expect("worker handle lock").drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("⚙️ Worker task panicked during shutdown: {e}");
            }
        }
        info!("⚙️ Job engine stopped");
    }
}

async fn run_worker<B>(
    worker_id: usize,
    db: Arc<B>,
    queue: Arc<AsyncMutex<Receiver<Job>>>,
    shutdown: CancellationToken,
    cancel_map: CancelMap,
    config: JobEngineConfig,
) where
    B: PlatformDatabase + 'static,
{
    debug!("⚙️ Worker {worker_id} started");
    loop {
        // Hold the receiver lock only while waiting for a job; processing happens outside it so
        // the other workers can pick up work concurrently.
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(job) = next else {
            debug!("⚙️ Worker {worker_id} stopped");
            break;
        };
        process_job(worker_id, &db, &job, &shutdown, &cancel_map, &config).await;
    }
}

async fn process_job<B>(
    worker_id: usize,
    db: &Arc<B>,
    job: &Job,
    shutdown: &CancellationToken,
    cancel_map: &CancelMap,
    config: &JobEngineConfig,
) where
    B: PlatformDatabase + 'static,
{
    let started = Instant::now();
    info!("⚙️ Worker {worker_id} picked up {} job [{}]", job.job_type, job.id);

    // Child of the engine root: engine shutdown cancels every in-flight job too.
    let token = shutdown.child_token();
    cancel_map.lock().expect("cancel map lock").insert(job.id, token.clone());
    let outcome = execute_job(db, job, &token, config).await;
    cancel_map.lock().expect("cancel map lock").remove(&job.id);

    let job_type = job.job_type.to_string();
    metrics::JOBS_COMPLETED.with_label_values(&[&job_type, outcome]).inc();
    metrics::JOB_DURATION.with_label_values(&[&job_type]).observe(started.elapsed().as_secs_f64());
    info!("⚙️ Job [{}] finished with outcome '{outcome}' after {:.2}s", job.id, started.elapsed().as_secs_f64());
}

/// Runs the job body and settles the terminal state. Returns the outcome label for metrics.
async fn execute_job<B>(
    db: &Arc<B>,
    job: &Job,
    token: &CancellationToken,
    config: &JobEngineConfig,
) -> &'static str
where
    B: PlatformDatabase + 'static,
{
    match db.mark_job_started(job.id).await {
        Ok(true) => {},
        Ok(false) => {
            // Cancelled (or otherwise moved on) while it sat in the queue.
            info!("⚙️ Job [{}] was no longer QUEUED when picked up; skipping", job.id);
            return "cancelled";
        },
        Err(e) => {
            error!("⚙️ Could not mark job [{}] as started: {e}", job.id);
            return "failed";
        },
    }

    let result = match job.job_type {
        JobType::Settlement => {
            let aggregator =
                SettlementAggregator::new(Arc::clone(db), config.batch_size, config.output_dir.clone());
            aggregator.run(job, token).await.map(|_| ())
        },
    };

    match result {
        Ok(()) => match db.mark_job_completed(job.id).await {
            Ok(true) => "success",
            Ok(false) => {
                // The run finished its work, but a cancellation flipped the row first. The
                // terminal state stays CANCELLED.
                info!("⚙️ Job [{}] finished after being cancelled; leaving it CANCELLED", job.id);
                "cancelled"
            },
            Err(e) => {
                error!("⚙️ Could not mark job [{}] as completed: {e}", job.id);
                "failed"
            },
        },
        Err(PlatformError::Cancelled) => {
            info!("⚙️ Job [{}] observed cancellation and aborted", job.id);
            // The cancel endpoint usually flipped the status already. If cancellation came from
            // engine shutdown instead, flip it here; a lost race to a terminal state is fine.
            match db.cancel_job(job.id).await {
                Ok(()) | Err(PlatformError::JobAlreadyCancelled) => {},
                Err(e) => error!("⚙️ Could not record cancellation of job [{}]: {e}", job.id),
            }
            "cancelled"
        },
        Err(e) => {
            error!("⚙️ Job [{}] failed: {e}", job.id);
            match db.fail_job(job.id, &e.to_string()).await {
                Ok(_) => {},
                Err(e2) => error!("⚙️ Could not record failure of job [{}]: {e2}", job.id),
            }
            "failed"
        },
    }
}
