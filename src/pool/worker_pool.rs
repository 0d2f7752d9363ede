use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::PoolError;
use crate::io::HttpClient;
use crate::tile::{Grid, TileFetcher, TileRequest, TileResult};

/// Default number of workers per available CPU.
///
/// Workers are network bound, so the pool is much larger than the core count.
pub const DEFAULT_WORKER_MULTIPLIER: usize = 10;

/// Worker count for this machine: available parallelism × `multiplier`.
pub fn default_worker_count(multiplier: usize) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    (cpus * multiplier).max(1)
}

type JobQueue = Arc<Mutex<mpsc::Receiver<TileRequest>>>;

// =============================================================================
// Worker Pool
// =============================================================================

/// A fixed set of tile workers sharing one job queue and one result queue.
///
/// The pool is created for one client session and stopped when the session
/// ends. It may serve several grids in sequence as long as each grid's
/// results are drained before the next grid is submitted.
///
/// Must be created from within a Tokio runtime.
///
/// # Example
///
/// ```ignore
/// let mut pool = WorkerPool::new(fetcher, default_worker_count(10), grid.tile_count());
/// pool.submit_grid(&grid, &pano_id)?;
/// while let Some(result) = pool.next_result().await {
///     // ...
/// }
/// pool.stop().await;
/// ```
pub struct WorkerPool {
    /// Job sender; `None` once the pool is stopped
    jobs: Option<mpsc::Sender<TileRequest>>,

    /// Results published by the workers
    results: mpsc::Receiver<TileResult>,

    /// Broadcast termination signal observed by every worker
    cancel: CancellationToken,

    /// Worker tasks
    workers: JoinSet<()>,

    /// Capacity of both queues
    capacity: usize,

    /// Number of workers spawned
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn `worker_count` workers with queues of `capacity` entries.
    pub fn new<C>(fetcher: Arc<TileFetcher<C>>, worker_count: usize, capacity: usize) -> Self
    where
        C: HttpClient + 'static,
    {
        Self::with_cancellation(fetcher, worker_count, capacity, CancellationToken::new())
    }

    /// Spawn workers that also stop when `cancel` is cancelled.
    ///
    /// Pass a child of a session-level token to tie the pool's lifetime to
    /// the session.
    pub fn with_cancellation<C>(
        fetcher: Arc<TileFetcher<C>>,
        worker_count: usize,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self
    where
        C: HttpClient + 'static,
    {
        let worker_count = worker_count.max(1);
        let capacity = capacity.max(1);

        let (job_tx, job_rx) = mpsc::channel(capacity);
        let (result_tx, result_rx) = mpsc::channel(capacity);
        let job_rx: JobQueue = Arc::new(Mutex::new(job_rx));

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            workers.spawn(run_worker(
                id,
                Arc::clone(&fetcher),
                Arc::clone(&job_rx),
                result_tx.clone(),
                cancel.clone(),
            ));
        }

        debug!(workers = worker_count, capacity, "Worker pool started");

        Self {
            jobs: Some(job_tx),
            results: result_rx,
            cancel,
            workers,
            capacity,
            worker_count,
        }
    }

    /// Number of workers spawned.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Capacity of the job and result queues.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of worker tasks that have not yet been joined.
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool no longer accepts jobs.
    pub fn is_stopped(&self) -> bool {
        self.jobs.is_none() || self.cancel.is_cancelled()
    }

    /// The pool's termination token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Enqueue one job without blocking.
    ///
    /// # Errors
    ///
    /// - [`PoolError::QueueFull`] if the job queue is at capacity
    /// - [`PoolError::Stopped`] if the pool has been stopped
    pub fn submit(&self, request: TileRequest) -> Result<(), PoolError> {
        if self.cancel.is_cancelled() {
            return Err(PoolError::Stopped);
        }
        let jobs = self.jobs.as_ref().ok_or(PoolError::Stopped)?;

        jobs.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => PoolError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => PoolError::Stopped,
        })
    }

    /// Enqueue every tile of `grid` for `pano_id` in one pass.
    ///
    /// Fails without enqueuing anything if the grid is larger than the
    /// queue capacity. Returns the number of jobs submitted.
    pub fn submit_grid(&self, grid: &Grid, pano_id: &str) -> Result<usize, PoolError> {
        if grid.tile_count() > self.capacity {
            return Err(PoolError::QueueFull {
                capacity: self.capacity,
            });
        }

        let requests = grid.requests(pano_id);
        let count = requests.len();
        for request in requests {
            self.submit(request)?;
        }

        trace!(jobs = count, pano_id, "Grid submitted");
        Ok(count)
    }

    /// Wait for the next result.
    ///
    /// Returns `None` once the pool is stopped or every worker has exited.
    pub async fn next_result(&mut self) -> Option<TileResult> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.results.recv() => result,
        }
    }

    /// Stop every worker and wait for all of them to exit.
    ///
    /// In-flight fetches are abandoned, not awaited. Calling `stop` more
    /// than once is harmless.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        self.jobs.take();

        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!(error = %e, "Tile worker panicked");
                }
            }
        }

        // Discard anything published before the workers saw the signal
        while self.results.try_recv().is_ok() {}

        debug!(workers = self.worker_count, "Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping the JoinSet aborts the tasks; cancelling first lets
        // workers parked on the token exit on their own.
        self.cancel.cancel();
    }
}

// =============================================================================
// Worker Loop
// =============================================================================

/// Take the next job from the shared queue.
async fn next_job(jobs: &Mutex<mpsc::Receiver<TileRequest>>) -> Option<TileRequest> {
    jobs.lock().await.recv().await
}

/// Consume jobs until the queue closes or the pool is cancelled.
async fn run_worker<C: HttpClient>(
    id: usize,
    fetcher: Arc<TileFetcher<C>>,
    jobs: JobQueue,
    results: mpsc::Sender<TileResult>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = next_job(&jobs) => job,
        };
        let Some(request) = job else {
            break;
        };

        let coordinate = request.coordinate;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = fetcher.fetch(&request) => outcome,
        };

        let published = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = results.send(TileResult { coordinate, outcome }) => sent,
        };
        if published.is_err() {
            // Result receiver is gone; nobody is waiting for tiles
            break;
        }
    }

    trace!(worker = id, "Tile worker exiting");
}

// =============================================================================
// Tests
// =============================================================================
