use std::{
    ops::Range,
    sync::{Arc, Condvar, Mutex, PoisonError},
};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{error::WorldError, star::Star};

/// Index range owned by worker `part` of `parts`.
pub fn partition(count: usize, part: usize, parts: usize) -> Range<usize> {
    count * part / parts..count * (part + 1) / parts
}

/// Number of pool threads that have not exited yet.
#[derive(Debug, Default)]
pub(crate) struct Liveness {
    live: Mutex<usize>,
    exited: Condvar,
}

impl Liveness {
    fn exit(&self) {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        *live = live.saturating_sub(1);
        self.exited.notify_all();
    }

    fn wait_all_exited(&self) {
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        let _live = self
            .exited
            .wait_while(live, |live| *live > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> usize {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed set of long-lived workers, each owning a static slice of the particle store.
///
/// A pool of one runs every job inline on the caller's thread.
pub struct WorkerPool {
    workers: usize,
    pool: Option<ThreadPool>,
    liveness: Arc<Liveness>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("threaded", &self.pool.is_some())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, WorldError> {
        if workers == 0 {
            return Err(WorldError::ZeroWorkers);
        }

        let liveness = Arc::new(Liveness::default());
        if workers == 1 {
            return Ok(Self {
                workers,
                pool: None,
                liveness,
            });
        }

        *liveness.live.lock().unwrap_or_else(PoisonError::into_inner) = workers;
        let on_exit = Arc::clone(&liveness);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("star-worker-{i}"))
            .exit_handler(move |_| on_exit.exit())
            .build();
        let pool = match pool {
            Ok(pool) => pool,
            Err(err) => {
                *liveness.live.lock().unwrap_or_else(PoisonError::into_inner) = 0;
                return Err(err.into());
            }
        };
        log::info!("started {workers} star workers");

        Ok(Self {
            workers,
            pool: Some(pool),
            liveness,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Whether jobs run on pool threads rather than inline.
    pub fn is_threaded(&self) -> bool {
        self.pool.is_some()
    }

    #[cfg(test)]
    pub(crate) fn liveness(&self) -> Arc<Liveness> {
        Arc::clone(&self.liveness)
    }

    /// Runs `job` once per worker on that worker's partition of `stars` and
    /// returns when every partition is done.
    ///
    /// `job` receives the global index range of its slice alongside the slice.
    pub fn run<F>(&self, stars: &mut [Star], job: F)
    where
        F: Fn(Range<usize>, &mut [Star]) + Sync,
    {
        let Some(pool) = &self.pool else {
            job(0..stars.len(), stars);
            return;
        };

        let count = stars.len();
        let workers = self.workers;
        let job = &job;
        pool.scope(|scope| {
            let mut rest = stars;
            for part in 0..workers {
                let range = partition(count, part, workers);
                let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                rest = tail;
                scope.spawn(move |_| job(range, chunk));
            }
        });
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Idle workers terminate once the pool handle is gone; wait for all of them.
        if let Some(pool) = self.pool.take() {
            drop(pool);
            self.liveness.wait_all_exited();
            log::info!("stopped {} star workers", self.workers);
        }
    }
}
