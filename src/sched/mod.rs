//! Job scheduling: handle pool, jobs, session groups, and the dispatcher.
//!
//! [`Scheduler`] is an explicit object — not process-wide state — owning
//! the handle pool, the job table, and the dispatcher thread. Tests build
//! one per case against a simulated accelerator.
//!
//! Lock discipline: the pool has one pool-wide lock; each job's FIFO and
//! state sit behind that job's own lock; each session group has its own
//! lock; the hardware adapter serializes its own register sequences. The
//! only nesting is job-table → job, always in that order, and no lock is
//! held across a blocking wait.

pub mod dispatch;
pub mod group;
pub mod job;
pub mod pool;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::SchedConfig;
use crate::error::{Error, JobResult, Result};
use crate::hw::CmdQueue;
use crate::HANDLE_CAPACITY;

pub use group::SessionGroup;
pub use job::{segment, Job, JobState, SubmitStatus, Tile};
pub use pool::{Handle, HandlePool};

/// State shared between the scheduler facade and the dispatcher thread.
pub(crate) struct Shared {
    pub cfg: SchedConfig,
    pub pool: HandlePool,
    /// Live jobs in creation order; the dispatcher's first-ready scan
    /// walks this front to back.
    pub jobs: Mutex<Vec<Arc<Job>>>,
    /// Signalled (under the `jobs` mutex) whenever new tiles are queued.
    pub work: Condvar,
    pub shutdown: AtomicBool,
    pub hw: CmdQueue,
}

pub struct Scheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Builds a scheduler over a hardware queue adapter and starts the
    /// dispatcher thread.
    pub fn new(hw: CmdQueue, cfg: SchedConfig) -> Scheduler {
        let shared = Arc::new(Shared {
            cfg,
            pool: HandlePool::new(HANDLE_CAPACITY),
            jobs: Mutex::new(Vec::new()),
            work: Condvar::new(),
            shutdown: AtomicBool::new(false),
            hw,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("dc-dispatch".into())
            .spawn(move || dispatch::run(&worker_shared))
            .expect("spawn dispatcher");

        Scheduler {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Wakes the dispatcher. Notifying under the job-table mutex pairs
    /// with the dispatcher's scan-then-wait, so a wakeup between the scan
    /// and the wait cannot be lost.
    fn wake(&self) {
        let _jobs = self.shared.jobs.lock().unwrap();
        self.shared.work.notify_all();
    }

    fn find(&self, handle: Handle) -> Result<Arc<Job>> {
        let jobs = self.shared.jobs.lock().unwrap();
        jobs.iter()
            .find(|j| j.handle() == handle)
            .cloned()
            .ok_or(Error::HandleNotFound)
    }

    /// Allocates a handle and registers an Idle job whose completion
    /// record will be delivered to `group`.
    pub fn create_job(&self, group: &Arc<SessionGroup>) -> Result<Handle> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }
        let handle = self.shared.pool.acquire()?;
        let job = Arc::new(Job::new(handle, Arc::downgrade(group)));
        self.shared.jobs.lock().unwrap().push(job);
        log::debug!("job {}: created", handle);
        Ok(handle)
    }

    /// Runs tile segmentation, records the job's geometry, and queues its
    /// config tile. Returns `(tile_count, last_tile_len)`.
    pub fn configure(
        &self,
        handle: Handle,
        valid_data_len: u64,
        tile_size: u32,
        out_addr: u64,
        out_len: u32,
        block_count: u32,
    ) -> Result<(u32, u32)> {
        let job = self.find(handle)?;
        let geometry = job.configure(valid_data_len, tile_size, out_addr, out_len, block_count)?;
        self.wake();
        Ok(geometry)
    }

    /// Queues a run of full-size data tiles. Returns the consumed byte
    /// count and whether the job's final tile is now queued.
    pub fn tiles_run(&self, handle: Handle, addr: u64, len: u64) -> Result<(u64, SubmitStatus)> {
        let job = self.find(handle)?;
        let (consumed, status) = job.submit_run(addr, len)?;
        if consumed > 0 {
            self.wake();
        }
        Ok((consumed, status))
    }

    /// Queues the explicit trailing tile.
    pub fn last_tile_run(&self, handle: Handle, addr: u64, len: u32) -> Result<()> {
        let job = self.find(handle)?;
        job.submit_last_tile(addr, len)?;
        self.wake();
        Ok(())
    }

    /// Blocks until the job's completion record exists, then consumes it
    /// from the owning session group.
    ///
    /// Exactly one waiter consumes the record; a second concurrent waiter
    /// fails with [`Error::HandleNotFound`] once the record is gone.
    pub fn wait_finish(&self, handle: Handle, timeout: Duration) -> Result<JobResult> {
        let job = self.find(handle)?;
        let deadline = Instant::now() + timeout;

        let published = {
            let mut inner = job.lock();
            loop {
                if let Some(result) = inner.result {
                    break result;
                }
                let now = Instant::now();
                if now >= deadline {
                    return Err(Error::Timeout);
                }
                let slice = self.shared.cfg.wait_tick.min(deadline - now);
                let (guard, _res) = job.done.wait_timeout(inner, slice).unwrap();
                inner = guard;
            }
        };

        match job.owner().upgrade() {
            Some(group) => group.take(handle).ok_or(Error::HandleNotFound),
            // The owning group was torn down; the outcome survives on the
            // job itself.
            None => Ok(published),
        }
    }

    /// Unregisters the job and returns its handle to the pool. Legal only
    /// for Idle or Complete jobs.
    pub fn destroy(&self, handle: Handle) -> Result<()> {
        let mut jobs = self.shared.jobs.lock().unwrap();
        let pos = jobs
            .iter()
            .position(|j| j.handle() == handle)
            .ok_or(Error::HandleNotFound)?;
        {
            let inner = jobs[pos].lock();
            match inner.state {
                JobState::Idle | JobState::Complete => {}
                JobState::Running | JobState::AwaitingLastTile => return Err(Error::Busy),
            }
        }
        jobs.remove(pos);
        self.shared.pool.release(handle);
        log::debug!("job {}: destroyed", handle);
        Ok(())
    }

    /// Stops the dispatcher and resolves every in-flight job as
    /// Cancelled. Idempotent.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("scheduler shutting down");
        self.wake();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Handle pool accessor (slot accounting).
    pub fn pool(&self) -> &HandlePool {
        &self.shared.pool
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
