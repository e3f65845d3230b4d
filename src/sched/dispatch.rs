//! The dispatcher — the single logical worker of the scheduler.
//!
//! One long-lived thread drains job tile FIFOs into the hardware command
//! queue:
//!
//! 1. Pick the *first* job (creation order — a linear scan, deliberately
//!    not a fairness scheme) that is not Complete and has a queued tile,
//!    and pop its head tile. With nothing ready, sleep on the work condvar
//!    for a bounded slice so a shutdown request is always observed.
//! 2. Config tiles go straight to the destination registers. Data tiles
//!    are admission-checked; a full queue is retried with bounded
//!    exponential backoff. The job's first data tile produces the start
//!    edge.
//! 3. After a job's final tile the dispatcher blocks — in bounded,
//!    shutdown-aware slices — on the completion interrupt, decodes the
//!    latched status into a [`JobResult`], writes the restore edge, marks
//!    the job Complete, publishes the record into the owning session
//!    group, and fires the job's completion signal.
//!
//! On shutdown the loop exits without processing remaining queued work;
//! every job without a published result is resolved as an explicit
//! `Cancelled` record so no waiter is left blocked.
//!
//! No job, group, or pool lock is ever held across a blocking wait.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use crate::error::{Error, JobResult};
use crate::sched::job::{Job, JobState, Tile};
use crate::sched::Shared;

pub(crate) fn run(shared: &Shared) {
    log::debug!("dispatcher running");
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        // First-ready selection: first created job, not yet complete, with
        // a non-empty tile FIFO. The scan restarts after every dispatched
        // tile, so every ready job is eventually serviced.
        let picked = {
            let jobs = shared.jobs.lock().unwrap();
            let mut picked = None;
            for job in jobs.iter() {
                let mut inner = job.lock();
                if inner.state != JobState::Complete {
                    if let Some(tile) = inner.tiles.pop_front() {
                        picked = Some((Arc::clone(job), tile));
                        break;
                    }
                }
            }
            match picked {
                Some(p) => p,
                None => {
                    // Bounded so the shutdown flag is re-checked even if a
                    // wakeup is missed.
                    let _ = shared
                        .work
                        .wait_timeout(jobs, shared.cfg.idle_wait)
                        .unwrap();
                    continue;
                }
            }
        };

        let (job, tile) = picked;
        dispatch_tile(shared, &job, tile);
    }

    cancel_incomplete(shared);
    log::debug!("dispatcher exited");
}

fn dispatch_tile(shared: &Shared, job: &Arc<Job>, tile: Tile) {
    match tile {
        Tile::Config {
            out_addr,
            out_len,
            block_count,
            tile_count,
        } => {
            log::debug!(
                "job {}: config out=0x{:x} len={} blocks={} tiles={}",
                job.handle(),
                out_addr,
                out_len,
                block_count,
                tile_count
            );
            shared.hw.submit_config(out_addr, out_len, block_count, tile_count);
        }
        Tile::Data { addr, len, last } => {
            let first = {
                let mut inner = job.lock();
                inner.enqueued_tile_count += 1;
                if last {
                    inner.state = JobState::AwaitingLastTile;
                }
                inner.enqueued_tile_count == 1
            };
            if first {
                shared.hw.trigger(true);
            }
            if !submit_with_backoff(shared, addr, len, last) {
                // Shutdown raced the retry loop; the drain pass publishes
                // the Cancelled record.
                return;
            }
            if last {
                resolve_completion(shared, job);
            }
        }
    }
}

/// Retries a full command queue with exponential backoff, doubling from
/// `backoff_min` up to `backoff_max`, until the tile is admitted or
/// shutdown is requested. Returns `false` on shutdown.
fn submit_with_backoff(shared: &Shared, addr: u64, len: u32, last: bool) -> bool {
    let mut backoff = shared.cfg.backoff_min;
    loop {
        match shared.hw.submit_data(addr, len, last) {
            Ok(()) => return true,
            Err(Error::QueueFull) => {
                if shared.shutdown.load(Ordering::Acquire) {
                    return false;
                }
                thread::sleep(backoff);
                backoff = (backoff * 2).min(shared.cfg.backoff_max);
            }
            // submit_data only fails transiently.
            Err(_) => return true,
        }
    }
}

/// Blocks for the completion interrupt of `job`'s final tile, then
/// finishes the job. Aborts silently on shutdown (the drain pass takes
/// over).
fn resolve_completion(shared: &Shared, job: &Arc<Job>) {
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        if shared.hw.wait_completion(shared.cfg.completion_wait) {
            break;
        }
    }
    let status = shared.hw.take_interrupt_status();
    let result = JobResult::from_irq_status(status);
    shared.hw.trigger(false);
    log::debug!(
        "job {}: complete, result={} irq=0x{:03x}",
        job.handle(),
        result,
        status
    );
    finish(job, result);
}

/// Publishes the completion record into the owning group, marks the job
/// Complete, and fires its completion signal.
fn finish(job: &Arc<Job>, result: JobResult) {
    // Publish before flipping the state so a waiter woken by the signal
    // always finds the record.
    if let Some(group) = job.owner().upgrade() {
        group.push(job.handle(), result);
    }
    let mut inner = job.lock();
    inner.state = JobState::Complete;
    inner.result = Some(result);
    job.done.notify_all();
}

/// Shutdown drain: every job without a published result is resolved as an
/// explicit Cancelled outcome — state reset to Idle, tile FIFO dropped —
/// so blocked waiters are released rather than abandoned.
fn cancel_incomplete(shared: &Shared) {
    let jobs = shared.jobs.lock().unwrap();
    for job in jobs.iter() {
        let already_done = job.lock().result.is_some();
        if already_done {
            continue;
        }
        log::warn!("job {}: cancelled by device teardown", job.handle());
        if let Some(group) = job.owner().upgrade() {
            group.push(job.handle(), JobResult::Cancelled);
        }
        let mut inner = job.lock();
        inner.tiles.clear();
        inner.state = JobState::Idle;
        inner.result = Some(JobResult::Cancelled);
        job.done.notify_all();
    }
}
