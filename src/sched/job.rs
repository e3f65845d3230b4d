//! Job state machine, tile geometry, and the per-job tile FIFO.
//!
//! A job is one decompression task tracked from `create` to `destroy`.
//! All mutable state lives behind a single per-job mutex (distinct per
//! job, so one job's churn never blocks another); the completion condvar
//! signals "a completion record for this handle now exists".
//!
//! Lifecycle:
//!
//! ```text
//! Idle ──configure/first tile──▶ Running ──last tile dispatched──▶
//!     AwaitingLastTile ──completion interrupt──▶ Complete ──destroy──▶ slot freed
//! ```
//!
//! Destruction is legal only in Idle or Complete; no other transition
//! exists.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, Weak};

use crate::error::{Error, JobResult, Result};
use crate::sched::group::SessionGroup;
use crate::sched::pool::Handle;
use crate::MIN_TILE_SIZE;

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    /// The final tile has been handed to the hardware; the dispatcher is
    /// blocked on the completion interrupt.
    AwaitingLastTile,
    Complete,
}

/// One unit of work for the hardware pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    /// Destination parameters; exactly one per job, dispatched before any
    /// data tile.
    Config {
        out_addr: u64,
        out_len: u32,
        block_count: u32,
        tile_count: u32,
    },
    /// A bounded chunk of source data. `last` marks the job's final tile.
    Data { addr: u64, len: u32, last: bool },
}

/// Whether a submission call finished the job's data or left a remainder
/// for the caller to submit later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// The job's final tile has been enqueued.
    Complete,
    /// More data (a full-tile run or the trailing tile) is still expected.
    PartComplete,
}

pub(crate) struct JobInner {
    pub state: JobState,
    pub tile_size: u32,
    pub tiles_total: u32,
    pub last_tile_len: u32,
    /// Full-size tiles accepted by submission calls so far.
    pub current_tile_index: u32,
    /// Data tiles handed to the hardware by the dispatcher.
    pub enqueued_tile_count: u32,
    pub tiles: VecDeque<Tile>,
    /// Set once, when the completion record is published.
    pub result: Option<JobResult>,
}

pub struct Job {
    handle: Handle,
    inner: Mutex<JobInner>,
    /// Signals the submitter once `result` is set.
    pub(crate) done: Condvar,
    /// Group that receives this job's completion record. Never an
    /// ownership edge; the group tears down independently once its
    /// pending count reaches zero.
    owner: Weak<SessionGroup>,
}

impl Job {
    pub(crate) fn new(handle: Handle, owner: Weak<SessionGroup>) -> Job {
        Job {
            handle,
            inner: Mutex::new(JobInner {
                state: JobState::Idle,
                tile_size: 0,
                tiles_total: 0,
                last_tile_len: 0,
                current_tile_index: 0,
                enqueued_tile_count: 0,
                tiles: VecDeque::new(),
                result: None,
            }),
            done: Condvar::new(),
            owner,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub(crate) fn owner(&self) -> &Weak<SessionGroup> {
        &self.owner
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, JobInner> {
        self.inner.lock().unwrap()
    }

    /// Records tile geometry and enqueues the job's single config tile.
    ///
    /// Fails with [`Error::InvalidParameter`] — recording no partial
    /// state — unless the job is Idle, `tile_size` is a positive multiple
    /// of [`MIN_TILE_SIZE`], and address/sizes/block count are non-zero.
    /// Returns `(tile_count, last_tile_len)`.
    pub fn configure(
        &self,
        valid_data_len: u64,
        tile_size: u32,
        out_addr: u64,
        out_len: u32,
        block_count: u32,
    ) -> Result<(u32, u32)> {
        // Validate everything before touching job state.
        let (tiles_total, last_tile_len) = segment(valid_data_len, tile_size)?;
        if out_addr == 0 || out_len == 0 || block_count == 0 || valid_data_len == 0 {
            return Err(Error::InvalidParameter);
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.state != JobState::Idle {
            return Err(Error::InvalidParameter);
        }

        // Data tiles the hardware will see: full tiles plus the trailing
        // segment when one exists.
        let hw_tile_count = tiles_total + u32::from(last_tile_len > 0);

        inner.tile_size = tile_size;
        inner.tiles_total = tiles_total;
        inner.last_tile_len = last_tile_len;
        inner.current_tile_index = 0;
        inner.enqueued_tile_count = 0;
        inner.tiles.push_back(Tile::Config {
            out_addr,
            out_len,
            block_count,
            tile_count: hw_tile_count,
        });
        inner.state = JobState::Running;
        Ok((tiles_total, last_tile_len))
    }

    /// Splits `[addr, addr + len)` into consecutive full-size data tiles
    /// and enqueues them, up to the job's remaining full-tile budget.
    ///
    /// The last tile of the run is flagged final only when it is the last
    /// full tile of the whole job *and* the job has no trailing remainder;
    /// otherwise the caller is expected to submit the remainder through
    /// [`Job::submit_last_tile`] and the call reports
    /// [`SubmitStatus::PartComplete`]. Returns the number of input bytes
    /// consumed.
    pub fn submit_run(&self, addr: u64, len: u64) -> Result<(u64, SubmitStatus)> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != JobState::Running {
            return Err(Error::InvalidParameter);
        }

        let tile_size = inner.tile_size as u64;
        let remaining = (inner.tiles_total - inner.current_tile_index) as u64;
        let n = (len / tile_size).min(remaining);

        let mut status = SubmitStatus::PartComplete;
        for i in 0..n {
            inner.current_tile_index += 1;
            let last =
                inner.current_tile_index == inner.tiles_total && inner.last_tile_len == 0;
            inner.tiles.push_back(Tile::Data {
                addr: addr + i * tile_size,
                len: tile_size as u32,
                last,
            });
            if last {
                status = SubmitStatus::Complete;
            }
        }
        Ok((n * tile_size, status))
    }

    /// Enqueues the explicit trailing tile, flagged final.
    ///
    /// Only legal for a Running job whose trailing remainder is non-zero
    /// and whose full-size tiles have all been submitted; `len` must be
    /// non-zero.
    pub fn submit_last_tile(&self, addr: u64, len: u32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != JobState::Running || len == 0 {
            return Err(Error::InvalidParameter);
        }
        if inner.last_tile_len == 0 || inner.current_tile_index != inner.tiles_total {
            return Err(Error::InvalidParameter);
        }
        inner.tiles.push_back(Tile::Data {
            addr,
            len,
            last: true,
        });
        Ok(())
    }
}

/// Splits `valid_data_len` bytes into full `tile_size` tiles plus a
/// trailing segment.
///
/// If the raw remainder is non-zero but shorter than [`MIN_TILE_SIZE`],
/// one full tile is folded into the trailing segment so the final segment
/// is never undersized unless it is the only segment. The identity
/// `tile_count * tile_size + last_tile_len == valid_data_len` always
/// holds.
///
/// `tile_size` must be a positive multiple of [`MIN_TILE_SIZE`].
pub fn segment(valid_data_len: u64, tile_size: u32) -> Result<(u32, u32)> {
    if tile_size == 0 || tile_size % MIN_TILE_SIZE != 0 {
        return Err(Error::InvalidParameter);
    }
    let ts = tile_size as u64;
    let mut tile_count = valid_data_len / ts;
    let remainder = valid_data_len % ts;
    if remainder > 0 && remainder < MIN_TILE_SIZE as u64 && tile_count > 0 {
        tile_count -= 1;
    }
    let last_tile_len = valid_data_len - tile_count * ts;
    Ok((tile_count as u32, last_tile_len as u32))
}
