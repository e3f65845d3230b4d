//! Per-session container of completion records.
//!
//! The dispatcher produces `(handle, result)` records into the group that
//! owns the job; the session consumes them through [`SessionGroup::wait_for`]
//! or [`SessionGroup::take`]. Sessions never see each other's records —
//! scoping is by group, not global.
//!
//! `pending_count` gates teardown: a group is handed out as an
//! `Arc<SessionGroup>` and [`SessionGroup::try_close`] refuses while
//! records are pending, so a group a concurrent dispatch could still be
//! writing into is structurally impossible to free.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, JobResult, Result};
use crate::sched::pool::Handle;

struct GroupInner {
    /// Records awaiting pickup, in publication order.
    records: Vec<(Handle, JobResult)>,
    /// Records published but not yet consumed.
    pending: usize,
}

pub struct SessionGroup {
    inner: Mutex<GroupInner>,
    cv: Condvar,
}

impl SessionGroup {
    pub fn new() -> Arc<SessionGroup> {
        Arc::new(SessionGroup {
            inner: Mutex::new(GroupInner {
                records: Vec::new(),
                pending: 0,
            }),
            cv: Condvar::new(),
        })
    }

    /// Publishes a completion record. Producer side: the dispatcher.
    pub fn push(&self, handle: Handle, result: JobResult) {
        let mut inner = self.inner.lock().unwrap();
        inner.records.push((handle, result));
        inner.pending += 1;
        self.cv.notify_all();
    }

    /// Removes and returns the record for `handle` if one is present.
    /// Exactly one caller can succeed per completed job.
    pub fn take(&self, handle: Handle) -> Option<JobResult> {
        let mut inner = self.inner.lock().unwrap();
        let pos = inner.records.iter().position(|(h, _)| *h == handle)?;
        let (_, result) = inner.records.remove(pos);
        inner.pending -= 1;
        Some(result)
    }

    /// Blocks until a record for `handle` appears, then consumes it.
    ///
    /// Waits in `tick`-bounded slices so shutdown-published records are
    /// observed promptly; fails with [`Error::Timeout`] once `timeout`
    /// elapses.
    pub fn wait_for(&self, handle: Handle, timeout: Duration, tick: Duration) -> Result<JobResult> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(pos) = inner.records.iter().position(|(h, _)| *h == handle) {
                let (_, result) = inner.records.remove(pos);
                inner.pending -= 1;
                return Ok(result);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let slice = tick.min(deadline - now);
            let (guard, _res) = self.cv.wait_timeout(inner, slice).unwrap();
            inner = guard;
        }
    }

    /// Records not yet picked up.
    pub fn pending(&self) -> usize {
        self.inner.lock().unwrap().pending
    }

    /// Attempts teardown. Refuses while completion records are pending;
    /// on success any leftover unclaimed records are drained and the
    /// caller may drop its `Arc`.
    pub fn try_close(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.pending > 0 {
            return false;
        }
        inner.records.clear();
        true
    }
}
