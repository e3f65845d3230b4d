//! Control surface: sessions, reference-counted device bring-up, and the
//! request/response operations.
//!
//! Operation map:
//!
//! - `dev_init` / `dev_deinit` — counted per open session; the first init
//!   resets the engine and starts the dispatcher, the last matching
//!   deinit stops it (cancelling in-flight jobs).
//! - `create_handle` — validates the stream header, allocates a job.
//! - `config` — tile segmentation + the config tile.
//! - `tiles_run` / `lasttile_run` — data submission.
//! - `wait_finish` — blocking completion query; hardware integrity errors
//!   arrive in the returned [`JobResult`], cancellation as
//!   [`Error::Cancelled`].
//! - `destroy_handle` — returns the job's slot to the pool.
//!
//! Sessions are explicit: each open session owns a
//! [`SessionGroup`] that collects its jobs' completion records;
//! `close_session` defers while records are pending.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::SchedConfig;
use crate::error::{Error, JobResult, Result};
use crate::header::{parse_header, HeaderInfo};
use crate::hw::regs::{self, IrqLine, RegBus};
use crate::hw::CmdQueue;
use crate::sched::{Handle, Scheduler, SessionGroup, SubmitStatus};

/// Identifier of an open control-surface session.
pub type SessionId = u32;

struct DeviceInner {
    init_count: u32,
    sched: Option<Arc<Scheduler>>,
    sessions: HashMap<SessionId, Arc<SessionGroup>>,
    next_session: SessionId,
}

pub struct Device {
    cfg: SchedConfig,
    bus: Arc<dyn RegBus>,
    irq: Arc<dyn IrqLine>,
    inner: Mutex<DeviceInner>,
}

impl Device {
    pub fn new(bus: Arc<dyn RegBus>, irq: Arc<dyn IrqLine>, cfg: SchedConfig) -> Device {
        Device {
            cfg,
            bus,
            irq,
            inner: Mutex::new(DeviceInner {
                init_count: 0,
                sched: None,
                sessions: HashMap::new(),
                next_session: 0,
            }),
        }
    }

    /// Reference-counted bring-up. The first call resets the engine and
    /// starts the dispatcher.
    pub fn dev_init(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.init_count += 1;
        if inner.init_count == 1 {
            // Engine reset: drop the start bit, clear every latched
            // interrupt.
            self.bus.write32(regs::REG_CTRL, 0);
            self.bus.write32(regs::REG_INT_CLR, regs::INT_MASK_ALL);

            let hw = CmdQueue::new(Arc::clone(&self.bus), Arc::clone(&self.irq));
            inner.sched = Some(Arc::new(Scheduler::new(hw, self.cfg)));
            log::info!("device initialized");
        }
        Ok(())
    }

    /// Counted tear-down. The last matching call stops the dispatcher;
    /// jobs still in flight resolve as Cancelled.
    pub fn dev_deinit(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.init_count == 0 {
            return Err(Error::NotInitialized);
        }
        inner.init_count -= 1;
        if inner.init_count == 0 {
            if let Some(sched) = inner.sched.take() {
                drop(inner); // shutdown joins the dispatcher; don't hold the device lock
                sched.shutdown();
                log::info!("device deinitialized");
            }
        }
        Ok(())
    }

    /// Opens a session and its completion-record group.
    pub fn open_session(&self) -> SessionId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_session;
        inner.next_session += 1;
        inner.sessions.insert(id, SessionGroup::new());
        id
    }

    /// Closes a session. Deferred — fails with [`Error::Busy`] — while
    /// the session's group still holds unconsumed completion records.
    pub fn close_session(&self, session: SessionId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let group = inner
            .sessions
            .get(&session)
            .ok_or(Error::InvalidParameter)?;
        if !group.try_close() {
            return Err(Error::Busy);
        }
        inner.sessions.remove(&session);
        Ok(())
    }

    fn sched(&self) -> Result<Arc<Scheduler>> {
        self.inner
            .lock()
            .unwrap()
            .sched
            .clone()
            .ok_or(Error::NotInitialized)
    }

    fn group(&self, session: SessionId) -> Result<Arc<SessionGroup>> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .get(&session)
            .cloned()
            .ok_or(Error::InvalidParameter)
    }

    /// `CREATE_HANDLE`: validates the stream header and allocates a job
    /// owned by `session`'s group.
    pub fn create_handle(
        &self,
        session: SessionId,
        header_bytes: &[u8],
    ) -> Result<(Handle, HeaderInfo)> {
        let sched = self.sched()?;
        let group = self.group(session)?;
        let info = parse_header(header_bytes)?;
        let handle = sched.create_job(&group)?;
        log::debug!(
            "session {}: handle {} for {} blocks, in={} out={}",
            session,
            handle,
            info.block_count,
            info.in_size,
            info.out_size
        );
        Ok((handle, info))
    }

    /// `CONFIG`: segments the stream into tiles and queues the config
    /// tile. The caller's output buffer must cover the advertised
    /// decompressed size.
    pub fn config(
        &self,
        handle: Handle,
        tile_size: u32,
        out_addr: u64,
        out_len: u32,
        info: &HeaderInfo,
    ) -> Result<(u32, u32)> {
        if out_len < info.out_size {
            return Err(Error::InvalidParameter);
        }
        self.sched()?.configure(
            handle,
            info.in_size as u64,
            tile_size,
            out_addr,
            out_len,
            info.block_count,
        )
    }

    /// `TILES_RUN`: submits a run of full-size tiles; returns how much of
    /// `len` was consumed and whether the job still expects its trailing
    /// tile.
    pub fn tiles_run(&self, handle: Handle, addr: u64, len: u64) -> Result<(u64, SubmitStatus)> {
        self.sched()?.tiles_run(handle, addr, len)
    }

    /// `LASTTILE_RUN`: submits the explicit trailing tile.
    pub fn lasttile_run(&self, handle: Handle, addr: u64, len: u32) -> Result<()> {
        self.sched()?.last_tile_run(handle, addr, len)
    }

    /// `WAIT_FINISH`: blocks until the job's completion record is
    /// delivered, then consumes it. Integrity failures come back as the
    /// `JobResult` value; teardown mid-flight maps to
    /// [`Error::Cancelled`].
    pub fn wait_finish(&self, handle: Handle) -> Result<JobResult> {
        let sched = self.sched()?;
        match sched.wait_finish(handle, self.cfg.wait_finish_timeout)? {
            JobResult::Cancelled => Err(Error::Cancelled),
            result => Ok(result),
        }
    }

    /// `DESTROY_HANDLE`: releases the job and its pool slot. Legal once
    /// the job is Idle or Complete.
    pub fn destroy_handle(&self, handle: Handle) -> Result<()> {
        self.sched()?.destroy(handle)
    }
}
