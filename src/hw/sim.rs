//! Software model of the decompression accelerator.
//!
//! Implements [`RegBus`] + [`IrqLine`] so the scheduler drives it through
//! the exact register contract real hardware would see. A worker thread
//! retires one queued tile per latency tick; retiring a last-flagged tile
//! latches the completion interrupt (plus any injected error bits) and
//! pulses the interrupt line. The restore edge on the control register
//! only re-masks interrupts — tiles already admitted always drain.
//!
//! The model records everything the tests assert on: the high-water mark
//! of the outstanding count (admission bound), every latched destination
//! configuration, the full data-tile log, the retire count, and the number
//! of start edges seen.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::hw::regs::{self, IrqLine, RegBus};

/// A destination configuration latched by a `REG_TILE_CNT` write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    pub out_addr: u64,
    pub out_size: u32,
    pub block_count: u32,
    pub tile_count: u32,
}

/// One data tile as pushed through the doorbell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimTileRec {
    pub addr: u64,
    pub len: u32,
    pub last: bool,
}

#[derive(Default)]
struct SimState {
    // Register shadows.
    out_lo: u32,
    out_hi: u32,
    out_size: u32,
    block_cnt: u32,
    src_lo: u32,
    src_hi: u32,
    src_len: u32,
    int_status: u32,
    start_asserted: bool,

    // Pipeline model.
    queue: VecDeque<SimTileRec>,
    inject: u32,

    // Observability for tests.
    max_outstanding: u32,
    retired: u64,
    start_edges: u32,
    configs: Vec<SimConfig>,
    data_log: Vec<SimTileRec>,
}

struct SimShared {
    state: Mutex<SimState>,
    irq_cv: Condvar,
}

/// Simulated accelerator. Construct with [`SimAccel::new`], hand two
/// `Arc` clones to [`crate::hw::CmdQueue`].
pub struct SimAccel {
    shared: Arc<SimShared>,
    stop_tx: Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimAccel {
    /// Starts the retirement thread; one tile retires per `latency` tick.
    pub fn new(latency: Duration) -> Arc<SimAccel> {
        let shared = Arc::new(SimShared {
            state: Mutex::new(SimState::default()),
            irq_cv: Condvar::new(),
        });
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("dc-sim".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(latency) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
                let mut st = worker_shared.state.lock().unwrap();
                if let Some(tile) = st.queue.pop_front() {
                    st.retired += 1;
                    if tile.last {
                        st.int_status |= regs::INT_DONE | st.inject;
                        st.inject = 0;
                        worker_shared.irq_cv.notify_all();
                    } else if st.queue.is_empty() {
                        // Queue drained mid-job: almost-complete only.
                        st.int_status |= regs::INT_ALMOST_DONE;
                    }
                }
            })
            .expect("spawn sim worker");

        Arc::new(SimAccel {
            shared,
            stop_tx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Sets error bits to latch together with the next completion.
    pub fn inject_irq_errors(&self, bits: u32) {
        self.shared.state.lock().unwrap().inject = bits & regs::INT_MASK_ALL;
    }

    /// Highest outstanding-tile count ever observed.
    pub fn max_outstanding(&self) -> u32 {
        self.shared.state.lock().unwrap().max_outstanding
    }

    /// Total tiles retired so far.
    pub fn retired(&self) -> u64 {
        self.shared.state.lock().unwrap().retired
    }

    /// Start edges seen on the control register.
    pub fn start_edges(&self) -> u32 {
        self.shared.state.lock().unwrap().start_edges
    }

    /// Every destination configuration latched so far.
    pub fn configs(&self) -> Vec<SimConfig> {
        self.shared.state.lock().unwrap().configs.clone()
    }

    /// Every data tile pushed through the doorbell, in admission order.
    pub fn data_log(&self) -> Vec<SimTileRec> {
        self.shared.state.lock().unwrap().data_log.clone()
    }
}

impl Drop for SimAccel {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl RegBus for SimAccel {
    fn read32(&self, offset: usize) -> u32 {
        let st = self.shared.state.lock().unwrap();
        match offset {
            regs::REG_STATUS => {
                (st.queue.len() as u32 & regs::STATUS_OUTSTANDING_MASK)
                    << regs::STATUS_OUTSTANDING_SHIFT
            }
            regs::REG_INT_STATUS => st.int_status,
            regs::REG_OUT_BASE_LO => st.out_lo,
            regs::REG_OUT_BASE_HI => st.out_hi,
            regs::REG_OUT_SIZE => st.out_size,
            regs::REG_BLOCK_CNT => st.block_cnt,
            regs::REG_SRC_BASE_LO => st.src_lo,
            regs::REG_SRC_BASE_HI => st.src_hi,
            regs::REG_SRC_LEN => st.src_len,
            _ => 0,
        }
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut st = self.shared.state.lock().unwrap();
        match offset {
            regs::REG_CTRL => {
                let start = value & regs::CTRL_START != 0;
                if start && !st.start_asserted {
                    st.start_edges += 1;
                }
                st.start_asserted = start;
            }
            regs::REG_INT_CLR => {
                // Write-1-to-clear.
                st.int_status &= !value;
            }
            regs::REG_OUT_BASE_LO => st.out_lo = value,
            regs::REG_OUT_BASE_HI => st.out_hi = value,
            regs::REG_OUT_SIZE => st.out_size = value,
            regs::REG_BLOCK_CNT => st.block_cnt = value,
            regs::REG_TILE_CNT => {
                let cfg = SimConfig {
                    out_addr: (st.out_hi as u64) << 32 | st.out_lo as u64,
                    out_size: st.out_size,
                    block_count: st.block_cnt,
                    tile_count: value,
                };
                st.configs.push(cfg);
            }
            regs::REG_SRC_BASE_LO => st.src_lo = value,
            regs::REG_SRC_BASE_HI => st.src_hi = value,
            regs::REG_SRC_LEN => st.src_len = value,
            regs::REG_CMD_PUSH => {
                if value & regs::PUSH_VALID != 0 {
                    let tile = SimTileRec {
                        addr: (st.src_hi as u64) << 32 | st.src_lo as u64,
                        len: st.src_len,
                        last: value & regs::PUSH_LAST != 0,
                    };
                    st.queue.push_back(tile);
                    st.data_log.push(tile);
                    let depth = st.queue.len() as u32;
                    if depth > st.max_outstanding {
                        st.max_outstanding = depth;
                    }
                }
            }
            _ => {}
        }
    }
}

impl IrqLine for SimAccel {
    fn wait_irq(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut st = self.shared.state.lock().unwrap();
        loop {
            if st.int_status & regs::INT_RESOLVE != 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _res) = self
                .shared
                .irq_cv
                .wait_timeout(st, deadline - now)
                .unwrap();
            st = guard;
        }
    }
}
