//! Admission-checked submission facade over the accelerator registers.
//!
//! [`CmdQueue`] is the only thing the dispatcher talks to. It owns the
//! multi-register submission sequences and the trigger edge state. A
//! single internal mutex serializes register sequences; in practice only
//! the dispatcher writes, so the lock degenerates to a single-writer
//! invariant. The lock is never held across a blocking wait —
//! [`CmdQueue::wait_completion`] delegates straight to the interrupt line.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::hw::regs::{self, IrqLine, RegBus};
use crate::CMDQ_DEPTH;

pub struct CmdQueue {
    bus: Arc<dyn RegBus>,
    irq: Arc<dyn IrqLine>,
    /// Guards multi-register sequences and the trigger edge state.
    /// `true` while a start edge is outstanding.
    started: Mutex<bool>,
}

impl CmdQueue {
    pub fn new(bus: Arc<dyn RegBus>, irq: Arc<dyn IrqLine>) -> Self {
        CmdQueue {
            bus,
            irq,
            started: Mutex::new(false),
        }
    }

    /// Number of tiles submitted but not yet retired, read from the
    /// status register.
    pub fn outstanding(&self) -> u32 {
        (self.bus.read32(regs::REG_STATUS) >> regs::STATUS_OUTSTANDING_SHIFT)
            & regs::STATUS_OUTSTANDING_MASK
    }

    /// True while the pipeline can accept another tile.
    pub fn slot_available(&self) -> bool {
        self.outstanding() < CMDQ_DEPTH
    }

    /// One-time write of a job's destination parameters. Metadata, not a
    /// queued tile: no depth check, always succeeds. Writing the tile
    /// count latches the set.
    pub fn submit_config(&self, out_addr: u64, out_len: u32, block_count: u32, tile_count: u32) {
        let _g = self.started.lock().unwrap();
        self.bus.write32(regs::REG_OUT_BASE_LO, out_addr as u32);
        self.bus.write32(regs::REG_OUT_BASE_HI, (out_addr >> 32) as u32);
        self.bus.write32(regs::REG_OUT_SIZE, out_len);
        self.bus.write32(regs::REG_BLOCK_CNT, block_count);
        self.bus.write32(regs::REG_TILE_CNT, tile_count);
    }

    /// Enqueues one data tile if a slot is free.
    ///
    /// `last` marks the job's final tile in the doorbell; retiring it
    /// raises the completion interrupt. On [`Error::QueueFull`] the caller
    /// retries after a backoff.
    pub fn submit_data(&self, addr: u64, len: u32, last: bool) -> Result<()> {
        let _g = self.started.lock().unwrap();
        // Depth check under the same lock as the doorbell so the admission
        // bound holds even with multiple submitters.
        let outstanding = (self.bus.read32(regs::REG_STATUS) >> regs::STATUS_OUTSTANDING_SHIFT)
            & regs::STATUS_OUTSTANDING_MASK;
        if outstanding >= CMDQ_DEPTH {
            return Err(Error::QueueFull);
        }
        self.bus.write32(regs::REG_SRC_BASE_LO, addr as u32);
        self.bus.write32(regs::REG_SRC_BASE_HI, (addr >> 32) as u32);
        self.bus.write32(regs::REG_SRC_LEN, len);
        let mut push = regs::PUSH_VALID;
        if last {
            push |= regs::PUSH_LAST;
        }
        self.bus.write32(regs::REG_CMD_PUSH, push);
        Ok(())
    }

    /// Edge-triggered start/stop. Idempotent: repeated `trigger(true)`
    /// while already started is a no-op; exactly one start edge is written
    /// per activation, and one restore edge per deactivation.
    pub fn trigger(&self, start: bool) {
        let mut started = self.started.lock().unwrap();
        if *started == start {
            return;
        }
        *started = start;
        let pattern = if start {
            regs::CTRL_TRIGGER_PATTERN
        } else {
            regs::CTRL_RESTORE_PATTERN
        };
        self.bus.write32(regs::REG_CTRL, pattern);
    }

    /// Reads and atomically clears the latched interrupt status.
    pub fn take_interrupt_status(&self) -> u32 {
        let _g = self.started.lock().unwrap();
        let bits = self.bus.read32(regs::REG_INT_STATUS) & regs::INT_MASK_ALL;
        if bits != 0 {
            self.bus.write32(regs::REG_INT_CLR, bits);
        }
        bits
    }

    /// Blocks until the completion interrupt is pending or `timeout`
    /// elapses. Returns `true` if pending. No adapter lock is held while
    /// blocked.
    pub fn wait_completion(&self, timeout: Duration) -> bool {
        self.irq.wait_irq(timeout)
    }
}
