//! Register map of the decompression accelerator.
//!
//! Offsets are relative to the engine's MMIO base. All registers are
//! 32-bit. The layout the scheduler relies on:
//!
//! - `REG_STATUS` bits [20:16] hold the number of outstanding (submitted
//!   but not yet retired) tiles, compared against [`crate::CMDQ_DEPTH`]
//!   for admission.
//! - `REG_CTRL` takes a fixed trigger pattern that starts the pipeline and
//!   simultaneously disables the secondary "almost-empty" interrupt; the
//!   restore pattern drops the start bit but keeps that interrupt masked.
//! - `REG_INT_STATUS` bits [8:0] latch completion and error conditions;
//!   clearing is a write-1 to `REG_INT_CLR`.
//! - Destination parameters are plain register writes (`REG_OUT_*`,
//!   `REG_BLOCK_CNT`, `REG_TILE_CNT`); writing `REG_TILE_CNT` latches the
//!   whole set.
//! - A data tile is three writes (`REG_SRC_*`) followed by a doorbell
//!   write to `REG_CMD_PUSH` carrying a valid bit and, for the job's
//!   final tile, a last-descriptor bit.

use core::ptr::{read_volatile, write_volatile};
use std::time::Duration;

// ── Register offsets ─────────────────────────────────────────────────────────

pub const REG_CTRL: usize = 0x00;
pub const REG_STATUS: usize = 0x04;
pub const REG_INT_STATUS: usize = 0x08;
pub const REG_INT_CLR: usize = 0x0C;

pub const REG_OUT_BASE_LO: usize = 0x10;
pub const REG_OUT_BASE_HI: usize = 0x14;
pub const REG_OUT_SIZE: usize = 0x18;
pub const REG_BLOCK_CNT: usize = 0x1C;
/// Writing this register latches the destination configuration.
pub const REG_TILE_CNT: usize = 0x20;

pub const REG_SRC_BASE_LO: usize = 0x24;
pub const REG_SRC_BASE_HI: usize = 0x28;
pub const REG_SRC_LEN: usize = 0x2C;
/// Doorbell: latches `REG_SRC_*` into the command queue.
pub const REG_CMD_PUSH: usize = 0x30;

// ── STATUS fields ────────────────────────────────────────────────────────────

/// Outstanding-tile count lives in bits [20:16].
pub const STATUS_OUTSTANDING_SHIFT: u32 = 16;
pub const STATUS_OUTSTANDING_MASK: u32 = 0x1F;

// ── CTRL bits ────────────────────────────────────────────────────────────────

/// Start-processing bit.
pub const CTRL_START: u32 = 1 << 0;
/// Masks the secondary almost-empty interrupt.
pub const CTRL_AEMPTY_INT_DIS: u32 = 1 << 3;
/// Pattern written on the start edge.
pub const CTRL_TRIGGER_PATTERN: u32 = CTRL_START | CTRL_AEMPTY_INT_DIS;
/// Pattern written on the restore edge after a job's last tile resolves.
pub const CTRL_RESTORE_PATTERN: u32 = CTRL_AEMPTY_INT_DIS;

// ── CMD_PUSH bits ────────────────────────────────────────────────────────────

pub const PUSH_VALID: u32 = 1 << 0;
/// Marks the descriptor as the job's final tile; retiring it raises the
/// completion interrupt.
pub const PUSH_LAST: u32 = 1 << 1;

// ── INT_STATUS bits [8:0] ────────────────────────────────────────────────────

/// Complete-ok: the last-flagged tile retired.
pub const INT_DONE: u32 = 1 << 0;
/// Almost-complete: the queue drained with work still expected.
pub const INT_ALMOST_DONE: u32 = 1 << 1;
/// Output CRC mismatch.
pub const INT_ERR_CRC: u32 = 1 << 2;
/// Decoded-size mismatch.
pub const INT_ERR_SIZE: u32 = 1 << 3;
/// AXI integrity error.
pub const INT_ERR_AXI: u32 = 1 << 4;
/// AXI response errors, bits [8:5].
pub const INT_ERR_AXI_RESP: u32 = 0x1E0;
/// Every interrupt bit the engine can latch.
pub const INT_MASK_ALL: u32 = 0x1FF;
/// Bits that resolve a blocked completion wait.
pub const INT_RESOLVE: u32 =
    INT_DONE | INT_ERR_CRC | INT_ERR_SIZE | INT_ERR_AXI | INT_ERR_AXI_RESP;

// ── Bus abstraction ──────────────────────────────────────────────────────────

/// 32-bit register access. Implemented by [`MmioBus`] for real hardware
/// and by [`crate::hw::SimAccel`] for tests.
pub trait RegBus: Send + Sync {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

/// The engine's completion interrupt line.
pub trait IrqLine: Send + Sync {
    /// Blocks until an interrupt in [`INT_RESOLVE`] is pending or
    /// `timeout` elapses. Returns `true` if one is pending. Must not be
    /// called with any adapter lock held.
    fn wait_irq(&self, timeout: Duration) -> bool;
}

// ── MMIO bus ─────────────────────────────────────────────────────────────────

/// Volatile MMIO implementation of [`RegBus`] over a mapped register
/// window.
pub struct MmioBus {
    base: *mut u8,
}

// SAFETY: register accesses are individually atomic volatile word
// operations; ordering across registers is synchronized by CmdQueue's lock.
unsafe impl Send for MmioBus {}
unsafe impl Sync for MmioBus {}

impl MmioBus {
    /// # Safety
    /// `base` must point at a live mapping of the engine's register window,
    /// valid for the lifetime of the bus.
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }
}

impl RegBus for MmioBus {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        unsafe { read_volatile(self.base.add(offset) as *const u32) }
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        unsafe { write_volatile(self.base.add(offset) as *mut u32, value) }
    }
}
