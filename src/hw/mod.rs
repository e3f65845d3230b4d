//! Hardware queue adapter for the decompression accelerator.
//!
//! The accelerator is treated as an opaque bounded command queue plus an
//! interrupt source. Three layers:
//!
//! - [`regs`] — the register map (offsets, bit fields) and the [`RegBus`] /
//!   [`IrqLine`] traits that abstract the bus so the same adapter drives
//!   real MMIO or the software simulator.
//! - [`queue`] — [`CmdQueue`], the admission-checked submission facade the
//!   dispatcher talks to.
//! - [`sim`] — [`SimAccel`], a software model of the pipeline used by the
//!   integration tests.

pub mod queue;
pub mod regs;
pub mod sim;

pub use queue::CmdQueue;
pub use regs::{IrqLine, MmioBus, RegBus};
pub use sim::SimAccel;
