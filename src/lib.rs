// dcsched — job/tile scheduler for a SoC decompression accelerator.
//
// One dispatcher thread multiplexes concurrently-submitted decompression
// jobs onto a fixed-depth hardware command queue, synchronizes with the
// completion interrupt, and delivers per-job results back to independent
// calling sessions.

pub mod config;
pub mod device;
pub mod error;
pub mod header;
pub mod hw;
pub mod sched;

// ── Hardware geometry constants ──────────────────────────────────────────────

/// Minimum tile size the accelerator accepts (8 KiB). Caller-chosen tile
/// sizes must be positive multiples of this.
pub const MIN_TILE_SIZE: u32 = 8 * 1024;

/// Depth of the hardware command queue: the maximum number of tiles that
/// may be "submitted but not yet retired" at any instant.
pub const CMDQ_DEPTH: u32 = 16;

/// Capacity of the job handle pool. The 101st concurrent `acquire` fails
/// with [`Error::ResourceExhausted`].
pub const HANDLE_CAPACITY: usize = 100;

// ── Top-level re-exports ─────────────────────────────────────────────────────

pub use config::SchedConfig;
pub use device::{Device, SessionId};
pub use error::{Error, JobResult, Result};
pub use header::{HeaderInfo, HEADER_SIZE};
pub use sched::{Handle, Scheduler, SubmitStatus};
