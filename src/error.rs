//! Error taxonomy and completion results.
//!
//! Two distinct types on purpose:
//!
//! - [`Error`] is returned synchronously by the call that caused it
//!   (bad parameter, pool exhausted, timeout, ...). A failed call never
//!   mutates job or group state.
//! - [`JobResult`] is the *outcome* of a decompression job, decoded from
//!   the accelerator's interrupt-status bits. Hardware integrity errors
//!   (CRC / size / AXI) do not fail the call that observes the interrupt —
//!   they are encoded into the completion record so the original submitter,
//!   possibly a different thread, receives the true outcome.

use core::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by scheduler and device operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed header, zero-length config, tile size not a multiple of
    /// the minimum, or an otherwise out-of-range argument.
    InvalidParameter,
    /// The handle pool has no free slot.
    ResourceExhausted,
    /// No live job carries the requested handle.
    HandleNotFound,
    /// The hardware command queue is at depth. Transient — retried
    /// internally by the dispatcher with backoff; public operations never
    /// return it.
    QueueFull,
    /// A bounded wait elapsed without shutdown. Retryable.
    Timeout,
    /// The device was torn down while the job was in flight.
    Cancelled,
    /// Device operation issued before `dev_init` (or after final
    /// `dev_deinit`).
    NotInitialized,
    /// Destroying a Running/AwaitingLastTile job, or closing a session
    /// group that still has pending completion records.
    Busy,
}

impl Error {
    /// Stable identifier string for each variant.
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidParameter => "invalid parameter",
            Error::ResourceExhausted => "handle pool exhausted",
            Error::HandleNotFound => "handle not found",
            Error::QueueFull => "hardware command queue full",
            Error::Timeout => "operation timed out",
            Error::Cancelled => "device torn down while job in flight",
            Error::NotInitialized => "device not initialized",
            Error::Busy => "resource busy",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::error::Error for Error {}

/// Outcome of a completed job, decoded from interrupt status.
///
/// Pushed into the owning session group as `(handle, JobResult)` and
/// consumed by exactly one waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    /// Complete-ok bit set, no error bits.
    Ok,
    /// Output CRC mismatch reported by the accelerator.
    CrcError,
    /// Decoded-size mismatch reported by the accelerator.
    SizeError,
    /// AXI integrity or response error on the output path.
    AxiError,
    /// Job abandoned by device teardown before the hardware resolved it.
    Cancelled,
}

impl JobResult {
    /// Decodes latched interrupt-status bits into a job outcome.
    ///
    /// Error bits win over the complete-ok bit: hardware sets bit 0
    /// together with an error bit when a stream finished decoding but
    /// failed verification.
    pub fn from_irq_status(bits: u32) -> JobResult {
        use crate::hw::regs;
        if bits & regs::INT_ERR_CRC != 0 {
            JobResult::CrcError
        } else if bits & regs::INT_ERR_SIZE != 0 {
            JobResult::SizeError
        } else if bits & (regs::INT_ERR_AXI | regs::INT_ERR_AXI_RESP) != 0 {
            JobResult::AxiError
        } else {
            // No error bits; treat as success even if only the
            // almost-complete bit made it through (the done bit is the
            // normal case).
            JobResult::Ok
        }
    }

    /// True for the success outcome.
    pub fn is_ok(&self) -> bool {
        matches!(self, JobResult::Ok)
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobResult::Ok => "ok",
            JobResult::CrcError => "crc error",
            JobResult::SizeError => "size error",
            JobResult::AxiError => "axi error",
            JobResult::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
