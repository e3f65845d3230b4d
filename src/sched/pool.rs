//! Fixed-capacity job handle pool.
//!
//! Handles are small integers, unique among live jobs. `acquire` scans for
//! the first free slot under one pool-wide lock and never blocks; when
//! every slot is taken it fails with [`Error::ResourceExhausted`].
//! `release` is only legal once the owning job is back to Idle; releasing
//! an already-free slot is a no-op.

use std::sync::Mutex;

use crate::error::{Error, Result};

/// Job identifier handed out by the pool.
pub type Handle = u32;

pub struct HandlePool {
    /// `true` = slot free.
    slots: Mutex<Vec<bool>>,
}

impl HandlePool {
    pub fn new(capacity: usize) -> Self {
        HandlePool {
            slots: Mutex::new(vec![true; capacity]),
        }
    }

    /// First-free-slot scan. Never blocks.
    pub fn acquire(&self) -> Result<Handle> {
        let mut slots = self.slots.lock().unwrap();
        for (idx, free) in slots.iter_mut().enumerate() {
            if *free {
                *free = false;
                return Ok(idx as Handle);
            }
        }
        Err(Error::ResourceExhausted)
    }

    /// Marks the slot free again. Double-release is a no-op.
    pub fn release(&self, handle: Handle) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(handle as usize) {
            *slot = true;
        }
    }

    /// Number of currently free slots.
    pub fn available(&self) -> usize {
        self.slots.lock().unwrap().iter().filter(|f| **f).count()
    }
}
