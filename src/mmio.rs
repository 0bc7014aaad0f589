//! Memory-mapped register access to the real link peripheral.
//!
//! The only unsafe code in the crate lives here: volatile loads and stores
//! at fixed physical offsets from the peripheral base. Everything above the
//! [`LinkBus`] seam is safe and hardware-agnostic.

#![allow(unsafe_code)]

use crate::transport::{LinkBus, Reg};

/// Physical base address of the link peripheral's register file.
pub const DEFAULT_BASE: usize = 0x4D00_0000;

/// [`LinkBus`] over a memory-mapped register file.
#[derive(Debug)]
pub struct MmioBus {
    base: *mut u32,
}

impl MmioBus {
    /// Bus over the register file at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the word-aligned address of a live link peripheral
    /// register file, mapped readable and writable for the whole lifetime of
    /// the bus, and nothing else may access those registers concurrently.
    pub unsafe fn new(base: usize) -> Self {
        Self {
            base: base as *mut u32,
        }
    }

    /// Bus at the platform's standard peripheral address, [`DEFAULT_BASE`].
    ///
    /// # Safety
    ///
    /// Same contract as [`new`](Self::new) for the default address.
    pub unsafe fn at_default_base() -> Self {
        unsafe { Self::new(DEFAULT_BASE) }
    }

    fn reg_ptr(&self, reg: Reg) -> *mut u32 {
        self.base.wrapping_add(reg.offset() / 4)
    }
}

impl LinkBus for MmioBus {
    fn read(&mut self, reg: Reg) -> u32 {
        // Volatile: register reads have side effects (RX_DATA pops a word).
        unsafe { self.reg_ptr(reg).read_volatile() }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        unsafe { self.reg_ptr(reg).write_volatile(value) }
    }
}
