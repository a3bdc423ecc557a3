// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! 32-bit register access primitive.

use core::ptr::{read_volatile, write_volatile};

/// Word-sized access to an address space of memory-mapped registers.
///
/// Implementations must perform every call as a real access, in program
/// order relative to other calls. There are no error returns: supplying an
/// address that is not mapped is outside the contract.
pub trait RegisterAccess {
    fn read32(&mut self, addr: u32) -> u32;
    fn write32(&mut self, addr: u32, value: u32);

    /// Read-modify-write of a single register.
    ///
    /// Not atomic. Callers sharing a register with another execution
    /// context must serialize around it.
    fn modify32<F>(&mut self, addr: u32, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read32(addr);
        self.write32(addr, f(value));
    }
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &mut T {
    fn read32(&mut self, addr: u32) -> u32 {
        (**self).read32(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        (**self).write32(addr, value)
    }
}

/// Direct volatile access to the physical address space.
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Only valid when running on the ChiselV SoC (or a core with the same
    /// memory map), where every address handed to the drivers is a mapped,
    /// word-aligned register.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterAccess for Mmio {
    #[inline(always)]
    fn read32(&mut self, addr: u32) -> u32 {
        // Safety: `Mmio::new` requires the ChiselV memory map.
        unsafe { read_volatile(addr as usize as *const u32) }
    }

    #[inline(always)]
    fn write32(&mut self, addr: u32, value: u32) {
        // Safety: `Mmio::new` requires the ChiselV memory map.
        unsafe { write_volatile(addr as usize as *mut u32, value) }
    }
}
