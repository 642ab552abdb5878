// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Manages the chipset flush page.
//!
//! From the i915 until SandyBridge, the chipset's write buffers
//! are flushed by writing to a dedicated page of memory. The
//! page's physical address is held in the host bridge's IFPADDR
//! register, with bit 0 set once the page is valid.
//!
//! If the BIOS has already set up the page, the driver uses it
//! as it is and never clears the register. Otherwise, the driver
//! allocates a page, publishes its address, and clears the valid
//! bit again when it is finished.

use crate::error::Error;
use crate::generation::FlushMechanism;
use crate::platform::{Allocation, Platform};
use crate::regs;
use mmio::RegisterBlock;
use pci::{Address, ConfigSpace};

const VALID: u32 = 0x1;

/// A chipset flush page.
///
pub struct FlushPage<R> {
    allocation: Allocation<R>,
    register: u8,
    bios_allocated: bool,
}

impl<R: RegisterBlock> FlushPage<R> {
    /// setup prepares the flush page for the given mechanism,
    /// returning `None` if no page is needed.
    ///
    pub fn setup<P>(platform: &P, bridge: Address, mechanism: FlushMechanism) -> Result<Option<Self>, Error>
    where
        P: Platform<Registers = R>,
    {
        let (register, wide) = match mechanism.register() {
            Some(reg) => reg,
            None => return Ok(None),
        };

        let config = platform.config();
        let high = if wide {
            config.read_u32(bridge, register + 4)
        } else {
            0
        };
        let low = config.read_u32(bridge, register);

        if low & VALID != 0 {
            let physical = ((high as u64) << 32) | (low & !VALID) as u64;
            log::debug!("found already configured flush page at {:#x}", physical);

            // The BIOS is expected to have reserved the page
            // too.
            let allocation = platform.allocate(regs::PAGE_SIZE as usize, physical, physical + regs::PAGE_SIZE - 1)?;
            return Ok(Some(FlushPage {
                allocation,
                register,
                bios_allocated: true,
            }));
        }

        let end = if wide { u64::MAX } else { u32::MAX as u64 };
        let allocation = match platform.allocate(regs::PAGE_SIZE as usize, 0, end) {
            Ok(allocation) => allocation,
            Err(err) => {
                log::warn!("failed to allocate flush page");
                return Err(err);
            }
        };

        let physical = allocation.physical;
        if wide {
            config.write_u32(bridge, register + 4, (physical >> 32) as u32);
        }
        config.write_u32(bridge, register, (physical as u32) | VALID);
        log::debug!("allocated flush page at {:#x}", physical);

        Ok(Some(FlushPage {
            allocation,
            register,
            bios_allocated: false,
        }))
    }

    /// teardown releases the flush page, clearing the
    /// host bridge register if the driver set it.
    ///
    pub fn teardown<P>(self, platform: &P, bridge: Address)
    where
        P: Platform<Registers = R>,
    {
        if !self.bios_allocated {
            let config = platform.config();
            let low = config.read_u32(bridge, self.register);
            config.write_u32(bridge, self.register, low & !VALID);
        }

        platform.release(self.allocation);
    }

    /// physical returns the address of the flush page.
    ///
    pub fn physical(&self) -> u64 {
        self.allocation.physical
    }

    /// flush triggers a flush of the chipset's write
    /// buffers.
    ///
    pub fn flush(&self) -> Result<(), Error> {
        mmio::access_barrier();
        self.allocation.mapping.write_u32(0, 1)?;
        Ok(())
    }
}
