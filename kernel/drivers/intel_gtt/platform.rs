// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Describes the services the host kernel provides to the GTT
//! driver.
//!
//! The driver never touches page tables, port I/O, or the
//! physical memory allocator directly. Instead, the kernel
//! supplies a [`Platform`], which the driver owns for as long
//! as the device is attached.

use crate::error::Error;
use mmio::RegisterBlock;
use pci::{Address, ConfigSpace, Function};

/// The generic AGP aperture manager.
///
/// This handles the aperture BAR and its size, which
/// works the same way for all AGP bridges.
///
pub trait GenericAperture {
    /// attach claims the aperture resource described by
    /// the BAR at config offset `bar`.
    ///
    fn attach(&self, device: Address, bar: u8) -> Result<(), Error>;

    /// detach releases the aperture resource.
    ///
    fn detach(&self, device: Address);

    /// base returns the physical address of the aperture.
    ///
    fn base(&self) -> u64;

    /// size returns the current size of the aperture in
    /// bytes.
    ///
    fn size(&self) -> u32;

    /// set_size changes the aperture size.
    ///
    fn set_size(&self, size: u32) -> Result<(), Error>;
}

/// A physically contiguous allocation, with the virtual
/// mapping the driver uses to access it.
///
#[derive(Debug)]
pub struct Allocation<R> {
    /// physical is the address of the first byte.
    pub physical: u64,

    /// size is the number of bytes allocated.
    pub size: usize,

    /// mapping is the uncached mapping of the memory.
    pub mapping: R,
}

/// The kernel services used by the driver.
///
pub trait Platform {
    type Config: ConfigSpace;
    type Aperture: GenericAperture;
    type Registers: RegisterBlock;

    /// config returns the PCI configuration space
    /// accessor.
    ///
    fn config(&self) -> &Self::Config;

    /// aperture returns the generic aperture manager.
    ///
    fn aperture(&self) -> &Self::Aperture;

    /// find_device_at returns the PCI function at the given
    /// location, if any.
    ///
    fn find_device_at(&self, bus: u8, slot: u8, func: u8) -> Option<Function> {
        pci::find(self.config(), bus, slot, func)
    }

    /// physical_memory_end returns the largest physical
    /// address of system memory.
    ///
    fn physical_memory_end(&self) -> u64;

    /// memory_limit returns the number of bytes of memory
    /// that may be allocated for the aperture.
    ///
    fn memory_limit(&self) -> u64;

    /// scratch_page returns the physical address of a page
    /// that unused GTT entries can safely point at.
    ///
    fn scratch_page(&self) -> u64;

    /// map_bar maps the memory BAR at config offset `bar`
    /// of `device`.
    ///
    fn map_bar(&self, device: &Function, bar: u8) -> Result<Self::Registers, Error>;

    /// unmap_bar releases a mapping returned by `map_bar`.
    ///
    fn unmap_bar(&self, registers: Self::Registers);

    /// allocate returns `size` bytes of page-aligned,
    /// physically contiguous memory within `[start, end]`.
    ///
    fn allocate(&self, size: usize, start: u64, end: u64) -> Result<Allocation<Self::Registers>, Error>;

    /// release frees an allocation returned by `allocate`.
    ///
    fn release(&self, allocation: Allocation<Self::Registers>);
}
