// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Defines the operations that vary between hardware generations.
//!
//! Each generation implements [`GenerationOps`] on a unit type.
//! The provided methods describe the most common behaviour,
//! which individual generations override as needed.

use crate::error::Error;
use crate::generation::Generation;
use crate::platform::GenericAperture;
use crate::pte::{CacheFlags, PteFormat};
use crate::regs::{self, PgtblCtl};
use crate::stolen::StolenMemory;
use mmio::RegisterBlock;
use pci::{Address, ConfigSpace};

/// The page table, as seen through its register mapping.
///
#[derive(Clone, Copy)]
pub struct Table<'a> {
    block: &'a dyn RegisterBlock,
    offset: usize,
    format: PteFormat,
}

impl<'a> Table<'a> {
    /// new returns the page table starting at `offset`
    /// within `block`, with entries in the given format.
    ///
    pub fn new(block: &'a dyn RegisterBlock, offset: usize, format: PteFormat) -> Self {
        Table {
            block,
            offset,
            format,
        }
    }

    pub fn format(&self) -> PteFormat {
        self.format
    }

    /// location returns the register offset of the entry
    /// at `index`.
    ///
    pub fn location(&self, index: u32) -> usize {
        self.offset + index as usize * self.format.entry_size()
    }

    /// write stores an encoded entry.
    ///
    /// 64-bit entries are written as two dwords, low half
    /// first.
    ///
    pub fn write(&self, index: u32, pte: u64) -> Result<(), Error> {
        let location = self.location(index);
        match self.format.entry_size() {
            8 => self.block.write_u64(location, pte)?,
            _ => self.block.write_u32(location, pte as u32)?,
        }

        Ok(())
    }

    /// read returns the encoded entry at `index`.
    ///
    pub fn read(&self, index: u32) -> Result<u64, Error> {
        let location = self.location(index);
        let pte = match self.format.entry_size() {
            8 => self.block.read_u64(location)?,
            _ => self.block.read_u32(location)? as u64,
        };

        Ok(pte)
    }

    /// sync reads back the entry at `index`, which
    /// ensures that all preceding writes to the table
    /// have completed.
    ///
    pub fn sync(&self, index: u32) -> Result<(), Error> {
        self.block.read_u32(self.location(index))?;
        Ok(())
    }
}

/// The hardware a generation operates on.
///
pub struct Hardware<'a> {
    /// config is the PCI configuration space.
    pub config: &'a dyn ConfigSpace,

    /// bridge is the host bridge at 00:00.0.
    pub bridge: Address,

    /// registers is the device's register BAR.
    pub registers: &'a dyn RegisterBlock,

    /// table is the GTT.
    pub table: Table<'a>,

    /// aperture is the generic aperture manager.
    pub aperture: &'a dyn GenericAperture,
}

impl<'a> Hardware<'a> {
    pub fn pgtbl_ctl(&self) -> Result<PgtblCtl, Error> {
        Ok(PgtblCtl::from_bits(self.registers.read_u32(regs::PGTBL_CTL)?))
    }

    pub fn set_pgtbl_ctl(&self, ctl: PgtblCtl) -> Result<(), Error> {
        self.registers.write_u32(regs::PGTBL_CTL, ctl.bits())?;
        Ok(())
    }
}

/// The behaviour specific to one hardware generation.
///
pub trait GenerationOps: Sync {
    /// generation returns the generation these operations
    /// implement.
    ///
    fn generation(&self) -> Generation;

    /// check_active returns an error if the integrated
    /// graphics function has been disabled in the host
    /// bridge.
    ///
    fn check_active(&self, _config: &dyn ConfigSpace, _bridge: Address) -> Result<(), Error> {
        Ok(())
    }

    /// stolen_memory returns the amount of memory the BIOS
    /// has reserved for the display.
    ///
    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error>;

    /// dcache_size returns the number of bytes of on-chip
    /// display cache memory that can be mapped into the
    /// aperture.
    ///
    fn dcache_size(&self, _hw: &Hardware<'_>) -> Result<u64, Error> {
        Ok(0)
    }

    /// mappable_entries returns the number of GTT entries
    /// visible through the aperture.
    ///
    fn mappable_entries(&self, hw: &Hardware<'_>) -> Result<u32, Error> {
        aperture_entries(hw.aperture.size())
    }

    /// total_entries returns the number of entries in the
    /// GTT, which is at least `mappable`.
    ///
    fn total_entries(&self, _hw: &Hardware<'_>, mappable: u32) -> Result<u32, Error> {
        Ok(mappable)
    }

    /// install_gatt enables the page table, returning its
    /// physical address.
    ///
    /// `allocated` holds the address of the table if the
    /// driver allocated it.
    ///
    fn install_gatt(&self, hw: &Hardware<'_>, _allocated: Option<u64>) -> Result<u64, Error> {
        let ctl = hw.pgtbl_ctl()?.with_enabled(true);
        hw.set_pgtbl_ctl(ctl)?;
        Ok(ctl.base() as u64)
    }

    /// deinstall_gatt disables the page table.
    ///
    fn deinstall_gatt(&self, hw: &Hardware<'_>) -> Result<(), Error> {
        let ctl = hw.pgtbl_ctl()?.with_enabled(false);
        hw.set_pgtbl_ctl(ctl)
    }

    /// encode_pte returns the entry mapping `physical` with
    /// the given caching.
    ///
    fn encode_pte(&self, physical: u64, flags: CacheFlags) -> u64 {
        self.generation().pte_format().encode(physical, flags)
    }

    /// install_pte encodes and writes one entry.
    ///
    fn install_pte(&self, hw: &Hardware<'_>, index: u32, physical: u64, flags: CacheFlags) -> Result<(), Error> {
        hw.table.write(index, self.encode_pte(physical, flags))
    }

    /// write_pte writes an entry that has already been
    /// encoded.
    ///
    fn write_pte(&self, hw: &Hardware<'_>, index: u32, pte: u64) -> Result<(), Error> {
        if pte > hw.table.format().max_value() {
            return Err(Error::InvalidPte(pte));
        }

        hw.table.write(index, pte)
    }

    /// sync_pte waits for the write to the entry at
    /// `index` to complete.
    ///
    fn sync_pte(&self, hw: &Hardware<'_>, index: u32) -> Result<(), Error> {
        hw.table.sync(index)
    }

    /// set_aperture changes the aperture size.
    ///
    fn set_aperture(&self, hw: &Hardware<'_>, size: u32) -> Result<(), Error> {
        hw.aperture.set_size(size)
    }

    /// dump_registers logs the registers describing the
    /// GTT's configuration.
    ///
    fn dump_registers(&self, hw: &Hardware<'_>) {
        if let Ok(ctl) = hw.pgtbl_ctl() {
            log::debug!("PGTBL_CTL: {:08x}", ctl.bits());
        }
        log::debug!("GCC1: {:02x}", hw.config.read_u8(hw.bridge, regs::I830_GCC1));
        log::debug!("MSAC: {:02x}", hw.config.read_u8(hw.bridge, regs::I915_MSAC));
    }
}

/// aperture_entries returns the number of GTT entries
/// needed to map an aperture of `size` bytes.
///
pub fn aperture_entries(size: u32) -> Result<u32, Error> {
    if size == 0 || size as u64 % regs::PAGE_SIZE != 0 {
        return Err(Error::InvalidAperture(size));
    }

    Ok(size >> regs::PAGE_SHIFT)
}

// check_deven is shared by the generations that report the
// graphics device's state in the DEVEN register.
//
pub(crate) fn check_deven(config: &dyn ConfigSpace, bridge: Address, enable: u32) -> Result<(), Error> {
    if config.read_u32(bridge, regs::I915_DEVEN) & enable == 0 {
        Err(Error::Disabled)
    } else {
        Ok(())
    }
}

// total_from_pgtbl_ctl decodes the GTT size field of the
// i965 family.
//
pub(crate) fn total_from_pgtbl_ctl(hw: &Hardware<'_>) -> Result<u32, Error> {
    let ctl = hw.pgtbl_ctl()?;
    match ctl.size() {
        Some(size) => Ok(size.entries()),
        None => {
            log::error!("unknown page table size in PGTBL_CTL {:#x}", ctl.bits());
            Err(Error::UnknownGttSize(ctl.bits()))
        }
    }
}
