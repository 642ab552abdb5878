// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Manages an attached graphics device.
//!
//! A [`Gtt`] is created by [`Gtt::attach`], which identifies the
//! chip, maps its registers, and discovers the layout of its page
//! table. It is destroyed by [`Gtt::detach`], which puts the
//! hardware back the way it was found and returns the platform.
//!
//! Attaching happens in a fixed order, as each step depends on
//! the state established by the steps before it:
//!
//! 1. Find the host bridge at 00:00.0.
//! 2. Match the graphics device against the chip table.
//! 3. Attach the generic aperture.
//! 4. Check that all physical memory is addressable by the device.
//! 5. Map the register BAR(s).
//! 6. Record the initial aperture size.
//! 7. Determine the stolen memory size.
//! 8. Install the GATT.
//! 9. Determine the mappable and total GTT entries.
//! 10. Set up the chipset flush page.
//!
//! If any step fails, everything done by the preceding steps is
//! undone.

use crate::chips::{self, Chip};
use crate::error::Error;
use crate::flush::FlushPage;
use crate::generation::{Generation, Layout};
use crate::memory::Memories;
use crate::ops::{GenerationOps, Hardware, Table};
use crate::platform::{Allocation, GenericAperture, Platform};
use crate::pte::CacheFlags;
use crate::regs::{self, PgtblCtl};
use crate::stolen::StolenMemory;
use mmio::RegisterBlock;
use pci::{Address, Function};
use spin::Mutex;

/// The page table installed in the hardware.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gatt {
    /// physical is the address of the page table.
    pub physical: u64,

    /// entries is the number of entries that back the
    /// aperture.
    pub entries: u32,
}

/// probe returns the chip table entry for `function`, if it
/// is a supported device that has not been disabled.
///
pub fn probe<P: Platform>(platform: &P, function: &Function) -> Result<&'static Chip, Error> {
    let chip = chips::lookup(function.vendor, function.device).ok_or(Error::Unsupported {
        vendor: function.vendor,
        device: function.device,
    })?;

    let bridge = match platform.find_device_at(0, 0, 0) {
        Some(bridge) => bridge,
        None => {
            log::debug!("can't find bridge device");
            return Err(Error::NoBridge);
        }
    };

    if let Err(err) = chip.ops.check_active(platform.config(), bridge.address) {
        log::debug!("{} disabled, not probing", chip.name);
        return Err(err);
    }

    Ok(chip)
}

// Mappings holds the register BARs of a device.
//
struct Mappings<R> {
    registers: R,
    table: Option<R>,
    table_offset: usize,
}

impl<R: RegisterBlock> Mappings<R> {
    // map maps the BARs used by the given generation.
    //
    fn map<P>(platform: &P, function: &Function, generation: Generation) -> Result<Self, Error>
    where
        P: Platform<Registers = R>,
    {
        match generation.layout() {
            Layout::Shared { bar, table_offset } => Ok(Mappings {
                registers: platform.map_bar(function, bar)?,
                table: None,
                table_offset,
            }),
            Layout::Split { registers, table } => {
                let registers = platform.map_bar(function, registers)?;
                match platform.map_bar(function, table) {
                    Ok(table) => Ok(Mappings {
                        registers,
                        table: Some(table),
                        table_offset: 0,
                    }),
                    Err(err) => {
                        platform.unmap_bar(registers);
                        Err(err)
                    }
                }
            }
        }
    }

    fn unmap<P>(self, platform: &P)
    where
        P: Platform<Registers = R>,
    {
        if let Some(table) = self.table {
            platform.unmap_bar(table);
        }

        platform.unmap_bar(self.registers);
    }

    fn hardware<'a, P>(&'a self, platform: &'a P, bridge: Address, generation: Generation) -> Hardware<'a>
    where
        P: Platform<Registers = R>,
    {
        let table: &dyn RegisterBlock = match &self.table {
            Some(table) => table,
            None => &self.registers,
        };

        Hardware {
            config: platform.config(),
            bridge,
            registers: &self.registers,
            table: Table::new(table, self.table_offset, generation.pte_format()),
            aperture: platform.aperture(),
        }
    }
}

// Discovered holds the state determined while probing the
// hardware.
//
struct Discovered<R> {
    stolen: StolenMemory,
    dcache_size: u64,
    gatt_physical: u64,
    gatt_allocation: Option<Allocation<R>>,
    mappable_entries: u32,
    total_entries: u32,
    flush_page: Option<FlushPage<R>>,
}

/// An attached graphics device.
///
pub struct Gtt<P: Platform> {
    pub(crate) platform: P,
    function: Function,
    bridge: Address,
    pub(crate) chip: &'static Chip,
    mappings: Mappings<P::Registers>,
    initial_aperture: u32,
    pub(crate) gatt: Gatt,
    gatt_allocation: Option<Allocation<P::Registers>>,
    pub(crate) stolen: StolenMemory,
    pub(crate) mappable_entries: u32,
    pub(crate) total_entries: u32,
    pub(crate) dcache_size: u64,
    pub(crate) flush_page: Option<FlushPage<P::Registers>>,
    pub(crate) memory: Mutex<Memories<P::Registers>>,
    suspended: bool,
}

impl<P: Platform> Gtt<P> {
    /// attach takes control of the graphics device `function`.
    ///
    pub fn attach(platform: P, function: Function) -> Result<Self, Error> {
        let bridge = match platform.find_device_at(0, 0, 0) {
            Some(bridge) => bridge.address,
            None => return Err(Error::NoBridge),
        };

        let chip = chips::lookup(function.vendor, function.device).ok_or(Error::Unsupported {
            vendor: function.vendor,
            device: function.device,
        })?;

        chip.ops.check_active(platform.config(), bridge)?;

        let generation = chip.ops.generation();
        platform.aperture().attach(function.address, generation.aperture_bar())?;

        let end = platform.physical_memory_end();
        let dma_bits = generation.dma_address_bits();
        if end > (1u64 << dma_bits) - 1 {
            log::error!(
                "{} does not support physical memory above {:#x}",
                chip.name,
                (1u64 << dma_bits) - 1
            );
            platform.aperture().detach(function.address);
            return Err(Error::PhysicalMemoryTooLarge { end, dma_bits });
        }

        let mappings = match Mappings::map(&platform, &function, generation) {
            Ok(mappings) => mappings,
            Err(err) => {
                platform.aperture().detach(function.address);
                return Err(err);
            }
        };

        let initial_aperture = platform.aperture().size();
        let gatt_entries = initial_aperture >> regs::PAGE_SHIFT;

        let hw = mappings.hardware(&platform, bridge, generation);
        let discovered = match Self::discover(&platform, chip.ops, &hw) {
            Ok(discovered) => discovered,
            Err(err) => {
                log::error!("{}: {}", chip.name, err);
                mappings.unmap(&platform);
                platform.aperture().detach(function.address);
                return Err(err);
            }
        };

        if discovered.stolen.entries > 0 {
            log::info!(
                "{}: aperture size is {}M, detected {}k stolen memory",
                chip.name,
                initial_aperture >> 20,
                discovered.stolen.entries * 4
            );
        } else {
            log::info!("{}: aperture size is {}M", chip.name, initial_aperture >> 20);
        }

        chip.ops.dump_registers(&hw);
        log::debug!("Mappable GTT entries: {}", discovered.mappable_entries);
        log::debug!("Total GTT entries: {}", discovered.total_entries);

        Ok(Gtt {
            platform,
            function,
            bridge,
            chip,
            mappings,
            initial_aperture,
            gatt: Gatt {
                physical: discovered.gatt_physical,
                entries: gatt_entries,
            },
            gatt_allocation: discovered.gatt_allocation,
            stolen: discovered.stolen,
            mappable_entries: discovered.mappable_entries,
            total_entries: discovered.total_entries,
            dcache_size: discovered.dcache_size,
            flush_page: discovered.flush_page,
            memory: Mutex::new(Memories::new()),
            suspended: false,
        })
    }

    // discover performs the generation-specific steps of
    // attaching, undoing its own work if it fails.
    //
    fn discover(platform: &P, ops: &dyn GenerationOps, hw: &Hardware<'_>) -> Result<Discovered<P::Registers>, Error> {
        let generation = ops.generation();
        let stolen = ops.stolen_memory(hw)?;
        let dcache_size = ops.dcache_size(hw)?;

        let gatt_allocation = match generation.gatt_allocation() {
            Some(size) => Some(Self::allocate_gatt(platform, size)?),
            None => None,
        };

        let gatt_physical = match ops.install_gatt(hw, gatt_allocation.as_ref().map(|a| a.physical)) {
            Ok(physical) => physical,
            Err(err) => {
                if let Some(allocation) = gatt_allocation {
                    platform.release(allocation);
                }

                return Err(err);
            }
        };

        let sizes = ops.mappable_entries(hw).and_then(|mappable| {
            let total = ops.total_entries(hw, mappable)?;
            if mappable > total {
                return Err(Error::MappableExceedsTotal { mappable, total });
            }

            Ok((mappable, total))
        });

        let flush_page = sizes.and_then(|sizes| {
            let page = FlushPage::setup(platform, hw.bridge, generation.flush_mechanism())?;
            Ok((sizes, page))
        });

        match flush_page {
            Ok(((mappable_entries, total_entries), flush_page)) => Ok(Discovered {
                stolen,
                dcache_size,
                gatt_physical,
                gatt_allocation,
                mappable_entries,
                total_entries,
                flush_page,
            }),
            Err(err) => {
                if let Err(deinstall) = ops.deinstall_gatt(hw) {
                    log::warn!("failed to deinstall GATT: {}", deinstall);
                }

                if let Some(allocation) = gatt_allocation {
                    platform.release(allocation);
                }

                Err(err)
            }
        }
    }

    // allocate_gatt allocates and clears a page table that
    // the driver manages itself. The table must be below
    // 4G, as PGTBL_CTL holds a 32-bit address.
    //
    fn allocate_gatt(platform: &P, size: usize) -> Result<Allocation<P::Registers>, Error> {
        let allocation = platform.allocate(size, 0, u32::MAX as u64)?;
        for offset in (0..size).step_by(4) {
            if let Err(err) = allocation.mapping.write_u32(offset, 0) {
                platform.release(allocation);
                return Err(err.into());
            }
        }

        Ok(allocation)
    }

    /// detach restores the hardware to the state it was in
    /// before the device was attached, releasing all of its
    /// resources, and returns the platform.
    ///
    pub fn detach(self) -> P {
        let Gtt {
            platform,
            function,
            bridge,
            chip,
            mappings,
            initial_aperture,
            gatt_allocation,
            flush_page,
            memory,
            ..
        } = self;

        let generation = chip.ops.generation();
        {
            let hw = mappings.hardware(&platform, bridge, generation);
            if let Err(err) = chip.ops.deinstall_gatt(&hw) {
                log::warn!("failed to deinstall GATT: {}", err);
            }

            if let Some(page) = flush_page {
                page.teardown(&platform, bridge);
            }

            if let Err(err) = chip.ops.set_aperture(&hw, initial_aperture) {
                log::warn!("failed to restore aperture size: {}", err);
            }
        }

        if let Some(allocation) = gatt_allocation {
            platform.release(allocation);
        }

        for allocation in memory.into_inner().into_allocations() {
            platform.release(allocation);
        }

        mappings.unmap(&platform);
        platform.aperture().detach(function.address);

        platform
    }

    /// suspend records that the system is suspending. The
    /// page table cannot be changed until the device has
    /// been resumed.
    ///
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    /// resume restores the aperture size and reinstalls the
    /// page table after a suspend.
    ///
    pub fn resume(&mut self) -> Result<(), Error> {
        if !self.suspended {
            return Err(Error::NotSuspended);
        }

        let hw = self.hardware();
        self.chip.ops.set_aperture(&hw, self.initial_aperture)?;
        hw.set_pgtbl_ctl(PgtblCtl::from_bits(self.gatt.physical as u32).with_enabled(true))?;

        self.suspended = false;
        Ok(())
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    // check_awake returns an error if the device is
    // suspended.
    //
    pub(crate) fn check_awake(&self) -> Result<(), Error> {
        if self.suspended {
            Err(Error::Suspended)
        } else {
            Ok(())
        }
    }

    /// hardware returns the device's registers and page
    /// table.
    ///
    pub(crate) fn hardware(&self) -> Hardware<'_> {
        self.mappings
            .hardware(&self.platform, self.bridge, self.chip.ops.generation())
    }

    pub fn chip(&self) -> &'static Chip {
        self.chip
    }

    pub fn generation(&self) -> Generation {
        self.chip.ops.generation()
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn gatt(&self) -> Gatt {
        self.gatt
    }

    pub fn stolen(&self) -> StolenMemory {
        self.stolen
    }

    pub fn mappable_entries(&self) -> u32 {
        self.mappable_entries
    }

    pub fn total_entries(&self) -> u32 {
        self.total_entries
    }

    /// initial_aperture returns the aperture size found
    /// when the device was attached.
    ///
    pub fn initial_aperture(&self) -> u32 {
        self.initial_aperture
    }

    /// dcache_size returns the amount of on-chip memory,
    /// which is only present on some i810 boards.
    ///
    pub fn dcache_size(&self) -> u64 {
        self.dcache_size
    }

    /// flush_page returns the physical address of the
    /// chipset flush page, if there is one.
    ///
    pub fn flush_page(&self) -> Option<u64> {
        self.flush_page.as_ref().map(|page| page.physical())
    }

    /// aperture_size returns the current aperture size.
    ///
    pub fn aperture_size(&self) -> u32 {
        self.platform.aperture().size()
    }

    /// set_aperture changes the aperture size.
    ///
    pub fn set_aperture(&self, size: u32) -> Result<(), Error> {
        self.chip.ops.set_aperture(&self.hardware(), size)
    }

    // checked_index returns the GTT index for `offset`
    // into the aperture, if it may be changed by the
    // caller.
    //
    fn checked_index(&self, offset: u64) -> Result<u32, Error> {
        self.check_awake()?;
        if offset >= (self.gatt.entries as u64) << regs::PAGE_SHIFT {
            log::warn!(
                "failed: offset is {:#010x}, shift is {}, entries is {}",
                offset,
                regs::PAGE_SHIFT,
                self.gatt.entries
            );
            return Err(Error::OutOfRange {
                entry: (offset >> regs::PAGE_SHIFT).min(u32::MAX as u64) as u32,
                entries: self.gatt.entries,
            });
        }

        let index = (offset >> regs::PAGE_SHIFT) as u32;
        self.check_not_stolen(index)?;

        Ok(index)
    }

    // check_not_stolen returns an error if the entry at
    // `index` maps stolen memory.
    //
    pub(crate) fn check_not_stolen(&self, index: u32) -> Result<(), Error> {
        if self.stolen.entries != 0 && index < self.stolen.entries {
            log::warn!("trying to change GTT entry {} in stolen memory", index);
            return Err(Error::StolenEntry {
                entry: index,
                stolen: self.stolen.entries,
            });
        }

        Ok(())
    }

    /// bind_page maps the page at `offset` into the
    /// aperture to the given physical address.
    ///
    /// This does not take the device lock. Callers must
    /// serialise calls that change the same entries.
    ///
    pub fn bind_page(&self, offset: u64, physical: u64) -> Result<(), Error> {
        let index = self.checked_index(offset)?;
        self.chip
            .ops
            .install_pte(&self.hardware(), index, physical, CacheFlags::NONE)
    }

    /// unbind_page clears the mapping for the page at
    /// `offset` into the aperture.
    ///
    /// As with [`bind_page`](Self::bind_page), this does
    /// not take the device lock.
    ///
    pub fn unbind_page(&self, offset: u64) -> Result<(), Error> {
        let index = self.checked_index(offset)?;
        self.chip
            .ops
            .install_pte(&self.hardware(), index, 0, CacheFlags::NONE)
    }

    /// enable_gtt flushes the chipset's write buffers
    /// through the GFX_FLSH_CNTL register.
    ///
    pub fn enable_gtt(&self) -> Result<(), Error> {
        let registers = &self.mappings.registers;
        registers.write_u32(regs::GFX_FLSH_CNTL, 1)?;
        registers.write_u32(regs::GFX_FLSH_CNTL, 0)?;
        Ok(())
    }
}
