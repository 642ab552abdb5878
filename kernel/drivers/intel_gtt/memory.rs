// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the legacy AGP memory interface.
//!
//! Callers allocate memory of a given type, then bind it into
//! the aperture at a chosen offset. Each allocation is tracked
//! by id in the device's memory set.
//!
//! Unlike the page-level interface, binding and unbinding memory
//! holds the device lock for the whole operation, including the
//! final PTE sync.

use crate::device::Gtt;
use crate::error::Error;
use crate::generation::Generation;
use crate::platform::{Allocation, GenericAperture, Platform};
use crate::pte::CacheFlags;
use crate::regs;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// The kinds of memory that can be allocated.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryType {
    /// Ordinary system memory.
    Normal,

    /// The i810's on-chip display cache.
    Dcache,

    /// Physically contiguous memory whose address is
    /// returned to the caller, as used for cursors.
    Physical,
}

/// Describes an allocation.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryInfo {
    pub id: u32,
    pub kind: MemoryType,
    pub size: u64,

    /// physical is the address of the memory, or zero
    /// for the display cache.
    pub physical: u64,

    /// offset is the aperture offset where the memory is
    /// bound.
    pub offset: u64,

    pub bound: bool,
}

struct Memory<R> {
    info: MemoryInfo,
    backing: Option<Allocation<R>>,
}

/// The set of allocations for a device.
///
pub struct Memories<R> {
    regions: BTreeMap<u32, Memory<R>>,
    next_id: u32,
    allocated: u64,

    // argb_cursor is set while the single multi-page
    // physical allocation exists.
    argb_cursor: bool,
}

impl<R> Memories<R> {
    pub(crate) fn new() -> Self {
        Memories {
            regions: BTreeMap::new(),
            next_id: 0,
            allocated: 0,
            argb_cursor: false,
        }
    }

    /// into_allocations returns the backing memory of all
    /// remaining allocations.
    ///
    pub(crate) fn into_allocations(self) -> impl Iterator<Item = Allocation<R>> {
        self.regions.into_values().filter_map(|memory| memory.backing)
    }

    // get returns the memory with the given id.
    //
    fn get(&mut self, id: u32) -> Result<&mut Memory<R>, Error> {
        self.regions.get_mut(&id).ok_or(Error::NoSuchMemory(id))
    }
}

impl<P: Platform> Gtt<P> {
    /// alloc_memory allocates `size` bytes of memory of the
    /// given type, returning its id.
    ///
    pub fn alloc_memory(&self, kind: MemoryType, size: u64) -> Result<u32, Error> {
        if size == 0 || size % regs::PAGE_SIZE != 0 {
            return Err(Error::Misaligned(size));
        }

        let mut memory = self.memory.lock();
        match memory.allocated.checked_add(size) {
            Some(total) if total <= self.platform.memory_limit() => {}
            _ => return Err(Error::OutOfMemory),
        }

        let argb_cursor = kind == MemoryType::Physical && size != regs::PAGE_SIZE;
        let backing = match kind {
            MemoryType::Dcache => {
                // Only the i810 can map its local memory.
                if self.chip.ops.generation() != Generation::I810 || size != self.dcache_size {
                    return Err(Error::InvalidMemoryType);
                }

                None
            }
            MemoryType::Physical | MemoryType::Normal => {
                if argb_cursor && memory.argb_cursor {
                    return Err(Error::Busy);
                }

                Some(self.platform.allocate(size as usize, 0, u64::MAX)?)
            }
        };

        let id = memory.next_id;
        let info = MemoryInfo {
            id,
            kind,
            size,
            physical: backing.as_ref().map(|b| b.physical).unwrap_or(0),
            offset: 0,
            bound: false,
        };

        memory.next_id += 1;
        memory.allocated += size;
        memory.argb_cursor |= argb_cursor;
        memory.regions.insert(id, Memory { info, backing });

        Ok(id)
    }

    /// free_memory releases the memory with the given id,
    /// which must not be bound.
    ///
    pub fn free_memory(&self, id: u32) -> Result<(), Error> {
        let mut memory = self.memory.lock();
        if memory.get(id)?.info.bound {
            return Err(Error::Busy);
        }

        let region = memory.regions.remove(&id).ok_or(Error::NoSuchMemory(id))?;
        memory.allocated -= region.info.size;
        if region.info.kind == MemoryType::Physical && region.info.size != regs::PAGE_SIZE {
            memory.argb_cursor = false;
        }

        if let Some(backing) = region.backing {
            self.platform.release(backing);
        }

        Ok(())
    }

    /// bind_memory maps the memory with the given id into
    /// the aperture at `offset`.
    ///
    pub fn bind_memory(&self, id: u32, offset: u64) -> Result<(), Error> {
        self.check_awake()?;
        let mut memory = self.memory.lock();
        let region = memory.get(id)?;
        let size = region.info.size;
        if offset % regs::PAGE_SIZE != 0 {
            log::warn!("binding memory at misaligned offset {:#x}", offset);
            return Err(Error::Misaligned(offset));
        }

        let end = offset.checked_add(size);
        if end.map_or(true, |end| end > self.platform.aperture().size() as u64) {
            log::warn!("binding memory at bad offset {:#x}", offset);
            let entry = end
                .map(|end| (end >> regs::PAGE_SHIFT).min(u32::MAX as u64) as u32)
                .unwrap_or(u32::MAX);
            return Err(Error::OutOfRange {
                entry,
                entries: self.gatt.entries,
            });
        }

        if region.info.bound {
            return Err(Error::AlreadyBound(id));
        }

        let first = (offset >> regs::PAGE_SHIFT) as u32;
        self.check_not_stolen(first)?;

        let pages = (size >> regs::PAGE_SHIFT) as u32;
        let (physical, flags) = match region.info.kind {
            MemoryType::Dcache => (0, CacheFlags::DCACHE),
            _ => (region.info.physical, CacheFlags::NONE),
        };

        let hw = self.hardware();
        let ops = self.chip.ops;
        for page in 0..pages {
            let address = physical + ((page as u64) << regs::PAGE_SHIFT);
            ops.install_pte(&hw, first + page, address, flags)?;
        }

        ops.sync_pte(&hw, first + pages - 1)?;
        region.info.offset = offset;
        region.info.bound = true;

        Ok(())
    }

    /// unbind_memory removes the memory with the given id
    /// from the aperture.
    ///
    pub fn unbind_memory(&self, id: u32) -> Result<(), Error> {
        self.check_awake()?;
        let mut memory = self.memory.lock();
        let region = memory.get(id)?;
        if !region.info.bound {
            return Err(Error::NotBound(id));
        }

        let first = (region.info.offset >> regs::PAGE_SHIFT) as u32;
        let pages = (region.info.size >> regs::PAGE_SHIFT) as u32;
        let hw = self.hardware();
        let ops = self.chip.ops;
        for page in 0..pages {
            ops.install_pte(&hw, first + page, 0, CacheFlags::NONE)?;
        }

        ops.sync_pte(&hw, first + pages - 1)?;
        region.info.bound = false;

        Ok(())
    }

    /// memory_info returns the state of the memory with the
    /// given id.
    ///
    pub fn memory_info(&self, id: u32) -> Result<MemoryInfo, Error> {
        let mut memory = self.memory.lock();
        Ok(memory.get(id)?.info)
    }

    /// memory_ids returns the ids of all allocations, in
    /// ascending order.
    ///
    pub fn memory_ids(&self) -> Vec<u32> {
        self.memory.lock().regions.keys().copied().collect()
    }

    /// allocated_memory returns the number of bytes
    /// currently allocated.
    ///
    pub fn allocated_memory(&self) -> u64 {
        self.memory.lock().allocated
    }
}
