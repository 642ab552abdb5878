// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the translation interface used by graphics drivers.
//!
//! The bulk operations here write a run of entries and then sync
//! only the last one, which is enough to ensure the whole run has
//! reached the hardware. None of them take the device lock, so
//! callers must serialise their own changes to the table.

use crate::device::Gtt;
use crate::error::Error;
use crate::platform::{GenericAperture, Platform};
use crate::pte::CacheFlags;
use crate::regs;
use crate::sg::{ScatterGatherList, Segment};

/// Summarises the GTT.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GttInfo {
    /// stolen_size is the number of bytes of stolen memory.
    pub stolen_size: u64,
    pub gtt_total_entries: u32,
    pub gtt_mappable_entries: u32,

    /// scratch_page is the physical address that cleared
    /// entries map.
    pub scratch_page: u64,
}

/// Describes the address spaces covered by the GTT.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApertureGeometry {
    /// gtt_total is the number of bytes the whole GTT maps.
    pub gtt_total: u64,
    pub stolen_size: u64,

    /// mappable_base is the physical address of the CPU
    /// aperture.
    pub mappable_base: u64,

    /// mappable_end is the number of bytes of the GTT
    /// visible through the aperture.
    pub mappable_end: u64,
}

impl<P: Platform> Gtt<P> {
    pub fn info(&self) -> GttInfo {
        GttInfo {
            stolen_size: self.stolen.size,
            gtt_total_entries: self.total_entries,
            gtt_mappable_entries: self.mappable_entries,
            scratch_page: self.platform.scratch_page(),
        }
    }

    pub fn geometry(&self) -> ApertureGeometry {
        ApertureGeometry {
            gtt_total: (self.total_entries as u64) << regs::PAGE_SHIFT,
            stolen_size: self.stolen.size,
            mappable_base: self.platform.aperture().base(),
            mappable_end: (self.mappable_entries as u64) << regs::PAGE_SHIFT,
        }
    }

    // check_run returns an error unless `count` entries
    // starting at `first` are within the table.
    //
    fn check_run(&self, first: u32, count: u64) -> Result<(), Error> {
        self.check_awake()?;
        let end = (first as u64).saturating_add(count);
        if end > self.total_entries as u64 {
            log::warn!(
                "GTT run of {} entries at {} exceeds {} entries",
                count,
                first,
                self.total_entries
            );
            return Err(Error::OutOfRange {
                entry: (end - 1).min(u32::MAX as u64) as u32,
                entries: self.total_entries,
            });
        }

        Ok(())
    }

    // write_run installs `count` entries from `first`,
    // mapping the given physical pages, then syncs the
    // last entry.
    //
    fn write_run<I>(&self, first: u32, count: u64, pages: I, flags: CacheFlags) -> Result<(), Error>
    where
        I: Iterator<Item = u64>,
    {
        self.check_run(first, count)?;
        if count == 0 {
            return Ok(());
        }

        let hw = self.hardware();
        let ops = self.chip.ops;
        let mut index = first;
        for physical in pages.take(count as usize) {
            ops.install_pte(&hw, index, physical, flags)?;
            index += 1;
        }

        ops.sync_pte(&hw, first + (count - 1) as u32)
    }

    /// clear_range points `count` entries starting at
    /// `first` at the scratch page.
    ///
    pub fn clear_range(&self, first: u32, count: u32) -> Result<(), Error> {
        let scratch = self.platform.scratch_page();
        let pages = core::iter::repeat(scratch);
        self.write_run(first, count as u64, pages, CacheFlags::NONE)
    }

    /// insert_pages maps consecutive entries starting at
    /// `first` to the given physical pages.
    ///
    pub fn insert_pages(&self, first: u32, pages: &[u64], flags: CacheFlags) -> Result<(), Error> {
        self.write_run(first, pages.len() as u64, pages.iter().copied(), flags)
    }

    /// insert_page maps a single entry, without waiting
    /// for the write to complete.
    ///
    pub fn insert_page(&self, physical: u64, entry: u32, flags: CacheFlags) -> Result<(), Error> {
        self.check_run(entry, 1)?;
        self.chip
            .ops
            .install_pte(&self.hardware(), entry, physical, flags)
    }

    /// insert_segments maps consecutive entries starting at
    /// `first` to the pages of each segment in turn.
    ///
    pub fn insert_segments(&self, segments: &[Segment], first: u32, flags: CacheFlags) -> Result<(), Error> {
        let count = segments
            .iter()
            .fold(0, |total: u64, s| total.saturating_add(s.pages()));
        let pages = segments.iter().flat_map(|segment| {
            (0..segment.pages()).map(move |page| segment.address() + (page << regs::PAGE_SHIFT))
        });

        self.write_run(first, count, pages, flags)
    }

    /// insert_sg_entries maps consecutive entries starting
    /// at `first` to the pages of a scatter-gather list.
    ///
    pub fn insert_sg_entries(&self, list: &ScatterGatherList, first: u32, flags: CacheFlags) -> Result<(), Error> {
        self.insert_segments(list.segments(), first, flags)
    }

    /// map_memory returns a scatter-gather list describing
    /// the given pages.
    ///
    pub fn map_memory(&self, pages: &[u64]) -> Result<ScatterGatherList, Error> {
        ScatterGatherList::from_pages(pages)
    }

    /// chipset_flush flushes the chipset's write buffers,
    /// if the chipset needs it.
    ///
    pub fn chipset_flush(&self) -> Result<(), Error> {
        match &self.flush_page {
            Some(page) => page.flush(),
            None => Ok(()),
        }
    }

    /// sync_pte waits for writes to the entry to complete.
    ///
    pub fn sync_pte(&self, entry: u32) -> Result<(), Error> {
        self.check_run(entry, 1)?;
        self.chip.ops.sync_pte(&self.hardware(), entry)
    }

    /// write_raw_pte stores an already-encoded entry.
    ///
    pub fn write_raw_pte(&self, entry: u32, value: u64) -> Result<(), Error> {
        self.check_run(entry, 1)?;
        self.chip.ops.write_pte(&self.hardware(), entry, value)
    }

    /// read_pte returns the encoded entry at `entry`.
    ///
    pub fn read_pte(&self, entry: u32) -> Result<u64, Error> {
        if entry >= self.total_entries {
            return Err(Error::OutOfRange {
                entry,
                entries: self.total_entries,
            });
        }

        self.hardware().table.read(entry)
    }
}
