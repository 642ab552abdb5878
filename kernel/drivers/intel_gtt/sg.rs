// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Describes physical memory as a list of contiguous segments.

use crate::error::Error;
use crate::regs;
use alloc::vec::Vec;

/// A physically contiguous run of pages.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    address: u64,
    length: u64,
}

impl Segment {
    /// new returns a segment, checking that it is made up
    /// of whole pages.
    ///
    pub fn new(address: u64, length: u64) -> Result<Self, Error> {
        if address % regs::PAGE_SIZE != 0 {
            return Err(Error::Misaligned(address));
        }

        if length % regs::PAGE_SIZE != 0 {
            return Err(Error::Misaligned(length));
        }

        if address.checked_add(length).is_none() {
            return Err(Error::InvalidSegment { address, length });
        }

        Ok(Segment { address, length })
    }

    /// address returns the physical address of the first
    /// page.
    ///
    pub fn address(&self) -> u64 {
        self.address
    }

    /// length returns the number of bytes in the segment,
    /// which is a multiple of the page size.
    ///
    pub fn length(&self) -> u64 {
        self.length
    }

    /// pages returns the number of pages in the segment.
    ///
    pub fn pages(&self) -> u64 {
        self.length >> regs::PAGE_SHIFT
    }
}

/// A scatter-gather list of physical segments.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScatterGatherList {
    segments: Vec<Segment>,
}

impl ScatterGatherList {
    pub fn new() -> Self {
        ScatterGatherList {
            segments: Vec::new(),
        }
    }

    /// from_pages returns a list with one single-page
    /// segment for each of the given page addresses.
    ///
    pub fn from_pages(pages: &[u64]) -> Result<Self, Error> {
        let mut list = ScatterGatherList {
            segments: Vec::with_capacity(pages.len()),
        };

        for page in pages.iter() {
            list.push(Segment::new(*page, regs::PAGE_SIZE)?);
        }

        Ok(list)
    }

    /// push adds a segment to the end of the list.
    ///
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// page_count returns the number of pages in the list.
    ///
    pub fn page_count(&self) -> u64 {
        self.segments.iter().fold(0, |total, s| total.saturating_add(s.pages()))
    }
}
