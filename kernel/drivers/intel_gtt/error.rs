// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Describes the ways in which GTT operations can fail.

use core::fmt;
use mmio::RegionOverflow;

/// Describes a failed GTT operation.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// No host bridge was found at 00:00.0.
    NoBridge,

    /// The device is not a supported Intel graphics
    /// device.
    Unsupported { vendor: u16, device: u16 },

    /// The integrated graphics function is disabled in
    /// the host bridge.
    Disabled,

    /// The stolen memory size field held an encoding that
    /// is not valid for this generation.
    UnknownStolenSize(u16),

    /// The GTT size field held an encoding that is not
    /// valid for this generation.
    UnknownGttSize(u32),

    /// The stolen memory is too small to hold the GTT and
    /// the BIOS display pages.
    StolenTooSmall { stolen_kb: u32, reserved_kb: u32 },

    /// The aperture size is not usable.
    InvalidAperture(u32),

    /// The mappable portion of the GTT is larger than the
    /// whole table.
    MappableExceedsTotal { mappable: u32, total: u32 },

    /// Physical memory extends beyond the addresses the
    /// device can reach.
    PhysicalMemoryTooLarge { end: u64, dma_bits: u8 },

    /// A register BAR or physical memory allocation could
    /// not be satisfied.
    ResourceUnavailable,

    /// The generic aperture could not be attached or
    /// resized.
    ApertureUnavailable,

    /// The GTT entry is past the end of the table.
    OutOfRange { entry: u32, entries: u32 },

    /// The GTT entry is reserved for stolen memory.
    StolenEntry { entry: u32, stolen: u32 },

    /// An offset or size was not page aligned.
    Misaligned(u64),

    /// The segment runs past the end of the physical
    /// address space.
    InvalidSegment { address: u64, length: u64 },

    /// The encoded PTE does not fit this generation's
    /// entry size.
    InvalidPte(u64),

    /// No memory has the given id.
    NoSuchMemory(u32),

    /// The memory type cannot be used with this device,
    /// or with this size.
    InvalidMemoryType,

    /// The memory limit for the aperture has been reached.
    OutOfMemory,

    /// The memory is already bound.
    AlreadyBound(u32),

    /// The memory is not bound.
    NotBound(u32),

    /// The memory is bound, or the resource is in use.
    Busy,

    /// The device is suspended.
    Suspended,

    /// The device is not suspended.
    NotSuspended,

    /// A register access fell outside its mapping.
    Register(RegionOverflow),
}

impl From<RegionOverflow> for Error {
    fn from(overflow: RegionOverflow) -> Self {
        Error::Register(overflow)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoBridge => write!(f, "no host bridge found at 00:00.0"),
            Error::Unsupported { vendor, device } => {
                write!(f, "unsupported graphics device {:04x}:{:04x}", vendor, device)
            }
            Error::Disabled => write!(f, "integrated graphics is disabled"),
            Error::UnknownStolenSize(value) => {
                write!(f, "unknown stolen memory configuration {:#x}", value)
            }
            Error::UnknownGttSize(value) => write!(f, "unknown GTT size configuration {:#x}", value),
            Error::StolenTooSmall {
                stolen_kb,
                reserved_kb,
            } => write!(
                f,
                "stolen memory of {}k cannot hold {}k of GTT and BIOS pages",
                stolen_kb, reserved_kb
            ),
            Error::InvalidAperture(size) => write!(f, "invalid aperture size {:#x}", size),
            Error::MappableExceedsTotal { mappable, total } => write!(
                f,
                "{} mappable GTT entries exceed {} total entries",
                mappable, total
            ),
            Error::PhysicalMemoryTooLarge { end, dma_bits } => write!(
                f,
                "physical memory ends at {:#x}, beyond the {}-bit DMA limit",
                end, dma_bits
            ),
            Error::ResourceUnavailable => write!(f, "resource allocation failed"),
            Error::ApertureUnavailable => write!(f, "generic aperture unavailable"),
            Error::OutOfRange { entry, entries } => {
                write!(f, "GTT entry {} out of range ({} entries)", entry, entries)
            }
            Error::StolenEntry { entry, stolen } => write!(
                f,
                "GTT entry {} is within the {} stolen entries",
                entry, stolen
            ),
            Error::Misaligned(value) => write!(f, "{:#x} is not page aligned", value),
            Error::InvalidSegment { address, length } => write!(
                f,
                "segment of {:#x} bytes at {:#x} wraps the address space",
                length, address
            ),
            Error::InvalidPte(value) => write!(f, "PTE {:#x} does not fit the entry size", value),
            Error::NoSuchMemory(id) => write!(f, "no memory with id {}", id),
            Error::InvalidMemoryType => write!(f, "invalid memory type"),
            Error::OutOfMemory => write!(f, "aperture memory limit reached"),
            Error::AlreadyBound(id) => write!(f, "memory {} is already bound", id),
            Error::NotBound(id) => write!(f, "memory {} is not bound", id),
            Error::Busy => write!(f, "resource busy"),
            Error::Suspended => write!(f, "device is suspended"),
            Error::NotSuspended => write!(f, "device is not suspended"),
            Error::Register(RegionOverflow(offset)) => {
                write!(f, "register access overflowed its mapping at {:#x}", offset)
            }
        }
    }
}
