// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Describes the static properties of each hardware generation.

use crate::pte::PteFormat;
use crate::regs;

/// A family of graphics devices sharing one GTT
/// programming model.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generation {
    /// i810 and i815.
    I810,
    /// 830M and 845G.
    I830,
    /// 852GM, 855GM, and 865G.
    I855,
    /// 915G to 945GME.
    I915,
    /// G965 and GM965.
    I965,
    /// G33, Q33, and Q35.
    G33,
    /// Pineview, also known as IGD.
    Pineview,
    /// G45, Q45, and Ironlake.
    G4x,
    /// SandyBridge, with IvyBridge and Haswell.
    SandyBridge,
    /// ValleyView.
    ValleyView,
    /// Broadwell.
    Broadwell,
}

/// Describes where the register and page table mappings
/// live.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// The registers and the page table share one BAR,
    /// with the table at `table_offset`.
    Shared { bar: u8, table_offset: usize },

    /// The page table has its own BAR.
    Split { registers: u8, table: u8 },
}

/// Describes how the chipset's write buffers are flushed.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushMechanism {
    /// Nothing needs to be done.
    None,

    /// A flush page whose address is in a 32-bit register.
    I915,

    /// A flush page whose address is in a 64-bit register.
    I965,
}

impl FlushMechanism {
    /// register returns the host bridge register holding
    /// the flush page address, and whether it is 64 bits
    /// wide.
    ///
    pub const fn register(self) -> Option<(u8, bool)> {
        match self {
            Self::None => None,
            Self::I915 => Some((regs::I915_IFPADDR, false)),
            Self::I965 => Some((regs::I965_IFPADDR, true)),
        }
    }
}

impl Generation {
    /// number returns the hardware generation number.
    ///
    pub const fn number(self) -> u8 {
        match self {
            Self::I810 => 1,
            Self::I830 | Self::I855 => 2,
            Self::I915 | Self::G33 | Self::Pineview => 3,
            Self::I965 => 4,
            Self::G4x => 5,
            Self::SandyBridge => 6,
            Self::ValleyView => 7,
            Self::Broadwell => 8,
        }
    }

    /// dma_address_bits returns the number of physical address
    /// bits the device can reach.
    ///
    pub const fn dma_address_bits(self) -> u8 {
        match self {
            Self::I810 | Self::I830 | Self::I855 | Self::I915 => 32,
            Self::I965 | Self::G33 | Self::Pineview | Self::G4x => 36,
            Self::SandyBridge | Self::ValleyView | Self::Broadwell => 40,
        }
    }

    /// aperture_bar returns the configuration offset of the
    /// BAR holding the graphics aperture.
    ///
    pub const fn aperture_bar(self) -> u8 {
        if self.number() <= 2 {
            regs::APBASE
        } else {
            regs::I915_GMADR
        }
    }

    pub const fn layout(self) -> Layout {
        match self {
            Self::I810 | Self::I830 | Self::I855 => Layout::Shared {
                bar: regs::I810_MMADR,
                table_offset: regs::I810_GTT,
            },
            Self::I915 | Self::G33 | Self::Pineview => Layout::Split {
                registers: regs::I915_MMADR,
                table: regs::I915_GTTADR,
            },
            Self::I965 => Layout::Shared {
                bar: regs::I965_GTTMMADR,
                table_offset: regs::I965_GTT,
            },
            Self::G4x | Self::SandyBridge | Self::ValleyView | Self::Broadwell => Layout::Shared {
                bar: regs::I965_GTTMMADR,
                table_offset: regs::G4X_GTT,
            },
        }
    }

    /// gtt_offset_within_bar returns the offset of the page
    /// table within the register BAR, or `None` if the page
    /// table has a separate mapping.
    ///
    pub const fn gtt_offset_within_bar(self) -> Option<usize> {
        match self.layout() {
            Layout::Shared { table_offset, .. } => Some(table_offset),
            Layout::Split { .. } => None,
        }
    }

    pub const fn pte_format(self) -> PteFormat {
        match self {
            Self::I810 => PteFormat::I810,
            Self::I830 | Self::I855 | Self::I915 => PteFormat::I830,
            Self::I965 | Self::G33 | Self::Pineview | Self::G4x => PteFormat::I965,
            Self::SandyBridge | Self::ValleyView => PteFormat::Gen6,
            Self::Broadwell => PteFormat::Gen8,
        }
    }

    pub const fn flush_mechanism(self) -> FlushMechanism {
        match self {
            Self::I915 => FlushMechanism::I915,
            Self::I965 | Self::G33 | Self::Pineview | Self::G4x => FlushMechanism::I965,
            _ => FlushMechanism::None,
        }
    }

    /// gatt_allocation returns the size of the page table
    /// the driver must allocate itself. Later chips have the
    /// table set up by firmware.
    ///
    pub const fn gatt_allocation(self) -> Option<usize> {
        match self {
            Self::I810 => Some(64 * 1024),
            _ => None,
        }
    }
}
