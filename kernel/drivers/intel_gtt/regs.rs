// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Register offsets, field encodings, and typed register values.
//!
//! Offsets below `0x100` are in the PCI configuration space of the
//! host bridge (00:00.0). Larger offsets are within the graphics
//! device's memory-mapped register BAR.

/// The PCI vendor id for Intel.
///
pub const VENDOR_INTEL: u16 = 0x8086;

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

// Host bridge configuration registers.
pub const I810_SMRAM: u8 = 0x70; // u8
pub const I810_SMRAM_GMS: u8 = 0xc0;
pub const I810_SMRAM_GMS_DISABLED: u8 = 0x00;
pub const I810_MISCC: u8 = 0x72; // u16
pub const I810_MISCC_WINSIZE: u16 = 0x0001;
pub const I810_MISCC_WINSIZE_64: u16 = 0x0000;
pub const I810_MISCC_WINSIZE_32: u16 = 0x0001;

pub const I830_GCC1: u8 = 0x52; // u8 or u16
pub const I830_GCC1_DEV2: u8 = 0x08;
pub const I830_GCC1_DEV2_DISABLED: u8 = 0x08;
pub const I830_GCC1_GMS: u8 = 0x70;
pub const I830_GCC1_GMS_STOLEN_512: u8 = 0x20;
pub const I830_GCC1_GMS_STOLEN_1024: u8 = 0x30;
pub const I830_GCC1_GMS_STOLEN_8192: u8 = 0x40;
pub const I830_GCC1_GMASIZE: u16 = 0x0001;
pub const I830_GCC1_GMASIZE_64: u16 = 0x0001;
pub const I830_GCC1_GMASIZE_128: u16 = 0x0000;

/// GCC1 is called MGGC from the i915 onwards.
pub const I855_GCC1: u8 = 0x52; // u8
pub const I855_GCC1_GMS: u8 = 0xf0;

pub const G33_MGGC_GGMS_MASK: u16 = 3 << 8;
pub const G33_MGGC_GGMS_SIZE_1M: u16 = 1 << 8;
pub const G33_MGGC_GGMS_SIZE_2M: u16 = 2 << 8;

pub const G4X_GCC1_SIZE_MASK: u16 = 0xf << 8;
pub const G4X_GCC1_SIZE_1M: u16 = 0x1 << 8;
pub const G4X_GCC1_SIZE_2M: u16 = 0x3 << 8;
pub const G4X_GCC1_SIZE_VT_1M: u16 = 0x9 << 8;
pub const G4X_GCC1_SIZE_VT_1_5M: u16 = 0xa << 8;
pub const G4X_GCC1_SIZE_VT_2M: u16 = 0xb << 8;

pub const I915_DEVEN: u8 = 0x54; // u32
pub const I915_DEVEN_D2F0: u32 = 0x08;
pub const SNB_DEVEN_D2EN: u32 = 0x10;
pub const I915_MSAC: u8 = 0x62; // u8
pub const I965_MSAC: u8 = 0x62; // u8

/// Flush page address, 32 bits.
pub const I915_IFPADDR: u8 = 0x60;
/// Flush page address, 64 bits (low dword first).
pub const I965_IFPADDR: u8 = 0x70;

pub const SNB_GCC1: u8 = 0x50; // u16
pub const SNB_GMCH_GMS_MASK: u16 = 0xf8;
pub const SNB_GTT_SIZE_MASK: u16 = 3 << 8;
pub const SNB_GTT_SIZE_1M: u16 = 1 << 8;
pub const SNB_GTT_SIZE_2M: u16 = 2 << 8;

// Graphics device configuration registers.
pub const APBASE: u8 = pci::BAR0;
pub const I810_MMADR: u8 = pci::BAR1;
pub const I915_MMADR: u8 = pci::BAR0;
pub const I915_GMADR: u8 = pci::BAR2;
pub const I915_GTTADR: u8 = pci::BAR3;
pub const I965_GTTMMADR: u8 = pci::BAR0;

// Memory-mapped registers.
pub const PGTBL_CTL: usize = 0x2020;
pub const PGTBL_CTL2: usize = 0x20c4;
pub const GFX_FLSH_CNTL: usize = 0x2170;
pub const SNB_GFX_MODE: usize = 0x2520;
pub const I810_DRT: usize = 0x3000;
pub const I810_DRT_POPULATED: u8 = 0x01;

/// The GTT within the register BAR on the i810 to i855.
pub const I810_GTT: usize = 0x10000;
/// The GTT within the combined BAR on the i965.
pub const I965_GTT: usize = 512 * 1024;
/// The GTT within the combined BAR on the G4X onwards.
pub const G4X_GTT: usize = 2 * 1024 * 1024;

/// The page table size field of PGTBL_CTL.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PgtblSize {
    Kb512 = 0,
    Kb256 = 1,
    Kb128 = 2,
    Mb1 = 3,
    Mb2 = 4,
    Mb1_5 = 5,
}

impl PgtblSize {
    /// from_field returns the size matching the 3-bit
    /// field value, if any.
    ///
    pub fn from_field(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Kb512),
            1 => Some(Self::Kb256),
            2 => Some(Self::Kb128),
            3 => Some(Self::Mb1),
            4 => Some(Self::Mb2),
            5 => Some(Self::Mb1_5),
            _ => None,
        }
    }

    /// kilobytes returns the size of the page table.
    ///
    pub const fn kilobytes(self) -> u32 {
        match self {
            Self::Kb512 => 512,
            Self::Kb256 => 256,
            Self::Kb128 => 128,
            Self::Mb1 => 1024,
            Self::Mb2 => 2048,
            Self::Mb1_5 => 1024 + 512,
        }
    }

    /// entries returns the number of 32-bit entries in
    /// a page table of this size.
    ///
    pub const fn entries(self) -> u32 {
        self.kilobytes() * 1024 / 4
    }
}

/// The page table control register, PGTBL_CTL.
///
/// Bit 0 enables the page table. Bits 1-3 hold the table
/// size on the i965 onwards. The remaining bits hold the
/// table's physical address, with bits 32-35 of the address
/// in bits 4-7 on chips that support them.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PgtblCtl(u32);

impl PgtblCtl {
    const ENABLED: u32 = 0x1;
    const SIZE_SHIFT: u32 = 1;
    const SIZE_MASK: u32 = 0x7 << Self::SIZE_SHIFT;

    pub const fn from_bits(bits: u32) -> Self {
        PgtblCtl(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn enabled(self) -> bool {
        self.0 & Self::ENABLED != 0
    }

    /// with_enabled returns the register with only the
    /// enable bit changed.
    ///
    #[must_use]
    pub const fn with_enabled(self, enabled: bool) -> Self {
        if enabled {
            PgtblCtl(self.0 | Self::ENABLED)
        } else {
            PgtblCtl(self.0 & !Self::ENABLED)
        }
    }

    pub fn size(self) -> Option<PgtblSize> {
        PgtblSize::from_field((self.0 & Self::SIZE_MASK) >> Self::SIZE_SHIFT)
    }

    /// with_size returns the register with only the size
    /// field changed.
    ///
    #[must_use]
    pub const fn with_size(self, size: PgtblSize) -> Self {
        PgtblCtl((self.0 & !Self::SIZE_MASK) | ((size as u32) << Self::SIZE_SHIFT))
    }

    /// base returns the register value with the enable bit
    /// cleared, which firmware leaves holding the address
    /// of the page table.
    ///
    pub const fn base(self) -> u32 {
        self.0 & !Self::ENABLED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pgtbl_ctl_enable_only_touches_bit_zero() {
        let ctl = PgtblCtl::from_bits(0x3ff8_0006);
        let on = ctl.with_enabled(true);
        assert_eq!(on.bits(), 0x3ff8_0007);
        assert!(on.enabled());
        assert_eq!(on.with_enabled(false), ctl);
        assert_eq!(on.base(), 0x3ff8_0006);
    }

    #[test]
    fn test_pgtbl_ctl_size() {
        let ctl = PgtblCtl::from_bits(0x3ff8_0001);
        assert_eq!(ctl.size(), Some(PgtblSize::Kb512));
        let ctl = ctl.with_size(PgtblSize::Mb2);
        assert_eq!(ctl.bits(), 0x3ff8_0009);
        assert_eq!(ctl.size(), Some(PgtblSize::Mb2));
        assert_eq!(PgtblCtl::from_bits(0xc).size(), None);
        assert_eq!(PgtblCtl::from_bits(0xe).size(), None);
    }

    #[test]
    fn test_pgtbl_size_entries() {
        assert_eq!(PgtblSize::Kb128.entries(), 32 * 1024);
        assert_eq!(PgtblSize::Kb256.entries(), 64 * 1024);
        assert_eq!(PgtblSize::Kb512.entries(), 128 * 1024);
        assert_eq!(PgtblSize::Mb1.entries(), 256 * 1024);
        assert_eq!(PgtblSize::Mb1_5.entries(), 384 * 1024);
        assert_eq!(PgtblSize::Mb2.entries(), 512 * 1024);
    }
}
