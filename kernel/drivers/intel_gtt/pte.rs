// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Encodes page table entries for each hardware layout.
//!
//! The GTT has used five distinct entry layouts:
//!
//! - i810: 32-bit entries with a local memory (dcache) bit.
//! - i830 to i915: 32-bit entries addressing the first 4 GiB.
//! - i965 to G4X: 32-bit entries with address bits 32-35 in
//!   bits 4-7.
//! - SandyBridge to ValleyView: 32-bit entries with address bits
//!   32-39 in bits 4-11 and a cache control field.
//! - Broadwell: 64-bit entries.

use bitflags::bitflags;

bitflags! {
    /// Flag bits in a 32-bit page table entry.
    ///
    /// Several layouts reuse the same bits for different
    /// purposes.
    ///
    pub struct PteFlags: u32 {
        const VALID = 0x1;
        const I810_LOCAL = 0x2;
        const I830_SYSTEM_CACHED = 0x6;
        const GEN6_UNCACHED = 0x2;
        const GEN6_LLC = 0x4;
        const GEN6_LLC_MLC = 0x6;
        const GEN6_GFDT = 0x8;
    }
}

bitflags! {
    /// Flag bits in a 64-bit page table entry.
    ///
    pub struct Gen8PteFlags: u64 {
        const PRESENT = 0x1;
        const RW = 0x2;
        const PWT = 1 << 3;
    }
}

/// The caching behaviour requested for a mapping.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheKind {
    /// No preference. Plain page binds use this.
    Default,

    /// Uncached user memory.
    Uncached,

    /// Snooped system memory. On SandyBridge and later
    /// this selects the last-level cache.
    Cached,

    /// The last-level and mid-level caches.
    CachedLlcMlc,

    /// i810 on-chip local memory.
    Dcache,
}

/// The caching flags for a mapping: the cache kind plus the
/// graphics data type modifier used by SandyBridge and later.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheFlags {
    pub kind: CacheKind,
    pub gfdt: bool,
}

impl CacheFlags {
    pub const NONE: CacheFlags = CacheFlags::new(CacheKind::Default);
    pub const UNCACHED: CacheFlags = CacheFlags::new(CacheKind::Uncached);
    pub const CACHED: CacheFlags = CacheFlags::new(CacheKind::Cached);
    pub const LLC: CacheFlags = Self::CACHED;
    pub const LLC_MLC: CacheFlags = CacheFlags::new(CacheKind::CachedLlcMlc);
    pub const DCACHE: CacheFlags = CacheFlags::new(CacheKind::Dcache);

    pub const fn new(kind: CacheKind) -> Self {
        CacheFlags { kind, gfdt: false }
    }

    /// with_gfdt returns the flags with the graphics data
    /// type modifier set.
    ///
    #[must_use]
    pub const fn with_gfdt(self) -> Self {
        CacheFlags {
            kind: self.kind,
            gfdt: true,
        }
    }
}

impl Default for CacheFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// A page table entry layout.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PteFormat {
    I810,
    I830,
    I965,
    Gen6,
    Gen8,
}

impl PteFormat {
    /// entry_size returns the number of bytes in each
    /// entry.
    ///
    pub const fn entry_size(self) -> usize {
        match self {
            Self::Gen8 => 8,
            _ => 4,
        }
    }

    /// max_value returns the largest value an entry can
    /// hold.
    ///
    pub const fn max_value(self) -> u64 {
        match self {
            Self::Gen8 => u64::MAX,
            _ => u32::MAX as u64,
        }
    }

    /// encode returns the entry mapping `physical` with the
    /// given caching flags.
    ///
    pub fn encode(self, physical: u64, flags: CacheFlags) -> u64 {
        match self {
            Self::I810 => {
                let mut pte = PteFlags::VALID.bits() | physical as u32;
                match flags.kind {
                    CacheKind::Dcache => pte |= PteFlags::I810_LOCAL.bits(),
                    CacheKind::Cached => pte |= PteFlags::I830_SYSTEM_CACHED.bits(),
                    _ => {}
                }

                pte as u64
            }
            Self::I830 => encode_i830(physical, flags) as u64,
            Self::I965 => {
                let high = ((physical >> 28) & 0xf0) as u32;
                (encode_i830(physical, flags) | high) as u64
            }
            Self::Gen6 => {
                let mut pte = PteFlags::VALID;
                let gfdt = if flags.gfdt {
                    PteFlags::GEN6_GFDT
                } else {
                    PteFlags::empty()
                };

                pte |= match flags.kind {
                    CacheKind::Uncached => PteFlags::GEN6_UNCACHED,
                    CacheKind::CachedLlcMlc => PteFlags::GEN6_LLC_MLC | gfdt,
                    _ => PteFlags::GEN6_LLC | gfdt,
                };

                let high = ((physical & 0xff_0000_0000) >> 28) as u32;
                (pte.bits() | physical as u32 | high) as u64
            }
            Self::Gen8 => {
                // The cache attributes are not yet mapped to the
                // private PAT, so every mapping is write-through.
                let flags = Gen8PteFlags::PRESENT | Gen8PteFlags::RW | Gen8PteFlags::PWT;
                physical | flags.bits()
            }
        }
    }
}

fn encode_i830(physical: u64, flags: CacheFlags) -> u32 {
    let mut pte = PteFlags::VALID.bits() | physical as u32;
    if flags.kind == CacheKind::Cached {
        pte |= PteFlags::I830_SYSTEM_CACHED.bits();
    }

    pte
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i810_encoding() {
        let f = PteFormat::I810;
        assert_eq!(f.encode(0x1234_5000, CacheFlags::NONE), 0x1234_5001);
        assert_eq!(f.encode(0x1234_5000, CacheFlags::DCACHE), 0x1234_5003);
        assert_eq!(f.encode(0x1234_5000, CacheFlags::CACHED), 0x1234_5007);
        assert_eq!(f.encode(0, CacheFlags::NONE), 0x1);
    }

    #[test]
    fn test_i830_encoding() {
        let f = PteFormat::I830;
        assert_eq!(f.encode(0x0abc_d000, CacheFlags::NONE), 0x0abc_d001);
        assert_eq!(f.encode(0x0abc_d000, CacheFlags::UNCACHED), 0x0abc_d001);
        assert_eq!(f.encode(0x0abc_d000, CacheFlags::CACHED), 0x0abc_d007);
        assert_eq!(f.encode(0x0abc_d000, CacheFlags::DCACHE), 0x0abc_d001);
        assert_eq!(f.entry_size(), 4);
    }

    #[test]
    fn test_i965_high_address_bits() {
        let f = PteFormat::I965;
        assert_eq!(f.encode(0x0000_0003_8765_4000, CacheFlags::NONE), 0x8765_4031);
        assert_eq!(f.encode(0x0000_000f_0000_0000, CacheFlags::CACHED), 0x0000_00f7);
        // Bits above 35 cannot be represented.
        assert_eq!(f.encode(0x0000_0010_0000_0000, CacheFlags::NONE), 0x1);
    }

    #[test]
    fn test_gen6_cache_modes() {
        let f = PteFormat::Gen6;
        let phys = 0x0000_0000_4000_0000;
        assert_eq!(f.encode(phys, CacheFlags::NONE), 0x4000_0005);
        assert_eq!(f.encode(phys, CacheFlags::LLC), 0x4000_0005);
        assert_eq!(f.encode(phys, CacheFlags::UNCACHED), 0x4000_0003);
        assert_eq!(f.encode(phys, CacheFlags::LLC_MLC), 0x4000_0007);
        assert_eq!(f.encode(phys, CacheFlags::LLC.with_gfdt()), 0x4000_000d);
        assert_eq!(f.encode(phys, CacheFlags::LLC_MLC.with_gfdt()), 0x4000_000f);
        // The GFDT bit is not applied to uncached mappings.
        assert_eq!(f.encode(phys, CacheFlags::UNCACHED.with_gfdt()), 0x4000_0003);
    }

    #[test]
    fn test_gen6_high_address_bits() {
        let f = PteFormat::Gen6;
        assert_eq!(f.encode(0x0000_00ab_1234_5000, CacheFlags::NONE), 0x1234_5ab5);
        assert_eq!(f.encode(0x0000_0001_0000_0000, CacheFlags::NONE), 0x0000_0015);
        assert_eq!(f.encode(0, CacheFlags::NONE), 0x5);
    }

    #[test]
    fn test_gen8_encoding() {
        let f = PteFormat::Gen8;
        assert_eq!(f.entry_size(), 8);
        assert_eq!(f.encode(0x0000_0012_3456_7000, CacheFlags::NONE), 0x0000_0012_3456_700b);
        assert_eq!(f.encode(0, CacheFlags::NONE), 0xb);
    }

    #[test]
    fn test_gen8_ignores_cache_flags() {
        // Known limitation: Broadwell entries use the same
        // write-through encoding whatever caching is requested.
        let f = PteFormat::Gen8;
        let phys = 0x8000_0000;
        let expected = f.encode(phys, CacheFlags::NONE);
        for flags in [
            CacheFlags::UNCACHED,
            CacheFlags::CACHED,
            CacheFlags::LLC_MLC,
            CacheFlags::LLC_MLC.with_gfdt(),
        ] {
            assert_eq!(f.encode(phys, flags), expected);
        }
    }
}
