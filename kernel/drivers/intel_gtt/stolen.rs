// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Decodes the amount of memory reserved by firmware for the
//! display.
//!
//! The BIOS sets aside some system memory before the kernel
//! starts, which it uses for early console output. The first
//! aperture pages map this memory, so the driver must never
//! replace their entries. Each family reports the reservation
//! in its own format.
//!
//! Up to the G4X, the GTT itself and four pages of BIOS data
//! also live in stolen memory, so the number of stolen entries
//! excludes them.

use crate::error::Error;
use crate::generation::Generation;
use crate::regs;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;

/// The BIOS keeps four pages of display data after the GTT.
const BIOS_POPUP_KB: u32 = 4;

/// The amount of stolen memory and the number of GTT
/// entries that map it.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StolenMemory {
    /// size is the number of bytes of stolen memory.
    pub size: u64,

    /// entries is the number of GTT entries at the start
    /// of the aperture that must not be changed.
    pub entries: u32,
}

impl StolenMemory {
    /// No memory was stolen.
    pub const NONE: StolenMemory = StolenMemory {
        size: 0,
        entries: 0,
    };

    /// kilobytes returns the stolen size in KiB.
    ///
    pub const fn kilobytes(&self) -> u64 {
        self.size / KB
    }
}

// usable_entries returns the number of pages of stolen memory
// left after `reserved_kb` is set aside.
//
fn usable_entries(stolen_kb: u32, reserved_kb: u32) -> Result<u32, Error> {
    match stolen_kb.checked_sub(reserved_kb) {
        Some(usable) => Ok(usable * 1024 / regs::PAGE_SIZE as u32),
        None => Err(Error::StolenTooSmall {
            stolen_kb,
            reserved_kb,
        }),
    }
}

/// decode_i830 returns the stolen memory described by the
/// 8-bit GCC1 register of an i830 host bridge.
///
/// The i830 keeps a 128K GTT in stolen memory.
///
pub fn decode_i830(gcc1: u8) -> Result<StolenMemory, Error> {
    let stolen_kb = match gcc1 & regs::I830_GCC1_GMS {
        regs::I830_GCC1_GMS_STOLEN_512 => 512,
        regs::I830_GCC1_GMS_STOLEN_1024 => 1024,
        regs::I830_GCC1_GMS_STOLEN_8192 => 8192,
        _ => return Err(Error::UnknownStolenSize(gcc1 as u16)),
    };

    Ok(StolenMemory {
        size: stolen_kb as u64 * KB,
        entries: usable_entries(stolen_kb, 128 + BIOS_POPUP_KB)?,
    })
}

/// decode_gms returns the stolen memory described by the
/// 8-bit GCC1 (MGGC) register of an i855 to G4X host bridge,
/// given the size in KiB of the GTT sharing stolen memory.
///
/// Encodings that are only defined for later generations
/// are rejected.
///
pub fn decode_gms(generation: Generation, gcc1: u8, gtt_kb: u32) -> Result<StolenMemory, Error> {
    let number = generation.number();
    let late_965 = matches!(generation, Generation::I965 | Generation::G4x);
    let mb = match gcc1 & regs::I855_GCC1_GMS {
        0x10 => 1,
        0x20 => 4,
        0x30 => 8,
        0x40 => 16,
        0x50 => 32,
        0x60 if number > 2 => 48,
        0x70 if number > 2 => 64,
        0x80 if number > 2 => 128,
        0x90 if number > 2 => 256,
        0xa0 if late_965 => 96,
        0xb0 if late_965 => 160,
        0xc0 if late_965 => 224,
        0xd0 if late_965 => 352,
        _ => return Err(Error::UnknownStolenSize(gcc1 as u16)),
    };

    let stolen_kb = mb * 1024;
    Ok(StolenMemory {
        size: stolen_kb as u64 * KB,
        entries: usable_entries(stolen_kb, gtt_kb + BIOS_POPUP_KB)?,
    })
}

/// decode_gen6 returns the stolen memory described by the
/// 16-bit GMCH control register of a SandyBridge or
/// ValleyView host bridge.
///
/// The size is a multiple of 32M, from 32M to 512M.
///
pub fn decode_gen6(gmch: u16) -> Result<StolenMemory, Error> {
    let gms = (gmch & regs::SNB_GMCH_GMS_MASK) >> 3;
    if gms == 0 || gms > 16 {
        return Err(Error::UnknownStolenSize(gmch));
    }

    let size = gms as u64 * 32 * MB;
    Ok(StolenMemory {
        size,
        entries: ((size - 4) / regs::PAGE_SIZE) as u32,
    })
}

/// decode_gen8 returns the stolen memory described by the
/// 16-bit GMCH control register of a Broadwell host bridge.
///
/// The upper byte counts 32M units. Zero means nothing was
/// stolen.
///
pub fn decode_gen8(gmch: u16) -> StolenMemory {
    let size = ((gmch >> 8) & 0xff) as u64 * 32 * MB;
    StolenMemory {
        size,
        entries: (size.saturating_sub(4) / regs::PAGE_SIZE) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i830() {
        let s = decode_i830(0x20).unwrap();
        assert_eq!(s.size, 512 * KB);
        assert_eq!(s.entries, (512 - 132) / 4);

        // Other bits in the register are ignored.
        let s = decode_i830(0x3f).unwrap();
        assert_eq!(s.size, MB);
        assert_eq!(s.entries, (1024 - 132) / 4);

        let s = decode_i830(0x40).unwrap();
        assert_eq!(s.size, 8 * MB);

        for bad in [0x00, 0x10, 0x50, 0x60, 0x70] {
            assert_eq!(decode_i830(bad), Err(Error::UnknownStolenSize(bad as u16)));
        }
    }

    #[test]
    fn test_gms_common_values() {
        let cases = [(0x10, 1), (0x20, 4), (0x30, 8), (0x40, 16), (0x50, 32)];
        for generation in [Generation::I855, Generation::I915, Generation::G4x] {
            for (value, mb) in cases {
                let s = decode_gms(generation, value, 128).unwrap();
                assert_eq!(s.size, mb * MB, "{:?} {:#x}", generation, value);
            }
        }
    }

    #[test]
    fn test_gms_generation_gates() {
        // 48M and up require a gen 3 part.
        assert_eq!(
            decode_gms(Generation::I855, 0x60, 128),
            Err(Error::UnknownStolenSize(0x60))
        );
        assert_eq!(decode_gms(Generation::I915, 0x60, 256).unwrap().size, 48 * MB);
        assert_eq!(decode_gms(Generation::G33, 0x90, 1024).unwrap().size, 256 * MB);

        // The largest values only exist on the i965 and G4X.
        for value in [0xa0, 0xb0, 0xc0, 0xd0] {
            for generation in [Generation::I915, Generation::G33, Generation::Pineview] {
                assert_eq!(
                    decode_gms(generation, value, 0),
                    Err(Error::UnknownStolenSize(value as u16))
                );
            }
        }

        assert_eq!(decode_gms(Generation::I965, 0xa0, 512).unwrap().size, 96 * MB);
        assert_eq!(decode_gms(Generation::G4x, 0xb0, 0).unwrap().size, 160 * MB);
        assert_eq!(decode_gms(Generation::G4x, 0xc0, 0).unwrap().size, 224 * MB);
        assert_eq!(decode_gms(Generation::G4x, 0xd0, 0).unwrap().size, 352 * MB);

        for value in [0x00, 0xe0, 0xf0] {
            assert!(decode_gms(Generation::G4x, value, 0).is_err());
        }
    }

    #[test]
    fn test_gms_entries_exclude_gtt() {
        // 8M stolen, with a 256K GTT and 4K of BIOS data.
        let s = decode_gms(Generation::I915, 0x30, 256).unwrap();
        assert_eq!(s.entries, (8192 - 260) / 4);

        // No GTT in stolen memory.
        let s = decode_gms(Generation::G4x, 0x30, 0).unwrap();
        assert_eq!(s.entries, (8192 - 4) / 4);

        // A 2M GTT does not fit in 1M of stolen memory.
        assert_eq!(
            decode_gms(Generation::G33, 0x10, 2048),
            Err(Error::StolenTooSmall {
                stolen_kb: 1024,
                reserved_kb: 2052
            })
        );
    }

    #[test]
    fn test_gen6() {
        for n in 1..=16u16 {
            let s = decode_gen6(n << 3).unwrap();
            assert_eq!(s.size, n as u64 * 32 * MB);
            assert_eq!(s.entries as u64, s.size / 4096 - 1);
        }

        // The GTT size bits do not affect the stolen size.
        assert_eq!(decode_gen6((2 << 8) | (2 << 3)).unwrap().size, 64 * MB);

        assert_eq!(decode_gen6(0), Err(Error::UnknownStolenSize(0)));
        assert_eq!(decode_gen6(17 << 3), Err(Error::UnknownStolenSize(17 << 3)));
        assert_eq!(decode_gen6(0xf8), Err(Error::UnknownStolenSize(0xf8)));
    }

    #[test]
    fn test_gen8() {
        assert_eq!(decode_gen8(0), StolenMemory::NONE);
        let s = decode_gen8(0x0200);
        assert_eq!(s.size, 64 * MB);
        assert_eq!(s.entries, 16383);
        assert_eq!(decode_gen8(0xff00).size, 255 * 32 * MB);

        // The GTT size bits do not affect the stolen size.
        assert_eq!(decode_gen8(0x01c0).size, 32 * MB);
        assert_eq!(s.kilobytes(), 64 * 1024);
    }
}
