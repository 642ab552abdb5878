// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the Broadwell family, which uses 64-bit PTEs.

use crate::error::Error;
use crate::gen6::{check_d2_enabled, dump_gen6_registers};
use crate::generation::Generation;
use crate::ops::{GenerationOps, Hardware};
use crate::regs;
use crate::stolen::{self, StolenMemory};
use pci::{Address, ConfigSpace};

/// The largest aperture span the GTT may describe.
///
/// Consumers compute offsets into the GTT with 32-bit
/// arithmetic.
///
const MAX_SPAN: u64 = 4 * 1024 * 1024 * 1024;

/// clamp_entries halves `entries` until the pages they map
/// span less than 4 GiB.
///
pub fn clamp_entries(mut entries: u32) -> u32 {
    while entries as u64 * regs::PAGE_SIZE >= MAX_SPAN {
        entries >>= 1;
    }

    entries
}

/// total_entries decodes the GTT size field of a Broadwell
/// GMCH control register.
///
/// The 2-bit field selects a table of 2, 4, or 8 MiB, each
/// holding 8-byte entries. Zero means no GTT.
///
pub fn total_entries(gmch: u16) -> u32 {
    let mut ggms = ((gmch >> 6) & 3) as u32;
    if ggms != 0 {
        ggms = 1 << ggms;
    }

    clamp_entries((ggms << 20) / 8)
}

/// Broadwell.
///
pub struct Broadwell;

impl GenerationOps for Broadwell {
    fn generation(&self) -> Generation {
        Generation::Broadwell
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_d2_enabled(config, bridge)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        let stolen = stolen::decode_gen8(hw.config.read_u16(hw.bridge, regs::SNB_GCC1));
        log::debug!("GTT stolen {}", stolen.size);

        Ok(stolen)
    }

    fn total_entries(&self, hw: &Hardware<'_>, _mappable: u32) -> Result<u32, Error> {
        let entries = total_entries(hw.config.read_u16(hw.bridge, regs::SNB_GCC1));
        log::debug!(
            "GTT size {} representing {}M aperture",
            entries as u64 * 8,
            (entries as u64 * regs::PAGE_SIZE) >> 20
        );

        Ok(entries)
    }

    fn dump_registers(&self, hw: &Hardware<'_>) {
        dump_gen6_registers(hw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_entries() {
        assert_eq!(total_entries(0), 0);
        assert_eq!(total_entries(1 << 6), 2 * 1024 * 1024 / 8);
        assert_eq!(total_entries(2 << 6), 4 * 1024 * 1024 / 8);

        // 8M of entries would map 4G, so it is halved.
        assert_eq!(total_entries(3 << 6), 4 * 1024 * 1024 / 8);

        // Stolen memory bits are ignored.
        assert_eq!(total_entries(0xff00 | (1 << 6)), 2 * 1024 * 1024 / 8);
    }

    #[test]
    fn test_clamp_entries() {
        for raw in [1u32 << 20, 3 << 19, 1 << 21, 1 << 24, u32::MAX, 0xdead_beef] {
            let clamped = clamp_entries(raw);
            assert!((clamped as u64) * regs::PAGE_SIZE < MAX_SPAN, "{:#x}", raw);
            assert!(clamped > 0);

            // The result is the raw value halved at least once.
            let halvings = (0..32).find(|n| raw >> n == clamped).unwrap();
            assert!(halvings > 0);
        }

        // Spans already under 4G are unchanged.
        assert_eq!(clamp_entries(0), 0);
        assert_eq!(clamp_entries((1 << 20) - 1), (1 << 20) - 1);
        assert_eq!(clamp_entries(512 * 1024), 512 * 1024);
    }
}
