// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the i915, G33, and Pineview families.
//!
//! From these chips onwards, the GTT is firmware-provided and
//! the aperture size is managed through the generic aperture
//! BAR. The GTT has its own BAR.

use crate::error::Error;
use crate::generation::Generation;
use crate::ops::{check_deven, total_from_pgtbl_ctl, GenerationOps, Hardware};
use crate::regs;
use crate::stolen::{self, StolenMemory};
use pci::{Address, ConfigSpace};

/// The 915G to 945GME.
///
pub struct I915;

impl GenerationOps for I915 {
    fn generation(&self) -> Generation {
        Generation::I915
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_deven(config, bridge, regs::I915_DEVEN_D2F0)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        let gcc1 = hw.config.read_u8(hw.bridge, regs::I855_GCC1);
        stolen::decode_gms(Generation::I915, gcc1, 256)
    }
}

// g33_gtt_kb returns the size of the GTT selected by the
// GGMS field of the MGGC register.
//
fn g33_gtt_kb(hw: &Hardware<'_>) -> Result<u32, Error> {
    let mggc = hw.config.read_u16(hw.bridge, regs::I855_GCC1);
    match mggc & regs::G33_MGGC_GGMS_MASK {
        regs::G33_MGGC_GGMS_SIZE_1M => Ok(1024),
        regs::G33_MGGC_GGMS_SIZE_2M => Ok(2048),
        _ => {
            log::error!("bad GTT size in MGGC {:#06x}", mggc);
            Err(Error::UnknownGttSize(mggc as u32))
        }
    }
}

// dump_i965_registers is also used by the G33, which shares
// the i965's second page table control register.
//
pub(crate) fn dump_i965_registers(hw: &Hardware<'_>) {
    if let Ok(ctl2) = hw.registers.read_u32(regs::PGTBL_CTL2) {
        log::debug!("PGTBL_CTL2: {:08x}", ctl2);
    }
    log::debug!("GCC1: {:02x}", hw.config.read_u8(hw.bridge, regs::I855_GCC1));
    log::debug!("MSAC: {:02x}", hw.config.read_u8(hw.bridge, regs::I965_MSAC));
}

/// The G33, Q33, and Q35.
///
pub struct G33;

impl GenerationOps for G33 {
    fn generation(&self) -> Generation {
        Generation::G33
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_deven(config, bridge, regs::I915_DEVEN_D2F0)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        let gtt_kb = g33_gtt_kb(hw)?;
        let gcc1 = hw.config.read_u8(hw.bridge, regs::I855_GCC1);
        stolen::decode_gms(Generation::G33, gcc1, gtt_kb)
    }

    fn total_entries(&self, hw: &Hardware<'_>, _mappable: u32) -> Result<u32, Error> {
        total_from_pgtbl_ctl(hw)
    }

    fn dump_registers(&self, hw: &Hardware<'_>) {
        dump_i965_registers(hw);
    }
}

/// Pineview, the first chips with graphics in the processor
/// package.
///
pub struct Pineview;

impl GenerationOps for Pineview {
    fn generation(&self) -> Generation {
        Generation::Pineview
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_deven(config, bridge, regs::I915_DEVEN_D2F0)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        // The GTT is not kept in stolen memory.
        let gcc1 = hw.config.read_u8(hw.bridge, regs::I855_GCC1);
        stolen::decode_gms(Generation::Pineview, gcc1, 0)
    }

    fn total_entries(&self, hw: &Hardware<'_>, _mappable: u32) -> Result<u32, Error> {
        total_from_pgtbl_ctl(hw)
    }
}
