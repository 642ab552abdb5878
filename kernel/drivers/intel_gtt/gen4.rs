// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the i965 and G4X families.
//!
//! The GTT size is held in PGTBL_CTL, and the GTT shares a
//! BAR with the registers. PTEs hold 36-bit addresses.

use crate::error::Error;
use crate::gen3::dump_i965_registers;
use crate::generation::Generation;
use crate::ops::{check_deven, total_from_pgtbl_ctl, GenerationOps, Hardware};
use crate::regs::{self, PgtblCtl, PgtblSize};
use crate::stolen::{self, StolenMemory};
use pci::{Address, ConfigSpace};

/// The G965 and GM965.
///
pub struct I965;

impl GenerationOps for I965 {
    fn generation(&self) -> Generation {
        Generation::I965
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_deven(config, bridge, regs::I915_DEVEN_D2F0)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        let ctl = hw.pgtbl_ctl()?;
        let gtt_kb = match ctl.size() {
            Some(size) => size.kilobytes(),
            None => {
                log::error!("bad page table size in PGTBL_CTL {:#x}", ctl.bits());
                return Err(Error::UnknownGttSize(ctl.bits()));
            }
        };

        let gcc1 = hw.config.read_u8(hw.bridge, regs::I855_GCC1);
        stolen::decode_gms(Generation::I965, gcc1, gtt_kb)
    }

    fn total_entries(&self, hw: &Hardware<'_>, _mappable: u32) -> Result<u32, Error> {
        total_from_pgtbl_ctl(hw)
    }

    fn dump_registers(&self, hw: &Hardware<'_>) {
        dump_i965_registers(hw);
    }
}

/// The G45, Q45, and Ironlake.
///
pub struct G4x;

impl G4x {
    // resize_gtt programs the GTT size chosen by the BIOS
    // into PGTBL_CTL. The per-process page table must be
    // disabled before the size is changed.
    //
    fn resize_gtt(hw: &Hardware<'_>, size: PgtblSize) -> Result<(), Error> {
        let ctl2 = PgtblCtl::from_bits(hw.registers.read_u32(regs::PGTBL_CTL2)?);
        hw.registers
            .write_u32(regs::PGTBL_CTL2, ctl2.with_enabled(false).bits())?;

        let ctl = hw.pgtbl_ctl()?.with_size(size);
        hw.set_pgtbl_ctl(ctl)
    }
}

impl GenerationOps for G4x {
    fn generation(&self) -> Generation {
        Generation::G4x
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_deven(config, bridge, regs::I915_DEVEN_D2F0)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        // The GTT is not kept in stolen memory.
        let gcc1 = hw.config.read_u8(hw.bridge, regs::I855_GCC1);
        stolen::decode_gms(Generation::G4x, gcc1, 0)
    }

    fn total_entries(&self, hw: &Hardware<'_>, _mappable: u32) -> Result<u32, Error> {
        let gcc1 = hw.config.read_u16(hw.bridge, regs::I830_GCC1);
        let size = match gcc1 & regs::G4X_GCC1_SIZE_MASK {
            regs::G4X_GCC1_SIZE_1M | regs::G4X_GCC1_SIZE_VT_1M => PgtblSize::Mb1,
            regs::G4X_GCC1_SIZE_VT_1_5M => PgtblSize::Mb1_5,
            regs::G4X_GCC1_SIZE_2M | regs::G4X_GCC1_SIZE_VT_2M => PgtblSize::Mb2,
            _ => {
                log::error!("unknown page table size in GCC1 {:#06x}", gcc1);
                return Err(Error::UnknownGttSize(gcc1 as u32));
            }
        };

        Self::resize_gtt(hw, size)?;
        total_from_pgtbl_ctl(hw)
    }

    fn dump_registers(&self, hw: &Hardware<'_>) {
        dump_i965_registers(hw);
    }
}
