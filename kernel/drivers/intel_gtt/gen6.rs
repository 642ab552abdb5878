// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the SandyBridge and ValleyView families.
//!
//! IvyBridge and Haswell parts use the SandyBridge operations.

use crate::error::Error;
use crate::generation::Generation;
use crate::ops::{check_deven, GenerationOps, Hardware};
use crate::regs;
use crate::stolen::{self, StolenMemory};
use pci::{Address, ConfigSpace};

pub(crate) fn check_d2_enabled(config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
    check_deven(config, bridge, regs::SNB_DEVEN_D2EN)
}

pub(crate) fn dump_gen6_registers(hw: &Hardware<'_>) {
    if let Ok(mode) = hw.registers.read_u32(regs::SNB_GFX_MODE) {
        log::debug!("GFX_MODE: {:08x}", mode);
    }
    log::debug!("GCC1: {:04x}", hw.config.read_u16(hw.bridge, regs::SNB_GCC1));
}

// gen6_total_entries decodes the GTT size field of the GMCH
// control register.
//
fn gen6_total_entries(hw: &Hardware<'_>) -> Result<u32, Error> {
    let gmch = hw.config.read_u16(hw.bridge, regs::SNB_GCC1);
    match gmch & regs::SNB_GTT_SIZE_MASK {
        regs::SNB_GTT_SIZE_1M => Ok(1024 * 1024 / 4),
        regs::SNB_GTT_SIZE_2M => Ok(2 * 1024 * 1024 / 4),
        _ => {
            log::error!("bad GTT size in GMCH control {:#06x}", gmch);
            Err(Error::UnknownGttSize(gmch as u32))
        }
    }
}

fn gen6_stolen_memory(hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
    let gmch = hw.config.read_u16(hw.bridge, regs::SNB_GCC1);
    stolen::decode_gen6(gmch).map_err(|err| {
        log::error!("unknown memory configuration in GMCH control {:#06x}", gmch);
        err
    })
}

/// SandyBridge, IvyBridge, and Haswell.
///
pub struct SandyBridge;

impl GenerationOps for SandyBridge {
    fn generation(&self) -> Generation {
        Generation::SandyBridge
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_d2_enabled(config, bridge)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        gen6_stolen_memory(hw)
    }

    fn total_entries(&self, hw: &Hardware<'_>, _mappable: u32) -> Result<u32, Error> {
        gen6_total_entries(hw)
    }

    fn dump_registers(&self, hw: &Hardware<'_>) {
        dump_gen6_registers(hw);
    }
}

/// ValleyView.
///
pub struct ValleyView;

impl GenerationOps for ValleyView {
    fn generation(&self) -> Generation {
        Generation::ValleyView
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_d2_enabled(config, bridge)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        gen6_stolen_memory(hw)
    }

    fn total_entries(&self, hw: &Hardware<'_>, _mappable: u32) -> Result<u32, Error> {
        gen6_total_entries(hw)
    }

    fn dump_registers(&self, hw: &Hardware<'_>) {
        dump_gen6_registers(hw);
    }
}
