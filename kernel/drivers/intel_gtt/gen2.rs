// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the i810, i830, and i855 families.
//!
//! These chips set the aperture size in the host bridge,
//! rather than through the generic aperture BAR.

use crate::error::Error;
use crate::generation::Generation;
use crate::ops::{aperture_entries, GenerationOps, Hardware};
use crate::regs::{self, PgtblCtl};
use crate::stolen::{self, StolenMemory};
use pci::{Address, ConfigSpace};

const MB: u32 = 1024 * 1024;

/// The i810 and i815.
///
pub struct I810;

impl GenerationOps for I810 {
    fn generation(&self) -> Generation {
        Generation::I810
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        let smram = config.read_u8(bridge, regs::I810_SMRAM);
        if smram & regs::I810_SMRAM_GMS == regs::I810_SMRAM_GMS_DISABLED {
            return Err(Error::Disabled);
        }

        Ok(())
    }

    fn stolen_memory(&self, _hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        Ok(StolenMemory::NONE)
    }

    fn dcache_size(&self, hw: &Hardware<'_>) -> Result<u64, Error> {
        let drt = hw.registers.read_u8(regs::I810_DRT)?;
        if drt & regs::I810_DRT_POPULATED != 0 {
            Ok(4 * MB as u64)
        } else {
            Ok(0)
        }
    }

    fn mappable_entries(&self, hw: &Hardware<'_>) -> Result<u32, Error> {
        let miscc = hw.config.read_u16(hw.bridge, regs::I810_MISCC);
        if miscc & regs::I810_MISCC_WINSIZE == regs::I810_MISCC_WINSIZE_32 {
            aperture_entries(32 * MB)
        } else {
            aperture_entries(64 * MB)
        }
    }

    fn install_gatt(&self, hw: &Hardware<'_>, allocated: Option<u64>) -> Result<u64, Error> {
        // The i810 has no page table until the driver
        // provides one.
        let physical = allocated.ok_or(Error::ResourceUnavailable)?;
        hw.set_pgtbl_ctl(PgtblCtl::from_bits(physical as u32).with_enabled(true))?;

        Ok(physical)
    }

    fn deinstall_gatt(&self, hw: &Hardware<'_>) -> Result<(), Error> {
        hw.set_pgtbl_ctl(PgtblCtl::from_bits(0))
    }

    fn set_aperture(&self, hw: &Hardware<'_>, size: u32) -> Result<(), Error> {
        let window = match size {
            s if s == 32 * MB => regs::I810_MISCC_WINSIZE_32,
            s if s == 64 * MB => regs::I810_MISCC_WINSIZE_64,
            _ => return Err(Error::InvalidAperture(size)),
        };

        let miscc = hw.config.read_u16(hw.bridge, regs::I810_MISCC);
        let miscc = (miscc & !regs::I810_MISCC_WINSIZE) | window;
        hw.config.write_u16(hw.bridge, regs::I810_MISCC, miscc);

        Ok(())
    }

    fn dump_registers(&self, hw: &Hardware<'_>) {
        if let Ok(ctl) = hw.pgtbl_ctl() {
            log::debug!("PGTBL_CTL: {:08x}", ctl.bits());
        }
        log::debug!("SMRAM: {:02x}", hw.config.read_u8(hw.bridge, regs::I810_SMRAM));
    }
}

// The i830 and i855 share everything but the stolen memory
// decoding.

fn check_gcc1_active(config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
    let gcc1 = config.read_u8(bridge, regs::I830_GCC1);
    if gcc1 & regs::I830_GCC1_DEV2 == regs::I830_GCC1_DEV2_DISABLED {
        return Err(Error::Disabled);
    }

    Ok(())
}

fn gcc1_mappable_entries(hw: &Hardware<'_>) -> Result<u32, Error> {
    let gcc1 = hw.config.read_u16(hw.bridge, regs::I830_GCC1);
    if gcc1 & regs::I830_GCC1_GMASIZE == regs::I830_GCC1_GMASIZE_64 {
        aperture_entries(64 * MB)
    } else {
        aperture_entries(128 * MB)
    }
}

fn gcc1_set_aperture(hw: &Hardware<'_>, size: u32) -> Result<(), Error> {
    let gmasize = match size {
        s if s == 64 * MB => regs::I830_GCC1_GMASIZE_64,
        s if s == 128 * MB => regs::I830_GCC1_GMASIZE_128,
        _ => return Err(Error::InvalidAperture(size)),
    };

    let gcc1 = hw.config.read_u16(hw.bridge, regs::I830_GCC1);
    let gcc1 = (gcc1 & !regs::I830_GCC1_GMASIZE) | gmasize;
    hw.config.write_u16(hw.bridge, regs::I830_GCC1, gcc1);

    Ok(())
}

/// The 830M and 845G.
///
pub struct I830;

impl GenerationOps for I830 {
    fn generation(&self) -> Generation {
        Generation::I830
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_gcc1_active(config, bridge)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        stolen::decode_i830(hw.config.read_u8(hw.bridge, regs::I830_GCC1))
    }

    fn mappable_entries(&self, hw: &Hardware<'_>) -> Result<u32, Error> {
        gcc1_mappable_entries(hw)
    }

    fn set_aperture(&self, hw: &Hardware<'_>, size: u32) -> Result<(), Error> {
        gcc1_set_aperture(hw, size)
    }
}

/// The 852GM, 855GM, and 865G.
///
pub struct I855;

impl GenerationOps for I855 {
    fn generation(&self) -> Generation {
        Generation::I855
    }

    fn check_active(&self, config: &dyn ConfigSpace, bridge: Address) -> Result<(), Error> {
        check_gcc1_active(config, bridge)
    }

    fn stolen_memory(&self, hw: &Hardware<'_>) -> Result<StolenMemory, Error> {
        let gcc1 = hw.config.read_u8(hw.bridge, regs::I855_GCC1);
        stolen::decode_gms(Generation::I855, gcc1, 128)
    }

    fn mappable_entries(&self, hw: &Hardware<'_>) -> Result<u32, Error> {
        gcc1_mappable_entries(hw)
    }

    fn set_aperture(&self, hw: &Hardware<'_>, size: u32) -> Result<(), Error> {
        gcc1_set_aperture(hw, size)
    }
}
