// Copyright 2021 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Provides access to PCI configuration space and simple device lookup.
//!
//! Configuration space is reached through the [`ConfigSpace`] trait, so that
//! device drivers can be exercised against a simulated bus. On x86_64, the
//! [`PortConfigSpace`] implementation uses configuration mechanism #1 through
//! the I/O ports at `0xcf8` and `0xcfc`.
//!
//! Devices are located with [`find`], which checks a single bus, slot, and
//! function without walking the bus hierarchy. The `BAR` constants name a
//! function's base address registers, which the caller's platform maps.
//!
//! # Examples
//!
//! ```no_run
//! let config = pci::PortConfigSpace;
//! if let Some(bridge) = pci::find(&config, 0, 0, 0) {
//!     assert_ne!(bridge.vendor, pci::NONE);
//! }
//! ```

#![no_std]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::inline_asm_x86_att_syntax)]
#![deny(clippy::missing_panics_doc)]
#![deny(clippy::panic)]
#![deny(clippy::return_self_not_must_use)]
#![deny(clippy::single_char_lifetime_names)]
#![deny(clippy::wildcard_imports)]
#![deny(deprecated_in_future)]
#![deny(keyword_idents)]
#![deny(macro_use_extern_crate)]
#![deny(missing_abi)]
#![allow(unsafe_code)]
#![deny(unused_crate_dependencies)]

use core::fmt;

#[cfg(target_arch = "x86_64")]
use x86_64::instructions::port::Port;

#[cfg(target_arch = "x86_64")]
const CONFIG_ADDRESS: u16 = 0xcf8;
#[cfg(target_arch = "x86_64")]
const CONFIG_DATA: u16 = 0xcfc;

/// The vendor id returned when no device is present.
///
pub const NONE: u16 = 0xffff;

// See https://en.wikipedia.org/wiki/PCI_configuration_space#/media/File:Pci-config-space.svg
pub const VENDOR_ID: u8 = 0x00; // u16
pub const DEVICE_ID: u8 = 0x02; // u16
pub const BAR0: u8 = 0x10; // u32
pub const BAR1: u8 = 0x14; // u32
pub const BAR2: u8 = 0x18; // u32
pub const BAR3: u8 = 0x1c; // u32

/// Identifies a single PCI function by its
/// location.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    pub bus: u8,
    pub slot: u8,
    pub func: u8,
}

impl Address {
    /// new returns the address of the given
    /// function.
    ///
    pub const fn new(bus: u8, slot: u8, func: u8) -> Self {
        Address { bus, slot, func }
    }

    /// config_address returns the value written to the
    /// configuration address port to select `field`.
    ///
    pub const fn config_address(&self, field: u8) -> u32 {
        let lbus = self.bus as u32;
        let lslot = self.slot as u32;
        let lfunc = self.func as u32;
        let lfield = field as u32;

        (lbus << 16) | (lslot << 11) | (lfunc << 8) | (lfield & 0xfc) | 0x8000_0000
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.slot, self.func)
    }
}

/// Provides access to PCI configuration space.
///
/// Only the 32-bit accessors are required. The narrower
/// accessors default to shifting or merging within the
/// containing dword, which implementations with native
/// narrow accesses may override.
///
pub trait ConfigSpace {
    /// read_u32 returns the dword at the given field.
    ///
    /// `field` is rounded down to a multiple of four.
    ///
    fn read_u32(&self, addr: Address, field: u8) -> u32;

    /// write_u32 writes the dword at the given field.
    ///
    /// `field` is rounded down to a multiple of four.
    ///
    fn write_u32(&self, addr: Address, field: u8, value: u32);

    /// read_u16 returns the 16-bit value at the given field.
    ///
    fn read_u16(&self, addr: Address, field: u8) -> u16 {
        let shift = (field & 2) as u32 * 8;
        (self.read_u32(addr, field) >> shift) as u16
    }

    /// read_u8 returns the byte at the given field.
    ///
    fn read_u8(&self, addr: Address, field: u8) -> u8 {
        let shift = (field & 3) as u32 * 8;
        (self.read_u32(addr, field) >> shift) as u8
    }

    /// write_u16 writes the 16-bit value at the given field,
    /// preserving the rest of the containing dword.
    ///
    fn write_u16(&self, addr: Address, field: u8, value: u16) {
        let shift = (field & 2) as u32 * 8;
        let old = self.read_u32(addr, field) & !(0xffff << shift);
        self.write_u32(addr, field, old | ((value as u32) << shift));
    }

    /// write_u8 writes the byte at the given field,
    /// preserving the rest of the containing dword.
    ///
    fn write_u8(&self, addr: Address, field: u8, value: u8) {
        let shift = (field & 3) as u32 * 8;
        let old = self.read_u32(addr, field) & !(0xff << shift);
        self.write_u32(addr, field, old | ((value as u32) << shift));
    }
}

/// Accesses configuration space using the x86
/// I/O port mechanism.
///
#[cfg(target_arch = "x86_64")]
#[derive(Clone, Copy, Debug, Default)]
pub struct PortConfigSpace;

#[cfg(target_arch = "x86_64")]
impl PortConfigSpace {
    // select sets the configuration address.
    //
    fn select(&self, addr: Address, field: u8) {
        unsafe {
            Port::new(CONFIG_ADDRESS).write(addr.config_address(field));
        }
    }
}

#[cfg(target_arch = "x86_64")]
impl ConfigSpace for PortConfigSpace {
    fn read_u32(&self, addr: Address, field: u8) -> u32 {
        self.select(addr, field);
        unsafe { Port::new(CONFIG_DATA).read() }
    }

    fn write_u32(&self, addr: Address, field: u8, value: u32) {
        self.select(addr, field);
        unsafe { Port::new(CONFIG_DATA).write(value) };
    }

    fn read_u16(&self, addr: Address, field: u8) -> u16 {
        self.select(addr, field);
        unsafe { Port::new(CONFIG_DATA + (field as u16 & 2)).read() }
    }

    fn read_u8(&self, addr: Address, field: u8) -> u8 {
        self.select(addr, field);
        unsafe { Port::new(CONFIG_DATA + (field as u16 & 3)).read() }
    }

    fn write_u16(&self, addr: Address, field: u8, value: u16) {
        self.select(addr, field);
        unsafe { Port::new(CONFIG_DATA + (field as u16 & 2)).write(value) };
    }

    fn write_u8(&self, addr: Address, field: u8, value: u8) {
        self.select(addr, field);
        unsafe { Port::new(CONFIG_DATA + (field as u16 & 3)).write(value) };
    }
}

/// Function represents a present PCI function.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Function {
    pub address: Address,
    pub vendor: u16,
    pub device: u16,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PCI device {} with vendor={:04x}, device={:04x}",
            self.address, self.vendor, self.device
        )
    }
}

/// find returns the function at the given location,
/// if one is present.
///
/// Only the given location is checked. Buses behind
/// bridges are not searched.
///
pub fn find<C: ConfigSpace + ?Sized>(config: &C, bus: u8, slot: u8, func: u8) -> Option<Function> {
    let address = Address::new(bus, slot, func);
    let id = config.read_u32(address, VENDOR_ID);
    let vendor = id as u16;
    if vendor == NONE {
        return None;
    }

    Some(Function {
        address,
        vendor,
        device: (id >> 16) as u16,
    })
}
