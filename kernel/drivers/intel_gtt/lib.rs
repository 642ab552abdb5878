// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements a driver for the Graphics Translation Table (GTT) of
//! Intel integrated graphics, from the i810 to Broadwell.
//!
//! The GTT is a page table that maps the graphics aperture onto
//! physical memory. The driver:
//!
//! - identifies the graphics device from its PCI device id
//!   ([`chips`]),
//! - determines how much memory the BIOS has stolen for the
//!   display, and how large the GTT is ([`stolen`], [`ops`]),
//! - enables the page table and sets up the chipset flush page
//!   ([`Gtt::attach`]),
//! - encodes and writes page table entries ([`pte`]), both one
//!   page at a time and in runs ([`api`]),
//! - tracks memory bound through the legacy AGP interface
//!   ([`memory`]).
//!
//! The hardware changed many times over the generations covered.
//! The differences are described as data in [`Generation`], and as
//! behaviour in the [`GenerationOps`] implementations.
//!
//! The driver reaches the hardware and the rest of the kernel
//! only through a [`Platform`], which the kernel provides when it
//! attaches the device. There is no global device handle: callers
//! hold the [`Gtt`] returned by [`Gtt::attach`].

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
#![forbid(unsafe_code)]
#![deny(unused_crate_dependencies)]

extern crate alloc;

pub mod api;
pub mod chips;
pub mod device;
mod error;
pub mod flush;
mod gen2;
mod gen3;
mod gen4;
mod gen6;
pub mod gen8;
pub mod generation;
pub mod memory;
pub mod ops;
pub mod platform;
pub mod pte;
pub mod regs;
pub mod sg;
pub mod stolen;

pub use crate::api::{ApertureGeometry, GttInfo};
pub use crate::chips::{lookup, Chip};
pub use crate::device::{probe, Gatt, Gtt};
pub use crate::error::Error;
pub use crate::generation::{FlushMechanism, Generation, Layout};
pub use crate::memory::{MemoryInfo, MemoryType};
pub use crate::ops::{GenerationOps, Hardware, Table};
pub use crate::platform::{Allocation, GenericAperture, Platform};
pub use crate::pte::{CacheFlags, CacheKind, PteFormat};
pub use crate::sg::{ScatterGatherList, Segment};
pub use crate::stolen::StolenMemory;
