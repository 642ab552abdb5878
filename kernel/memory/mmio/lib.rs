// Copyright 2021 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Provides functionality for interacting with memory-mapped
//! I/O devices.
//!
//! Device registers are accessed through the [`RegisterBlock`] trait,
//! which performs offset-based, bounds-checked reads and writes. The
//! [`Region`] type implements it for a virtual address range that the
//! caller has already mapped with caching disabled.
//!
//! Accesses that fall outside the region return a [`RegionOverflow`]
//! rather than touching memory beyond the mapping.
//!
//! # Examples
//!
//! ```
//! let mut buf = [0u32; 4];
//! let region = unsafe { mmio::Region::new(buf.as_mut_ptr() as usize, 16) };
//! use mmio::RegisterBlock;
//! region.write_u32(4, 0x1234).unwrap();
//! assert_eq!(region.read_u32(4).unwrap(), 0x1234);
//! assert!(region.read_u32(16).is_err());
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

use core::sync::atomic;
use volatile::Volatile;

/// Ensures the compiler will not rearrange any reads or
/// writes from one side of the barrier to the other.
///
#[inline]
pub fn access_barrier() {
    atomic::fence(atomic::Ordering::SeqCst);
}

/// Indicates that a read or write in an MMIO region exceeded the
/// bounds of the region.
///
/// The offset of the first byte past the region that the
/// access would have touched is included.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionOverflow(pub usize);

/// A block of memory-mapped device registers, addressed
/// by byte offset.
///
/// Writes do not require a mutable reference, as volatile
/// writes to device memory do not affect Rust mutability
/// requirements.
///
pub trait RegisterBlock {
    /// size returns the number of bytes in the block.
    ///
    fn size(&self) -> usize;

    /// read_u8 returns the byte at `offset`.
    ///
    fn read_u8(&self, offset: usize) -> Result<u8, RegionOverflow>;

    /// read_u32 returns the dword at `offset`.
    ///
    fn read_u32(&self, offset: usize) -> Result<u32, RegionOverflow>;

    /// write_u32 stores `value` at `offset`.
    ///
    fn write_u32(&self, offset: usize, value: u32) -> Result<(), RegionOverflow>;

    /// read_u64 returns the quadword at `offset`, read as
    /// two dwords, low half first.
    ///
    fn read_u64(&self, offset: usize) -> Result<u64, RegionOverflow> {
        let low = self.read_u32(offset)? as u64;
        let high = self.read_u32(offset + 4)? as u64;
        Ok(low | (high << 32))
    }

    /// write_u64 stores `value` at `offset` as two dwords,
    /// low half first.
    ///
    fn write_u64(&self, offset: usize, value: u64) -> Result<(), RegionOverflow> {
        check_bounds(offset, 8, self.size())?;
        self.write_u32(offset, value as u32)?;
        self.write_u32(offset + 4, (value >> 32) as u32)
    }
}

// check_bounds ensures that an access of `len` bytes at `offset`
// stays within `size` bytes.
//
fn check_bounds(offset: usize, len: usize, size: usize) -> Result<(), RegionOverflow> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        Some(end) => Err(RegionOverflow(end)),
        None => Err(RegionOverflow(usize::MAX)),
    }
}

/// Describes a virtual memory range used for memory-mapped I/O.
///
pub struct Region {
    // start is the first valid address in the region.
    start: usize,

    // size is the number of valid bytes in the region.
    size: usize,
}

// Accesses to the region are volatile and uncached, so sharing
// the handle between threads is no different from sharing the
// device itself.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Returns a region covering `size` bytes of already-mapped
    /// virtual memory, starting at `start`.
    ///
    /// # Safety
    ///
    /// The range `[start, start + size)` must remain mapped and
    /// valid for volatile access for as long as the region exists.
    ///
    pub unsafe fn new(start: usize, size: usize) -> Self {
        Region { start, size }
    }

    /// Returns the virtual address of the first byte in the
    /// region.
    ///
    pub fn start(&self) -> usize {
        self.start
    }

    /// Returns a mutable pointer of the given type at the MMIO memory
    /// at `offset` into the region.
    ///
    #[inline]
    pub fn as_mut_ptr<T: Copy>(&self, offset: usize) -> Result<*mut T, RegionOverflow> {
        check_bounds(offset, core::mem::size_of::<T>(), self.size)?;
        Ok((self.start + offset) as *mut T)
    }

    /// Returns a generic value at the given offset into the region.
    ///
    pub fn read<T: 'static + Copy>(&self, offset: usize) -> Result<T, RegionOverflow> {
        let ptr = self.as_mut_ptr::<T>(offset)?;
        Ok(Volatile::new_read_only(unsafe { &*ptr }).read())
    }

    /// Writes a generic value to the given offset into the region.
    ///
    pub fn write<T: 'static + Copy>(&self, offset: usize, val: T) -> Result<(), RegionOverflow> {
        let ptr = self.as_mut_ptr::<T>(offset)?;
        Volatile::new_write_only(unsafe { &mut *ptr }).write(val);

        Ok(())
    }
}

impl RegisterBlock for Region {
    fn size(&self) -> usize {
        self.size
    }

    fn read_u8(&self, offset: usize) -> Result<u8, RegionOverflow> {
        self.read(offset)
    }

    fn read_u32(&self, offset: usize) -> Result<u32, RegionOverflow> {
        self.read(offset)
    }

    fn write_u32(&self, offset: usize, value: u32) -> Result<(), RegionOverflow> {
        self.write(offset, value)
    }
}
