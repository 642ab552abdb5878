// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Provides a simulated platform for the integration tests.
//!
//! The [`FakePlatform`] is a cheap handle onto shared state, so
//! a test can keep a copy to inspect the hardware after the
//! device has been attached, failed to attach, or detached.

#![allow(dead_code)]

use intel_gtt::{Allocation, Error, GenericAperture, Platform};
use mmio::{RegionOverflow, RegisterBlock};
use pci::{Address, ConfigSpace, Function};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

pub const BRIDGE: Address = Address::new(0, 0, 0);
pub const GRAPHICS: Address = Address::new(0, 2, 0);

pub const MB: u32 = 1024 * 1024;

/// The first physical address handed out by the fake
/// allocator.
///
pub const ALLOCATION_BASE: u64 = 0x1000_0000;

pub const SCRATCH_PAGE: u64 = 0x00ab_c000;

/// Holds a write to the gated offset until the test
/// releases it.
///
#[derive(Default)]
pub struct Gate {
    state: Mutex<(bool, bool)>,
    cond: Condvar,
}

impl Gate {
    // pass blocks the writer until the gate is released.
    //
    fn pass(&self) {
        let mut state = self.state.lock().unwrap();
        state.0 = true;
        self.cond.notify_all();
        while !state.1 {
            state = self.cond.wait(state).unwrap();
        }
    }

    /// wait_entered blocks until a writer has reached the
    /// gate.
    ///
    pub fn wait_entered(&self) {
        let mut state = self.state.lock().unwrap();
        while !state.0 {
            state = self.cond.wait(state).unwrap();
        }
    }

    pub fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.1 = true;
        self.cond.notify_all();
    }
}

#[derive(Default)]
struct RegisterState {
    values: HashMap<usize, u32>,
    writes: Vec<(usize, u32)>,
    reads: Vec<usize>,
}

struct RegisterInner {
    size: usize,
    state: Mutex<RegisterState>,
    gate: Mutex<Option<(usize, Arc<Gate>)>>,
}

/// A sparse register block, which records every access.
///
#[derive(Clone)]
pub struct FakeRegisters {
    inner: Arc<RegisterInner>,
}

impl FakeRegisters {
    pub fn new(size: usize) -> Self {
        FakeRegisters {
            inner: Arc::new(RegisterInner {
                size,
                state: Mutex::new(RegisterState::default()),
                gate: Mutex::new(None),
            }),
        }
    }

    /// set stores a value without recording a write.
    ///
    pub fn set(&self, offset: usize, value: u32) {
        self.inner.state.lock().unwrap().values.insert(offset, value);
    }

    /// get returns a value without recording a read.
    ///
    pub fn get(&self, offset: usize) -> u32 {
        self.inner.state.lock().unwrap().values.get(&offset).copied().unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.inner.state.lock().unwrap().writes.clone()
    }

    /// writes_within returns the writes to offsets in
    /// `[start, end)`.
    ///
    pub fn writes_within(&self, start: usize, end: usize) -> Vec<(usize, u32)> {
        self.writes()
            .into_iter()
            .filter(|(offset, _)| (start..end).contains(offset))
            .collect()
    }

    /// reads_within returns the offsets read in
    /// `[start, end)`, in order.
    ///
    pub fn reads_within(&self, start: usize, end: usize) -> Vec<usize> {
        self.inner
            .state
            .lock()
            .unwrap()
            .reads
            .iter()
            .copied()
            .filter(|offset| (start..end).contains(offset))
            .collect()
    }

    /// clear_log forgets all recorded accesses.
    ///
    pub fn clear_log(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.writes.clear();
        state.reads.clear();
    }

    /// gate makes the next write to `offset` wait on the
    /// returned gate.
    ///
    pub fn gate(&self, offset: usize) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.inner.gate.lock().unwrap() = Some((offset, gate.clone()));
        gate
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), RegionOverflow> {
        if offset + len > self.inner.size {
            Err(RegionOverflow(offset))
        } else {
            Ok(())
        }
    }
}

impl RegisterBlock for FakeRegisters {
    fn size(&self) -> usize {
        self.inner.size
    }

    fn read_u8(&self, offset: usize) -> Result<u8, RegionOverflow> {
        self.check(offset, 1)?;
        let dword = self.get(offset & !3);
        Ok((dword >> ((offset & 3) * 8)) as u8)
    }

    fn read_u32(&self, offset: usize) -> Result<u32, RegionOverflow> {
        self.check(offset, 4)?;
        let mut state = self.inner.state.lock().unwrap();
        state.reads.push(offset);
        Ok(state.values.get(&offset).copied().unwrap_or(0))
    }

    fn write_u32(&self, offset: usize, value: u32) -> Result<(), RegionOverflow> {
        self.check(offset, 4)?;
        let gate = {
            let mut gate = self.inner.gate.lock().unwrap();
            match gate.as_ref() {
                Some((gated, _)) if *gated == offset => gate.take().map(|(_, gate)| gate),
                _ => None,
            }
        };

        if let Some(gate) = gate {
            gate.pass();
        }

        let mut state = self.inner.state.lock().unwrap();
        state.values.insert(offset, value);
        state.writes.push((offset, value));
        Ok(())
    }
}

/// A sparse configuration space. Reads from functions
/// that have not been added return all ones.
///
#[derive(Default)]
pub struct FakeConfig {
    present: Mutex<HashSet<Address>>,
    space: Mutex<HashMap<(Address, u8), u32>>,
}

impl FakeConfig {
    pub fn add_function(&self, addr: Address, vendor: u16, device: u16) {
        self.present.lock().unwrap().insert(addr);
        self.write_u32(addr, pci::VENDOR_ID, ((device as u32) << 16) | vendor as u32);
    }

    pub fn remove_function(&self, addr: Address) {
        self.present.lock().unwrap().remove(&addr);
    }
}

impl ConfigSpace for FakeConfig {
    fn read_u32(&self, addr: Address, field: u8) -> u32 {
        if !self.present.lock().unwrap().contains(&addr) {
            return 0xffff_ffff;
        }

        let space = self.space.lock().unwrap();
        space.get(&(addr, field & !3)).copied().unwrap_or(0)
    }

    fn write_u32(&self, addr: Address, field: u8, value: u32) {
        self.space.lock().unwrap().insert((addr, field & !3), value);
    }
}

/// The generic aperture, which only tracks its size and
/// whether it is attached.
///
pub struct FakeAperture {
    base: u64,
    size: AtomicU32,
    attached: AtomicUsize,
    attaches: AtomicUsize,
    fail_attach: Mutex<bool>,
    resizes: Mutex<Vec<u32>>,
}

impl FakeAperture {
    fn new(base: u64, size: u32) -> Self {
        FakeAperture {
            base,
            size: AtomicU32::new(size),
            attached: AtomicUsize::new(0),
            attaches: AtomicUsize::new(0),
            fail_attach: Mutex::new(false),
            resizes: Mutex::new(Vec::new()),
        }
    }

    /// attached returns the number of outstanding attaches.
    ///
    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn attaches(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn resizes(&self) -> Vec<u32> {
        self.resizes.lock().unwrap().clone()
    }

    /// resize changes the size without recording it, as
    /// another user of the aperture might.
    ///
    pub fn resize(&self, size: u32) {
        self.size.store(size, Ordering::SeqCst);
    }

    pub fn fail_attach(&self) {
        *self.fail_attach.lock().unwrap() = true;
    }
}

impl GenericAperture for FakeAperture {
    fn attach(&self, _device: Address, _bar: u8) -> Result<(), Error> {
        if *self.fail_attach.lock().unwrap() {
            return Err(Error::ApertureUnavailable);
        }

        self.attaches.fetch_add(1, Ordering::SeqCst);
        self.attached.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach(&self, _device: Address) {
        self.attached.fetch_sub(1, Ordering::SeqCst);
    }

    fn base(&self) -> u64 {
        self.base
    }

    fn size(&self) -> u32 {
        self.size.load(Ordering::SeqCst)
    }

    fn set_size(&self, size: u32) -> Result<(), Error> {
        self.resizes.lock().unwrap().push(size);
        self.size.store(size, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct Resources {
    next_physical: u64,
    outstanding: HashMap<u64, FakeRegisters>,
    allocations: usize,
    mapped: usize,
    map_calls: usize,
    fail_allocation: Option<usize>,
    fail_map: Option<usize>,
}

struct Inner {
    config: FakeConfig,
    aperture: FakeAperture,
    bars: HashMap<u8, FakeRegisters>,
    resources: Mutex<Resources>,
    physical_memory_end: u64,
    memory_limit: u64,
}

/// The simulated machine.
///
#[derive(Clone)]
pub struct FakePlatform {
    inner: Arc<Inner>,
}

impl FakePlatform {
    pub fn config_space(&self) -> &FakeConfig {
        &self.inner.config
    }

    pub fn fake_aperture(&self) -> &FakeAperture {
        &self.inner.aperture
    }

    /// bar returns the register block behind the given
    /// BAR of the graphics device.
    ///
    pub fn bar(&self, bar: u8) -> FakeRegisters {
        self.inner.bars[&bar].clone()
    }

    /// mapped returns the number of BAR mappings that have
    /// not been unmapped.
    ///
    pub fn mapped(&self) -> usize {
        self.inner.resources.lock().unwrap().mapped
    }

    /// outstanding returns the number of allocations that
    /// have not been released.
    ///
    pub fn outstanding(&self) -> usize {
        self.inner.resources.lock().unwrap().outstanding.len()
    }

    pub fn is_allocated(&self, physical: u64) -> bool {
        self.inner.resources.lock().unwrap().outstanding.contains_key(&physical)
    }

    /// allocation returns the memory behind an outstanding
    /// allocation.
    ///
    pub fn allocation(&self, physical: u64) -> Option<FakeRegisters> {
        self.inner.resources.lock().unwrap().outstanding.get(&physical).cloned()
    }

    /// fail_allocation makes the `n`th allocation from now
    /// fail, counting from one.
    ///
    pub fn fail_allocation(&self, n: usize) {
        let mut resources = self.inner.resources.lock().unwrap();
        resources.fail_allocation = Some(resources.allocations + n);
    }

    /// fail_map makes the `n`th BAR mapping from now fail,
    /// counting from one.
    ///
    pub fn fail_map(&self, n: usize) {
        let mut resources = self.inner.resources.lock().unwrap();
        resources.fail_map = Some(resources.map_calls + n);
    }

    pub fn bridge_u16(&self, field: u8) -> u16 {
        self.inner.config.read_u16(BRIDGE, field)
    }

    pub fn bridge_u32(&self, field: u8) -> u32 {
        self.inner.config.read_u32(BRIDGE, field)
    }
}

impl Platform for FakePlatform {
    type Config = FakeConfig;
    type Aperture = FakeAperture;
    type Registers = FakeRegisters;

    fn config(&self) -> &FakeConfig {
        &self.inner.config
    }

    fn aperture(&self) -> &FakeAperture {
        &self.inner.aperture
    }

    fn physical_memory_end(&self) -> u64 {
        self.inner.physical_memory_end
    }

    fn memory_limit(&self) -> u64 {
        self.inner.memory_limit
    }

    fn scratch_page(&self) -> u64 {
        SCRATCH_PAGE
    }

    fn map_bar(&self, device: &Function, bar: u8) -> Result<FakeRegisters, Error> {
        let mut resources = self.inner.resources.lock().unwrap();
        resources.map_calls += 1;
        if resources.fail_map == Some(resources.map_calls) || device.address != GRAPHICS {
            return Err(Error::ResourceUnavailable);
        }

        let registers = self.inner.bars.get(&bar).cloned().ok_or(Error::ResourceUnavailable)?;
        resources.mapped += 1;
        Ok(registers)
    }

    fn unmap_bar(&self, _registers: FakeRegisters) {
        self.inner.resources.lock().unwrap().mapped -= 1;
    }

    fn allocate(&self, size: usize, start: u64, end: u64) -> Result<Allocation<FakeRegisters>, Error> {
        let mut resources = self.inner.resources.lock().unwrap();
        resources.allocations += 1;
        if resources.fail_allocation == Some(resources.allocations) {
            return Err(Error::ResourceUnavailable);
        }

        let physical = resources.next_physical.max(start);
        if physical + size as u64 - 1 > end {
            return Err(Error::ResourceUnavailable);
        }

        let mapping = FakeRegisters::new(size);
        resources.next_physical = physical + size as u64;
        resources.outstanding.insert(physical, mapping.clone());
        Ok(Allocation {
            physical,
            size,
            mapping,
        })
    }

    fn release(&self, allocation: Allocation<FakeRegisters>) {
        let mut resources = self.inner.resources.lock().unwrap();
        let mapping = resources.outstanding.remove(&allocation.physical);
        assert_eq!(
            mapping.map(|mapping| mapping.size()),
            Some(allocation.size),
            "release of unknown allocation"
        );
    }
}

/// Describes the machine to simulate.
///
pub struct Builder {
    device: u16,
    config: FakeConfig,
    bars: HashMap<u8, FakeRegisters>,
    aperture_size: u32,
    physical_memory_end: u64,
    memory_limit: u64,
}

impl Builder {
    fn new(device: u16) -> Self {
        let config = FakeConfig::default();
        config.add_function(BRIDGE, 0x8086, 0x0100);
        config.add_function(GRAPHICS, 0x8086, device);
        Builder {
            device,
            config,
            bars: HashMap::new(),
            aperture_size: 256 * MB,
            physical_memory_end: 0x7fff_ffff,
            memory_limit: 64 << 20,
        }
    }

    pub fn bridge_u8(self, field: u8, value: u8) -> Self {
        self.config.write_u8(BRIDGE, field, value);
        self
    }

    pub fn bridge_u16(self, field: u8, value: u16) -> Self {
        self.config.write_u16(BRIDGE, field, value);
        self
    }

    pub fn bridge_u32(self, field: u8, value: u32) -> Self {
        self.config.write_u32(BRIDGE, field, value);
        self
    }

    pub fn bar(mut self, bar: u8, size: usize) -> Self {
        self.bars.insert(bar, FakeRegisters::new(size));
        self
    }

    /// register presets a register in the given BAR.
    ///
    pub fn register(self, bar: u8, offset: usize, value: u32) -> Self {
        self.bars[&bar].set(offset, value);
        self
    }

    pub fn aperture(mut self, size: u32) -> Self {
        self.aperture_size = size;
        self
    }

    pub fn physical_memory_end(mut self, end: u64) -> Self {
        self.physical_memory_end = end;
        self
    }

    pub fn memory_limit(mut self, limit: u64) -> Self {
        self.memory_limit = limit;
        self
    }

    pub fn without_bridge(self) -> Self {
        self.config.remove_function(BRIDGE);
        self
    }

    /// build returns the platform and the graphics
    /// function to attach.
    ///
    pub fn build(self) -> (FakePlatform, Function) {
        let function = Function {
            address: GRAPHICS,
            vendor: 0x8086,
            device: self.device,
        };

        let platform = FakePlatform {
            inner: Arc::new(Inner {
                config: self.config,
                aperture: FakeAperture::new(0xd000_0000, self.aperture_size),
                bars: self.bars,
                resources: Mutex::new(Resources {
                    next_physical: ALLOCATION_BASE,
                    ..Resources::default()
                }),
                physical_memory_end: self.physical_memory_end,
                memory_limit: self.memory_limit,
            }),
        };

        (platform, function)
    }
}

/// i810 returns an i810 with its graphics memory enabled
/// and a 64M aperture.
///
pub fn i810() -> Builder {
    Builder::new(0x7121)
        .bridge_u8(0x70, 0x40)
        .bar(pci::BAR1, 512 * 1024)
        .aperture(64 * MB)
}

/// i830 returns an 830M with 1M of stolen memory and a
/// 128M aperture.
///
pub fn i830() -> Builder {
    Builder::new(0x3577)
        .bridge_u16(0x52, 0x0030)
        .bar(pci::BAR1, 512 * 1024)
        .aperture(128 * MB)
}

/// i915 returns a 915G with 8M of stolen memory and a
/// 256M aperture.
///
pub fn i915() -> Builder {
    Builder::new(0x2582)
        .bridge_u32(0x54, 0x08)
        .bridge_u8(0x52, 0x30)
        .bar(pci::BAR0, 512 * 1024)
        .bar(pci::BAR3, 256 * 1024)
}

/// g33 returns a G33 with 8M of stolen memory and a 1M GTT.
///
pub fn g33() -> Builder {
    Builder::new(0x29C2)
        .bridge_u32(0x54, 0x08)
        .bridge_u16(0x52, (1 << 8) | 0x50)
        .bar(pci::BAR0, 512 * 1024)
        .bar(pci::BAR3, 1024 * 1024)
        .register(pci::BAR0, 0x2020, 0x3f00_0006)
}

/// i965 returns a G965 with a 512K GTT.
///
pub fn i965() -> Builder {
    Builder::new(0x2982)
        .bridge_u32(0x54, 0x08)
        .bridge_u8(0x52, 0x30)
        .bar(pci::BAR0, 1024 * 1024)
        .register(pci::BAR0, 0x2020, 0x3f00_0000)
}

/// g4x returns a G45 whose GMCH control asks for a 2M GTT.
///
pub fn g4x() -> Builder {
    Builder::new(0x2E22)
        .bridge_u32(0x54, 0x08)
        .bridge_u16(0x52, (0x3 << 8) | 0x30)
        .bar(pci::BAR0, 4 * 1024 * 1024)
        .register(pci::BAR0, 0x20c4, 0x1)
}

/// sandybridge returns a SandyBridge GT1 with 64M of
/// stolen memory and a 2M GTT.
///
pub fn sandybridge() -> Builder {
    Builder::new(0x0102)
        .bridge_u32(0x54, 0x10)
        .bridge_u16(0x50, (2 << 8) | (2 << 3))
        .bar(pci::BAR0, 4 * 1024 * 1024)
        .physical_memory_end(0xff_ffff_ffff)
}

/// broadwell returns a Broadwell with 64M of stolen memory
/// and a 4M GTT.
///
pub fn broadwell() -> Builder {
    Builder::new(0x1602)
        .bridge_u32(0x54, 0x10)
        .bridge_u16(0x50, (2 << 8) | (2 << 6))
        .bar(pci::BAR0, 8 * 1024 * 1024)
        .physical_memory_end(0xff_ffff_ffff)
}
