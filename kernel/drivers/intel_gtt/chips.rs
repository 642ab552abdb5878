// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Lists the supported graphics devices.
//!
//! Each entry is keyed by the PCI device id of the graphics
//! function (usually at 00:02.0). The placeholder function for
//! the second display head should never be listed.

use crate::gen2::{I810, I830, I855};
use crate::gen3::{Pineview, G33, I915};
use crate::gen4::{G4x, I965};
use crate::gen6::{SandyBridge, ValleyView};
use crate::gen8::Broadwell;
use crate::ops::GenerationOps;
use crate::regs;
use core::fmt;

/// A supported graphics device.
///
pub struct Chip {
    pub device_id: u16,
    pub name: &'static str,
    pub ops: &'static dyn GenerationOps,
}

impl fmt::Debug for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chip")
            .field("device_id", &format_args!("{:#06x}", self.device_id))
            .field("name", &self.name)
            .field("generation", &self.ops.generation())
            .finish()
    }
}

const fn chip(device_id: u16, name: &'static str, ops: &'static dyn GenerationOps) -> Chip {
    Chip {
        device_id,
        name,
        ops,
    }
}

/// The supported devices, in match order.
///
pub static CHIPS: &[Chip] = &[
    chip(0x7121, "Intel 82810 (i810 GMCH) SVGA controller", &I810),
    chip(0x7123, "Intel 82810-DC100 (i810-DC100 GMCH) SVGA controller", &I810),
    chip(0x7125, "Intel 82810E (i810E GMCH) SVGA controller", &I810),
    chip(0x1132, "Intel 82815 (i815 GMCH) SVGA controller", &I810),
    chip(0x3577, "Intel 82830M (830M GMCH) SVGA controller", &I830),
    chip(0x2562, "Intel 82845M (845M GMCH) SVGA controller", &I830),
    chip(0x3582, "Intel 82852/855GM SVGA controller", &I855),
    chip(0x2572, "Intel 82865G (865G GMCH) SVGA controller", &I855),
    chip(0x2582, "Intel 82915G (915G GMCH) SVGA controller", &I915),
    chip(0x258A, "Intel E7221 SVGA controller", &I915),
    chip(0x2592, "Intel 82915GM (915GM GMCH) SVGA controller", &I915),
    chip(0x2772, "Intel 82945G (945G GMCH) SVGA controller", &I915),
    chip(0x27A2, "Intel 82945GM (945GM GMCH) SVGA controller", &I915),
    chip(0x27AE, "Intel 945GME SVGA controller", &I915),
    chip(0x2972, "Intel 946GZ SVGA controller", &I965),
    chip(0x2982, "Intel G965 SVGA controller", &I965),
    chip(0x2992, "Intel Q965 SVGA controller", &I965),
    chip(0x29A2, "Intel G965 SVGA controller", &I965),
    chip(0x29B2, "Intel Q35 SVGA controller", &G33),
    chip(0x29C2, "Intel G33 SVGA controller", &G33),
    chip(0x29D2, "Intel Q33 SVGA controller", &G33),
    chip(0xA001, "Intel Pineview SVGA controller", &Pineview),
    chip(0xA011, "Intel Pineview (M) SVGA controller", &Pineview),
    chip(0x2A02, "Intel GM965 SVGA controller", &I965),
    chip(0x2A12, "Intel GME965 SVGA controller", &I965),
    chip(0x2A42, "Intel GM45 SVGA controller", &G4x),
    chip(0x2E02, "Intel Eaglelake SVGA controller", &G4x),
    chip(0x2E12, "Intel Q45 SVGA controller", &G4x),
    chip(0x2E22, "Intel G45 SVGA controller", &G4x),
    chip(0x2E32, "Intel G41 SVGA controller", &G4x),
    chip(0x0042, "Intel Ironlake (D) SVGA controller", &G4x),
    chip(0x0046, "Intel Ironlake (M) SVGA controller", &G4x),
    chip(0x0102, "SandyBridge desktop GT1 IG", &SandyBridge),
    chip(0x0112, "SandyBridge desktop GT2 IG", &SandyBridge),
    chip(0x0122, "SandyBridge desktop GT2+ IG", &SandyBridge),
    chip(0x0106, "SandyBridge mobile GT1 IG", &SandyBridge),
    chip(0x0116, "SandyBridge mobile GT2 IG", &SandyBridge),
    chip(0x0126, "SandyBridge mobile GT2+ IG", &SandyBridge),
    chip(0x010a, "SandyBridge server IG", &SandyBridge),
    chip(0x0152, "IvyBridge desktop GT1 IG", &SandyBridge),
    chip(0x0162, "IvyBridge desktop GT2 IG", &SandyBridge),
    chip(0x0156, "IvyBridge mobile GT1 IG", &SandyBridge),
    chip(0x0166, "IvyBridge mobile GT2 IG", &SandyBridge),
    chip(0x015a, "IvyBridge server GT1 IG", &SandyBridge),
    chip(0x016a, "IvyBridge server GT2 IG", &SandyBridge),
    chip(0x0f30, "ValleyView", &ValleyView),
    chip(0x0402, "Haswell desktop GT1 IG", &SandyBridge),
    chip(0x0412, "Haswell desktop GT2 IG", &SandyBridge),
    chip(0x041e, "Haswell", &SandyBridge),
    chip(0x0422, "Haswell", &SandyBridge),
    chip(0x0406, "Haswell mobile GT1 IG", &SandyBridge),
    chip(0x0416, "Haswell mobile GT2 IG", &SandyBridge),
    chip(0x0426, "Haswell", &SandyBridge),
    chip(0x040a, "Haswell server GT1 IG", &SandyBridge),
    chip(0x041a, "Haswell server GT2 IG", &SandyBridge),
    chip(0x042a, "Haswell", &SandyBridge),
    chip(0x0c02, "Haswell", &SandyBridge),
    chip(0x0c12, "Haswell", &SandyBridge),
    chip(0x0c22, "Haswell", &SandyBridge),
    chip(0x0c06, "Haswell", &SandyBridge),
    chip(0x0c16, "Haswell SDV", &SandyBridge),
    chip(0x0c26, "Haswell", &SandyBridge),
    chip(0x0c0a, "Haswell", &SandyBridge),
    chip(0x0c1a, "Haswell", &SandyBridge),
    chip(0x0c2a, "Haswell", &SandyBridge),
    chip(0x0a02, "Haswell", &SandyBridge),
    chip(0x0a12, "Haswell", &SandyBridge),
    chip(0x0a22, "Haswell", &SandyBridge),
    chip(0x0a06, "Haswell", &SandyBridge),
    chip(0x0a16, "Haswell", &SandyBridge),
    chip(0x0a26, "Haswell", &SandyBridge),
    chip(0x0a0a, "Haswell", &SandyBridge),
    chip(0x0a1a, "Haswell", &SandyBridge),
    chip(0x0a2a, "Haswell", &SandyBridge),
    chip(0x0d12, "Haswell", &SandyBridge),
    chip(0x0d22, "Haswell", &SandyBridge),
    chip(0x0d32, "Haswell", &SandyBridge),
    chip(0x0d16, "Haswell", &SandyBridge),
    chip(0x0d26, "Haswell", &SandyBridge),
    chip(0x0d36, "Haswell", &SandyBridge),
    chip(0x0d1a, "Haswell", &SandyBridge),
    chip(0x0d2a, "Haswell", &SandyBridge),
    chip(0x0d3a, "Haswell", &SandyBridge),
    chip(0x1602, "Broadwell", &Broadwell),
    chip(0x1606, "Broadwell", &Broadwell),
    chip(0x160B, "Broadwell", &Broadwell),
    chip(0x160E, "Broadwell", &Broadwell),
    chip(0x1616, "Broadwell", &Broadwell),
    chip(0x161E, "Broadwell", &Broadwell),
    chip(0x160A, "Broadwell", &Broadwell),
    chip(0x160D, "Broadwell", &Broadwell),
];

/// lookup returns the supported chip with the given PCI
/// vendor and device ids.
///
/// The table is searched in order, so the first entry with
/// a matching device id is returned.
///
pub fn lookup(vendor: u16, device: u16) -> Option<&'static Chip> {
    if vendor != regs::VENDOR_INTEL {
        return None;
    }

    CHIPS.iter().find(|chip| chip.device_id == device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::Generation;

    #[test]
    fn test_lookup() {
        let chip = lookup(0x8086, 0x0126).unwrap();
        assert_eq!(chip.name, "SandyBridge mobile GT2+ IG");
        assert_eq!(chip.ops.generation(), Generation::SandyBridge);

        assert_eq!(lookup(0x8086, 0x0f30).unwrap().ops.generation(), Generation::ValleyView);
        assert_eq!(lookup(0x8086, 0x160D).unwrap().ops.generation(), Generation::Broadwell);
        assert_eq!(lookup(0x8086, 0x7121).unwrap().ops.generation(), Generation::I810);
        assert_eq!(lookup(0x8086, 0xA011).unwrap().ops.generation(), Generation::Pineview);

        // Haswell parts run as SandyBridge.
        assert_eq!(lookup(0x8086, 0x0d3a).unwrap().ops.generation(), Generation::SandyBridge);
    }

    #[test]
    fn test_lookup_rejects() {
        assert!(lookup(0x8086, 0x0000).is_none());
        assert!(lookup(0x8086, 0x1237).is_none());
        assert!(lookup(0x1022, 0x0126).is_none());
        assert!(lookup(0xffff, 0xffff).is_none());
    }

    #[test]
    fn test_every_entry_matches_itself() {
        for (i, chip) in CHIPS.iter().enumerate() {
            let found = lookup(regs::VENDOR_INTEL, chip.device_id).unwrap();
            assert!(core::ptr::eq(found, chip), "entry {} ({:?}) is shadowed", i, chip);
            assert!(lookup(0x10de, chip.device_id).is_none());
        }
    }
}
