// RDRAM Interface: RDRAM chip configuration registers. Entirely cosmetic
// for emulation purposes (boot code pokes these to train the RDRAM
// interface; nothing downstream reads them back for behavior), so this is
// a flat register bank with no side effects.

use crate::memory::{Device, Size};

#[derive(Default)]
pub struct RdramInterface {
    mode: u32,
    config: u32,
    current_load: u32,
    select: u32,
    refresh: u32,
    latency: u32,
    rerror: u32,
    werror: u32,
}

impl RdramInterface {
    pub fn new() -> Self {
        RdramInterface { config: 0x0001_0000, ..Default::default() }
    }
}

impl Device for RdramInterface {
    fn name(&self) -> &str {
        "RI"
    }

    fn read(&mut self, offset: u32, _size: Size) -> u64 {
        (match offset & 0x1f {
            0x00 => self.mode,
            0x04 => self.config,
            0x08 => self.current_load,
            0x0c => self.select,
            0x10 => self.refresh,
            0x14 => self.latency,
            0x18 => self.rerror,
            0x1c => self.werror,
            _ => 0,
        }) as u64
    }

    fn write(&mut self, offset: u32, _size: Size, value: u64) {
        let value = value as u32;
        match offset & 0x1f {
            0x00 => self.mode = value,
            0x04 => self.config = value,
            0x0c => self.select = value,
            0x10 => self.refresh = value,
            0x14 => self.latency = value,
            _ => {}
        }
    }
}
