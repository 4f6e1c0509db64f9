// Serial Interface: bridges RDRAM and the 64-byte PIF RAM/ROM command
// buffer for joybus transactions. Register layout mirrors the bit-exact
// reference (dram_addr/pif_ad_rd64b/pif_ad_wr4b/pif_ad_wr64b/pif_ad_rd4b/
// status at 0x00..=0x18).

use crate::memory::{Device, Size};
use crate::mi::{IrqMask, MipsInterface};
use crate::scheduler::{EventKind, Scheduler};
use log::debug;
use proc_bitfield::bitfield;

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct StatusReg(pub u32): Debug {
        pub dma_busy: bool @ 0,
        pub io_busy: bool @ 1,
        pub dma_error: bool @ 3,
        pub interrupt: bool @ 12,
    }
}

pub struct SerialInterface {
    pub dram_addr: u32,
    busy: bool,
    interrupt: bool,
}

impl SerialInterface {
    pub fn new() -> Self {
        SerialInterface { dram_addr: 0, busy: false, interrupt: false }
    }

    fn start(&mut self, sched: &mut Scheduler, now: u64) {
        if self.busy {
            return;
        }
        self.busy = true;
        // 64 bytes of joybus traffic; the real controller interface is far
        // slower than RDRAM access, but this core doesn't model SI's serial
        // clock in detail.
        sched.add_event(EventKind::SiDma, now + 64 * 4);
    }

    /// Called when `EventKind::SiDma` fires: the actual PIF RAM <-> RDRAM
    /// byte copy is driven by the owning system (it holds both the bus and
    /// the PIF), this just clears busy and raises the interrupt.
    pub fn finish_dma(&mut self, mi: &mut MipsInterface) {
        self.busy = false;
        self.interrupt = true;
        mi.raise(IrqMask::SI);
        debug!("SI DMA complete");
    }

    fn status(&self) -> StatusReg {
        StatusReg(0).with_dma_busy(self.busy).with_interrupt(self.interrupt)
    }
}

impl Device for SerialInterface {
    fn name(&self) -> &str {
        "SI"
    }

    fn read(&mut self, offset: u32, _size: Size) -> u64 {
        (match offset & 0x1f {
            0x00 => self.dram_addr,
            0x18 => self.status().0,
            _ => 0,
        }) as u64
    }

    fn write(&mut self, offset: u32, _size: Size, value: u64) {
        let value = value as u32;
        match offset & 0x1f {
            0x00 => self.dram_addr = value & 0x00ff_ffff,
            0x04 | 0x08 | 0x0c | 0x10 => {
                // PIF AD rd/wr triggers are handled by the owning system,
                // which needs the PIF RAM contents this struct doesn't hold.
            }
            0x18 => self.interrupt = false,
            _ => {}
        }
    }
}

impl Default for SerialInterface {
    fn default() -> Self {
        Self::new()
    }
}

pub fn request_dma(si: &mut SerialInterface, sched: &mut Scheduler, now: u64) {
    si.start(sched, now);
}
