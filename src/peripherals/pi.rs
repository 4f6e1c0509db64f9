// Peripheral Interface: the cartridge-domain DMA engine and bus timing
// registers. Register layout mirrors the bit-exact reference (dram_addr/
// cart_addr/rd_len/wr_len/status/dom{1,2}_{lat,pwd,pgs,rls} at
// 0x00..=0x30); status is read/write-distinct there (a union of two
// bitfields over the same word) since writes to it mean "clear
// interrupt"/"reset dma" rather than storing bits. We model that as two
// plain methods instead of a union, which needs no unsafe code.

use crate::dma::Transfer;
use crate::memory::{Device, Size};
use crate::mi::{IrqMask, MipsInterface};
use crate::scheduler::{EventKind, Scheduler};

pub struct PeripheralInterface {
    pub dram_addr: u32,
    pub cart_addr: u32,
    dma_busy: bool,
    dma_error: bool,
    interrupt: bool,
    pub dom1_lat: u32,
    pub dom1_pwd: u32,
    pub dom1_pgs: u32,
    pub dom1_rls: u32,
    pub dom2_lat: u32,
    pub dom2_pwd: u32,
    pub dom2_pgs: u32,
    pub dom2_rls: u32,
}

impl PeripheralInterface {
    pub fn new() -> Self {
        PeripheralInterface {
            dram_addr: 0,
            cart_addr: 0,
            dma_busy: false,
            dma_error: false,
            interrupt: false,
            dom1_lat: 0,
            dom1_pwd: 0,
            dom1_pgs: 0,
            dom1_rls: 0,
            dom2_lat: 0,
            dom2_pwd: 0,
            dom2_pgs: 0,
            dom2_rls: 0,
        }
    }

    /// `to_rdram=true` for RD_LEN (cart -> RDRAM), false for WR_LEN.
    fn start_dma(&mut self, len_reg: u32, to_rdram: bool, sched: &mut Scheduler, now: u64) -> Option<(Transfer, bool)> {
        if self.dma_busy {
            self.dma_error = true;
            return None;
        }
        self.dma_busy = true;
        let t = Transfer::new(self.dram_addr & !1, self.cart_addr & !1, len_reg, 0);
        sched.add_event(EventKind::PiDma, now + t.cycles());
        Some((t, to_rdram))
    }

    pub fn finish_dma(&mut self, mi: &mut MipsInterface) {
        self.dma_busy = false;
        self.interrupt = true;
        mi.raise(IrqMask::PI);
    }

    fn status_read(&self) -> u32 {
        (self.dma_busy as u32) | ((self.dma_error as u32) << 2) | ((self.interrupt as u32) << 3)
    }

    fn status_write(&mut self, value: u32) {
        if value & 1 != 0 {
            self.interrupt = false;
        }
        if value & 2 != 0 {
            self.dma_busy = false;
            self.dma_error = false;
        }
    }
}

impl Device for PeripheralInterface {
    fn name(&self) -> &str {
        "PI"
    }

    fn read(&mut self, offset: u32, _size: Size) -> u64 {
        (match offset & 0x3f {
            0x00 => self.dram_addr,
            0x04 => self.cart_addr,
            0x10 => self.status_read(),
            0x14 => self.dom1_lat,
            0x18 => self.dom1_pwd,
            0x1c => self.dom1_pgs,
            0x20 => self.dom1_rls,
            0x24 => self.dom2_lat,
            0x28 => self.dom2_pwd,
            0x2c => self.dom2_pgs,
            0x30 => self.dom2_rls,
            _ => 0,
        }) as u64
    }

    fn write(&mut self, offset: u32, _size: Size, value: u64) {
        let value = value as u32;
        match offset & 0x3f {
            0x00 => self.dram_addr = value & 0x00ff_fffe,
            0x04 => self.cart_addr = value,
            0x08 | 0x0c => {
                // rd_len/wr_len writes need the scheduler/now pair, which
                // the owning system supplies via `request_dma` below rather
                // than through this narrow `Device` write path.
            }
            0x10 => self.status_write(value),
            0x14 => self.dom1_lat = value & 0xff,
            0x18 => self.dom1_pwd = value & 0xff,
            0x1c => self.dom1_pgs = value & 0xf,
            0x20 => self.dom1_rls = value & 0x3,
            0x24 => self.dom2_lat = value & 0xff,
            0x28 => self.dom2_pwd = value & 0xff,
            0x2c => self.dom2_pgs = value & 0xf,
            0x30 => self.dom2_rls = value & 0x3,
            _ => {}
        }
    }
}

impl Default for PeripheralInterface {
    fn default() -> Self {
        Self::new()
    }
}

pub fn request_dma(
    pi: &mut PeripheralInterface,
    len_reg: u32,
    to_rdram: bool,
    sched: &mut Scheduler,
    now: u64,
) -> Option<(Transfer, bool)> {
    pi.start_dma(len_reg, to_rdram, sched, now)
}
