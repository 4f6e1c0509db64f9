// SP register block: DMA source/dest/length, status, semaphore. Exposed as
// a `Device` so the bus can route 0x0404_0000-0x0404_001F accesses here
// directly; the PC shadow register at 0x0408_0000 is handled by the caller
// since it needs to reach into `Rsp::pc`.

use crate::dma::Transfer;
use crate::memory::{Device, Size};
use crate::mi::{IrqMask, MipsInterface};
use crate::scheduler::{EventKind, Scheduler};
use log::debug;

pub struct SpInterface {
    pub mem_addr: u32,
    pub dram_addr: u32,
    pub dma_busy: bool,
    pub dma_full: bool,
    pending: Option<(u32, u32, u32, bool)>,
    /// Set by a write to DMA_RDLEN/DMA_WRLEN (`len_reg`, `to_rdram`); the
    /// `Device::write` path has no scheduler to start the transfer with, so
    /// it just latches the request here for the owning system to pick up
    /// and pass to `start_dma`.
    requested: Option<(u32, bool)>,
    semaphore: bool,
}

impl SpInterface {
    pub fn new() -> Self {
        SpInterface {
            mem_addr: 0,
            dram_addr: 0,
            dma_busy: false,
            dma_full: false,
            pending: None,
            requested: None,
            semaphore: false,
        }
    }

    /// Takes the DMA request latched by the last DMA_RDLEN/DMA_WRLEN write,
    /// if any, so the caller can start it with a real scheduler/clock.
    pub fn take_requested(&mut self) -> Option<(u32, bool)> {
        self.requested.take()
    }

    /// Called on a write to DMA_RDLEN/DMA_WRLEN. Starts the transfer if the
    /// engine is idle, else buffers it (DMA_FULL=1).
    pub fn start_dma(&mut self, len_reg: u32, to_rdram: bool, sched: &mut Scheduler, now: u64) -> Option<(Transfer, bool)> {
        if self.dma_busy {
            self.pending = Some((self.dram_addr, self.mem_addr, len_reg, to_rdram));
            self.dma_full = true;
            return None;
        }
        self.dma_busy = true;
        let t = Transfer::new(self.dram_addr, self.mem_addr & 0xfff, len_reg, 0);
        sched.add_event(EventKind::SpDma, now + t.cycles());
        Some((t, to_rdram))
    }

    /// Call when `EventKind::SpDma` fires: clears busy, raises the SP
    /// interrupt, and swaps in a buffered DMA if one is pending.
    pub fn finish_dma(&mut self, mi: &mut MipsInterface, sched: &mut Scheduler, now: u64) -> Option<(Transfer, bool)> {
        self.dma_busy = false;
        mi.raise(IrqMask::SP);
        debug!("SP DMA complete");
        if let Some((dram, mem, len, to_rdram)) = self.pending.take() {
            self.dma_full = false;
            self.dram_addr = dram;
            self.mem_addr = mem;
            self.dma_busy = true;
            let t = Transfer::new(dram, mem & 0xfff, len, 0);
            sched.add_event(EventKind::SpDma, now + t.cycles());
            Some((t, to_rdram))
        } else {
            None
        }
    }

    pub fn read_semaphore(&mut self) -> u32 {
        let v = self.semaphore as u32;
        self.semaphore = true;
        v
    }

    pub fn write_semaphore(&mut self, _value: u32) {
        self.semaphore = false;
    }
}

impl Device for SpInterface {
    fn name(&self) -> &str {
        "SP"
    }

    fn read(&mut self, offset: u32, _size: Size) -> u64 {
        (match offset {
            0x00 => self.mem_addr,
            0x04 => self.dram_addr,
            0x10 => (self.dma_busy as u32) | ((self.dma_full as u32) << 3),
            _ => 0,
        }) as u64
    }

    fn write(&mut self, offset: u32, _size: Size, value: u64) {
        let value = value as u32;
        match offset {
            0x00 => self.mem_addr = value & 0x1fff,
            0x04 => self.dram_addr = value & 0x00ff_ffff,
            0x08 => self.requested = Some((value, false)), // DMA_RDLEN: RDRAM -> SP mem
            0x0c => self.requested = Some((value, true)),  // DMA_WRLEN: SP mem -> RDRAM
            _ => {}
        }
    }
}

impl Default for SpInterface {
    fn default() -> Self {
        Self::new()
    }
}
