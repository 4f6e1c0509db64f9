// Audio Interface: a single-buffered DMA engine that drains RDRAM samples to
// the DAC at `dac_rate`. Register layout mirrors the bit-exact reference
// (dram_addr/length/control/status at 0x00/0x04/0x08/0x0c, dac_rate/bit_rate
// write-only beyond that).

use crate::backend::AudioSink;
use crate::memory::{Device, Size};
use crate::mi::{IrqMask, MipsInterface};
use crate::scheduler::{EventKind, Scheduler};
use proc_bitfield::bitfield;

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct StatusReg(pub u32): Debug {
        pub full: bool @ 0,
        pub dma_enable: bool @ 25,
        pub dma_busy: bool @ 27,
        pub busy: bool @ 30,
    }
}

pub struct AudioInterface {
    dram_addr: u32,
    length: u32,
    dma_enable: bool,
    dac_rate: u32,
    bit_rate: u32,
    busy: bool,
    pending: Option<(u32, u32)>,
}

impl AudioInterface {
    pub fn new() -> Self {
        AudioInterface {
            dram_addr: 0,
            length: 0,
            dma_enable: false,
            dac_rate: 0,
            bit_rate: 0,
            busy: false,
            pending: None,
        }
    }

    fn status(&self) -> StatusReg {
        StatusReg(0)
            .with_full(self.pending.is_some())
            .with_dma_enable(self.dma_enable)
            .with_dma_busy(self.busy)
            .with_busy(self.busy)
    }

    pub fn write_length(&mut self, len: u32, sched: &mut Scheduler, now: u64) {
        if !self.dma_enable || len == 0 {
            return;
        }
        if self.busy {
            self.pending = Some((self.dram_addr, len));
            return;
        }
        self.busy = true;
        self.length = len;
        let samples_cycles = (len as u64 / 4).max(1) * 4;
        sched.add_event(EventKind::AiDma, now + samples_cycles);
    }

    /// Address/length of the buffer to drain, for the caller to slice out of
    /// RDRAM before calling `finish_dma` (which can't hold a `&mut Bus`
    /// itself since it lives inside `Bus` as a field).
    pub fn pending_buffer(&self) -> (u32, u32) {
        (self.dram_addr, self.length & !1)
    }

    /// Called when `EventKind::AiDma` fires, given the RDRAM bytes at the
    /// address `pending_buffer` returned: pushes samples through the sink,
    /// raises AI, and starts the next buffer if one was queued.
    pub fn finish_dma(&mut self, src: &[u8], sink: &mut dyn AudioSink, mi: &mut MipsInterface, sched: &mut Scheduler, now: u64) {
        self.busy = false;
        let samples: Vec<i16> = src.chunks_exact(2).map(|c| i16::from_be_bytes([c[0], c[1]])).collect();
        sink.push_samples(&samples);
        mi.raise(IrqMask::AI);
        if let Some((addr, len)) = self.pending.take() {
            self.dram_addr = addr;
            self.write_length(len, sched, now);
        }
    }

    pub fn dac_rate(&self) -> u32 {
        self.dac_rate
    }

    pub fn bit_rate(&self) -> u32 {
        self.bit_rate
    }
}

impl Device for AudioInterface {
    fn name(&self) -> &str {
        "AI"
    }

    fn read(&mut self, offset: u32, _size: Size) -> u64 {
        (match offset & 0x1f {
            0x08 => self.status().0,
            _ => 0,
        }) as u64
    }

    fn write(&mut self, offset: u32, _size: Size, value: u64) {
        let value = value as u32;
        match offset & 0x1f {
            0x00 => self.dram_addr = value & 0x00ff_ffff,
            0x04 => self.length = value & 0x3_ffff,
            0x08 => self.dma_enable = value & 1 != 0,
            0x0c => {} // interrupt clear handled by the MI wiring that calls this write
            0x10 => self.dac_rate = value & 0x3fff,
            0x14 => self.bit_rate = value & 0xf,
            _ => {}
        }
    }
}

impl Default for AudioInterface {
    fn default() -> Self {
        Self::new()
    }
}
