// Video Interface: the scanout timing/format registers and the vertical
// interrupt that drives the emulator's frame cadence. Register layout
// mirrors the bit-exact reference (ctrl/origin/width/v_intr/v_current/
// burst/v_sync/h_sync/... at 0x00..=0x3c).

use crate::backend::RdpBackend;
use crate::memory::{Device, Size};
use crate::mi::{IrqMask, MipsInterface};
use num_enum::{FromPrimitive, IntoPrimitive};
use proc_bitfield::bitfield;

#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ColorDepth {
    Bpp32 = 3,
    Bpp16 = 2,
    Reserved = 1,
    #[default]
    Blank = 0,
}

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct CtrlReg(pub u32): Debug {
        pub depth: u8 [ColorDepth] @ 0..=1,
        pub gamma_dither_enable: bool @ 2,
        pub gamma_enable: bool @ 3,
        pub divot_enable: bool @ 4,
        pub serrate: bool @ 6,
        pub test_mode: bool @ 7,
        pub aa_mode: u8 @ 8..=9,
        pub kill_we: bool @ 11,
        pub pixel_advance: u8 @ 12..=15,
        pub dither_filter_enable: bool @ 16,
    }
}

pub struct VideoInterface {
    pub ctrl: CtrlReg,
    pub origin: u32,
    pub width: u32,
    pub v_intr: u32,
    pub v_current: u32,
    pub burst: u32,
    pub v_sync: u32,
    pub h_sync: u32,
    pub h_sync_leap: u32,
    pub h_video: u32,
    pub v_video: u32,
    pub v_burst: u32,
    pub x_scale: u32,
    pub y_scale: u32,
    field: bool,
}

impl VideoInterface {
    pub fn new() -> Self {
        VideoInterface {
            ctrl: CtrlReg(0),
            origin: 0,
            width: 0,
            v_intr: 0x3ff,
            v_current: 0,
            burst: 0,
            v_sync: 0,
            h_sync: 0,
            h_sync_leap: 0,
            h_video: 0,
            v_video: 0,
            v_burst: 0,
            x_scale: 0,
            y_scale: 0,
            field: false,
        }
    }

    /// Called once per scanout interval (driven by `EventKind::ViVblank`):
    /// advances the half-line counter, fires MI when it matches `v_intr`,
    /// and hands the current framebuffer to the backend for presentation.
    pub fn tick_vblank(&mut self, mi: &mut MipsInterface, backend: &mut dyn RdpBackend) {
        self.field = !self.field;
        self.v_current = (self.v_current + 2) % (self.v_sync.max(1) * 2);
        if self.v_current == (self.v_intr & !1) {
            mi.raise(IrqMask::VI);
        }
        // framebuffer readback (origin/width/depth) is the backend's job once
        // wired to a concrete presentation surface; this only drives timing.
        backend.full_sync();
    }

    pub fn depth(&self) -> ColorDepth {
        self.ctrl.depth()
    }
}

impl Device for VideoInterface {
    fn name(&self) -> &str {
        "VI"
    }

    fn read(&mut self, offset: u32, _size: Size) -> u64 {
        (match offset & 0x3f {
            0x00 => self.ctrl.0,
            0x04 => self.origin,
            0x08 => self.width,
            0x0c => self.v_intr,
            0x10 => self.v_current | (self.field as u32),
            0x14 => self.burst,
            0x18 => self.v_sync,
            0x1c => self.h_sync,
            0x20 => self.h_sync_leap,
            0x24 => self.h_video,
            0x28 => self.v_video,
            0x2c => self.v_burst,
            0x30 => self.x_scale,
            0x34 => self.y_scale,
            _ => 0,
        }) as u64
    }

    fn write(&mut self, offset: u32, _size: Size, value: u64) {
        let value = value as u32;
        match offset & 0x3f {
            0x00 => self.ctrl = CtrlReg(value),
            0x04 => self.origin = value & 0x00ff_ffff,
            0x08 => self.width = value & 0xfff,
            0x0c => self.v_intr = value & 0x3ff,
            0x10 => {} // v_current write clears the pending interrupt; handled by MI wiring
            0x14 => self.burst = value,
            0x18 => self.v_sync = value & 0x3ff,
            0x1c => self.h_sync = value,
            0x20 => self.h_sync_leap = value,
            0x24 => self.h_video = value,
            0x28 => self.v_video = value,
            0x2c => self.v_burst = value,
            0x30 => self.x_scale = value,
            0x34 => self.y_scale = value,
            _ => {}
        }
    }
}

impl Default for VideoInterface {
    fn default() -> Self {
        Self::new()
    }
}
