// System control coprocessor register file. Field layouts are bit-exact
// with the real VR4300, taken from the reference register definitions
// (proc-bitfield layouts mirrored from a PAC for this chip); here they are
// plain in-memory structs rather than volatile MMIO, since this is a
// software core and not bare-metal firmware.

use proc_bitfield::bitfield;
use num_enum::{FromPrimitive, IntoPrimitive};

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct IndexReg(pub u32): Debug {
        pub index: u8 @ 0..=5,
        pub probe_failed: bool @ 31,
    }
}

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct EntryLoReg(pub u32): Debug {
        pub global: bool @ 0,
        pub valid: bool @ 1,
        pub dirty: bool @ 2,
        pub cache_algorithm: u8 @ 3..=5,
        pub page_frame_number: u32 @ 6..=25,
    }
}

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct PageMaskReg(pub u32): Debug {
        pub mask: u16 @ 13..=24,
    }
}

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct EntryHiReg(pub u64): Debug {
        pub asid: u8 @ 0..=7,
        pub vpn2: u64 @ 13..=39,
        pub region: u8 @ 62..=63,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ExceptionCode {
    Interrupt = 0,
    TlbModification = 1,
    TlbMissOnLoad = 2,
    TlbMissOnStore = 3,
    AddressErrorOnLoad = 4,
    AddressErrorOnStore = 5,
    InstructionBusError = 6,
    DataBusError = 7,
    Syscall = 8,
    Breakpoint = 9,
    ReservedInstruction = 10,
    CoprocessorUnusable = 11,
    ArithmeticOverflow = 12,
    Trap = 13,
    FloatingPoint = 15,
    Watch = 23,
    #[num_enum(default)]
    Reserved = 31,
}

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct StatusReg(pub u32): Debug {
        pub ie: bool @ 0,
        pub exl: bool @ 1,
        pub erl: bool @ 2,
        pub ksu: u8 @ 3..=4,
        pub ux: bool @ 5,
        pub sx: bool @ 6,
        pub kx: bool @ 7,
        pub im: u8 @ 8..=15,
        pub ds: u16 @ 16..=24,
        pub re: bool @ 25,
        pub fr: bool @ 26,
        pub rp: bool @ 27,
        pub cu: u8 @ 28..=31,
    }
}

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct CauseReg(pub u32): Debug {
        pub exception_code: u8 @ 2..=6,
        pub ip_soft: u8 @ 8..=9,
        pub ip_hw: u8 @ 10..=15,
        pub ce: u8 @ 28..=29,
        pub branch_delay: bool @ 31,
    }
}

impl CauseReg {
    pub fn ip(&self) -> u8 {
        self.ip_soft() | (self.ip_hw() << 2)
    }
    pub fn set_ip(&mut self, value: u8) {
        self.set_ip_soft(value & 0x3);
        self.set_ip_hw((value >> 2) & 0x3f);
    }
}

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct ContextReg(pub u64): Debug {
        pub bad_vpn2: u64 @ 4..=22,
        pub pte_base: u64 @ 23..=63,
    }
}

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct XContextReg(pub u64): Debug {
        pub bad_vpn2: u64 @ 4..=30,
        pub region: u8 @ 31..=32,
        pub pte_base: u64 @ 33..=63,
    }
}

bitfield! {
    #[derive(Clone, Copy, Default)]
    pub struct ConfigReg(pub u32): Debug {
        pub k0: u8 @ 0..=2,
        pub cu: bool @ 3,
        pub be: bool @ 15,
        pub ep: u8 @ 24..=27,
        pub ec: u8 @ 28..=30,
    }
}

/// The 32-register CP0 file. Exposed as named fields rather than an
/// array-plus-accessor-macro pile, since (unlike the PAC) nothing here
/// needs per-register free functions — callers always go through a `Cpu`.
#[derive(Debug, Clone)]
pub struct Cp0 {
    pub index: IndexReg,
    pub random: u8,
    pub entry_lo0: EntryLoReg,
    pub entry_lo1: EntryLoReg,
    pub context: ContextReg,
    pub page_mask: PageMaskReg,
    pub wired: u8,
    pub bad_vaddr: u64,
    pub count: u32,
    pub entry_hi: EntryHiReg,
    pub compare: u32,
    pub status: StatusReg,
    pub cause: CauseReg,
    pub epc: u64,
    pub prid: u32,
    pub config: ConfigReg,
    pub config1: u32,
    pub ll_addr: u32,
    pub watch_lo: u32,
    pub watch_hi: u32,
    pub x_context: XContextReg,
    pub tag_lo: u32,
    pub tag_hi: u32,
    pub error_epc: u64,
}

impl Cp0 {
    pub fn new() -> Self {
        let mut status = StatusReg(0);
        status.set_erl(true);
        status.set_cu(0b0001);
        Cp0 {
            index: IndexReg(0),
            random: 31,
            entry_lo0: EntryLoReg(0),
            entry_lo1: EntryLoReg(0),
            context: ContextReg(0),
            page_mask: PageMaskReg(0),
            wired: 0,
            bad_vaddr: 0,
            count: 0,
            entry_hi: EntryHiReg(0),
            compare: 0,
            status,
            cause: CauseReg(0),
            epc: 0,
            prid: 0x0000_0b22,
            config: ConfigReg(0x7006_6460),
            config1: 0x0006_e463,
            ll_addr: 0,
            watch_lo: 0,
            watch_hi: 0,
            x_context: XContextReg(0),
            tag_lo: 0,
            tag_hi: 0,
            error_epc: 0,
        }
    }

    /// CP0 register read by index, as used by MFC0/DMFC0. Unimplemented
    /// slots (7, 21, 22, 25 partially, 31) read as whatever was last
    /// latched there, matching hardware's "unused but readable" behavior.
    pub fn read(&self, index: u8) -> u64 {
        match index {
            0 => self.index.0 as u64,
            1 => self.random as u64,
            2 => self.entry_lo0.0 as u64,
            3 => self.entry_lo1.0 as u64,
            4 => self.context.0,
            5 => self.page_mask.0 as u64,
            6 => self.wired as u64,
            8 => self.bad_vaddr,
            9 => self.count as u64,
            10 => self.entry_hi.0,
            11 => self.compare as u64,
            12 => self.status.0 as u64,
            13 => self.cause.0 as u64,
            14 => self.epc,
            15 => self.prid as u64,
            16 => self.config.0 as u64,
            17 => self.ll_addr as u64,
            18 => self.watch_lo as u64,
            19 => self.watch_hi as u64,
            20 => self.x_context.0,
            28 => self.tag_lo as u64,
            29 => self.tag_hi as u64,
            30 => self.error_epc,
            _ => 0,
        }
    }

    pub fn write(&mut self, index: u8, value: u64) {
        match index {
            0 => self.index = IndexReg((value as u32) & 0x8000_003f),
            1 => {}
            2 => self.entry_lo0 = EntryLoReg((value as u32) & 0x3fff_ffff),
            3 => self.entry_lo1 = EntryLoReg((value as u32) & 0x3fff_ffff),
            4 => self.context = ContextReg(value & !0xf),
            5 => self.page_mask = PageMaskReg((value as u32) & 0x01ff_e000),
            6 => self.wired = (value as u8) & 0x3f,
            8 => self.bad_vaddr = value,
            9 => self.count = value as u32,
            10 => self.entry_hi = EntryHiReg(value & 0xc000_00ff_ffff_e0ff),
            11 => self.compare = value as u32,
            12 => self.status = StatusReg(value as u32),
            13 => self.cause.set_ip_soft((value as u8) & 0x3),
            14 => self.epc = value,
            16 => self.config = ConfigReg((value as u32 & 0x0f00_800f) | (self.config.0 & !0x0f00_800f)),
            17 => self.ll_addr = value as u32,
            18 => self.watch_lo = value as u32,
            19 => self.watch_hi = value as u32,
            20 => self.x_context = XContextReg(value & !0xf),
            28 => self.tag_lo = value as u32,
            29 => self.tag_hi = value as u32,
            30 => self.error_epc = value,
            _ => {}
        }
    }

    /// Advances Random, wrapping from 31 down to Wired (never below it).
    pub fn tick_random(&mut self) {
        if self.random == self.wired.max(0) && self.random != 0 {
            self.random = 31;
        } else if self.random > 0 {
            self.random -= 1;
        } else {
            self.random = 31;
        }
    }
}

impl Default for Cp0 {
    fn default() -> Self {
        Self::new()
    }
}
