pub mod interface;
pub mod vector;

use crate::memory::Size;
use crate::mi::{IrqMask, MipsInterface};
use log::trace;
use vector::VectorUnit;

pub const DMEM_SIZE: usize = 4096;
pub const IMEM_SIZE: usize = 4096;

/// The Reality Signal Processor: a MIPS-like scalar core married to a
/// 128-bit vector unit, running out of its own 4 KiB+4 KiB scratchpad.
pub struct Rsp {
    pub gpr: [u32; 32],
    pub pc: u16,
    pub mem: Vec<u8>, // DMEM [0..0x1000) then IMEM [0x1000..0x2000)
    pub vu: VectorUnit,
    pub halted: bool,
    pub broke: bool,
    pub single_step: bool,
    pub intbreak: bool,
    pub sig: u8,
    pending_jump: Option<u16>,
}

impl Rsp {
    pub fn new() -> Self {
        Rsp {
            gpr: [0; 32],
            pc: 0,
            mem: vec![0; DMEM_SIZE + IMEM_SIZE],
            vu: VectorUnit::new(),
            halted: true,
            broke: false,
            single_step: false,
            intbreak: false,
            sig: 0,
            pending_jump: None,
        }
    }

    fn get(&self, i: u8) -> u32 {
        self.gpr[i as usize]
    }

    fn set(&mut self, i: u8, v: u32) {
        if i != 0 {
            self.gpr[i as usize] = v;
        }
    }

    fn read_dmem(&self, addr: u32, size: Size) -> u32 {
        let addr = (addr & 0xfff) as usize;
        match size {
            Size::Byte => self.mem[addr] as u32,
            Size::Half => u16::from_be_bytes([self.mem[addr], self.mem[(addr + 1) & 0xfff]]) as u32,
            _ => {
                let b = |i: usize| self.mem[(addr + i) & 0xfff];
                u32::from_be_bytes([b(0), b(1), b(2), b(3)])
            }
        }
    }

    fn write_dmem(&mut self, addr: u32, size: Size, value: u32) {
        let addr = (addr & 0xfff) as usize;
        match size {
            Size::Byte => self.mem[addr] = value as u8,
            Size::Half => {
                let bytes = (value as u16).to_be_bytes();
                self.mem[addr] = bytes[0];
                self.mem[(addr + 1) & 0xfff] = bytes[1];
            }
            _ => {
                let bytes = value.to_be_bytes();
                for (i, b) in bytes.iter().enumerate() {
                    self.mem[(addr + i) & 0xfff] = *b;
                }
            }
        }
    }

    /// Runs scalar instructions until halted or `budget` is exhausted.
    pub fn run(&mut self, budget: u64, mi: &mut MipsInterface) -> u64 {
        let mut spent = 0;
        while !self.halted && spent < budget {
            self.step(mi);
            spent += 1;
            if self.single_step {
                self.halted = true;
            }
        }
        spent
    }

    fn step(&mut self, mi: &mut MipsInterface) {
        let imem_off = IMEM_SIZE;
        let pc = self.pc as usize & 0xfff;
        let bytes = [
            self.mem[imem_off + pc],
            self.mem[imem_off + pc + 1],
            self.mem[imem_off + pc + 2],
            self.mem[imem_off + pc + 3],
        ];
        let word = u32::from_be_bytes(bytes);

        let next_pc = self.pending_jump.take().unwrap_or_else(|| self.pc.wrapping_add(4) & 0xfff);
        self.pc = next_pc;

        self.execute(word, mi);
    }

    fn execute(&mut self, word: u32, mi: &mut MipsInterface) {
        use crate::cpu::decode::*;
        let op = opcode(word);
        let s = self.get(rs(word));
        let t = self.get(rt(word));
        match op {
            OP_SPECIAL => {
                let f = funct(word);
                match f {
                    0x00 => self.set(rd(word), t << sa(word)),
                    0x02 => self.set(rd(word), t >> sa(word)),
                    0x03 => self.set(rd(word), ((t as i32) >> sa(word)) as u32),
                    0x04 => self.set(rd(word), t << (s & 0x1f)),
                    0x06 => self.set(rd(word), t >> (s & 0x1f)),
                    0x07 => self.set(rd(word), ((t as i32) >> (s & 0x1f)) as u32),
                    0x08 => self.pending_jump = Some((s & 0xfff) as u16),
                    0x09 => {
                        let link = rd(word);
                        self.set(if link == 0 { 31 } else { link }, (self.pc.wrapping_add(4)) as u32);
                        self.pending_jump = Some((s & 0xfff) as u16);
                    }
                    0x0d => {
                        self.halted = true;
                        self.broke = true;
                        if self.intbreak {
                            mi.raise(IrqMask::SP);
                        }
                    }
                    0x20 | 0x21 => self.set(rd(word), s.wrapping_add(t)),
                    0x22 | 0x23 => self.set(rd(word), s.wrapping_sub(t)),
                    0x24 => self.set(rd(word), s & t),
                    0x25 => self.set(rd(word), s | t),
                    0x26 => self.set(rd(word), s ^ t),
                    0x27 => self.set(rd(word), !(s | t)),
                    0x2a => self.set(rd(word), ((s as i32) < (t as i32)) as u32),
                    0x2b => self.set(rd(word), (s < t) as u32),
                    _ => {}
                }
            }
            0x04 => {
                if s == t {
                    self.pending_jump = Some(branch_target(self.pc, word));
                }
            }
            0x05 => {
                if s != t {
                    self.pending_jump = Some(branch_target(self.pc, word));
                }
            }
            0x06 => {
                if (s as i32) <= 0 {
                    self.pending_jump = Some(branch_target(self.pc, word));
                }
            }
            0x07 => {
                if (s as i32) > 0 {
                    self.pending_jump = Some(branch_target(self.pc, word));
                }
            }
            0x08 | 0x09 => self.set(rt(word), s.wrapping_add(simm16(word) as u32)),
            0x0a => self.set(rt(word), ((s as i32) < simm16(word) as i32) as u32),
            0x0b => self.set(rt(word), (s < simm16(word) as u32) as u32),
            0x0c => self.set(rt(word), s & imm16(word) as u32),
            0x0d => self.set(rt(word), s | imm16(word) as u32),
            0x0e => self.set(rt(word), s ^ imm16(word) as u32),
            0x0f => self.set(rt(word), (imm16(word) as u32) << 16),
            0x20 => self.set(rt(word), self.read_dmem(s.wrapping_add(simm16(word) as u32), Size::Byte) as i8 as i32 as u32),
            0x24 => self.set(rt(word), self.read_dmem(s.wrapping_add(simm16(word) as u32), Size::Byte)),
            0x21 => self.set(rt(word), self.read_dmem(s.wrapping_add(simm16(word) as u32), Size::Half) as i16 as i32 as u32),
            0x25 => self.set(rt(word), self.read_dmem(s.wrapping_add(simm16(word) as u32), Size::Half)),
            0x23 | 0x27 => self.set(rt(word), self.read_dmem(s.wrapping_add(simm16(word) as u32), Size::Word)),
            0x28 => self.write_dmem(s.wrapping_add(simm16(word) as u32), Size::Byte, t),
            0x29 => self.write_dmem(s.wrapping_add(simm16(word) as u32), Size::Half, t),
            0x2b => self.write_dmem(s.wrapping_add(simm16(word) as u32), Size::Word, t),
            0x32 => self.vu.load_store(word, &mut self.mem[..DMEM_SIZE], self.gpr),
            0x3a => self.vu.load_store(word, &mut self.mem[..DMEM_SIZE], self.gpr),
            0x12 => self.vu.compute(word),
            _ => {}
        }
    }

    pub fn status_read(&self) -> u32 {
        (self.halted as u32)
            | ((self.broke as u32) << 1)
            | ((self.single_step as u32) << 5)
            | ((self.intbreak as u32) << 6)
            | ((self.sig as u32) << 7)
    }

    pub fn status_write(&mut self, value: u32) {
        let pairs: [(u32, u32); 2] = [(1 << 0, 1 << 1), (1 << 2, 1 << 3)];
        if value & pairs[0].0 != 0 {
            self.halted = false;
        }
        if value & pairs[0].1 != 0 {
            self.halted = true;
        }
        if value & pairs[1].0 != 0 {
            self.broke = false;
        }
        if value & (1 << 6) != 0 {
            self.single_step = false;
        }
        if value & (1 << 7) != 0 {
            self.single_step = true;
        }
        if value & (1 << 8) != 0 {
            self.intbreak = false;
        }
        if value & (1 << 9) != 0 {
            self.intbreak = true;
        }
        trace!("SP status write {:#010x}", value);
    }
}

fn branch_target(pc: u16, word: u32) -> u16 {
    use crate::cpu::decode::simm16;
    (pc.wrapping_add(4) as i32 + ((simm16(word) as i32) << 2)) as u16 & 0xfff
}

impl Default for Rsp {
    fn default() -> Self {
        Self::new()
    }
}
