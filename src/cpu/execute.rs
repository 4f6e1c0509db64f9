// Per-instruction semantics. Dispatch is a match over the primary opcode
// field, with SPECIAL/REGIMM/COP0/COP1 escape groups nested by their own
// secondary field. Each arm is a short, pure-ish function of decoded
// operands and `&mut Cpu`/`&mut Bus`.

use super::decode::*;
use super::exceptions::Exception;
use super::fpu::{self, Cond, CAUSE_INVALID};
use super::Cpu;
use crate::memory::{Bus, Size};
use crate::mi::MipsInterface;
use crate::scheduler::{EventKind, Scheduler};

fn se32(value: u32) -> u64 {
    value as i32 as i64 as u64
}

fn checked_add32(a: u32, b: u32) -> Option<u32> {
    let (r, overflowed) = (a as i32).overflowing_add(b as i32);
    if overflowed { None } else { Some(r as u32) }
}

fn checked_sub32(a: u32, b: u32) -> Option<u32> {
    let (r, overflowed) = (a as i32).overflowing_sub(b as i32);
    if overflowed { None } else { Some(r as u32) }
}

fn checked_add64(a: u64, b: u64) -> Option<u64> {
    let (r, overflowed) = (a as i64).overflowing_add(b as i64);
    if overflowed { None } else { Some(r as u64) }
}

fn checked_sub64(a: u64, b: u64) -> Option<u64> {
    let (r, overflowed) = (a as i64).overflowing_sub(b as i64);
    if overflowed { None } else { Some(r as u64) }
}

pub fn execute(
    cpu: &mut Cpu,
    bus: &mut Bus,
    mi: &mut MipsInterface,
    sched: &mut Scheduler,
    word: u32,
    pc: u64,
    _in_delay_slot: bool,
) -> Result<u64, Exception> {
    let op = opcode(word);
    match op {
        OP_SPECIAL => execute_special(cpu, bus, word, pc),
        OP_REGIMM => execute_regimm(cpu, word, pc),
        OP_COP0 => execute_cop0(cpu, bus, mi, sched, word),
        OP_COP1 => execute_cop1(cpu, word),
        0x02 => {
            // J
            let target = (pc.wrapping_add(4) & !0xfff_ffff) | ((target26(word) as u64) << 2);
            cpu.regs.pending_jump = Some(target);
            Ok(1)
        }
        0x03 => {
            // JAL
            let target = (pc.wrapping_add(4) & !0xfff_ffff) | ((target26(word) as u64) << 2);
            cpu.regs.set(31, pc.wrapping_add(8));
            cpu.regs.pending_jump = Some(target);
            Ok(1)
        }
        0x04 => branch(cpu, word, pc, cpu.regs.get(rs(word)) == cpu.regs.get(rt(word)), false),
        0x05 => branch(cpu, word, pc, cpu.regs.get(rs(word)) != cpu.regs.get(rt(word)), false),
        0x06 => branch(cpu, word, pc, (cpu.regs.get(rs(word)) as i64) <= 0, false),
        0x07 => branch(cpu, word, pc, (cpu.regs.get(rs(word)) as i64) > 0, false),
        0x08 => {
            // ADDI
            let a = cpu.regs.get(rs(word)) as u32;
            let b = simm16(word) as u32;
            match checked_add32(a, b) {
                Some(r) => {
                    cpu.regs.set(rt(word), se32(r));
                    Ok(1)
                }
                None => Err(Exception::IntegerOverflow),
            }
        }
        0x09 => {
            // ADDIU
            let a = cpu.regs.get(rs(word)) as u32;
            let r = a.wrapping_add(simm16(word) as u32);
            cpu.regs.set(rt(word), se32(r));
            Ok(1)
        }
        0x0a => {
            // SLTI
            let v = (cpu.regs.get(rs(word)) as i64) < simm16(word);
            cpu.regs.set(rt(word), v as u64);
            Ok(1)
        }
        0x0b => {
            // SLTIU
            let v = cpu.regs.get(rs(word)) < (simm16(word) as u64);
            cpu.regs.set(rt(word), v as u64);
            Ok(1)
        }
        0x0c => {
            cpu.regs.set(rt(word), cpu.regs.get(rs(word)) & imm16(word) as u64);
            Ok(1)
        }
        0x0d => {
            cpu.regs.set(rt(word), cpu.regs.get(rs(word)) | imm16(word) as u64);
            Ok(1)
        }
        0x0e => {
            cpu.regs.set(rt(word), cpu.regs.get(rs(word)) ^ imm16(word) as u64);
            Ok(1)
        }
        0x0f => {
            // LUI
            cpu.regs.set(rt(word), se32((imm16(word) as u32) << 16));
            Ok(1)
        }
        0x14 => branch(cpu, word, pc, cpu.regs.get(rs(word)) == cpu.regs.get(rt(word)), true),
        0x15 => branch(cpu, word, pc, cpu.regs.get(rs(word)) != cpu.regs.get(rt(word)), true),
        0x16 => branch(cpu, word, pc, (cpu.regs.get(rs(word)) as i64) <= 0, true),
        0x17 => branch(cpu, word, pc, (cpu.regs.get(rs(word)) as i64) > 0, true),
        0x18 => {
            // DADDI
            let a = cpu.regs.get(rs(word));
            let b = simm16(word) as u64;
            match checked_add64(a, b) {
                Some(r) => {
                    cpu.regs.set(rt(word), r);
                    Ok(1)
                }
                None => Err(Exception::IntegerOverflow),
            }
        }
        0x19 => {
            // DADDIU
            let r = cpu.regs.get(rs(word)).wrapping_add(simm16(word) as u64);
            cpu.regs.set(rt(word), r);
            Ok(1)
        }
        0x20..=0x27 | 0x30 | 0x34 | 0x37 => load(cpu, bus, word, op),
        0x28..=0x2e | 0x38 | 0x3c | 0x3f => store(cpu, bus, word, op),
        0x31 | 0x35 => cop_mem(cpu, bus, word, op, true),
        0x39 | 0x3d => cop_mem(cpu, bus, word, op, false),
        _ => Err(Exception::ReservedInstruction),
    }
}

fn branch(cpu: &mut Cpu, word: u32, pc: u64, taken: bool, likely: bool) -> Result<u64, Exception> {
    let target = pc.wrapping_add(4).wrapping_add((simm16(word) as u64) << 2);
    if taken {
        cpu.regs.pending_jump = Some(target);
    } else if likely {
        cpu.regs.pc = pc.wrapping_add(8);
    }
    Ok(1)
}

fn execute_regimm(cpu: &mut Cpu, word: u32, pc: u64) -> Result<u64, Exception> {
    let sub = rt(word);
    let src = cpu.regs.get(rs(word)) as i64;
    match sub {
        0x00 => branch(cpu, word, pc, src < 0, false),
        0x01 => branch(cpu, word, pc, src >= 0, false),
        0x02 => branch(cpu, word, pc, src < 0, true),
        0x03 => branch(cpu, word, pc, src >= 0, true),
        0x10 => {
            cpu.regs.set(31, pc.wrapping_add(8));
            branch(cpu, word, pc, src < 0, false)
        }
        0x11 => {
            cpu.regs.set(31, pc.wrapping_add(8));
            branch(cpu, word, pc, src >= 0, false)
        }
        _ => Err(Exception::ReservedInstruction),
    }
}

fn execute_special(cpu: &mut Cpu, bus: &mut Bus, word: u32, pc: u64) -> Result<u64, Exception> {
    let f = funct(word);
    let s = cpu.regs.get(rs(word));
    let t = cpu.regs.get(rt(word));
    match f {
        0x00 => {
            // SLL
            let v = se32((t as u32) << sa(word));
            cpu.regs.set(rd(word), v);
            Ok(1)
        }
        0x02 => {
            let v = se32((t as u32) >> sa(word));
            cpu.regs.set(rd(word), v);
            Ok(1)
        }
        0x03 => {
            let v = se32(((t as i32) >> sa(word)) as u32);
            cpu.regs.set(rd(word), v);
            Ok(1)
        }
        0x04 => {
            let v = se32((t as u32) << (s & 0x1f));
            cpu.regs.set(rd(word), v);
            Ok(1)
        }
        0x06 => {
            let v = se32((t as u32) >> (s & 0x1f));
            cpu.regs.set(rd(word), v);
            Ok(1)
        }
        0x07 => {
            let v = se32(((t as i32) >> (s & 0x1f)) as u32);
            cpu.regs.set(rd(word), v);
            Ok(1)
        }
        0x08 => {
            // JR
            if s & 0x3 != 0 {
                return Err(Exception::AddressErrorLoadFetch);
            }
            cpu.regs.pending_jump = Some(s);
            Ok(1)
        }
        0x09 => {
            // JALR
            if s & 0x3 != 0 {
                return Err(Exception::AddressErrorLoadFetch);
            }
            let link_reg = rd(word);
            cpu.regs.set(if link_reg == 0 { 31 } else { link_reg }, pc.wrapping_add(8));
            cpu.regs.pending_jump = Some(s);
            Ok(1)
        }
        0x0c => Err(Exception::Syscall),
        0x0d => Err(Exception::Breakpoint),
        0x0f => Ok(1), // SYNC
        0x10 => {
            cpu.regs.set(rd(word), cpu.regs.hi);
            Ok(1)
        }
        0x11 => {
            cpu.regs.hi = s;
            Ok(1)
        }
        0x12 => {
            cpu.regs.set(rd(word), cpu.regs.lo);
            Ok(1)
        }
        0x13 => {
            cpu.regs.lo = s;
            Ok(1)
        }
        0x14 => {
            // DSLLV
            cpu.regs.set(rd(word), t << (s & 0x3f));
            Ok(1)
        }
        0x16 => {
            cpu.regs.set(rd(word), t >> (s & 0x3f));
            Ok(1)
        }
        0x17 => {
            cpu.regs.set(rd(word), ((t as i64) >> (s & 0x3f)) as u64);
            Ok(1)
        }
        0x18 => {
            // MULT
            let r = (s as i32 as i64) * (t as i32 as i64);
            cpu.regs.lo = se32(r as u32);
            cpu.regs.hi = se32((r >> 32) as u32);
            Ok(5)
        }
        0x19 => {
            let r = (s as u32 as u64) * (t as u32 as u64);
            cpu.regs.lo = se32(r as u32);
            cpu.regs.hi = se32((r >> 32) as u32);
            Ok(5)
        }
        0x1a => {
            // DIV
            let (n, d) = (s as i32, t as i32);
            if d == 0 {
                cpu.regs.lo = se32(if n >= 0 { u32::MAX } else { 1 });
                cpu.regs.hi = se32(n as u32);
            } else {
                cpu.regs.lo = se32((n.wrapping_div(d)) as u32);
                cpu.regs.hi = se32((n.wrapping_rem(d)) as u32);
            }
            Ok(37)
        }
        0x1b => {
            let (n, d) = (s as u32, t as u32);
            if d == 0 {
                cpu.regs.lo = se32(u32::MAX);
                cpu.regs.hi = se32(n);
            } else {
                cpu.regs.lo = se32(n / d);
                cpu.regs.hi = se32(n % d);
            }
            Ok(37)
        }
        0x1c => {
            // DMULT
            let r = (s as i64 as i128) * (t as i64 as i128);
            cpu.regs.lo = r as u64;
            cpu.regs.hi = (r >> 64) as u64;
            Ok(8)
        }
        0x1d => {
            let r = (s as u128) * (t as u128);
            cpu.regs.lo = r as u64;
            cpu.regs.hi = (r >> 64) as u64;
            Ok(8)
        }
        0x1e => {
            if t == 0 {
                cpu.regs.lo = if (s as i64) >= 0 { u64::MAX } else { 1 };
                cpu.regs.hi = s;
            } else {
                cpu.regs.lo = ((s as i64).wrapping_div(t as i64)) as u64;
                cpu.regs.hi = ((s as i64).wrapping_rem(t as i64)) as u64;
            }
            Ok(69)
        }
        0x1f => {
            if t == 0 {
                cpu.regs.lo = u64::MAX;
                cpu.regs.hi = s;
            } else {
                cpu.regs.lo = s / t;
                cpu.regs.hi = s % t;
            }
            Ok(69)
        }
        0x20 => {
            // ADD
            match checked_add32(s as u32, t as u32) {
                Some(r) => {
                    cpu.regs.set(rd(word), se32(r));
                    Ok(1)
                }
                None => Err(Exception::IntegerOverflow),
            }
        }
        0x21 => {
            cpu.regs.set(rd(word), se32((s as u32).wrapping_add(t as u32)));
            Ok(1)
        }
        0x22 => match checked_sub32(s as u32, t as u32) {
            Some(r) => {
                cpu.regs.set(rd(word), se32(r));
                Ok(1)
            }
            None => Err(Exception::IntegerOverflow),
        },
        0x23 => {
            cpu.regs.set(rd(word), se32((s as u32).wrapping_sub(t as u32)));
            Ok(1)
        }
        0x24 => {
            cpu.regs.set(rd(word), s & t);
            Ok(1)
        }
        0x25 => {
            cpu.regs.set(rd(word), s | t);
            Ok(1)
        }
        0x26 => {
            cpu.regs.set(rd(word), s ^ t);
            Ok(1)
        }
        0x27 => {
            cpu.regs.set(rd(word), !(s | t));
            Ok(1)
        }
        0x2a => {
            cpu.regs.set(rd(word), ((s as i64) < (t as i64)) as u64);
            Ok(1)
        }
        0x2b => {
            cpu.regs.set(rd(word), (s < t) as u64);
            Ok(1)
        }
        0x2c => match checked_add64(s, t) {
            Some(r) => {
                cpu.regs.set(rd(word), r);
                Ok(1)
            }
            None => Err(Exception::IntegerOverflow),
        },
        0x2d => {
            cpu.regs.set(rd(word), s.wrapping_add(t));
            Ok(1)
        }
        0x2e => match checked_sub64(s, t) {
            Some(r) => {
                cpu.regs.set(rd(word), r);
                Ok(1)
            }
            None => Err(Exception::IntegerOverflow),
        },
        0x2f => {
            cpu.regs.set(rd(word), s.wrapping_sub(t));
            Ok(1)
        }
        0x38 => {
            cpu.regs.set(rd(word), t << ((sa(word) as u32) + 32));
            Ok(1)
        }
        0x3a => {
            cpu.regs.set(rd(word), t >> ((sa(word) as u32) + 32));
            Ok(1)
        }
        0x3b => {
            cpu.regs.set(rd(word), ((t as i64) >> ((sa(word) as u32) + 32)) as u64);
            Ok(1)
        }
        _ => Err(Exception::ReservedInstruction),
    }
}

fn require_cop0(cpu: &Cpu) -> Result<(), Exception> {
    if cpu.cp0.status.cu() & 1 == 0 && cpu.cp0.status.ksu() != 0 {
        Err(Exception::CoprocessorUnusable(0))
    } else {
        Ok(())
    }
}

fn execute_cop0(
    cpu: &mut Cpu,
    _bus: &mut Bus,
    mi: &mut MipsInterface,
    sched: &mut Scheduler,
    word: u32,
) -> Result<u64, Exception> {
    require_cop0(cpu)?;
    let sub = rs(word);
    match sub {
        0x00 => {
            // MFC0
            let v = cpu.cp0.read(rd(word));
            cpu.regs.set(rt(word), se32(v as u32));
            Ok(1)
        }
        0x01 => {
            // DMFC0
            let v = cpu.cp0.read(rd(word));
            cpu.regs.set(rt(word), v);
            Ok(1)
        }
        0x04 => {
            // MTC0
            let v = cpu.regs.get(rt(word)) as u32 as u64;
            cpu.cp0.write(rd(word), v);
            if rd(word) == 11 {
                mi.pending(); // interrupts rechecked at call site; Compare write rearms externally
                let delta = cpu.cp0.compare.wrapping_sub(cpu.cp0.count) as u64;
                sched.change_event_time(EventKind::CpuCompare, sched.clock + delta.max(1) as u64 * 2);
            }
            Ok(1)
        }
        0x05 => {
            // DMTC0
            let v = cpu.regs.get(rt(word));
            cpu.cp0.write(rd(word), v);
            Ok(1)
        }
        0x10 => {
            // COP0 function group (funct field)
            match funct(word) {
                0x01 => {
                    // TLBR
                    let idx = cpu.cp0.index.index() as usize;
                    cpu.tlb.read_into_cp0(idx, &mut cpu.cp0);
                    Ok(1)
                }
                0x02 => {
                    // TLBWI
                    let idx = cpu.cp0.index.index() as usize;
                    cpu.tlb.write_from_cp0(idx, &cpu.cp0);
                    Ok(1)
                }
                0x06 => {
                    // TLBWR
                    let idx = cpu.cp0.random as usize;
                    cpu.tlb.write_from_cp0(idx, &cpu.cp0);
                    Ok(1)
                }
                0x08 => {
                    // TLBP
                    match cpu.tlb.probe(cpu.cp0.entry_hi) {
                        Some(idx) => {
                            let mut index = cpu.cp0.index;
                            index.set_index(idx as u8);
                            index.set_probe_failed(false);
                            cpu.cp0.index = index;
                        }
                        None => cpu.cp0.index.set_probe_failed(true),
                    }
                    Ok(1)
                }
                0x18 => {
                    // ERET
                    cpu.eret()?;
                    Ok(1)
                }
                _ => Err(Exception::ReservedInstruction),
            }
        }
        _ => Err(Exception::ReservedInstruction),
    }
}

fn execute_cop1(cpu: &mut Cpu, word: u32) -> Result<u64, Exception> {
    if cpu.cp0.status.cu() & 0x2 == 0 {
        return Err(Exception::CoprocessorUnusable(1));
    }
    let fr1 = cpu.cp0.status.fr();
    let sub = rs(word);
    match sub {
        0x00 => {
            let v = cpu.fpu.read_word(rd(word), fr1);
            cpu.regs.set(rt(word), se32(v as u32));
            Ok(1)
        }
        0x01 => {
            let v = cpu.fpu.read_long(rd(word), fr1);
            cpu.regs.set(rt(word), v as u64);
            Ok(1)
        }
        0x02 => {
            // CFC1 (only FCR31 and FCR0 meaningfully modelled)
            let v = if rd(word) == 31 { cpu.fpu.fcr31.0 } else { 0 };
            cpu.regs.set(rt(word), se32(v));
            Ok(1)
        }
        0x04 => {
            let v = cpu.regs.get(rt(word)) as i32;
            cpu.fpu.write_word(rd(word), fr1, v);
            Ok(1)
        }
        0x05 => {
            let v = cpu.regs.get(rt(word)) as i64;
            cpu.fpu.write_long(rd(word), fr1, v);
            Ok(1)
        }
        0x06 => {
            if rd(word) == 31 {
                cpu.fpu.fcr31.0 = cpu.regs.get(rt(word)) as u32;
            }
            Ok(1)
        }
        0x08 => {
            // BC1T/F/TL/FL
            let c = cpu.fpu.fcr31.c();
            let nd = rt(word) & 0x2 != 0;
            let tf = rt(word) & 0x1 != 0;
            let taken = c == tf;
            Ok(branch_cop1(cpu, word, taken, nd)?)
        }
        0x10 | 0x11 | 0x14 | 0x15 => execute_cop1_compute_inner(cpu, word),
        _ => Err(Exception::ReservedInstruction),
    }
}

fn branch_cop1(cpu: &mut Cpu, word: u32, taken: bool, likely: bool) -> Result<u64, Exception> {
    // `cpu.regs.pc` already holds pc+4 (the delay slot address) by the time
    // this runs, since the step loop advances it before dispatch; recover
    // the branch's own pc from that.
    let pc = cpu.regs.pc.wrapping_sub(4);
    branch(cpu, word, pc, taken, likely)
}

fn execute_cop1_compute_inner(cpu: &mut Cpu, word: u32) -> Result<u64, Exception> {
    let fmt = rs(word);
    let ft = rt(word);
    let fs = rd(word);
    let fd = sa(word);
    let f = funct(word);
    let fr1 = cpu.cp0.status.fr();

    let is_double = fmt == 17;
    let is_word = fmt == 20;
    let is_long = fmt == 21;

    macro_rules! as_f64 {
        ($idx:expr) => {
            if is_double {
                cpu.fpu.read_double($idx, fr1)
            } else if is_word {
                cpu.fpu.read_word($idx, fr1) as f64
            } else if is_long {
                cpu.fpu.read_long($idx, fr1) as f64
            } else {
                cpu.fpu.read_single($idx, fr1) as f64
            }
        };
    }

    macro_rules! store_f64 {
        ($idx:expr, $v:expr) => {
            if is_double {
                cpu.fpu.write_double($idx, fr1, $v);
            } else {
                cpu.fpu.write_single($idx, fr1, $v as f32);
            }
        };
    }

    let raise_if = |cpu: &mut Cpu, cause: u8, unimpl: bool| -> Result<(), Exception> {
        if cpu.fpu.finish_op(cause, unimpl) {
            Err(Exception::FloatingPoint)
        } else {
            Ok(())
        }
    };

    match f {
        0x00 | 0x01 | 0x02 | 0x03 => {
            // ADD SUB MUL DIV
            let a = as_f64!(fs);
            let b = as_f64!(ft);
            let (r, cause) = match f {
                0x00 => (a + b, 0),
                0x01 => (a - b, 0),
                0x02 => (a * b, 0),
                0x03 => {
                    let cause = if b == 0.0 { super::fpu::CAUSE_DIV_ZERO } else { 0 };
                    (a / b, cause)
                }
                _ => unreachable!(),
            };
            store_f64!(fd, r);
            raise_if(cpu, cause, false)?;
            Ok(if f == 0x03 { 29 } else if f == 0x02 { 29 } else { 3 })
        }
        0x04 => {
            store_f64!(fd, as_f64!(fs).sqrt());
            raise_if(cpu, 0, false)?;
            Ok(29)
        }
        0x05 => {
            store_f64!(fd, as_f64!(fs).abs());
            Ok(1)
        }
        0x06 => {
            store_f64!(fd, as_f64!(fs));
            Ok(1)
        }
        0x07 => {
            store_f64!(fd, -as_f64!(fs));
            Ok(1)
        }
        0x20 => {
            // CVT.S
            let v = as_f64!(fs) as f32;
            cpu.fpu.write_single(fd, fr1, v);
            raise_if(cpu, 0, is_word || is_long)?;
            Ok(2)
        }
        0x21 => {
            let v = as_f64!(fs);
            cpu.fpu.write_double(fd, fr1, v);
            raise_if(cpu, 0, is_word || is_long)?;
            Ok(2)
        }
        0x24 | 0x0c | 0x0d | 0x0e | 0x0f => {
            // CVT.W / ROUND/TRUNC/CEIL/FLOOR.W
            let rm = match f {
                0x0c => 0,
                0x0d => 1,
                0x0e => 2,
                0x0f => 3,
                _ => cpu.fpu.fcr31.rounding_mode(),
            };
            let (v, cause) = fpu::cvt_to_word(as_f64!(fs), rm);
            cpu.fpu.write_word(fd, fr1, v);
            raise_if(cpu, cause, true)?;
            Ok(5)
        }
        0x25 | 0x08 | 0x09 | 0x0a | 0x0b => {
            let rm = match f {
                0x08 => 0,
                0x09 => 1,
                0x0a => 2,
                0x0b => 3,
                _ => cpu.fpu.fcr31.rounding_mode(),
            };
            let (v, cause) = fpu::cvt_to_long(as_f64!(fs), rm);
            cpu.fpu.write_long(fd, fr1, v);
            raise_if(cpu, cause, true)?;
            Ok(5)
        }
        0x30..=0x3f => {
            // C.cond.fmt
            let cond_idx = f & 0xf;
            let cond = [
                Cond::F, Cond::Un, Cond::Eq, Cond::Ueq, Cond::Olt, Cond::Ult, Cond::Ole, Cond::Ule,
                Cond::Sf, Cond::Ngle, Cond::Seq, Cond::Ngl, Cond::Lt, Cond::Nge, Cond::Le, Cond::Ngt,
            ][cond_idx as usize];
            let (result, cause) = fpu::compare(cond, as_f64!(fs), as_f64!(ft));
            cpu.fpu.fcr31.set_c(result);
            if cause & CAUSE_INVALID != 0 {
                raise_if(cpu, cause, false)?;
            }
            Ok(1)
        }
        _ => Err(Exception::ReservedInstruction),
    }
}

fn load(cpu: &mut Cpu, bus: &mut Bus, word: u32, op: u8) -> Result<u64, Exception> {
    let base = cpu.regs.get(rs(word));
    let vaddr = base.wrapping_add(simm16(word) as u64);
    match op {
        0x20 => {
            let v = cpu.read_mem(bus, vaddr, Size::Byte)?;
            cpu.regs.set(rt(word), (v as u8) as i8 as i64 as u64);
        }
        0x24 => {
            let v = cpu.read_mem(bus, vaddr, Size::Byte)?;
            cpu.regs.set(rt(word), v as u8 as u64);
        }
        0x21 => {
            let v = cpu.read_mem(bus, vaddr, Size::Half)?;
            cpu.regs.set(rt(word), (v as u16) as i16 as i64 as u64);
        }
        0x25 => {
            let v = cpu.read_mem(bus, vaddr, Size::Half)?;
            cpu.regs.set(rt(word), v as u16 as u64);
        }
        0x23 => {
            let v = cpu.read_mem(bus, vaddr, Size::Word)?;
            cpu.regs.set(rt(word), se32(v as u32));
        }
        0x27 => {
            let v = cpu.read_mem(bus, vaddr, Size::Word)?;
            cpu.regs.set(rt(word), v as u32 as u64);
        }
        0x37 => {
            let v = cpu.read_mem(bus, vaddr, Size::Double)?;
            cpu.regs.set(rt(word), v);
        }
        0x30 => {
            // LL
            let v = cpu.read_mem(bus, vaddr, Size::Word)?;
            let (paddr, _) = cpu.translate(vaddr, super::AccessKind::Load)?;
            cpu.regs.ll_addr = paddr >> 4;
            cpu.regs.ll_bit = true;
            cpu.regs.set(rt(word), se32(v as u32));
        }
        0x34 => {
            let v = cpu.read_mem(bus, vaddr, Size::Double)?;
            let (paddr, _) = cpu.translate(vaddr, super::AccessKind::Load)?;
            cpu.regs.ll_addr = paddr >> 4;
            cpu.regs.ll_bit = true;
            cpu.regs.set(rt(word), v);
        }
        0x22 | 0x26 => unaligned_load(cpu, bus, word, vaddr, op)?,
        _ => return Err(Exception::ReservedInstruction),
    }
    Ok(1)
}

fn unaligned_load(cpu: &mut Cpu, bus: &mut Bus, word: u32, vaddr: u64, op: u8) -> Result<(), Exception> {
    let aligned = vaddr & !0x3;
    let data = cpu.read_mem(bus, aligned, Size::Word)? as u32;
    let byte = (vaddr & 0x3) as u32;
    let rt_val = cpu.regs.get(rt(word)) as u32;
    let result = match op {
        0x22 => {
            // LWL: merges the high (32 - shift) bits of the loaded word into
            // the high bits of rt, keeping rt's low `shift` bits.
            let shift = 8 * byte;
            let mask = u32::MAX << shift;
            (rt_val & !mask) | (data << shift)
        }
        0x26 => {
            // LWR: merges the low (32 - shift) bits of the loaded word into
            // the low bits of rt, keeping rt's high `shift` bits.
            let shift = 8 * (3 - byte);
            let mask = if shift == 32 { 0 } else { u32::MAX >> shift };
            (rt_val & !mask) | (data >> shift)
        }
        _ => unreachable!(),
    };
    cpu.regs.set(rt(word), se32(result));
    Ok(())
}

fn store(cpu: &mut Cpu, bus: &mut Bus, word: u32, op: u8) -> Result<u64, Exception> {
    let base = cpu.regs.get(rs(word));
    let vaddr = base.wrapping_add(simm16(word) as u64);
    let t = cpu.regs.get(rt(word));
    match op {
        0x28 => cpu.write_mem(bus, vaddr, Size::Byte, t)?,
        0x29 => cpu.write_mem(bus, vaddr, Size::Half, t)?,
        0x2b => cpu.write_mem(bus, vaddr, Size::Word, t)?,
        0x3f => cpu.write_mem(bus, vaddr, Size::Double, t)?,
        0x38 => {
            // SC
            if cpu.regs.ll_bit {
                cpu.write_mem(bus, vaddr, Size::Word, t)?;
                cpu.regs.set(rt(word), 1);
            } else {
                cpu.regs.set(rt(word), 0);
            }
        }
        0x3c => {
            if cpu.regs.ll_bit {
                cpu.write_mem(bus, vaddr, Size::Double, t)?;
                cpu.regs.set(rt(word), 1);
            } else {
                cpu.regs.set(rt(word), 0);
            }
        }
        0x2a | 0x2e => unaligned_store(cpu, bus, word, vaddr, op, t as u32)?,
        _ => return Err(Exception::ReservedInstruction),
    }
    Ok(1)
}

fn unaligned_store(cpu: &mut Cpu, bus: &mut Bus, _word: u32, vaddr: u64, op: u8, rt_val: u32) -> Result<(), Exception> {
    let aligned = vaddr & !0x3;
    let existing = cpu.read_mem(bus, aligned, Size::Word)? as u32;
    let byte = (vaddr & 0x3) as u32;
    let merged = match op {
        0x2a => {
            // SWL: the high `shift` bits of rt overwrite the low bits of
            // the stored word; the word's high bits are preserved.
            let shift = 8 * byte;
            let mask = u32::MAX << shift;
            (existing & mask) | (rt_val >> shift)
        }
        0x2e => {
            // SWR: the low (32 - shift) bits of rt overwrite the high bits
            // of the stored word; the word's low bits are preserved.
            let shift = 8 * (3 - byte);
            let mask = if shift == 32 { 0 } else { u32::MAX >> shift };
            (existing & mask) | (rt_val << shift)
        }
        _ => existing,
    };
    cpu.write_mem(bus, aligned, Size::Word, merged as u64)
}

fn cop_mem(cpu: &mut Cpu, bus: &mut Bus, word: u32, op: u8, store_op: bool) -> Result<u64, Exception> {
    let base = cpu.regs.get(rs(word));
    let vaddr = base.wrapping_add(simm16(word) as u64);
    let fr1 = cpu.cp0.status.fr();
    let reg = rt(word);
    if store_op {
        match op {
            0x31 => {
                let v = cpu.fpu.read_word(reg, fr1) as u32;
                cpu.write_mem(bus, vaddr, Size::Word, v as u64)?;
            }
            0x35 => {
                let v = cpu.fpu.read_long(reg, fr1) as u64;
                cpu.write_mem(bus, vaddr, Size::Double, v)?;
            }
            _ => return Err(Exception::ReservedInstruction),
        }
    } else {
        match op {
            0x39 => {
                let v = cpu.read_mem(bus, vaddr, Size::Word)? as i32;
                cpu.fpu.write_word(reg, fr1, v);
            }
            0x3d => {
                let v = cpu.read_mem(bus, vaddr, Size::Double)? as i64;
                cpu.fpu.write_long(reg, fr1, v);
            }
            _ => return Err(Exception::ReservedInstruction),
        }
    }
    Ok(1)
}

pub fn cache_op(cpu: &mut Cpu, bus: &mut Bus, vaddr: u64, sub_op: u8) -> Result<(), Exception> {
    let (paddr, _) = cpu.translate(vaddr, super::AccessKind::Load)?;
    let which_cache = sub_op & 0x3;
    let op = sub_op >> 2;
    if which_cache == 0 {
        cpu.icache.op(op, paddr, bus);
    } else {
        cpu.dcache.op(op, paddr, bus);
    }
    Ok(())
}

