pub mod cache;
pub mod cp0;
pub mod decode;
pub mod execute;
pub mod exceptions;
pub mod fpu;
pub mod regs;
pub mod tlb;

use crate::memory::{Bus, Size};
use crate::mi::MipsInterface;
use crate::scheduler::{EventKind, Scheduler};
use cache::{DCache, ICache};
use cp0::Cp0;
use exceptions::Exception;
use fpu::Fpu;
use log::trace;
use regs::Regs;
use tlb::{Tlb, TlbLookupError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Load,
    Store,
    Fetch,
}

/// The full VR4300 aggregate: register file, CP0, TLB, caches, FPU. Threaded
/// by mutable reference through every instruction implementation; no hidden
/// globals.
pub struct Cpu {
    pub regs: Regs,
    pub cp0: Cp0,
    pub tlb: Tlb,
    pub icache: ICache,
    pub dcache: DCache,
    pub fpu: Fpu,
    pub halted: bool,
}

impl Cpu {
    pub fn new(reset_pc: u64) -> Self {
        Cpu {
            regs: Regs::new(reset_pc),
            cp0: Cp0::new(),
            tlb: Tlb::new(),
            icache: ICache::new(),
            dcache: DCache::new(),
            fpu: Fpu::new(),
            halted: false,
        }
    }

    fn is_64bit_addressing(&self) -> bool {
        if self.cp0.status.ksu() == 0 || self.cp0.status.exl() || self.cp0.status.erl() {
            self.cp0.status.kx()
        } else if self.cp0.status.ksu() == 1 {
            self.cp0.status.sx()
        } else {
            self.cp0.status.ux()
        }
    }

    /// Translates a virtual address to physical, per §4.4's mode table:
    /// User/Supervisor/Kernel x 32-bit/64-bit addressing, each with its own
    /// partition of unmapped cached/uncached ranges, TLB-mapped ranges, and
    /// illegal ranges that fault with AddressError.
    pub fn translate(&self, vaddr: u64, kind: AccessKind) -> Result<(u32, bool), Exception> {
        let is_write = kind == AccessKind::Store;
        let addr_error = match kind {
            AccessKind::Store => Exception::AddressErrorStore,
            _ => Exception::AddressErrorLoadFetch,
        };
        let ksu = self.cp0.status.ksu();
        let kernel_mode = ksu == 0 || self.cp0.status.exl() || self.cp0.status.erl();
        let supervisor_mode = !kernel_mode && ksu == 1;

        if self.is_64bit_addressing() {
            // Top two bits select one of the four 64-bit regions; this is
            // the same `region` field TLB entries match against.
            let region = ((vaddr >> 62) & 0x3) as u8;
            match region {
                0 => {} // XKUSEG: mapped, reachable from every mode.
                1 => {
                    // XKSSEG: mapped, supervisor and kernel only.
                    if !kernel_mode && !supervisor_mode {
                        return Err(addr_error);
                    }
                }
                2 => {
                    // XKPHYS: kernel only, unmapped. Bits 61:59 select the
                    // cache attribute; the physical address is the low bits.
                    if !kernel_mode {
                        return Err(addr_error);
                    }
                    let cached = match (vaddr >> 59) & 0x7 {
                        0 => true,
                        2 => false,
                        _ => return Err(addr_error),
                    };
                    return Ok((vaddr as u32, cached));
                }
                3 => {
                    // XKSEG: mapped, kernel only.
                    if !kernel_mode {
                        return Err(addr_error);
                    }
                }
                _ => unreachable!(),
            }
            let asid = self.cp0.entry_hi.asid();
            return match self.tlb.translate(vaddr, asid, region, is_write) {
                Ok(ok) => Ok((ok.physical as u32, ok.cached)),
                Err(TlbLookupError::Miss) => Err(Exception::XtlbMiss),
                Err(TlbLookupError::Invalid) => Err(match kind {
                    AccessKind::Store => Exception::TlbInvalidStore,
                    _ => Exception::TlbInvalidLoadFetch,
                }),
                Err(TlbLookupError::Modification) => Err(Exception::TlbModification),
            };
        }

        let top = (vaddr >> 29) & 0x7;
        let low = vaddr as u32;
        if kernel_mode {
            if top == 4 {
                // KSEG0: 0x8000_0000-0x9FFF_FFFF, unmapped, cached.
                return Ok((low & 0x1fff_ffff, true));
            }
            if top == 5 {
                // KSEG1: 0xA000_0000-0xBFFF_FFFF, unmapped, uncached.
                return Ok((low & 0x1fff_ffff, false));
            }
            // kuseg (0x0000_0000-0x7FFF_FFFF) and kseg2/kseg3
            // (0xC000_0000-0xFFFF_FFFF) are mapped; fall through to the TLB.
        } else if supervisor_mode {
            // suseg and sseg only; kseg0/kseg1/kseg3 are kernel-only.
            let suseg = low < 0x8000_0000;
            let sseg = (0xc000_0000..0xe000_0000).contains(&low);
            if !(suseg || sseg) {
                return Err(addr_error);
            }
        } else if low >= 0x8000_0000 {
            // User mode: only useg (the low 2 GiB) is reachable.
            return Err(addr_error);
        }

        let asid = self.cp0.entry_hi.asid();
        let region = ((vaddr >> 62) & 0x3) as u8;
        match self.tlb.translate(vaddr, asid, region, is_write) {
            Ok(ok) => Ok((ok.physical as u32, ok.cached)),
            Err(TlbLookupError::Miss) => Err(match kind {
                AccessKind::Store => Exception::TlbMissStore,
                _ => Exception::TlbMissLoadFetch,
            }),
            Err(TlbLookupError::Invalid) => Err(match kind {
                AccessKind::Store => Exception::TlbInvalidStore,
                _ => Exception::TlbInvalidLoadFetch,
            }),
            Err(TlbLookupError::Modification) => Err(Exception::TlbModification),
        }
    }

    pub fn read_mem(&mut self, bus: &mut Bus, vaddr: u64, size: Size) -> Result<u64, Exception> {
        let align = size.bytes() as u64 - 1;
        if vaddr & align != 0 {
            return Err(Exception::AddressErrorLoadFetch);
        }
        let (paddr, _cached) = self.translate(vaddr, AccessKind::Load)?;
        if size == Size::Double && is_rcp_register_space(paddr) {
            crate::memory::unsupported_64bit_rcp_access(paddr, false);
            return Ok(bus.read(paddr, Size::Word));
        }
        Ok(bus.read(paddr, size))
    }

    pub fn write_mem(&mut self, bus: &mut Bus, vaddr: u64, size: Size, value: u64) -> Result<(), Exception> {
        let align = size.bytes() as u64 - 1;
        if vaddr & align != 0 {
            return Err(Exception::AddressErrorStore);
        }
        let (paddr, _cached) = self.translate(vaddr, AccessKind::Store)?;
        if size == Size::Double && is_rcp_register_space(paddr) {
            crate::memory::unsupported_64bit_rcp_access(paddr, true);
            bus.write(paddr, Size::Word, value);
            return Ok(());
        }
        // any store to a physical line we might have cached as LL's
        // reservation invalidates it, per the open-question ruling (§9).
        if (paddr >> 4) == self.regs.ll_addr {
            self.regs.ll_bit = false;
        }
        bus.write(paddr, size, value);
        Ok(())
    }

    pub fn fetch(&mut self, bus: &mut Bus, vaddr: u64) -> Result<u32, Exception> {
        if vaddr & 0x3 != 0 {
            return Err(Exception::AddressErrorLoadFetch);
        }
        let (paddr, cached) = self.translate(vaddr, AccessKind::Fetch)?;
        if cached {
            let mut dummy = 0u64;
            Ok(self.icache.fetch(paddr, bus, &mut dummy))
        } else {
            Ok(bus.read(paddr, Size::Word) as u32)
        }
    }

    /// One CPU step: fetch-decode-execute, delay-slot pipelining, interrupt
    /// check, Count advance. Returns the number of cycles charged.
    pub fn step(&mut self, bus: &mut Bus, mi: &mut MipsInterface, sched: &mut Scheduler) -> u64 {
        if self.halted {
            return 1;
        }
        let pc = self.regs.pc;
        let in_delay_slot = self.regs.pending_jump.is_some();
        self.regs.branch_delay_prev = in_delay_slot;

        let word = match self.fetch(bus, pc) {
            Ok(w) => w,
            Err(e) => {
                self.raise(e, pc, in_delay_slot);
                return 1;
            }
        };

        let next_pc = if let Some(target) = self.regs.pending_jump.take() {
            target
        } else {
            pc.wrapping_add(4)
        };
        self.regs.pc = next_pc;

        let cycles = match execute::execute(self, bus, mi, sched, word, pc, in_delay_slot) {
            Ok(c) => c,
            Err(e) => {
                self.raise(e, pc, in_delay_slot);
                1
            }
        };

        self.cp0.count = self.cp0.count.wrapping_add(1);
        if self.cp0.count == self.cp0.compare {
            self.cp0.cause.set_ip_hw(self.cp0.cause.ip_hw() | 0x20);
        }
        self.cp0.tick_random();
        self.check_interrupts(mi);
        cycles
    }

    pub fn check_interrupts(&mut self, mi: &MipsInterface) {
        let ip2 = mi.pending();
        self.cp0.cause.set_ip_hw((self.cp0.cause.ip_hw() & !0x04) | if ip2 { 0x04 } else { 0 });
        if self.cp0.status.ie() && !self.cp0.status.exl() && !self.cp0.status.erl() {
            let im = self.cp0.status.im();
            if self.cp0.cause.ip() & im != 0 {
                let pc = self.regs.pc;
                self.raise(Exception::Interrupt, pc, false);
            }
        }
    }

    pub fn raise(&mut self, exc: Exception, pc: u64, in_delay_slot: bool) {
        trace!("exception {:?} at pc={:#x} bd={}", exc, pc, in_delay_slot);
        if !self.cp0.status.exl() {
            self.cp0.cause.set_branch_delay(in_delay_slot);
            self.cp0.epc = if in_delay_slot { pc.wrapping_sub(4) } else { pc };
            self.cp0.status.set_exl(true);
        }
        // Fetch-time faults: the faulting address is `pc` itself. Load/store
        // faults would need the data vaddr threaded down from `execute`,
        // which `Result<_, Exception>` doesn't carry; BadVAddr is left
        // untouched for those (§9 open question, approximated).
        use exceptions::Exception::*;
        if matches!(exc, AddressErrorLoadFetch | TlbMissLoadFetch | TlbInvalidLoadFetch | XtlbMiss) {
            self.cp0.bad_vaddr = pc;
        }
        self.cp0.cause.set_exception_code(exc.exc_code());
        if let crate::cpu::exceptions::Exception::CoprocessorUnusable(cop) = exc {
            self.cp0.cause.set_ce(cop);
        }
        let vector = exceptions::vector(exc, self.cp0.status.rp(), true);
        self.regs.pc = vector;
        self.regs.pending_jump = None;
    }

    pub fn eret(&mut self) -> Result<(), Exception> {
        let target = if self.cp0.status.erl() {
            self.cp0.status.set_erl(false);
            self.cp0.error_epc
        } else {
            self.cp0.status.set_exl(false);
            self.cp0.epc
        };
        self.regs.ll_bit = false;
        if target & 0x3 != 0 {
            return Err(Exception::AddressErrorLoadFetch);
        }
        self.regs.pc = target;
        self.regs.pending_jump = None;
        Ok(())
    }
}

fn is_rcp_register_space(paddr: u32) -> bool {
    (0x0404_0000..0x0500_0000).contains(&paddr) || (0x0430_0000..0x0470_0000).contains(&paddr)
}

pub fn arm_compare_event(cp0: &Cp0, sched: &mut Scheduler, current_cycle: u64) {
    let delta = cp0.compare.wrapping_sub(cp0.count) as u64;
    sched.add_event(EventKind::CpuCompare, current_cycle + delta.max(1) * 2);
}
