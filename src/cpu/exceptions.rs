// Closed exception taxonomy, static priority table, and vector selection.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    ColdReset,
    SoftReset,
    Nmi,
    AddressErrorLoadFetch,
    TlbMissLoadFetch,
    TlbInvalidLoadFetch,
    BusErrorFetch,
    Syscall,
    Breakpoint,
    CoprocessorUnusable(u8),
    ReservedInstruction,
    Trap,
    IntegerOverflow,
    FloatingPoint,
    AddressErrorStore,
    TlbMissStore,
    TlbInvalidStore,
    TlbModification,
    Watch,
    BusErrorStore,
    Interrupt,
    XtlbMiss,
}

impl Exception {
    /// Higher value = higher priority; matches §4.4's table.
    pub fn priority(&self) -> u8 {
        use Exception::*;
        match self {
            ColdReset => 20,
            SoftReset => 19,
            Nmi => 18,
            AddressErrorLoadFetch => 17,
            TlbMissLoadFetch | XtlbMiss => 16,
            TlbInvalidLoadFetch => 15,
            BusErrorFetch => 14,
            Syscall => 13,
            Breakpoint => 12,
            CoprocessorUnusable(_) => 11,
            ReservedInstruction => 10,
            Trap => 9,
            IntegerOverflow => 8,
            FloatingPoint => 7,
            AddressErrorStore => 6,
            TlbMissStore => 5,
            TlbInvalidStore => 4,
            TlbModification => 3,
            Watch => 2,
            BusErrorStore => 1,
            Interrupt => 0,
        }
    }

    pub fn exc_code(&self) -> u8 {
        use Exception::*;
        match self {
            Interrupt => 0,
            TlbModification => 1,
            TlbMissLoadFetch | XtlbMiss => 2,
            TlbMissStore => 3,
            AddressErrorLoadFetch => 4,
            AddressErrorStore => 5,
            BusErrorFetch => 6,
            BusErrorStore => 7,
            Syscall => 8,
            Breakpoint => 9,
            ReservedInstruction => 10,
            CoprocessorUnusable(_) => 11,
            IntegerOverflow => 12,
            Trap => 13,
            FloatingPoint => 15,
            TlbInvalidLoadFetch => 2,
            TlbInvalidStore => 3,
            Watch => 23,
            ColdReset | SoftReset | Nmi => 0,
        }
    }

    /// Picks the highest-priority exception from a set signalled in the
    /// same cycle; the rest are discarded for that cycle.
    pub fn pick(mut candidates: Vec<Exception>) -> Option<Exception> {
        candidates.sort_by_key(|e| std::cmp::Reverse(e.priority()));
        candidates.into_iter().next()
    }
}

pub fn vector(exc: Exception, bev: bool, tlb_refill_live: bool) -> u64 {
    use Exception::*;
    let base: u64 = if bev { 0xffff_ffff_bfc0_0200 } else { 0xffff_ffff_8000_0000 };
    match exc {
        ColdReset | SoftReset | Nmi => 0xffff_ffff_bfc0_0000,
        TlbMissLoadFetch | TlbMissStore if tlb_refill_live => base, // 0x000
        XtlbMiss if tlb_refill_live => base + 0x080,
        _ => base + 0x180,
    }
}
