//! Cycle-budgeted Nintendo 64 emulation core: VR4300 CPU/FPU/CP0/TLB, RSP
//! scalar+vector unit, an RDP command front-end, and the AI/VI/SI/PI/PIF
//! peripherals sitting on a shared physical bus. `Emulator` is the
//! host-facing entry point; everything else is organized the way the
//! hardware itself is organized, one module per functional block.

pub mod backend;
pub mod cart;
pub mod cpu;
pub mod dma;
pub mod error;
pub mod memory;
pub mod mi;
pub mod n64;
pub mod peripherals;
pub mod rdp;
pub mod rsp;
pub mod scheduler;

use backend::{AudioSink, InputSource, RdpBackend};
use error::CoreResult;

/// Host-facing wrapper around a booted `n64::Machine`. Construction can
/// fail (bad ROM/PIF image); once built, `run_cycles` is the only thing
/// that needs calling in a loop, with backend/audio/input hooks swapped in
/// ahead of time through the `set_*` methods.
pub struct Emulator {
    machine: n64::Machine,
}

impl Emulator {
    /// Boots `rom` through `pif_rom`, deriving CIC seed and reset PC from
    /// the cartridge header the way real hardware does at power-on.
    pub fn new(rom: Vec<u8>, pif_rom: Vec<u8>) -> CoreResult<Self> {
        let config = n64::boot(rom, pif_rom)?;
        Ok(Emulator { machine: n64::Machine::new(config) })
    }

    pub fn set_backend(&mut self, backend: Box<dyn RdpBackend>) {
        self.machine.backend = backend;
    }

    pub fn set_audio_sink(&mut self, sink: Box<dyn AudioSink>) {
        self.machine.audio = sink;
    }

    pub fn set_input_source(&mut self, input: Box<dyn InputSource>) {
        self.machine.input = input;
    }

    /// Runs the machine for up to `budget` CPU cycles, dispatching every
    /// scheduler event crossed along the way. Returns cycles actually run.
    pub fn run_cycles(&mut self, budget: u64) -> u64 {
        self.machine.run(budget)
    }

    pub fn machine(&self) -> &n64::Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut n64::Machine {
        &mut self.machine
    }
}
