use clap::Parser;
use log::{error, info};
use n64_core::memory::try_load_rom;
use n64_core::Emulator;
use std::process::ExitCode;

/// Headless N64 core runner: boots a ROM through a PIF image and runs it
/// for a fixed cycle budget, logging machine state instead of presenting
/// a window. Presentation/audio/input are left at their no-op defaults;
/// a real frontend would call `Emulator::set_backend`/`set_audio_sink`/
/// `set_input_source` before driving the same `run_cycles` loop.
#[derive(Parser, Debug)]
#[command(name = "n64emu", about = "Cycle-budgeted N64 core runner")]
struct Args {
    /// Path to the cartridge ROM image (.z64, big-endian)
    rom: String,

    /// Path to the 2 KiB PIF boot ROM image
    #[arg(long)]
    pif: String,

    /// Total CPU cycles to run before exiting
    #[arg(long, default_value_t = 93_750 * 60)]
    cycles: u64,

    /// CPU cycles run per `run_cycles` call (controls log granularity only)
    #[arg(long, default_value_t = 93_750)]
    slice: u64,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let rom = match try_load_rom(&args.rom) {
        Ok(rom) => rom,
        Err(e) => {
            error!("failed to load ROM: {e}");
            return ExitCode::FAILURE;
        }
    };
    let pif_rom = match std::fs::read(&args.pif) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to load PIF image '{}': {e}", args.pif);
            return ExitCode::FAILURE;
        }
    };

    let mut emulator = match Emulator::new(rom, pif_rom) {
        Ok(emulator) => emulator,
        Err(e) => {
            error!("boot failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut spent = 0u64;
    while spent < args.cycles {
        let slice = args.slice.min(args.cycles - spent);
        spent += emulator.run_cycles(slice);
        info!("ran {spent}/{} cycles", args.cycles);
    }

    ExitCode::SUCCESS
}
