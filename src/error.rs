//! User-visible and fatal error taxonomy.
//!
//! CPU/RSP *exceptions* (§7 of the design) are not modelled here — they are
//! plain data threaded through the processor state (see [`crate::cpu::exceptions`]).
//! This module only covers the handful of conditions that the host process
//! or frontend needs to react to: a missing ROM, a malformed cartridge
//! header, an unreadable PIF/IPL ROM, or a savestate that doesn't match the
//! running configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("ROM file not found: {0}")]
    RomNotFound(String),

    #[error("ROM is too large ({size} bytes, maximum is {max} bytes)")]
    RomTooLarge { size: usize, max: usize },

    #[error("ROM is too small to contain a valid cartridge header ({0} bytes)")]
    RomTooSmall(usize),

    #[error("PIF boot ROM not found: {0}")]
    PifRomNotFound(String),

    #[error("PIF boot ROM has unexpected size ({0} bytes, expected 2048)")]
    PifRomBadSize(usize),

    #[error("unrecognized CIC seed for checksum 0x{0:06x}")]
    UnknownCic(u32),

    #[error("savestate is incompatible with the running configuration: {0}")]
    SavestateMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
