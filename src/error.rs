//! Error types for the kernel core.
//!
//! Each module gets a small, explicit enum rather than a shared catch-all.
//! None of these are fatal on their own; the only fatal path in the whole
//! crate is the core-1 watchdog timeout handled in
//! [`crate::runtime::WatchdogMonitor`].

use core::fmt;

/// Failure modes of the clock/voltage ramp engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampError {
    /// The hardware accepted the probe but rejected the actual PLL
    /// reconfiguration. Never fatal: the caller clamps `target_khz` and
    /// moves on.
    PllSetFailed {
        /// The frequency, in kHz, that the probe judged achievable.
        attempted_khz: u32,
    },
    /// No achievable frequency was found within the probe's search radius.
    NoAchievableFrequency {
        /// The frequency, in kHz, that was requested.
        requested_khz: u32,
    },
}

impl fmt::Display for RampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RampError::PllSetFailed { attempted_khz } => {
                write!(f, "PLL edge: set_sys_clock({attempted_khz}) failed")
            }
            RampError::NoAchievableFrequency { requested_khz } => {
                write!(f, "no achievable PLL frequency near {requested_khz} kHz")
            }
        }
    }
}

/// Failure modes of the PIO driver surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PioError {
    /// Both state machine slots on the PIO block are already in use.
    NoFreeStateMachine,
    /// The requested program does not fit in the PIO instruction memory.
    ProgramTooLarge,
}

impl fmt::Display for PioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PioError::NoFreeStateMachine => write!(f, "no free PIO state machine"),
            PioError::ProgramTooLarge => write!(f, "PIO program too large"),
        }
    }
}

/// Failure modes of the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistError {
    /// The record's CRC did not match its bytes.
    CrcMismatch,
    /// The record's magic did not match the expected value.
    BadMagic,
    /// The caller's buffer was too small for the record.
    BufferTooSmall,
    /// The underlying flash/erase operation failed.
    FlashIo,
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::CrcMismatch => write!(f, "persisted record failed CRC check"),
            PersistError::BadMagic => write!(f, "persisted record has wrong magic"),
            PersistError::BufferTooSmall => write!(f, "buffer too small for record"),
            PersistError::FlashIo => write!(f, "flash read/write failed"),
        }
    }
}

/// Domain violations reported by shell command handlers.
///
/// These never mutate kernel state; the (external) shell driver turns them
/// into a usage line for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellError {
    /// A numeric argument fell outside its accepted range.
    OutOfRange,
    /// `gov set`/`gov tune` named a governor that is not registered.
    UnknownGovernor,
    /// `gov tune <gov> get/set` named a parameter the governor doesn't have.
    UnknownParameter,
    /// The command name itself was not recognized.
    UnknownCommand,
    /// `peek`/`poke` was given an address outside the allowed MMIO window,
    /// or one that isn't 4-byte aligned.
    BadAddress,
    /// A command that requires an argument didn't get one.
    MissingArgument,
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::OutOfRange => write!(f, "value out of range"),
            ShellError::UnknownGovernor => write!(f, "unknown governor"),
            ShellError::UnknownParameter => write!(f, "unknown parameter"),
            ShellError::UnknownCommand => write!(f, "unknown command"),
            ShellError::BadAddress => write!(f, "address out of range or misaligned"),
            ShellError::MissingArgument => write!(f, "missing argument"),
        }
    }
}
