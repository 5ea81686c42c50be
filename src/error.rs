use std::io;
use thiserror::Error;

/// Everything that can go wrong inside the machine, plus the I/O the
/// front-end does around it.
#[derive(Debug, Error)]
pub enum Chip8Error {
    /// memory access outside 0x000..=0xfff
    #[error("memory access out of bounds at {addr:#06x}")]
    OutOfBoundsMemory { addr: usize },

    #[error("program of {len} bytes does not fit in memory (max {max} bytes)")]
    RomTooLarge { len: usize, max: usize },

    #[error("call stack overflow at pc {pc:#05x}")]
    StackOverflow { pc: u16 },

    #[error("return with empty call stack at pc {pc:#05x}")]
    StackUnderflow { pc: u16 },

    /// only ever surfaced when the driver runs in strict mode; the engine
    /// itself treats unknown opcodes as a no-op
    #[error("unknown opcode {opcode:#06x} at pc {pc:#05x}")]
    UnknownOpcode { opcode: u16, pc: u16 },

    #[error("incompatible snapshot: {0}")]
    IncompatibleSnapshot(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Chip8Error>;
