use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::input::InputLatch;
use crate::memory::Chip8MemoryMap;
use crate::registers::RegisterFile;
use crate::timers::Timers;
use std::io;

/// Everything a running CHIP-8 program can observe or change. One owner;
/// the engine borrows it mutably for exactly one cycle at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineState {
    pub memory: Chip8MemoryMap,
    pub registers: RegisterFile,
    pub timers: Timers,
    pub framebuffer: Framebuffer,
    pub input: InputLatch,
}

impl MachineState {
    /// power-on state: font loaded, PC at 0x200, everything else zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_program(&mut self, program: &[u8]) -> Result<()> {
        self.memory.load_program(program)
    }

    pub fn load_program_from(&mut self, reader: &mut impl io::Read) -> Result<()> {
        self.memory.load_program_from(reader)
    }
}
