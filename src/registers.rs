use crate::error::{Chip8Error, Result};
use crate::memory::CHIP8_PROGRAM_ADDR;

/// the canonical call stack limit
pub const CHIP8_STACK_DEPTH: usize = 16;

/// I is 16 bits wide but only 12 of them ever address anything
pub const INDEX_MASK: u16 = 0x0fff;

/// flag register
pub const VF: u8 = 0xf;

/// V0-VF, I, PC and the call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    v: [u8; 16],
    i: u16,
    pub pc: u16,
    stack: Vec<u16>,
}

impl Default for RegisterFile {
    fn default() -> Self {
        RegisterFile {
            v: [0; 16],
            i: 0,
            pc: CHIP8_PROGRAM_ADDR,
            stack: Vec::with_capacity(CHIP8_STACK_DEPTH),
        }
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// read Vx; only the low nibble of `x` is used, so this never fails
    pub fn v(&self, x: u8) -> u8 {
        self.v[(x & 0x0f) as usize]
    }

    pub fn set_v(&mut self, x: u8, value: u8) {
        self.v[(x & 0x0f) as usize] = value;
    }

    pub fn set_flag(&mut self, flag: bool) {
        self.v[VF as usize] = flag as u8;
    }

    /// step over the next instruction when `condition` holds
    pub fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    pub fn all_v(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    /// set I, keeping it inside the 12-bit address space
    pub fn set_i(&mut self, value: u16) {
        self.i = value & INDEX_MASK;
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    /// push a return address; a full stack is an overflow
    pub fn push_return(&mut self, addr: u16) -> Result<()> {
        if self.stack.len() >= CHIP8_STACK_DEPTH {
            return Err(Chip8Error::StackOverflow { pc: self.pc });
        }
        self.stack.push(addr);
        Ok(())
    }

    pub fn pop_return(&mut self) -> Result<u16> {
        self.stack
            .pop()
            .ok_or(Chip8Error::StackUnderflow { pc: self.pc })
    }

    /// rebuild from snapshot parts; sizes are checked by the caller
    pub(crate) fn from_parts(v: [u8; 16], i: u16, pc: u16, stack: Vec<u16>) -> Self {
        RegisterFile { v, i, pc, stack }
    }
}
