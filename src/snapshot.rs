//! Save states.
//!
//! A snapshot is an explicit, versioned record of the whole [`MachineState`],
//! encoded as JSON. Restoring checks the tag, the version and every size
//! before it touches the live machine, so a bad file can't leave it half
//! loaded.

use crate::error::{Chip8Error, Result};
use crate::framebuffer::{Framebuffer, PACKED_BYTES};
use crate::input::InputLatch;
use crate::memory::{Chip8MemoryMap, CHIP8_RAM_SIZE_BYTES};
use crate::registers::{RegisterFile, CHIP8_STACK_DEPTH, INDEX_MASK};
use crate::state::MachineState;
use crate::timers::Timers;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const SNAPSHOT_FORMAT: &str = "chip8.snapshot";
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format: String,
    pub version: u32,
    pub memory: Vec<u8>,
    pub registers: Vec<u8>,
    pub index: u16,
    pub pc: u16,
    pub stack_depth: usize,
    pub stack: Vec<u16>,
    pub delay_timer: u8,
    pub sound_timer: u8,
    /// one bit per pixel, row-major, MSB leftmost
    pub framebuffer: Vec<u8>,
    pub keys: Vec<bool>,
}

fn incompatible(msg: impl Into<String>) -> Chip8Error {
    Chip8Error::IncompatibleSnapshot(msg.into())
}

fn expect_len(field: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(incompatible(format!(
            "{} has {} entries, expected {}",
            field, actual, expected
        )));
    }
    Ok(())
}

impl Snapshot {
    pub fn capture(state: &MachineState) -> Self {
        let regs = &state.registers;
        Snapshot {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            memory: state.memory.as_bytes().to_vec(),
            registers: regs.all_v().to_vec(),
            index: regs.i(),
            pc: regs.pc,
            stack_depth: regs.stack().len(),
            stack: regs.stack().to_vec(),
            delay_timer: state.timers.delay,
            sound_timer: state.timers.sound,
            framebuffer: state.framebuffer.to_packed().to_vec(),
            keys: state.input.as_array().to_vec(),
        }
    }

    /// check everything and build a fresh state; never touches a live one
    pub fn to_state(&self) -> Result<MachineState> {
        if self.format != SNAPSHOT_FORMAT {
            return Err(incompatible(format!("unknown format {:?}", self.format)));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(incompatible(format!(
                "version {} is not supported (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        expect_len("memory", self.memory.len(), CHIP8_RAM_SIZE_BYTES)?;
        expect_len("registers", self.registers.len(), 16)?;
        expect_len("stack", self.stack.len(), self.stack_depth)?;
        expect_len("framebuffer", self.framebuffer.len(), PACKED_BYTES)?;
        expect_len("keys", self.keys.len(), 16)?;
        if self.stack_depth > CHIP8_STACK_DEPTH {
            return Err(incompatible(format!(
                "stack depth {} exceeds {}",
                self.stack_depth, CHIP8_STACK_DEPTH
            )));
        }
        if self.index > INDEX_MASK {
            return Err(incompatible(format!("index {:#06x} out of range", self.index)));
        }

        let memory = Chip8MemoryMap::from_image(&self.memory)
            .ok_or_else(|| incompatible("memory image"))?;
        let framebuffer = Framebuffer::from_packed(&self.framebuffer)
            .ok_or_else(|| incompatible("framebuffer"))?;
        let mut v = [0u8; 16];
        v.copy_from_slice(&self.registers);
        let mut keys = [false; 16];
        keys.copy_from_slice(&self.keys);

        Ok(MachineState {
            memory,
            registers: RegisterFile::from_parts(v, self.index, self.pc, self.stack.clone()),
            timers: Timers {
                delay: self.delay_timer,
                sound: self.sound_timer,
            },
            framebuffer,
            input: InputLatch::from_array(keys),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| incompatible(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| incompatible(e.to_string()))
    }
}

impl MachineState {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self)
    }

    /// all-or-nothing: on error `self` is exactly as it was
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        *self = snapshot.to_state()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.snapshot().to_json()?)?;
        info!("state saved to {}", path.display());
        Ok(())
    }

    pub fn load(&mut self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path)?;
        self.restore(&Snapshot::from_json(&json)?)?;
        info!("state loaded from {}", path.display());
        Ok(())
    }
}
