use crate::error::{Chip8Error, Result};
use log::info;
use std::io;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: usize = 4096;

/// where the program is loaded
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

/// largest program that fits between the program address and top of RAM
pub const CHIP8_MAX_PROGRAM_BYTES: usize = CHIP8_RAM_SIZE_BYTES - CHIP8_PROGRAM_ADDR as usize;

/// where the hex digit glyphs live; each glyph is this many bytes
pub const CHIP8_FONT_ADDR: u16 = 0x000;
pub const CHIP8_FONT_GLYPH_BYTES: u16 = 5;

/// Represents the byte-addressed store. Every access is bounds checked; there
/// is no wraparound.
pub trait MemoryMap {
    /// how many bytes are addressable
    fn len(&self) -> usize;

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8]>;

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8]>;

    fn read_byte(&self, addr: u16) -> Result<u8> {
        Ok(self.get_ro_slice(addr, 1)?[0])
    }

    fn write_byte(&mut self, addr: u16, value: u8) -> Result<()> {
        self.get_rw_slice(addr, 1)?[0] = value;
        Ok(())
    }

    /// get a big-endian two-byte word (opcodes)
    fn read_word(&self, addr: u16) -> Result<u16> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(u16::from_be_bytes([word[0], word[1]]))
    }

    /// write a chunk of bytes into "RAM"; all-or-nothing
    fn write(&mut self, data: &[u8], addr: u16) -> Result<()> {
        self.get_rw_slice(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Standard CHIP-8 memory map: glyph table at 0x000, program from 0x200.
#[derive(Clone, PartialEq, Eq)]
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
}

impl std::fmt::Debug for Chip8MemoryMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 4k of hex is no use to anyone
        f.debug_struct("Chip8MemoryMap")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// bounds check shared by the slice accessors; returns the exclusive end
fn checked_range(addr: u16, len: usize, size: usize) -> Result<usize> {
    let start = addr as usize;
    if start >= size {
        return Err(Chip8Error::OutOfBoundsMemory { addr: start });
    }
    match start.checked_add(len) {
        Some(end) if end <= size => Ok(end),
        // report the first byte that fell off the end
        _ => Err(Chip8Error::OutOfBoundsMemory { addr: size }),
    }
}

impl MemoryMap for Chip8MemoryMap {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8]> {
        let end = checked_range(addr, len, self.bytes.len())?;
        Ok(&self.bytes[addr as usize..end])
    }

    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8]> {
        let end = checked_range(addr, len, self.bytes.len())?;
        Ok(&mut self.bytes[addr as usize..end])
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip8MemoryMap {
    /// initialises memory with the font baked in and everything else zeroed
    pub fn new() -> Self {
        let mut bytes = vec![0u8; CHIP8_RAM_SIZE_BYTES].into_boxed_slice();
        let font = CHIP8_FONT_ADDR as usize;
        bytes[font..font + CHIP8_FONT.len()].copy_from_slice(&CHIP8_FONT);
        Chip8MemoryMap { bytes }
    }

    /// rebuild from a raw image, e.g. a snapshot; must be exactly 4k
    pub fn from_image(image: &[u8]) -> Option<Self> {
        if image.len() != CHIP8_RAM_SIZE_BYTES {
            return None;
        }
        Some(Chip8MemoryMap {
            bytes: image.to_vec().into_boxed_slice(),
        })
    }

    /// the whole 4k, for snapshots
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// load a CHIP-8 program at 0x200
    pub fn load_program(&mut self, program: &[u8]) -> Result<()> {
        if program.len() > CHIP8_MAX_PROGRAM_BYTES {
            return Err(Chip8Error::RomTooLarge {
                len: program.len(),
                max: CHIP8_MAX_PROGRAM_BYTES,
            });
        }
        self.write(program, CHIP8_PROGRAM_ADDR)?;
        info!(
            "loaded {} byte program at {:#05x}",
            program.len(),
            CHIP8_PROGRAM_ADDR
        );
        Ok(())
    }

    /// write unknown len of data into memory at the program address
    pub fn load_program_from(&mut self, reader: &mut impl io::Read) -> Result<()> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.load_program(&buf)
    }
}

/// address of the glyph for hex digit `digit`; digits above 0xf land past
/// the glyph table but never outside memory
pub fn glyph_addr(digit: u8) -> u16 {
    CHIP8_FONT_ADDR + digit as u16 * CHIP8_FONT_GLYPH_BYTES
}

const CHIP8_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
