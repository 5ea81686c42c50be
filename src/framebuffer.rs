//! The 64x32 monochrome bitmap and the XOR sprite draw.
//!
//! Each row is one `u64`, leftmost pixel in the most significant bit, which
//! lines up with how sprite bytes are laid out (MSB first) and with the packed
//! format the display gets handed.

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// size of the packed, one-bit-per-pixel frame
pub const PACKED_BYTES: usize = WIDTH * HEIGHT / 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    rows: [u64; HEIGHT],
}

impl Default for Framebuffer {
    fn default() -> Self {
        Framebuffer { rows: [0; HEIGHT] }
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.rows = [0; HEIGHT];
    }

    /// pixel at column `x`, row `y`; coordinates wrap like the draw does
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        let row = self.rows[y % HEIGHT];
        (row >> (WIDTH - 1 - x % WIDTH)) & 1 == 1
    }

    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|&r| r == 0)
    }

    /// XOR a sprite in at (x, y), wrapping toroidally. Returns true if any
    /// pixel that was on got turned off.
    pub fn draw_sprite(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        let ox = x as u32 % WIDTH as u32;
        let oy = y as usize % HEIGHT;
        let mut collision = false;
        for (r, &byte) in sprite.iter().enumerate() {
            // byte in the top 8 bits then rotate; rotation is the column wrap
            let mask = ((byte as u64) << (WIDTH - 8)).rotate_right(ox);
            let row = &mut self.rows[(oy + r) % HEIGHT];
            collision |= *row & mask != 0;
            *row ^= mask;
        }
        collision
    }

    /// row-major, MSB is the leftmost pixel
    pub fn to_packed(&self) -> [u8; PACKED_BYTES] {
        let mut out = [0u8; PACKED_BYTES];
        for (chunk, row) in out.chunks_exact_mut(WIDTH / 8).zip(self.rows.iter()) {
            chunk.copy_from_slice(&row.to_be_bytes());
        }
        out
    }

    pub fn from_packed(data: &[u8]) -> Option<Self> {
        if data.len() != PACKED_BYTES {
            return None;
        }
        let mut fb = Framebuffer::new();
        for (row, chunk) in fb.rows.iter_mut().zip(data.chunks_exact(WIDTH / 8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *row = u64::from_be_bytes(bytes);
        }
        Some(fb)
    }
}
