//! Opcode decoding.
//!
//! ```text
//! Var  Bits  Location                  Description
//! x    4     high byte, low nibble     register
//! y    4     low byte, high nibble     register
//! n    4     low byte, low nibble      sprite height
//! nn   8     low byte                  immediate
//! nnn  12    low three nibbles         address
//! ```

use std::fmt;

/// One decoded CHIP-8 instruction. Register operands are 4-bit indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    Cls,
    /// 00EE
    Ret,
    /// 1nnn
    Jp(u16),
    /// 2nnn
    Call(u16),
    /// 3xnn
    SeByte(u8, u8),
    /// 4xnn
    SneByte(u8, u8),
    /// 5xy0
    SeReg(u8, u8),
    /// 6xnn
    LdByte(u8, u8),
    /// 7xnn
    AddByte(u8, u8),
    /// 8xy0
    LdReg(u8, u8),
    /// 8xy1
    Or(u8, u8),
    /// 8xy2
    And(u8, u8),
    /// 8xy3
    Xor(u8, u8),
    /// 8xy4
    AddReg(u8, u8),
    /// 8xy5
    Sub(u8, u8),
    /// 8xy6
    Shr(u8),
    /// 8xy7
    Subn(u8, u8),
    /// 8xyE
    Shl(u8),
    /// 9xy0
    SneReg(u8, u8),
    /// Annn
    LdI(u16),
    /// Bnnn
    JpV0(u16),
    /// Cxnn
    Rnd(u8, u8),
    /// Dxyn
    Drw(u8, u8, u8),
    /// Ex9E
    Skp(u8),
    /// ExA1
    Sknp(u8),
    /// Fx07
    LdRegDt(u8),
    /// Fx0A
    LdKey(u8),
    /// Fx15
    LdDtReg(u8),
    /// Fx18
    LdSt(u8),
    /// Fx1E
    AddI(u8),
    /// Fx29
    LdF(u8),
    /// Fx33
    LdB(u8),
    /// Fx55
    StoreRegs(u8),
    /// Fx65
    LoadRegs(u8),
    /// anything else, including the 0nnn machine-code call
    Unknown(u16),
}

impl Instruction {
    pub fn decode(opcode: u16) -> Self {
        use Instruction::*;

        let c = (opcode >> 12) as u8;
        let x = ((opcode >> 8) & 0xf) as u8;
        let y = ((opcode >> 4) & 0xf) as u8;
        let n = (opcode & 0xf) as u8;
        let nn = (opcode & 0xff) as u8;
        let nnn = opcode & 0x0fff;

        match (c, x, y, n) {
            (0x0, 0x0, 0xe, 0x0) => Cls,
            (0x0, 0x0, 0xe, 0xe) => Ret,
            (0x1, _, _, _) => Jp(nnn),
            (0x2, _, _, _) => Call(nnn),
            (0x3, _, _, _) => SeByte(x, nn),
            (0x4, _, _, _) => SneByte(x, nn),
            (0x5, _, _, 0x0) => SeReg(x, y),
            (0x6, _, _, _) => LdByte(x, nn),
            (0x7, _, _, _) => AddByte(x, nn),
            (0x8, _, _, 0x0) => LdReg(x, y),
            (0x8, _, _, 0x1) => Or(x, y),
            (0x8, _, _, 0x2) => And(x, y),
            (0x8, _, _, 0x3) => Xor(x, y),
            (0x8, _, _, 0x4) => AddReg(x, y),
            (0x8, _, _, 0x5) => Sub(x, y),
            (0x8, _, _, 0x6) => Shr(x),
            (0x8, _, _, 0x7) => Subn(x, y),
            (0x8, _, _, 0xe) => Shl(x),
            (0x9, _, _, 0x0) => SneReg(x, y),
            (0xa, _, _, _) => LdI(nnn),
            (0xb, _, _, _) => JpV0(nnn),
            (0xc, _, _, _) => Rnd(x, nn),
            (0xd, _, _, _) => Drw(x, y, n),
            (0xe, _, 0x9, 0xe) => Skp(x),
            (0xe, _, 0xa, 0x1) => Sknp(x),
            (0xf, _, 0x0, 0x7) => LdRegDt(x),
            (0xf, _, 0x0, 0xa) => LdKey(x),
            (0xf, _, 0x1, 0x5) => LdDtReg(x),
            (0xf, _, 0x1, 0x8) => LdSt(x),
            (0xf, _, 0x1, 0xe) => AddI(x),
            (0xf, _, 0x2, 0x9) => LdF(x),
            (0xf, _, 0x3, 0x3) => LdB(x),
            (0xf, _, 0x5, 0x5) => StoreRegs(x),
            (0xf, _, 0x6, 0x5) => LoadRegs(x),
            _ => Unknown(opcode),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Jp(a) => write!(f, "JP {:#05x}", a),
            Call(a) => write!(f, "CALL {:#05x}", a),
            SeByte(x, nn) => write!(f, "SE V{:X}, {:#04x}", x, nn),
            SneByte(x, nn) => write!(f, "SNE V{:X}, {:#04x}", x, nn),
            SeReg(x, y) => write!(f, "SE V{:X}, V{:X}", x, y),
            LdByte(x, nn) => write!(f, "LD V{:X}, {:#04x}", x, nn),
            AddByte(x, nn) => write!(f, "ADD V{:X}, {:#04x}", x, nn),
            LdReg(x, y) => write!(f, "LD V{:X}, V{:X}", x, y),
            Or(x, y) => write!(f, "OR V{:X}, V{:X}", x, y),
            And(x, y) => write!(f, "AND V{:X}, V{:X}", x, y),
            Xor(x, y) => write!(f, "XOR V{:X}, V{:X}", x, y),
            AddReg(x, y) => write!(f, "ADD V{:X}, V{:X}", x, y),
            Sub(x, y) => write!(f, "SUB V{:X}, V{:X}", x, y),
            Shr(x) => write!(f, "SHR V{:X}", x),
            Subn(x, y) => write!(f, "SUBN V{:X}, V{:X}", x, y),
            Shl(x) => write!(f, "SHL V{:X}", x),
            SneReg(x, y) => write!(f, "SNE V{:X}, V{:X}", x, y),
            LdI(a) => write!(f, "LD I, {:#05x}", a),
            JpV0(a) => write!(f, "JP V0, {:#05x}", a),
            Rnd(x, nn) => write!(f, "RND V{:X}, {:#04x}", x, nn),
            Drw(x, y, n) => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            Skp(x) => write!(f, "SKP V{:X}", x),
            Sknp(x) => write!(f, "SKNP V{:X}", x),
            LdRegDt(x) => write!(f, "LD V{:X}, DT", x),
            LdKey(x) => write!(f, "LD V{:X}, K", x),
            LdDtReg(x) => write!(f, "LD DT, V{:X}", x),
            LdSt(x) => write!(f, "LD ST, V{:X}", x),
            AddI(x) => write!(f, "ADD I, V{:X}", x),
            LdF(x) => write!(f, "LD F, V{:X}", x),
            LdB(x) => write!(f, "LD B, V{:X}", x),
            StoreRegs(x) => write!(f, "LD [I], V{:X}", x),
            LoadRegs(x) => write!(f, "LD V{:X}, [I]", x),
            Unknown(op) => write!(f, "??? {:#06x}", op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Instruction::*;
    use super::*;

    #[test]
    fn test_decode_families() {
        let cases = [
            (0x00E0, Cls),
            (0x00EE, Ret),
            (0x1234, Jp(0x234)),
            (0x2456, Call(0x456)),
            (0x342A, SeByte(0x4, 0x2A)),
            (0x4A75, SneByte(0xA, 0x75)),
            (0x5AE0, SeReg(0xA, 0xE)),
            (0x63F5, LdByte(0x3, 0xF5)),
            (0x7B12, AddByte(0xB, 0x12)),
            (0x8590, LdReg(0x5, 0x9)),
            (0x8101, Or(0x1, 0x0)),
            (0x8642, And(0x6, 0x4)),
            (0x87F3, Xor(0x7, 0xF)),
            (0x8264, AddReg(0x2, 0x6)),
            (0x8C45, Sub(0xC, 0x4)),
            (0x8106, Shr(0x1)),
            (0x86D7, Subn(0x6, 0xD)),
            (0x8E0E, Shl(0xE)),
            (0x9990, SneReg(0x9, 0x9)),
            (0xA568, LdI(0x568)),
            (0xBABC, JpV0(0xABC)),
            (0xC5AF, Rnd(0x5, 0xAF)),
            (0xD7B0, Drw(0x7, 0xB, 0)),
            (0xE49E, Skp(0x4)),
            (0xECA1, Sknp(0xC)),
            (0xF907, LdRegDt(0x9)),
            (0xFD0A, LdKey(0xD)),
            (0xF315, LdDtReg(0x3)),
            (0xF718, LdSt(0x7)),
            (0xF91E, AddI(0x9)),
            (0xFF29, LdF(0xF)),
            (0xF533, LdB(0x5)),
            (0xF655, StoreRegs(0x6)),
            (0xF165, LoadRegs(0x1)),
        ];
        for (opcode, expected) in cases {
            assert_eq!(Instruction::decode(opcode), expected, "{:#06x}", opcode);
        }
    }

    #[test]
    fn test_decode_unknown() {
        for opcode in [0x0000, 0x0123, 0x00FF, 0x5001, 0x8008, 0x900F, 0xE000, 0xF000, 0xFFFF] {
            assert_eq!(Instruction::decode(opcode), Unknown(opcode));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction::decode(0xD7B5).to_string(), "DRW V7, VB, 5");
        assert_eq!(Instruction::decode(0x2456).to_string(), "CALL 0x456");
        assert_eq!(Instruction::decode(0x5001).to_string(), "??? 0x5001");
    }
}
