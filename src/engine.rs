//! Fetch, decode and execute, one instruction per cycle.

use crate::error::{Chip8Error, Result};
use crate::instruction::Instruction;
use crate::memory::{glyph_addr, MemoryMap};
use crate::state::MachineState;
use crate::timers::TimerEvent;
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// What one cycle did, for the driver to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    /// address the instruction was fetched from
    pub pc: u16,
    pub opcode: u16,
    pub instruction: Instruction,
    /// framebuffer was cleared or drawn to
    pub redraw: bool,
    /// Fx0A found no key and rewound PC
    pub waiting_for_key: bool,
    pub timer_event: Option<TimerEvent>,
}

impl Cycle {
    /// promote an unknown opcode to an error, for drivers that want to halt
    pub fn check_strict(&self) -> Result<()> {
        match self.instruction {
            Instruction::Unknown(opcode) => Err(Chip8Error::UnknownOpcode {
                opcode,
                pc: self.pc,
            }),
            _ => Ok(()),
        }
    }
}

/// side effects of an executed instruction that aren't visible in the state
#[derive(Default)]
struct Effect {
    redraw: bool,
    waiting_for_key: bool,
}

/// The dispatcher. Holds nothing but the random source; all machine state is
/// passed in.
pub struct Engine {
    rng: StdRng,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            rng: StdRng::from_entropy(),
        }
    }

    /// reproducible random numbers, for tests and replays
    pub fn with_seed(seed: u64) -> Self {
        Engine {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Run one fetch-decode-execute step, then tick the timers. An error
    /// aborts the cycle before the timers tick.
    pub fn cycle(&mut self, state: &mut MachineState) -> Result<Cycle> {
        let pc = state.registers.pc;
        let opcode = state.memory.read_word(pc)?;
        state.registers.pc = pc.wrapping_add(2);

        let instruction = Instruction::decode(opcode);
        trace!("{:#05x}: {:04x} {}", pc, opcode, instruction);

        let effect = self.execute(state, instruction)?;
        let timer_event = state.timers.tick();

        Ok(Cycle {
            pc,
            opcode,
            instruction,
            redraw: effect.redraw,
            waiting_for_key: effect.waiting_for_key,
            timer_event,
        })
    }

    fn execute(&mut self, state: &mut MachineState, instruction: Instruction) -> Result<Effect> {
        use Instruction::*;

        let regs = &mut state.registers;
        let mut effect = Effect::default();

        match instruction {
            Cls => {
                state.framebuffer.clear();
                effect.redraw = true;
            }
            Ret => {
                regs.pc = regs.pop_return()?;
                debug!("return to {:#05x}", regs.pc);
            }
            Jp(addr) => regs.pc = addr,
            Call(addr) => {
                regs.push_return(regs.pc)?;
                debug!("call {:#05x} (depth {})", addr, regs.stack().len());
                regs.pc = addr;
            }
            SeByte(x, nn) => regs.skip_if(regs.v(x) == nn),
            SneByte(x, nn) => regs.skip_if(regs.v(x) != nn),
            SeReg(x, y) => regs.skip_if(regs.v(x) == regs.v(y)),
            SneReg(x, y) => regs.skip_if(regs.v(x) != regs.v(y)),
            LdByte(x, nn) => regs.set_v(x, nn),
            AddByte(x, nn) => regs.set_v(x, regs.v(x).wrapping_add(nn)),
            LdReg(x, y) => regs.set_v(x, regs.v(y)),
            Or(x, y) => regs.set_v(x, regs.v(x) | regs.v(y)),
            And(x, y) => regs.set_v(x, regs.v(x) & regs.v(y)),
            Xor(x, y) => regs.set_v(x, regs.v(x) ^ regs.v(y)),
            // flag ops read both operands up front and write VF last, so VF
            // as an operand or destination still ends up holding the flag
            AddReg(x, y) => {
                let (sum, carry) = regs.v(x).overflowing_add(regs.v(y));
                regs.set_v(x, sum);
                regs.set_flag(carry);
            }
            Sub(x, y) => {
                let (vx, vy) = (regs.v(x), regs.v(y));
                regs.set_v(x, vx.wrapping_sub(vy));
                regs.set_flag(vx > vy);
            }
            Subn(x, y) => {
                let (vx, vy) = (regs.v(x), regs.v(y));
                regs.set_v(x, vy.wrapping_sub(vx));
                regs.set_flag(vy > vx);
            }
            Shr(x) => {
                let vx = regs.v(x);
                regs.set_v(x, vx >> 1);
                regs.set_flag(vx & 0x01 == 1);
            }
            Shl(x) => {
                let vx = regs.v(x);
                regs.set_v(x, vx << 1);
                regs.set_flag(vx >> 7 == 1);
            }
            LdI(addr) => regs.set_i(addr),
            // not masked: a jump past the top of memory faults on the next fetch
            JpV0(addr) => regs.pc = addr + regs.v(0) as u16,
            Rnd(x, nn) => regs.set_v(x, self.rng.gen::<u8>() & nn),
            Drw(x, y, n) => {
                let sprite = state.memory.get_ro_slice(regs.i(), n as usize)?;
                let collision = state.framebuffer.draw_sprite(regs.v(x), regs.v(y), sprite);
                regs.set_flag(collision);
                effect.redraw = true;
            }
            Skp(x) => regs.skip_if(state.input.is_pressed(regs.v(x))),
            Sknp(x) => regs.skip_if(!state.input.is_pressed(regs.v(x))),
            LdRegDt(x) => regs.set_v(x, state.timers.delay),
            LdKey(x) => match state.input.lowest_pressed() {
                Some(key) => regs.set_v(x, key),
                None => {
                    // go round again next cycle
                    regs.pc = regs.pc.wrapping_sub(2);
                    effect.waiting_for_key = true;
                }
            },
            LdDtReg(x) => state.timers.delay = regs.v(x),
            LdSt(x) => state.timers.sound = regs.v(x),
            AddI(x) => regs.set_i(regs.i().wrapping_add(regs.v(x) as u16)),
            LdF(x) => regs.set_i(glyph_addr(regs.v(x))),
            LdB(x) => {
                let vx = regs.v(x);
                let digits = state.memory.get_rw_slice(regs.i(), 3)?;
                digits.copy_from_slice(&[vx / 100, vx / 10 % 10, vx % 10]);
            }
            StoreRegs(x) => {
                let count = x as usize + 1;
                let dst = state.memory.get_rw_slice(regs.i(), count)?;
                dst.copy_from_slice(&regs.all_v()[..count]);
            }
            LoadRegs(x) => {
                let src = state.memory.get_ro_slice(regs.i(), x as usize + 1)?;
                for (r, &value) in src.iter().enumerate() {
                    regs.set_v(r as u8, value);
                }
            }
            Unknown(opcode) => {
                warn!(
                    "unknown opcode {:#06x} at {:#05x}, skipping",
                    opcode,
                    regs.pc.wrapping_sub(2)
                );
            }
        }
        Ok(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::VF;
    use proptest::prelude::*;

    /// state with `program` at 0x200
    fn machine(program: &[u16]) -> MachineState {
        let mut state = MachineState::new();
        let bytes: Vec<u8> = program.iter().flat_map(|op| op.to_be_bytes()).collect();
        state.load_program(&bytes).unwrap();
        state
    }

    fn run(state: &mut MachineState, cycles: usize) -> Result<()> {
        let mut engine = Engine::with_seed(0);
        for _ in 0..cycles {
            engine.cycle(state)?;
        }
        Ok(())
    }

    fn alu(op: u16, vx: u8, vy: u8) -> (u8, u8) {
        let mut state = machine(&[0x8010 | op]);
        state.registers.set_v(0, vx);
        state.registers.set_v(1, vy);
        run(&mut state, 1).unwrap();
        (state.registers.v(0), state.registers.v(VF))
    }

    #[test]
    fn test_pc_advances_before_dispatch() -> Result<()> {
        let mut state = machine(&[0x6001, 0x1208]);
        let mut engine = Engine::with_seed(0);
        let c = engine.cycle(&mut state)?;
        assert_eq!(c.pc, 0x200);
        assert_eq!(c.opcode, 0x6001);
        assert_eq!(state.registers.pc, 0x202);
        engine.cycle(&mut state)?;
        assert_eq!(state.registers.pc, 0x208);
        Ok(())
    }

    #[test]
    fn test_call_and_ret() -> Result<()> {
        let mut state = machine(&[0x2206, 0x7001, 0x1204, 0x7010, 0x00EE]);
        run(&mut state, 4)?;
        assert_eq!(state.registers.v(0), 0x11);
        assert_eq!(state.registers.pc, 0x204);
        assert!(state.registers.stack().is_empty());
        Ok(())
    }

    #[test]
    fn test_call_depth() {
        // 0x200: CALL 0x200 forever
        let mut state = machine(&[0x2200]);
        let mut engine = Engine::with_seed(0);
        for _ in 0..16 {
            engine.cycle(&mut state).unwrap();
        }
        assert_eq!(state.registers.stack().len(), 16);
        assert!(matches!(
            engine.cycle(&mut state),
            Err(Chip8Error::StackOverflow { .. })
        ));
    }

    #[test]
    fn test_ret_with_empty_stack() {
        let mut state = machine(&[0x00EE]);
        assert!(matches!(
            run(&mut state, 1),
            Err(Chip8Error::StackUnderflow { .. })
        ));
    }

    #[test]
    fn test_skips() -> Result<()> {
        for (op, taken) in [(0x3005, true), (0x3006, false), (0x4005, false), (0x4006, true)] {
            let mut state = machine(&[op]);
            state.registers.set_v(0, 5);
            run(&mut state, 1)?;
            assert_eq!(state.registers.pc, if taken { 0x204 } else { 0x202 }, "{:04x}", op);
        }
        for (op, taken) in [(0x5010, true), (0x9010, false)] {
            let mut state = machine(&[op]);
            state.registers.set_v(0, 9);
            state.registers.set_v(1, 9);
            run(&mut state, 1)?;
            assert_eq!(state.registers.pc, if taken { 0x204 } else { 0x202 }, "{:04x}", op);
        }
        Ok(())
    }

    #[test]
    fn test_add_immediate_leaves_flag() -> Result<()> {
        let mut state = machine(&[0x70FF]);
        state.registers.set_v(0, 2);
        state.registers.set_v(VF, 7);
        run(&mut state, 1)?;
        assert_eq!(state.registers.v(0), 1);
        assert_eq!(state.registers.v(VF), 7);
        Ok(())
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(alu(0x0, 0xf0, 0x0f).0, 0x0f);
        assert_eq!(alu(0x1, 0xf0, 0x0f).0, 0xff);
        assert_eq!(alu(0x2, 0xf0, 0x3c).0, 0x30);
        assert_eq!(alu(0x3, 0xf0, 0x3c).0, 0xcc);
    }

    #[test]
    fn test_reverse_subtract() {
        assert_eq!(alu(0x7, 3, 10), (7, 1));
        assert_eq!(alu(0x7, 10, 3), (249, 0));
        assert_eq!(alu(0x7, 4, 4), (0, 0));
    }

    #[test]
    fn test_shifts_ignore_prior_flag() {
        for prior in [0, 1, 0xff] {
            let mut state = machine(&[0x8006, 0x810E]);
            state.registers.set_v(0, 0b0000_0011);
            state.registers.set_v(1, 0b0100_0000);
            state.registers.set_v(VF, prior);
            run(&mut state, 1).unwrap();
            assert_eq!((state.registers.v(0), state.registers.v(VF)), (1, 1));
            state.registers.set_v(VF, prior);
            run(&mut state, 1).unwrap();
            assert_eq!((state.registers.v(1), state.registers.v(VF)), (0x80, 0));
        }
        assert_eq!(alu(0xe, 0x81, 0), (0x02, 1));
        assert_eq!(alu(0x6, 0x80, 0), (0x40, 0));
    }

    #[test]
    fn test_flag_register_as_destination() -> Result<()> {
        // VF += V0 with carry: flag wins
        let mut state = machine(&[0x8F04]);
        state.registers.set_v(0, 0x01);
        state.registers.set_v(VF, 0xff);
        run(&mut state, 1)?;
        assert_eq!(state.registers.v(VF), 1);
        Ok(())
    }

    #[test]
    fn test_index_ops() -> Result<()> {
        let mut state = machine(&[0xAFFF, 0xF01E, 0xF129]);
        state.registers.set_v(0, 2);
        state.registers.set_v(1, 0xb);
        run(&mut state, 2)?;
        assert_eq!(state.registers.i(), 0x001);
        run(&mut state, 1)?;
        assert_eq!(state.registers.i(), 55);
        Ok(())
    }

    #[test]
    fn test_add_to_index_wraps_at_top() -> Result<()> {
        let mut state = machine(&[0xAFFF, 0xF01E]);
        state.registers.set_v(0, 0xff);
        run(&mut state, 2)?;
        assert_eq!(state.registers.i(), 0x0fe);
        Ok(())
    }

    #[test]
    fn test_font_address_is_digit_times_five() -> Result<()> {
        let mut state = machine(&[0xF029]);
        state.registers.set_v(0, 0x10);
        run(&mut state, 1)?;
        assert_eq!(state.registers.i(), 0x50);
        Ok(())
    }

    #[test]
    fn test_jump_with_offset() -> Result<()> {
        let mut state = machine(&[0xB300]);
        state.registers.set_v(0, 0x10);
        run(&mut state, 1)?;
        assert_eq!(state.registers.pc, 0x310);
        Ok(())
    }

    #[test]
    fn test_jump_with_offset_past_memory_faults() {
        let mut state = machine(&[0xBFFF]);
        state.registers.set_v(0, 0x10);
        let mut engine = Engine::with_seed(0);
        engine.cycle(&mut state).unwrap();
        assert_eq!(state.registers.pc, 0x100f);
        assert!(matches!(
            engine.cycle(&mut state),
            Err(Chip8Error::OutOfBoundsMemory { .. })
        ));
    }

    #[test]
    fn test_random_masked_and_seeded() {
        let mut a = machine(&[0xC00F; 32]);
        let mut b = a.clone();
        let mut ea = Engine::with_seed(42);
        let mut eb = Engine::with_seed(42);
        for _ in 0..32 {
            ea.cycle(&mut a).unwrap();
            eb.cycle(&mut b).unwrap();
            assert_eq!(a.registers.v(0) & 0xf0, 0);
            assert_eq!(a.registers.v(0), b.registers.v(0));
        }
    }

    #[test]
    fn test_draw_sets_collision() -> Result<()> {
        // font glyph 0 at (0,0) twice
        let mut state = machine(&[0xA000, 0xD015, 0xD015]);
        let mut engine = Engine::with_seed(0);
        engine.cycle(&mut state)?;
        let c = engine.cycle(&mut state)?;
        assert!(c.redraw);
        assert_eq!(state.registers.v(VF), 0);
        assert!(state.framebuffer.pixel(0, 0));
        engine.cycle(&mut state)?;
        assert_eq!(state.registers.v(VF), 1);
        assert!(state.framebuffer.is_blank());
        Ok(())
    }

    #[test]
    fn test_draw_zero_height() -> Result<()> {
        let mut state = machine(&[0xD010]);
        state.registers.set_v(VF, 1);
        run(&mut state, 1)?;
        assert_eq!(state.registers.v(VF), 0);
        assert!(state.framebuffer.is_blank());
        Ok(())
    }

    #[test]
    fn test_draw_past_top_of_memory() {
        let mut state = machine(&[0xAFFE, 0xD015]);
        assert!(matches!(
            run(&mut state, 2),
            Err(Chip8Error::OutOfBoundsMemory { .. })
        ));
        assert!(state.framebuffer.is_blank());
    }

    #[test]
    fn test_clear_screen() -> Result<()> {
        let mut state = machine(&[0xD015, 0x00E0]);
        run(&mut state, 2)?;
        assert!(state.framebuffer.is_blank());
        Ok(())
    }

    #[test]
    fn test_key_skips() -> Result<()> {
        let mut state = machine(&[0xE09E, 0x0000, 0xE0A1]);
        state.registers.set_v(0, 0x7);
        state.input.set(0x7, true);
        run(&mut state, 1)?;
        assert_eq!(state.registers.pc, 0x204);
        run(&mut state, 1)?;
        assert_eq!(state.registers.pc, 0x206);
        Ok(())
    }

    #[test]
    fn test_key_skips_with_key_up() -> Result<()> {
        let mut state = machine(&[0xE09E, 0xE0A1]);
        state.registers.set_v(0, 0x7);
        state.input.set(0x6, true);
        run(&mut state, 1)?;
        assert_eq!(state.registers.pc, 0x202);
        run(&mut state, 1)?;
        assert_eq!(state.registers.pc, 0x206);
        Ok(())
    }

    #[test]
    fn test_wait_for_key() -> Result<()> {
        let mut state = machine(&[0xF30A]);
        state.registers.set_v(3, 0xaa);
        state.timers.delay = 20;
        let mut engine = Engine::with_seed(0);
        for _ in 0..10 {
            let c = engine.cycle(&mut state)?;
            assert!(c.waiting_for_key);
            assert_eq!(state.registers.pc, 0x200);
            assert_eq!(state.registers.v(3), 0xaa);
        }
        // timers kept running while we waited
        assert_eq!(state.timers.delay, 10);
        state.input.set(0x9, true);
        state.input.set(0x5, true);
        let c = engine.cycle(&mut state)?;
        assert!(!c.waiting_for_key);
        assert_eq!(state.registers.v(3), 5);
        assert_eq!(state.registers.pc, 0x202);
        Ok(())
    }

    #[test]
    fn test_timer_ops() -> Result<()> {
        let mut state = machine(&[0xF015, 0xF118, 0xF207]);
        state.registers.set_v(0, 10);
        state.registers.set_v(1, 1);
        let mut engine = Engine::with_seed(0);
        engine.cycle(&mut state)?;
        assert_eq!(state.timers.delay, 9);
        let c = engine.cycle(&mut state)?;
        // set to 1 then ticked straight back to 0
        assert_eq!(c.timer_event, Some(TimerEvent::SoundStopped));
        engine.cycle(&mut state)?;
        assert_eq!(state.registers.v(2), 8);
        Ok(())
    }

    #[test]
    fn test_bcd() -> Result<()> {
        for (value, digits) in [(255u8, [2u8, 5, 5]), (0, [0, 0, 0]), (107, [1, 0, 7])] {
            let mut state = machine(&[0xA300, 0xF033]);
            state.registers.set_v(0, value);
            run(&mut state, 2)?;
            assert_eq!(state.memory.get_ro_slice(0x300, 3)?, &digits);
        }
        Ok(())
    }

    #[test]
    fn test_bcd_at_top_is_all_or_nothing() {
        let mut state = machine(&[0xAFFE, 0xF033]);
        state.registers.set_v(0, 123);
        assert!(run(&mut state, 2).is_err());
        assert_eq!(state.memory.get_ro_slice(0xffe, 2).unwrap(), &[0, 0]);
    }

    #[test]
    fn test_register_dump_and_load() -> Result<()> {
        let mut state = machine(&[0xA400, 0xF355, 0x6000, 0x6100, 0x6200, 0x6300, 0xF265]);
        for r in 0..16 {
            state.registers.set_v(r, r + 1);
        }
        run(&mut state, 2)?;
        assert_eq!(state.memory.get_ro_slice(0x400, 5)?, &[1, 2, 3, 4, 0]);
        assert_eq!(state.registers.i(), 0x400);
        run(&mut state, 5)?;
        assert_eq!(&state.registers.all_v()[..5], &[1, 2, 3, 0, 5]);
        Ok(())
    }

    #[test]
    fn test_unknown_opcode_is_a_noop() -> Result<()> {
        let mut state = machine(&[0x5001, 0x6042]);
        let before = state.registers.clone();
        let mut engine = Engine::with_seed(0);
        let c = engine.cycle(&mut state)?;
        assert_eq!(c.instruction, Instruction::Unknown(0x5001));
        assert!(matches!(
            c.check_strict(),
            Err(Chip8Error::UnknownOpcode {
                opcode: 0x5001,
                pc: 0x200
            })
        ));
        assert_eq!(state.registers.all_v(), before.all_v());
        assert_eq!(state.registers.pc, 0x202);
        engine.cycle(&mut state)?.check_strict()?;
        assert_eq!(state.registers.v(0), 0x42);
        Ok(())
    }

    #[test]
    fn test_fetch_past_memory() {
        let mut state = MachineState::new();
        state.registers.pc = 0xfff;
        state.timers.delay = 5;
        assert!(matches!(
            run(&mut state, 1),
            Err(Chip8Error::OutOfBoundsMemory { addr: 0x1000 })
        ));
        assert_eq!(state.timers.delay, 5);
    }

    proptest! {
        #[test]
        fn prop_add_with_carry(vx in any::<u8>(), vy in any::<u8>()) {
            let (result, flag) = alu(0x4, vx, vy);
            let sum = vx as u16 + vy as u16;
            prop_assert_eq!(result, (sum % 256) as u8);
            prop_assert_eq!(flag, (sum > 255) as u8);
        }

        #[test]
        fn prop_subtract_with_borrow(vx in any::<u8>(), vy in any::<u8>()) {
            let (result, flag) = alu(0x5, vx, vy);
            prop_assert_eq!(result, vx.wrapping_sub(vy));
            prop_assert_eq!(flag, (vx > vy) as u8);
        }

        #[test]
        fn prop_shifts_move_boundary_bit(vx in any::<u8>(), prior in any::<u8>()) {
            for (op, expected, bit) in [(0x6, vx >> 1, vx & 1), (0xe, vx << 1, vx >> 7)] {
                let mut state = machine(&[0x8000 | op]);
                state.registers.set_v(0, vx);
                state.registers.set_v(VF, prior);
                run(&mut state, 1).unwrap();
                prop_assert_eq!(state.registers.v(0), expected);
                prop_assert_eq!(state.registers.v(VF), bit);
            }
        }
    }
}
