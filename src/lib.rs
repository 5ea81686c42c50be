//! A CHIP-8 virtual machine.
//!
//! ## Design
//!
//! * the machine is one plain value, [`MachineState`]: memory, registers,
//!   timers, framebuffer and the key latch. Nothing else holds machine state
//! * [`Engine::cycle`] takes `&mut MachineState` and does exactly one
//!   fetch/decode/execute step followed by one timer tick
//! * opcodes decode into an [`Instruction`] enum and dispatch through a
//!   single match
//! * wait-for-key never blocks; it rewinds PC and the driver keeps calling
//!   `cycle()`, updating the key latch in between
//! * save states are an explicit, versioned [`Snapshot`] rather than a dump
//!   of whatever the structs happen to look like
//! * display, input and audio sit behind traits so the interpreter doesn't
//!   need to know how they work; the terminal versions live here too
//!
//! Model
//!
//! ```text
//! Chip8Interpreter (driver, paced by spin_sleep)
//!  |-- display: dyn Display    <- packed 64x32 frame
//!  |-- input:   dyn Input      -> InputLatch, F5/F6/Esc commands
//!  |-- sound:   dyn Sound      <- sound timer running or not
//!  |-- engine:  Engine         (random source)
//!  `-- state:   MachineState
//!       |-- memory       4k, glyphs at 0x000, program at 0x200
//!       |-- registers    V0-VF, I, PC, call stack (depth 16)
//!       |-- timers       delay, sound
//!       |-- framebuffer  64x32, XOR draw, toroidal wrap
//!       `-- input        sixteen keys
//! ```
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod framebuffer;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod registers;
pub mod snapshot;
pub mod sound;
pub mod state;
pub mod timers;

pub use engine::{Cycle, Engine};
pub use error::{Chip8Error, Result};
pub use instruction::Instruction;
pub use snapshot::Snapshot;
pub use state::MachineState;
