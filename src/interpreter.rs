//! # interpreter
//!
//! The driver around the engine: owns the machine, feeds it keypresses,
//! pushes frames to the display, turns the sound timer into beeps and keeps
//! the whole thing running at the configured rate.
//!
//! ```text
//! main loop
//!  |-- input.poll(latch)            front-end commands handled here
//!  |-- engine.cycle(state)          one instruction, one timer tick
//!  |-- display.draw(frame)          only when the frame changed
//!  |-- sound.beep() / sound.stop()  following the sound timer
//!  `-- sleep(remainder of cycle period)
//! ```

use crate::config::Config;
use crate::display::Display;
use crate::engine::{Cycle, Engine};
use crate::error::Result;
use crate::input::{Command, Input};
use crate::sound::Sound;
use crate::state::MachineState;
use crate::timers::TimerEvent;
use log::{info, warn};
use std::io;
use std::time::Instant;

/// Why the main loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Quit,
    CycleLimit,
}

pub struct Chip8Interpreter<'a> {
    state: MachineState,
    engine: Engine,
    display: &'a mut dyn Display,
    input: &'a mut dyn Input,
    sound: &'a mut dyn Sound,
    config: Config,
    cycles: u64,
}

impl<'a> Chip8Interpreter<'a> {
    pub fn new(
        display: &'a mut dyn Display,
        input: &'a mut dyn Input,
        sound: &'a mut dyn Sound,
        config: Config,
    ) -> Chip8Interpreter<'a> {
        let engine = match config.seed {
            Some(seed) => Engine::with_seed(seed),
            None => Engine::new(),
        };
        Chip8Interpreter {
            state: MachineState::new(),
            engine,
            display,
            input,
            sound,
            config,
            cycles: 0,
        }
    }

    /// load a chip8 program
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<()> {
        self.state.load_program_from(reader)
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// poll input, run one cycle and deal with its side effects
    pub fn step(&mut self) -> Result<Option<Halt>> {
        if let Some(command) = self.input.poll(&mut self.state.input)? {
            match command {
                Command::Quit => return Ok(Some(Halt::Quit)),
                Command::SaveState => {
                    if let Err(e) = self.state.save(&self.config.snapshot) {
                        warn!("couldn't save state: {}", e);
                    }
                }
                Command::LoadState => match self.state.load(&self.config.snapshot) {
                    Ok(()) => self.refresh()?,
                    Err(e) => warn!("couldn't load state: {}", e),
                },
            }
        }

        let cycle = self.engine.cycle(&mut self.state)?;
        self.cycles += 1;
        if self.config.strict {
            cycle.check_strict()?;
        }
        self.after_cycle(&cycle)?;

        match self.config.cycles {
            Some(limit) if self.cycles >= limit => Ok(Some(Halt::CycleLimit)),
            _ => Ok(None),
        }
    }

    fn after_cycle(&mut self, cycle: &Cycle) -> Result<()> {
        if cycle.redraw {
            self.display.draw(&self.state.framebuffer.to_packed())?;
        }
        let result = if cycle.timer_event == Some(TimerEvent::SoundStopped) {
            self.sound.stop()
        } else if self.state.timers.is_sounding() && !self.sound.is_beeping() {
            self.sound.beep()
        } else {
            Ok(())
        };
        // no sound isn't worth stopping the program for
        if let Err(e) = result {
            warn!("sound: {}", e);
        }
        Ok(())
    }

    /// redraw and resync sound, e.g. after a state load
    fn refresh(&mut self) -> Result<()> {
        self.display.draw(&self.state.framebuffer.to_packed())?;
        let result = if self.state.timers.is_sounding() {
            self.sound.beep()
        } else {
            self.sound.stop()
        };
        if let Err(e) = result {
            warn!("sound: {}", e);
        }
        Ok(())
    }

    /// run until quit, the cycle limit, or a fatal error
    pub fn main_loop(&mut self) -> Result<Halt> {
        let period = self.config.cycle_period();
        info!("running at {} Hz", self.config.hz);
        self.refresh()?;
        loop {
            let start = Instant::now();
            if let Some(halt) = self.step()? {
                info!("halted after {} cycles: {:?}", self.cycles, halt);
                return Ok(halt);
            }
            if let Some(remaining) = period.checked_sub(start.elapsed()) {
                spin_sleep::sleep(remaining);
            }
        }
    }
}
