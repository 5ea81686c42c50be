use crossterm::event::{poll, read, Event, KeyCode};
use crossterm::terminal;
use log::warn;
use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

/// The sixteen COSMAC keys as the engine sees them. Written by an [`Input`]
/// provider, only ever read by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputLatch {
    keys: [bool; 16],
}

impl InputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// only the low nibble of `key` is used
    pub fn is_pressed(&self, key: u8) -> bool {
        self.keys[(key & 0x0f) as usize]
    }

    pub fn set(&mut self, key: u8, pressed: bool) {
        self.keys[(key & 0x0f) as usize] = pressed;
    }

    pub fn release_all(&mut self) {
        self.keys = [false; 16];
    }

    /// lowest-numbered key that's down, if any
    pub fn lowest_pressed(&self) -> Option<u8> {
        self.keys.iter().position(|&k| k).map(|k| k as u8)
    }

    pub fn as_array(&self) -> &[bool; 16] {
        &self.keys
    }

    pub fn from_array(keys: [bool; 16]) -> Self {
        InputLatch { keys }
    }
}

/// ditto using left-hand side of qwerty keyboard
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// Things the user can ask of the front-end, as opposed to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    SaveState,
    LoadState,
}

/// reads keypresses
pub trait Input {
    /// refresh `latch` from whatever the device has seen since the last
    /// poll, and hand back a front-end command if one arrived
    fn poll(&mut self, latch: &mut InputLatch) -> Result<Option<Command>, io::Error>;
}

/// terminals only send key-down (and autorepeat), so a key counts as held
/// for this long after its last event
const KEY_HOLD: Duration = Duration::from_millis(120);

/// simple implementation of Input, reading the terminal via crossterm
pub struct StdinInput {
    keymap: HashMap<char, u8>,
    last_seen: [Option<Instant>; 16],
}

impl StdinInput {
    pub fn new() -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(StdinInput {
            keymap: HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            last_seen: [None; 16],
        })
    }

    fn read_events(&mut self) -> Result<Option<Command>, io::Error> {
        let now = Instant::now();
        let mut command = None;
        while poll(Duration::from_millis(0))? {
            if let Event::Key(evt) = read()? {
                match evt.code {
                    KeyCode::Char(key) => match self.keymap.get(&key.to_ascii_lowercase()) {
                        Some(&mapped_key) => self.last_seen[mapped_key as usize] = Some(now),
                        None => warn!("can't map {:?} to a COSMAC key", key),
                    },
                    KeyCode::Esc => command = Some(Command::Quit),
                    KeyCode::F(5) => command = Some(Command::SaveState),
                    KeyCode::F(6) => command = Some(Command::LoadState),
                    other => warn!("unmapped key event {:?}", other),
                }
            }
        }
        Ok(command)
    }
}

impl Drop for StdinInput {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("couldn't leave raw mode: {}", e);
        }
    }
}

impl Input for StdinInput {
    fn poll(&mut self, latch: &mut InputLatch) -> Result<Option<Command>, io::Error> {
        let command = self.read_events()?;
        let now = Instant::now();
        for (key, seen) in self.last_seen.iter().enumerate() {
            let held = matches!(seen, Some(t) if now.duration_since(*t) < KEY_HOLD);
            latch.set(key as u8, held);
        }
        Ok(command)
    }
}

/// dummy Input implementation for testing
pub struct DummyInput {
    keys: Vec<u8>,
    polls: usize,
    scheduled: Vec<(usize, Command)>,
}

impl DummyInput {
    pub fn new(keys: &[u8]) -> Self {
        DummyInput {
            keys: Vec::from(keys),
            polls: 0,
            scheduled: Vec::new(),
        }
    }

    /// hand `command` out of the next poll
    pub fn push_command(&mut self, command: Command) {
        self.schedule(self.polls, command);
    }

    /// hand `command` out of the poll numbered `poll` (counting from 0)
    pub fn schedule(&mut self, poll: usize, command: Command) {
        self.scheduled.push((poll, command));
    }

    pub fn set_keys(&mut self, keys: &[u8]) {
        self.keys = Vec::from(keys);
    }
}

impl Input for DummyInput {
    fn poll(&mut self, latch: &mut InputLatch) -> Result<Option<Command>, io::Error> {
        latch.release_all();
        for &k in &self.keys {
            latch.set(k, true);
        }
        let now = self.polls;
        self.polls += 1;
        let command = self
            .scheduled
            .iter()
            .position(|&(at, _)| at == now)
            .map(|idx| self.scheduled.remove(idx).1);
        Ok(command)
    }
}
