use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Run a CHIP-8 program in the terminal.
///
/// Keys: 1234/qwer/asdf/zxcv map to the COSMAC hex pad, F5 saves state,
/// F6 loads it, Esc quits.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "chip8", version, about)]
pub struct Config {
    /// program to load at 0x200
    pub rom: PathBuf,

    /// instructions executed per second
    #[arg(long, default_value_t = 700, value_parser = clap::value_parser!(u32).range(1..))]
    pub hz: u32,

    /// stop after this many cycles
    #[arg(long)]
    pub cycles: Option<u64>,

    /// seed the random number generator, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// don't beep
    #[arg(long)]
    pub mute: bool,

    /// where F5/F6 save and load state
    #[arg(long, default_value = "chip8.json")]
    pub snapshot: PathBuf,

    /// halt on unknown opcodes instead of skipping them
    #[arg(long)]
    pub strict: bool,
}

impl Config {
    /// wall-clock budget for one cycle
    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs(1) / self.hz
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rom: PathBuf::new(),
            hz: 700,
            cycles: None,
            seed: None,
            mute: false,
            snapshot: PathBuf::from("chip8.json"),
            strict: false,
        }
    }
}
