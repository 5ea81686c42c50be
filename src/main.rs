use std::error::Error;
use std::fs::File;

use chip8::config::Config;
use chip8::display::MonoTermDisplay;
use chip8::input::StdinInput;
use chip8::interpreter::Chip8Interpreter;
use chip8::sound::{Mute, SimpleBeep, Sound};
use clap::Parser;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let config = Config::parse();

    // open the program before the terminal goes raw, so errors print sanely
    let mut f = File::open(&config.rom)?;

    // initialise
    let mut display = MonoTermDisplay::new()?;
    let mut input = StdinInput::new()?;
    let mut beeper = SimpleBeep::new();
    let mut mute = Mute::new();
    let sound: &mut dyn Sound = if config.mute { &mut mute } else { &mut beeper };
    let mut interpreter = Chip8Interpreter::new(&mut display, &mut input, sound, config);

    interpreter.load_program(&mut f)?;
    let result = interpreter.main_loop();
    drop(interpreter);
    drop(input);

    // shove some junk on stdout to stop the cli messing up the last frame
    for _ in 0..12 {
        println!();
    }
    result?;
    Ok(())
}
