/// What happened to the timers on a tick that a collaborator might care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// sound went from 1 to 0 this tick; stop the tone
    SoundStopped,
}

/// delay and sound timers; both count down to 0 and stay there
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timers {
    pub delay: u8,
    pub sound: u8,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// one engine cycle's worth of countdown
    pub fn tick(&mut self) -> Option<TimerEvent> {
        self.delay = self.delay.saturating_sub(1);
        if self.sound > 0 {
            self.sound -= 1;
            if self.sound == 0 {
                return Some(TimerEvent::SoundStopped);
            }
        }
        None
    }

    pub fn is_sounding(&self) -> bool {
        self.sound > 0
    }
}
