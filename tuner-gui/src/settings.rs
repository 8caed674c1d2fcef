//! # Settings
//!
//! Fixed presentation settings: the window title, tick rate and the menu of
//! tone durations offered to the user. The engine clamps whatever it is
//! given, so this menu is the only place durations are chosen.

use std::fmt;
use std::time::Duration;

/// Window title.
pub const APP_TITLE: &str = "Guitar Tuner";

/// How often the GUI polls the coordinator and drains notices (~60 FPS).
pub const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// One entry of the duration menu, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationChoice(pub u32);

/// Durations offered in the menu.
pub const DURATION_CHOICES: &[DurationChoice] = &[
    DurationChoice(1),
    DurationChoice(2),
    DurationChoice(3),
    DurationChoice(5),
    DurationChoice(10),
];

impl DurationChoice {
    pub fn seconds(self) -> f32 {
        self.0 as f32
    }
}

impl Default for DurationChoice {
    fn default() -> Self {
        DurationChoice(2)
    }
}

impl fmt::Display for DurationChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1 => write!(f, "1 second"),
            n => write!(f, "{} seconds", n),
        }
    }
}
