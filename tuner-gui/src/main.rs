//! # Guitar Tuner - Reference Tone GUI
//!
//! This module contains the main GUI application. It shows one control per
//! guitar string; activating a control plays that string's reference tone
//! for the selected duration and marks the string as playing.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme; owns the
//!   activation coordinator and with it the tone engine
//! - **Audio Thread**: Dedicated output worker opened on the first activation
//! - **Communication**: Crossbeam channel carrying status and error notices
//! - **Updates**: 60 FPS tick drives deferred indicator clears

mod settings;
mod ui;

use std::time::Instant;

use crossbeam_channel::Receiver;
use iced::keyboard::{self, key::Named, Key, Modifiers};
use iced::{Element, Subscription, Theme};
use tuner_core::{
    ActivationCoordinator, CpalBackend, Notice, StringId, SystemCoordinator, ToneEngine,
    IDLE_PROMPT,
};

use settings::{DurationChoice, APP_TITLE, TICK_INTERVAL};
use ui::main_display::create_main_view;

/// Main entry point for the tuner application.
///
/// Initializes logging (`RUST_LOG`, default `info`) and runs the Iced GUI
/// with the dark theme and a continuous tick subscription.
pub fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!(target: "tuner::main", "Starting {}...", APP_TITLE);
    let result = iced::application(APP_TITLE, TunerApp::update, TunerApp::view)
        .subscription(TunerApp::subscription)
        .theme(TunerApp::theme)
        .run();
    log::info!(target: "tuner::main", "Application finished with result: {:?}", result);
    result.map_err(|e| anyhow::anyhow!("application error: {}", e))
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    StringActivated(StringId),  // Click, or number key 1-6
    ActivateFocused,            // Enter or Space on the last chosen string
    DurationSelected(DurationChoice),
    Tick,                       // Timer tick for deferred clears
}

/// UI-specific data needed for rendering the interface.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    /// Current status line
    pub status: String,
    /// Error banners, oldest first
    pub errors: Vec<String>,
    pub duration: DurationChoice,
    /// String that Enter/Space re-activates
    pub focused: Option<StringId>,
    /// String showing the playing indicator
    pub playing: Option<StringId>,
}

impl Default for AppDisplayData {
    fn default() -> Self {
        Self {
            status: IDLE_PROMPT.to_string(),
            errors: Vec::new(),
            duration: DurationChoice::default(),
            focused: None,
            playing: None,
        }
    }
}

impl AppDisplayData {
    /// Reflects one engine/coordinator notice onto the display.
    pub fn apply_notice(&mut self, notice: Notice) {
        match notice {
            Notice::Error(message) => self.errors.push(message),
            Notice::Status(status) => self.status = status,
        }
    }
}

struct TunerApp {
    coordinator: SystemCoordinator,
    notices: Receiver<Notice>,
    // Single source of truth for all display data
    display_data: AppDisplayData,
}

impl Default for TunerApp {
    /// Creates the coordinator and engine. Audio output is only probed here;
    /// it is opened on the first activation.
    fn default() -> Self {
        log::info!(target: "tuner::main", "Creating TunerApp...");
        let (notice_tx, notice_rx) = crossbeam_channel::unbounded();

        let mut engine = ToneEngine::new(CpalBackend::new(), notice_tx.clone());
        if !engine.probe() {
            log::warn!(target: "tuner::main", "No audio output detected at startup");
        }

        let mut app = Self {
            coordinator: ActivationCoordinator::new(engine, notice_tx),
            notices: notice_rx,
            display_data: AppDisplayData::default(),
        };
        app.sync_display();
        app
    }
}

impl TunerApp {
    fn update(&mut self, message: Message) {
        match message {
            Message::StringActivated(string) => self.activate(string),
            Message::ActivateFocused => {
                if let Some(string) = self.display_data.focused {
                    self.activate(string);
                }
            }
            Message::DurationSelected(duration) => {
                log::debug!(target: "tuner::main", "Duration set to {}", duration);
                self.display_data.duration = duration;
            }
            Message::Tick => {
                self.coordinator.poll(Instant::now());
                self.sync_display();
            }
        }
    }

    fn activate(&mut self, string: StringId) {
        self.display_data.focused = Some(string);
        let duration = self.display_data.duration.seconds();
        self.coordinator.activate(string, duration, Instant::now());
        self.sync_display();
    }

    /// Pulls pending notices and the indicator owner into the display data.
    fn sync_display(&mut self) {
        for notice in self.notices.try_iter() {
            self.display_data.apply_notice(notice);
        }
        self.display_data.playing = self.coordinator.active().map(|active| active.string);
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data)
    }

    /// Tick for deferred clears plus the keyboard shortcuts.
    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(TICK_INTERVAL).map(|_| Message::Tick),
            keyboard::on_key_press(key_to_message),
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Number keys 1-6 play the strings low to high; Enter and Space replay the
/// last chosen string.
fn key_to_message(key: Key, _modifiers: Modifiers) -> Option<Message> {
    match key.as_ref() {
        Key::Named(Named::Enter | Named::Space) => Some(Message::ActivateFocused),
        Key::Character(" ") => Some(Message::ActivateFocused),
        Key::Character(c) => c
            .parse::<usize>()
            .ok()
            .and_then(StringId::from_position)
            .map(Message::StringActivated),
        _ => None,
    }
}
