// tuner-core/src/lib.rs

//! The core logic for the guitar reference-tone tuner.
//! This crate is responsible for the string table, tone synthesis, audio
//! output and the single-voice activation rules. It is completely headless
//! and contains no GUI code.

pub mod audio;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod graph;
pub mod strings;
pub mod synth;

pub use audio::{AudioContext, CpalBackend, OutputBackend};
pub use coordinator::{ActivationCoordinator, ActiveVoice, TonePlayer, VoiceState, IDLE_PROMPT};
pub use engine::{clamp_duration, ToneEngine, MAX_TONE_SECONDS};
pub use error::{Notice, ToneError};
pub use strings::{StringDefinition, StringId, GUITAR_STRINGS};

/// The engine wired to the system audio output.
pub type SystemToneEngine = ToneEngine<CpalBackend>;

/// The coordinator driving the system audio output.
pub type SystemCoordinator = ActivationCoordinator<SystemToneEngine>;
