//! # Tone Engine
//!
//! Plays one reference tone per call through the fixed
//! oscillator -> lowpass -> gain chain and guarantees that every tone's nodes
//! are released when it ends.
//!
//! The output context is opened lazily on the first request (audio is only
//! started in response to the user) and reused afterwards. Failures never
//! reach the caller as return codes: they are posted on the notice channel,
//! because tones are requested from fire-and-forget UI events.

use crossbeam_channel::Sender;

use crate::audio::{AudioContext, OutputBackend};
use crate::error::{Notice, ToneError};
use crate::graph::VoiceId;

/// Longest tone the engine will play, in seconds.
pub const MAX_TONE_SECONDS: f32 = 30.0;

/// Normalizes a requested duration into `[0, MAX_TONE_SECONDS]`.
/// NaN is treated as zero.
pub fn clamp_duration(duration: f32) -> f32 {
    if duration.is_nan() {
        0.0
    } else {
        duration.clamp(0.0, MAX_TONE_SECONDS)
    }
}

pub struct ToneEngine<B: OutputBackend> {
    backend: B,
    context: Option<AudioContext>,
    /// Set once output is known not to exist; every later request is a no-op.
    unsupported: bool,
    notices: Sender<Notice>,
}

impl<B: OutputBackend> ToneEngine<B> {
    pub fn new(backend: B, notices: Sender<Notice>) -> Self {
        Self {
            backend,
            context: None,
            unsupported: false,
            notices,
        }
    }

    /// Checks for an audio output without opening it, so an unusable system
    /// is reported before the first click.
    pub fn probe(&mut self) -> bool {
        if self.unsupported {
            return false;
        }
        match self.backend.probe() {
            Ok(()) => true,
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    /// Opens the output context if it is not open yet. Repeated calls after a
    /// success return the same context. A context whose stream has faulted is
    /// dropped and opened again.
    fn ensure_context(&mut self) -> Result<&AudioContext, ToneError> {
        if self.unsupported {
            return Err(ToneError::PlatformUnsupported("audio output already found missing".into()));
        }
        if self.context.as_ref().is_some_and(AudioContext::is_faulted) {
            log::warn!(target: "tuner::engine", "Output stream faulted, reopening audio output");
            self.context = None;
        }
        let context = match self.context.take() {
            Some(context) => context,
            None => {
                log::info!(target: "tuner::engine", "Opening audio output...");
                self.backend.open()?
            }
        };
        Ok(self.context.insert(context))
    }

    /// Plays `frequency` Hz for `duration` seconds (clamped to
    /// `[0, MAX_TONE_SECONDS]`). Returns the scheduled voice, or `None` when
    /// nothing could be played; the reason has already been reported.
    pub fn play_tone(&mut self, frequency: f32, duration: f32) -> Option<VoiceId> {
        if self.unsupported {
            log::debug!(target: "tuner::engine", "Audio output unsupported, ignoring tone request");
            return None;
        }
        if !(frequency.is_finite() && frequency > 0.0) {
            log::warn!(target: "tuner::engine", "Rejecting tone with invalid frequency {}", frequency);
            return None;
        }

        let duration = clamp_duration(duration);
        let started = self
            .ensure_context()
            .and_then(|context| context.start_tone(frequency, duration));

        match started {
            Ok(id) => {
                log::info!(
                    target: "tuner::engine",
                    "Playing {:.2} Hz for {:.2}s (voice {})",
                    frequency, duration, id.0
                );
                Some(id)
            }
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    /// Logs voices released since the last call and returns how many there
    /// were.
    pub fn collect_finished(&mut self) -> usize {
        let Some(context) = &self.context else {
            return 0;
        };
        let ended = context.drain_ended();
        for id in &ended {
            log::debug!(target: "tuner::engine", "Voice {} ended, nodes disconnected", id.0);
        }
        ended.len()
    }

    pub fn context(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    pub fn is_unsupported(&self) -> bool {
        self.unsupported
    }

    fn report(&mut self, error: ToneError) {
        if !error.is_retryable() {
            if self.unsupported {
                return;
            }
            self.unsupported = true;
        }
        log::error!(target: "tuner::engine", "{}", error);
        // The presentation layer may already be gone during shutdown.
        let _ = self.notices.send(Notice::Error(error.to_string()));
    }
}
