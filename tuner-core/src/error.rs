//! Error taxonomy of the tone engine.

use thiserror::Error;

/// Why a tone could not be played.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToneError {
    /// No audio output exists at all. Persists for the life of the process.
    #[error("No audio output is available on this system ({0}). Connect an output device or enable the sound server, then restart the tuner.")]
    PlatformUnsupported(String),
    /// The output exists but could not be opened this time. Retried on the
    /// next activation.
    #[error("Audio output could not be started: {0}")]
    InitializationFailure(String),
}

impl ToneError {
    /// Whether a later attempt could succeed without restarting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToneError::InitializationFailure(_))
    }
}

/// Messages for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Shown in the error area.
    Error(String),
    /// Replaces the status line.
    Status(String),
}
