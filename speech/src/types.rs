//! Synthesizer state and observer contract.

use std::fmt;

/// Playback state of the speech synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechSynthesizerState {
    /// Speech audio is playing.
    Playing,
    /// No speech audio is playing.
    Finished,
}

impl fmt::Display for SpeechSynthesizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechSynthesizerState::Playing => write!(f, "PLAYING"),
            SpeechSynthesizerState::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Observer of synthesizer state transitions, notified in playback order.
pub trait SpeechSynthesizerObserver: Send + Sync {
    fn on_state_changed(&self, state: SpeechSynthesizerState);
}
