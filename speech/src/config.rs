//! Synthesizer tunables.

use std::time::Duration;

/// Env override for the state-change wait, in milliseconds.
const STATE_CHANGE_TIMEOUT_ENV: &str = "SPEECH_STATE_CHANGE_TIMEOUT_MS";

const DEFAULT_STATE_CHANGE_TIMEOUT_MS: u64 = 2_000;

/// Configuration for the speech synthesizer.
#[derive(Debug, Clone)]
pub struct SpeechSynthesizerConfig {
    /// Upper bound on how long a focus callback waits for the media player to
    /// confirm the requested state transition. After the timeout the callback
    /// returns and later player callbacks reconcile the state.
    pub state_change_timeout: Duration,
}

impl Default for SpeechSynthesizerConfig {
    fn default() -> Self {
        let state_change_timeout = std::env::var(STATE_CHANGE_TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_STATE_CHANGE_TIMEOUT_MS));
        Self {
            state_change_timeout,
        }
    }
}
