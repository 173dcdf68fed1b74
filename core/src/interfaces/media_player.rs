//! Playback engine surface.
//!
//! The media player is a black box to the agents: they hand it an attachment
//! reader, ask it to play or stop, and learn about the outcome through the
//! asynchronous observer callbacks.

use std::sync::Weak;

use crate::interfaces::attachment::AttachmentReader;

/// Result of a synchronous media player call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPlayerStatus {
    /// The call took effect.
    Success,
    /// The call was accepted; the outcome arrives via an observer callback.
    Pending,
    /// The call failed.
    Failure,
}

/// Playback engine consumed by capability agents.
pub trait MediaPlayer: Send + Sync {
    /// Hand the player the audio source for the next playback.
    fn set_source(&self, reader: Box<dyn AttachmentReader>) -> MediaPlayerStatus;

    /// Start playing the current source.
    fn play(&self) -> MediaPlayerStatus;

    /// Stop the current playback. A successful stop is confirmed through
    /// `on_playback_finished`.
    fn stop(&self) -> MediaPlayerStatus;

    /// Current playback offset in milliseconds.
    fn offset_ms(&self) -> i64;

    /// Register the observer notified of playback transitions. The player
    /// holds the observer weakly.
    fn set_observer(&self, observer: Weak<dyn MediaPlayerObserver>);
}

/// Callbacks delivered by the playback engine. Implementations must return
/// promptly; agents post the real work onto their executor.
pub trait MediaPlayerObserver: Send + Sync {
    fn on_playback_started(&self);

    fn on_playback_finished(&self);

    fn on_playback_error(&self, error: String);
}
