//! Channel focus contract shared by the focus manager and its clients.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

/// Name of the dialog channel (highest-priority audio activity).
pub const DIALOG_CHANNEL_NAME: &str = "Dialog";

/// Name of the alerts channel.
pub const ALERTS_CHANNEL_NAME: &str = "Alerts";

/// Name of the content channel (lowest-priority audio activity).
pub const CONTENT_CHANNEL_NAME: &str = "Content";

/// Focus held by a channel's activity: whether its observer should produce
/// audio and at what prominence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    /// The channel is not active; its observer must not produce audio.
    None,
    /// The channel is active but another channel holds the foreground.
    Background,
    /// The channel is the single foreground activity.
    Foreground,
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FocusState::None => write!(f, "NONE"),
            FocusState::Background => write!(f, "BACKGROUND"),
            FocusState::Foreground => write!(f, "FOREGROUND"),
        }
    }
}

/// Observer notified of focus transitions on a channel it acquired.
///
/// The focus manager holds only a weak reference to the observer and awaits
/// each callback to completion before issuing the next notification, so an
/// observer sees transitions in the exact order they were decided.
#[async_trait]
pub trait ChannelObserver: Send + Sync {
    async fn on_focus_changed(&self, new_focus: FocusState);
}

/// Entry point for channel arbitration.
///
/// All three operations are thread-safe and non-blocking: they capture what
/// they need and schedule the arbitration work asynchronously.
pub trait FocusHandler: Send + Sync {
    /// Request focus on the named channel for `observer`, tagging the new
    /// activity with `activity_id`. Returns `false` when `channel_name` does
    /// not exist; otherwise returns `true` and schedules the grant.
    fn acquire_channel(
        &self,
        channel_name: &str,
        observer: Arc<dyn ChannelObserver>,
        activity_id: &str,
    ) -> bool;

    /// Release the named channel if and only if `observer` still holds it.
    /// The returned receiver resolves with `true` when the release was
    /// performed, `false` otherwise (including unknown channel names).
    fn release_channel(
        &self,
        channel_name: &str,
        observer: &Arc<dyn ChannelObserver>,
    ) -> oneshot::Receiver<bool>;

    /// Ask the current foreground activity, if any, to release its channel.
    /// The stop is guarded by the activity id observed at scheduling time, so
    /// an activity that has since been replaced is left untouched.
    fn stop_foreground_activity(&self);
}
