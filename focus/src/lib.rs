// Vesper focus arbitration library
//
// Takes requests to acquire and release channels and updates the focus of
// other channels based on their priorities, holding the invariant that at
// most one channel is foreground at any instant. Observers are notified of
// focus changes asynchronously, in arbitration order, from a single
// sequential executor.

pub mod channel;
pub mod manager;

pub use channel::{
    Channel, ChannelConfiguration, ALERTS_CHANNEL_PRIORITY, CONTENT_CHANNEL_PRIORITY,
    DIALOG_CHANNEL_PRIORITY,
};
pub use manager::FocusManager;
