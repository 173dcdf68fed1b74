//! Channels: named, priority-tagged arbitration slots.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use vesper_core::{ChannelObserver, FocusState};

/// Priority of the dialog channel. Lower numbers mean higher priority; 0 is
/// the highest possible priority.
pub const DIALOG_CHANNEL_PRIORITY: u32 = 100;

/// Priority of the alerts channel.
pub const ALERTS_CHANNEL_PRIORITY: u32 = 200;

/// Priority of the content channel.
pub const CONTENT_CHANNEL_PRIORITY: u32 = 300;

/// Name and priority used by the focus manager to create a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfiguration {
    pub name: String,
    pub priority: u32,
}

impl ChannelConfiguration {
    pub fn new(name: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            priority,
        }
    }

    /// The default channel set: Dialog, Alerts, and Content.
    pub fn defaults() -> Vec<ChannelConfiguration> {
        vec![
            ChannelConfiguration::new(vesper_core::DIALOG_CHANNEL_NAME, DIALOG_CHANNEL_PRIORITY),
            ChannelConfiguration::new(vesper_core::ALERTS_CHANNEL_NAME, ALERTS_CHANNEL_PRIORITY),
            ChannelConfiguration::new(vesper_core::CONTENT_CHANNEL_NAME, CONTENT_CHANNEL_PRIORITY),
        ]
    }
}

impl fmt::Display for ChannelConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name:'{}', priority:{}", self.name, self.priority)
    }
}

struct ChannelState {
    focus: FocusState,
    observer: Option<Weak<dyn ChannelObserver>>,
    activity_id: Option<String>,
}

/// Observer identity is allocation identity. Compare data pointers only;
/// vtable pointers for the same type can differ across codegen units.
fn same_observer(a: &Weak<dyn ChannelObserver>, b: &Weak<dyn ChannelObserver>) -> bool {
    a.as_ptr() as *const () == b.as_ptr() as *const ()
}

/// A single arbitration slot.
///
/// Mutable state lives behind a short-lived mutex; the arbitration logic in
/// the focus manager serializes all transitions on its executor, and observer
/// notifications are always issued after the lock is dropped.
pub struct Channel {
    name: String,
    priority: u32,
    state: Mutex<ChannelState>,
}

impl Channel {
    pub(crate) fn new(name: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            state: Mutex::new(ChannelState {
                focus: FocusState::None,
                observer: None,
                activity_id: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// True when an observer currently holds this channel.
    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().observer.is_some()
    }

    pub fn focus(&self) -> FocusState {
        self.state.lock().unwrap().focus
    }

    pub(crate) fn activity_id(&self) -> Option<String> {
        self.state.lock().unwrap().activity_id.clone()
    }

    pub(crate) fn set_activity_id(&self, activity_id: &str) {
        self.state.lock().unwrap().activity_id = Some(activity_id.to_string());
    }

    /// True when `observer` is the one currently holding this channel.
    pub(crate) fn is_held_by(&self, observer: &Arc<dyn ChannelObserver>) -> bool {
        let state = self.state.lock().unwrap();
        state
            .observer
            .as_ref()
            .is_some_and(|held| same_observer(held, &Arc::downgrade(observer)))
    }

    /// Install a new observer. When the channel was held by a different
    /// observer, that observer is returned so the caller can notify it with
    /// `None`, and the channel's focus is reset so the incoming observer
    /// receives a fresh transition.
    pub(crate) fn set_observer(
        &self,
        observer: Weak<dyn ChannelObserver>,
    ) -> Option<Weak<dyn ChannelObserver>> {
        let mut state = self.state.lock().unwrap();
        let displaced = state
            .observer
            .take()
            .filter(|held| !same_observer(held, &observer));
        if displaced.is_some() {
            state.focus = FocusState::None;
        }
        state.observer = Some(observer);
        displaced
    }

    /// Clear the observer and activity id, returning the observer that held
    /// the channel so the caller can notify it with `None`.
    pub(crate) fn clear(&self) -> Option<Weak<dyn ChannelObserver>> {
        let mut state = self.state.lock().unwrap();
        state.activity_id = None;
        state.focus = FocusState::None;
        state.observer.take()
    }

    /// Update the focus. Returns the observer to notify when the state
    /// actually changed, `None` when the update was a no-op.
    pub(crate) fn set_focus(&self, focus: FocusState) -> Option<Weak<dyn ChannelObserver>> {
        let mut state = self.state.lock().unwrap();
        if state.focus == focus {
            return None;
        }
        state.focus = focus;
        state.observer.clone()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("focus", &state.focus)
            .field("activity_id", &state.activity_id)
            .finish()
    }
}
