//! The focus manager: priority-ordered channel arbitration.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use vesper_core::{ChannelObserver, Executor, FocusHandler, FocusState};

use crate::channel::{Channel, ChannelConfiguration};

/// Arbitrates access to a fixed set of priority-ordered channels.
///
/// Clients acquire a channel with an observer and an activity id, and are
/// notified of focus changes through asynchronous `on_focus_changed`
/// callbacks. The manager enforces that at most one channel holds foreground
/// at any instant: acquiring a channel that outranks the current foreground
/// backgrounds the old holder before the new one is foregrounded, and
/// releasing the foreground channel promotes the highest-priority remaining
/// active channel.
///
/// All channel mutation and all observer notification happens on a single
/// sequential executor. The public methods are thread-safe: they capture the
/// state they need and schedule the rest. Observers are held weakly, so the
/// manager never extends an observer's lifetime past its release.
pub struct FocusManager {
    all_channels: Arc<HashMap<String, Arc<Channel>>>,
    executor: Executor,
}

impl FocusManager {
    /// Create channels from the given configurations. Configurations that
    /// repeat an already-used name or priority are discarded.
    pub fn new(channel_configurations: Vec<ChannelConfiguration>) -> Self {
        let mut all_channels: HashMap<String, Arc<Channel>> = HashMap::new();
        for config in channel_configurations {
            let name_taken = all_channels.contains_key(&config.name);
            let priority_taken = all_channels
                .values()
                .any(|channel| channel.priority() == config.priority);
            if name_taken || priority_taken {
                warn!(target: "focus_manager", config = %config, "Discarding duplicate channel configuration");
                continue;
            }
            debug!(target: "focus_manager", config = %config, "Creating channel");
            all_channels.insert(
                config.name.clone(),
                Arc::new(Channel::new(&config.name, config.priority)),
            );
        }
        Self {
            all_channels: Arc::new(all_channels),
            executor: Executor::new("focus_manager"),
        }
    }

    fn channel(&self, channel_name: &str) -> Option<Arc<Channel>> {
        self.all_channels.get(channel_name).cloned()
    }

    /// The highest-priority active channel, i.e. the channel that is (or is
    /// about to become) foreground.
    fn foreground_channel_of(
        all_channels: &HashMap<String, Arc<Channel>>,
    ) -> Option<Arc<Channel>> {
        all_channels
            .values()
            .filter(|channel| channel.is_active())
            .min_by_key(|channel| channel.priority())
            .cloned()
    }

    async fn notify(
        observer: &Weak<dyn ChannelObserver>,
        focus: FocusState,
        channel_name: &str,
    ) {
        match observer.upgrade() {
            Some(observer) => {
                debug!(target: "focus_manager", channel = %channel_name, focus = %focus, "Notifying observer");
                observer.on_focus_changed(focus).await;
            }
            None => {
                debug!(target: "focus_manager", channel = %channel_name, "Observer dropped before notification");
            }
        }
    }

    /// Full acquire logic, run on the executor.
    async fn execute_acquire(
        all_channels: Arc<HashMap<String, Arc<Channel>>>,
        channel_to_acquire: Arc<Channel>,
        observer: Arc<dyn ChannelObserver>,
        activity_id: String,
    ) {
        let previous_foreground = Self::foreground_channel_of(&all_channels);

        // An observer being replaced on the same channel is displaced first.
        if let Some(displaced) = channel_to_acquire.set_observer(Arc::downgrade(&observer)) {
            Self::notify(&displaced, FocusState::None, channel_to_acquire.name()).await;
        }
        channel_to_acquire.set_activity_id(&activity_id);

        let new_foreground = Self::foreground_channel_of(&all_channels);
        let acquired_wins = new_foreground
            .as_ref()
            .is_some_and(|foreground| Arc::ptr_eq(foreground, &channel_to_acquire));

        if acquired_wins {
            if let Some(previous) = previous_foreground {
                if !Arc::ptr_eq(&previous, &channel_to_acquire) {
                    if let Some(backgrounded) = previous.set_focus(FocusState::Background) {
                        Self::notify(&backgrounded, FocusState::Background, previous.name()).await;
                    }
                }
            }
            if let Some(foregrounded) = channel_to_acquire.set_focus(FocusState::Foreground) {
                Self::notify(
                    &foregrounded,
                    FocusState::Foreground,
                    channel_to_acquire.name(),
                )
                .await;
            }
        } else {
            // A higher-priority channel keeps the foreground; the acquired
            // channel starts out backgrounded.
            if let Some(backgrounded) = channel_to_acquire.set_focus(FocusState::Background) {
                Self::notify(
                    &backgrounded,
                    FocusState::Background,
                    channel_to_acquire.name(),
                )
                .await;
            }
        }
    }

    /// Release `channel` and promote the next active channel if the released
    /// one was foreground.
    async fn release_active_channel(
        all_channels: &HashMap<String, Arc<Channel>>,
        channel: Arc<Channel>,
    ) {
        let was_foreground = channel.focus() == FocusState::Foreground;
        if let Some(released) = channel.clear() {
            Self::notify(&released, FocusState::None, channel.name()).await;
        }
        if was_foreground {
            if let Some(next) = Self::foreground_channel_of(all_channels) {
                if let Some(promoted) = next.set_focus(FocusState::Foreground) {
                    Self::notify(&promoted, FocusState::Foreground, next.name()).await;
                }
            }
        }
    }

    /// Full release logic, run on the executor. Returns whether the release
    /// was performed.
    async fn execute_release(
        all_channels: &HashMap<String, Arc<Channel>>,
        channel: Arc<Channel>,
        observer: &Arc<dyn ChannelObserver>,
    ) -> bool {
        if !channel.is_held_by(observer) {
            debug!(
                target: "focus_manager",
                channel = %channel.name(),
                "Release ignored: caller does not hold the channel"
            );
            return false;
        }
        Self::release_active_channel(all_channels, channel).await;
        true
    }
}

impl Default for FocusManager {
    fn default() -> Self {
        Self::new(ChannelConfiguration::defaults())
    }
}

impl FocusHandler for FocusManager {
    fn acquire_channel(
        &self,
        channel_name: &str,
        observer: Arc<dyn ChannelObserver>,
        activity_id: &str,
    ) -> bool {
        let Some(channel) = self.channel(channel_name) else {
            warn!(target: "focus_manager", channel = %channel_name, "Acquire failed: unknown channel");
            return false;
        };
        info!(
            target: "focus_manager",
            channel = %channel_name,
            activity_id = %activity_id,
            "Acquire requested"
        );
        let all_channels = Arc::clone(&self.all_channels);
        let activity_id = activity_id.to_string();
        self.executor.submit(async move {
            Self::execute_acquire(all_channels, channel, observer, activity_id).await;
        });
        true
    }

    fn release_channel(
        &self,
        channel_name: &str,
        observer: &Arc<dyn ChannelObserver>,
    ) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let Some(channel) = self.channel(channel_name) else {
            warn!(target: "focus_manager", channel = %channel_name, "Release failed: unknown channel");
            let _ = tx.send(false);
            return rx;
        };
        info!(target: "focus_manager", channel = %channel_name, "Release requested");
        let all_channels = Arc::clone(&self.all_channels);
        let observer = Arc::clone(observer);
        self.executor.submit(async move {
            let released = Self::execute_release(&all_channels, channel, &observer).await;
            let _ = tx.send(released);
        });
        rx
    }

    fn stop_foreground_activity(&self) {
        // Snapshot taken synchronously; the queued task re-checks the
        // activity id so a stop aimed at an already-replaced activity is a
        // no-op.
        let Some(foreground) = Self::foreground_channel_of(&self.all_channels) else {
            debug!(target: "focus_manager", "No foreground activity to stop");
            return;
        };
        let Some(snapshot_activity_id) = foreground.activity_id() else {
            return;
        };
        info!(
            target: "focus_manager",
            channel = %foreground.name(),
            activity_id = %snapshot_activity_id,
            "Stop foreground requested"
        );
        let all_channels = Arc::clone(&self.all_channels);
        self.executor.submit(async move {
            if foreground.activity_id().as_deref() != Some(snapshot_activity_id.as_str()) {
                debug!(
                    target: "focus_manager",
                    channel = %foreground.name(),
                    "Stale stop request ignored"
                );
                return;
            }
            Self::release_active_channel(&all_channels, foreground).await;
        });
    }
}
