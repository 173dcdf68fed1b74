//! Hand-rolled collaborator mocks shared by the synthesizer test binaries.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{oneshot, Notify};

use vesper_core::{
    AttachmentManager, AttachmentReader, ChannelObserver, ContextManager, ContextRequester,
    Directive, DirectiveHandlerResult, DirectiveHeader, DirectiveInfo, EventMessage,
    ExceptionEncounteredSender, ExceptionErrorType, FocusHandler, MediaPlayer,
    MediaPlayerObserver, MediaPlayerStatus, MessageSender, NamespaceAndName, ReaderPolicy,
    Result, StateRefreshPolicy, VesperError,
};
use vesper_speech::{SpeechSynthesizer, SpeechSynthesizerConfig};

const WAIT: Duration = Duration::from_secs(1);

/// Wait until `predicate` holds, waking on `notify`.
pub async fn wait_until<F: Fn() -> bool>(notify: &Notify, what: &str, predicate: F) {
    tokio::time::timeout(WAIT, async {
        loop {
            let notified = notify.notified();
            if predicate() {
                return;
            }
            notified.await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

/// Test playback engine: `play` reports started synchronously, `stop` and
/// the explicit `finish` handle report finished.
pub struct MockMediaPlayer {
    observer: Mutex<Option<Weak<dyn MediaPlayerObserver>>>,
    source_set: AtomicBool,
    playing: AtomicBool,
    fail_next_play: AtomicBool,
    mute_callbacks: AtomicBool,
    offset: AtomicI64,
}

impl MockMediaPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            observer: Mutex::new(None),
            source_set: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            fail_next_play: AtomicBool::new(false),
            mute_callbacks: AtomicBool::new(false),
            offset: AtomicI64::new(0),
        })
    }

    fn observer(&self) -> Option<Arc<dyn MediaPlayerObserver>> {
        self.observer.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    /// Make the next `play` call return `Failure`.
    pub fn fail_next_play(&self) {
        self.fail_next_play.store(true, Ordering::SeqCst);
    }

    /// Swallow the callbacks a `play`/`stop` would fire, simulating an engine
    /// that accepted the call but never confirms.
    pub fn mute_callbacks(&self) {
        self.mute_callbacks.store(true, Ordering::SeqCst);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn set_offset_ms(&self, offset: i64) {
        self.offset.store(offset, Ordering::SeqCst);
    }

    /// End the current playback, as the engine does at end of stream.
    pub fn finish(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            if let Some(observer) = self.observer() {
                observer.on_playback_finished();
            }
        }
    }

    /// Report a mid-playback engine error.
    pub fn error(&self, message: &str) {
        self.playing.store(false, Ordering::SeqCst);
        if let Some(observer) = self.observer() {
            observer.on_playback_error(message.to_string());
        }
    }
}

impl MediaPlayer for MockMediaPlayer {
    fn set_source(&self, _reader: Box<dyn AttachmentReader>) -> MediaPlayerStatus {
        self.source_set.store(true, Ordering::SeqCst);
        MediaPlayerStatus::Success
    }

    fn play(&self) -> MediaPlayerStatus {
        if self.fail_next_play.swap(false, Ordering::SeqCst) {
            return MediaPlayerStatus::Failure;
        }
        if !self.source_set.swap(false, Ordering::SeqCst) {
            return MediaPlayerStatus::Failure;
        }
        self.playing.store(true, Ordering::SeqCst);
        if !self.mute_callbacks.load(Ordering::SeqCst) {
            if let Some(observer) = self.observer() {
                observer.on_playback_started();
            }
        }
        MediaPlayerStatus::Success
    }

    fn stop(&self) -> MediaPlayerStatus {
        if self.playing.swap(false, Ordering::SeqCst) {
            if !self.mute_callbacks.load(Ordering::SeqCst) {
                if let Some(observer) = self.observer() {
                    observer.on_playback_finished();
                }
            }
            MediaPlayerStatus::Success
        } else {
            MediaPlayerStatus::Failure
        }
    }

    fn offset_ms(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }

    fn set_observer(&self, observer: Weak<dyn MediaPlayerObserver>) {
        *self.observer.lock().unwrap() = Some(observer);
    }
}

/// Collects outbound events.
pub struct MockMessageSender {
    events: Mutex<Vec<EventMessage>>,
    pub notify: Notify,
}

impl MockMessageSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            notify: Notify::new(),
        })
    }

    pub fn events(&self) -> Vec<EventMessage> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events().iter().map(|e| e.name.clone()).collect()
    }

    pub async fn wait_for_event(&self, name: &str) -> EventMessage {
        self.wait_for_event_count(name, 1).await
    }

    /// Wait until the `count`-th event named `name` has been sent and return
    /// it; lets loops distinguish fresh events from earlier ones.
    pub async fn wait_for_event_count(&self, name: &str, count: usize) -> EventMessage {
        wait_until(&self.notify, name, || {
            self.events().iter().filter(|e| e.name == name).count() >= count
        })
        .await;
        self.events()
            .into_iter()
            .filter(|e| e.name == name)
            .nth(count - 1)
            .unwrap()
    }
}

#[async_trait]
impl MessageSender for MockMessageSender {
    async fn send_message(&self, message: EventMessage) {
        self.events.lock().unwrap().push(message);
        self.notify.notify_waiters();
    }
}

#[derive(Debug, Clone)]
pub struct RecordedState {
    pub namespace: NamespaceAndName,
    pub json_state: String,
    pub refresh_policy: StateRefreshPolicy,
    pub state_request_token: Option<u32>,
}

/// Records published states; optionally fails every `set_state`.
pub struct MockContextManager {
    states: Mutex<Vec<RecordedState>>,
    fail: AtomicBool,
    pub notify: Notify,
}

impl MockContextManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }

    pub fn fail_set_state(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn states(&self) -> Vec<RecordedState> {
        self.states.lock().unwrap().clone()
    }

    pub async fn wait_for_activity(&self, activity: &str) -> RecordedState {
        let needle = format!("\"playerActivity\":\"{activity}\"");
        wait_until(&self.notify, activity, || {
            self.states().iter().any(|s| s.json_state.contains(&needle))
        })
        .await;
        self.states()
            .into_iter()
            .rev()
            .find(|s| s.json_state.contains(&needle))
            .unwrap()
    }
}

#[async_trait]
impl ContextManager for MockContextManager {
    async fn set_state(
        &self,
        namespace: NamespaceAndName,
        json_state: String,
        refresh_policy: StateRefreshPolicy,
        state_request_token: Option<u32>,
    ) -> Result<()> {
        self.states.lock().unwrap().push(RecordedState {
            namespace,
            json_state,
            refresh_policy,
            state_request_token,
        });
        self.notify.notify_waiters();
        if self.fail.load(Ordering::SeqCst) {
            return Err(VesperError::ContextError("set_state rejected".to_string()));
        }
        Ok(())
    }

    fn get_context(&self, _requester: Arc<dyn ContextRequester>) {}
}

struct SilenceReader {
    remaining: usize,
}

impl AttachmentReader for SilenceReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.remaining.min(buf.len());
        buf[..n].fill(0);
        self.remaining -= n;
        Ok(n)
    }
}

/// Resolves every `cid:` locator to a short silent stream unless told that
/// attachments are missing.
pub struct MockAttachmentManager {
    missing: AtomicBool,
}

impl MockAttachmentManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            missing: AtomicBool::new(false),
        })
    }

    pub fn drop_attachments(&self) {
        self.missing.store(true, Ordering::SeqCst);
    }
}

impl AttachmentManager for MockAttachmentManager {
    fn create_reader(
        &self,
        _content_id: &str,
        _policy: ReaderPolicy,
    ) -> Option<Box<dyn AttachmentReader>> {
        if self.missing.load(Ordering::SeqCst) {
            None
        } else {
            Some(Box::new(SilenceReader { remaining: 64 }))
        }
    }
}

/// Collects reported exceptions.
pub struct MockExceptionSender {
    exceptions: Mutex<Vec<(String, ExceptionErrorType, String)>>,
    pub notify: Notify,
}

impl MockExceptionSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            exceptions: Mutex::new(Vec::new()),
            notify: Notify::new(),
        })
    }

    pub fn exceptions(&self) -> Vec<(String, ExceptionErrorType, String)> {
        self.exceptions.lock().unwrap().clone()
    }

    pub async fn wait_for_exception(&self) -> (ExceptionErrorType, String) {
        wait_until(&self.notify, "an exception report", || {
            !self.exceptions().is_empty()
        })
        .await;
        let (_, error, message) = self.exceptions().remove(0);
        (error, message)
    }
}

#[async_trait]
impl ExceptionEncounteredSender for MockExceptionSender {
    async fn send_exception_encountered(
        &self,
        unparsed_directive: String,
        error: ExceptionErrorType,
        message: String,
    ) {
        self.exceptions
            .lock()
            .unwrap()
            .push((unparsed_directive, error, message));
        self.notify.notify_waiters();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveOutcome {
    Completed,
    Failed(String),
    Canceled,
}

/// One-shot result sink recording which outcome the agent reported.
pub struct MockDirectiveResult {
    outcome: Mutex<Option<DirectiveOutcome>>,
    pub notify: Notify,
}

impl MockDirectiveResult {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(None),
            notify: Notify::new(),
        })
    }

    pub fn outcome(&self) -> Option<DirectiveOutcome> {
        self.outcome.lock().unwrap().clone()
    }

    pub async fn wait_for_outcome(&self) -> DirectiveOutcome {
        wait_until(&self.notify, "a directive outcome", || {
            self.outcome().is_some()
        })
        .await;
        self.outcome().unwrap()
    }
}

impl DirectiveHandlerResult for MockDirectiveResult {
    fn set_completed(&self) {
        *self.outcome.lock().unwrap() = Some(DirectiveOutcome::Completed);
        self.notify.notify_waiters();
    }

    fn set_failed(&self, description: &str) {
        *self.outcome.lock().unwrap() = Some(DirectiveOutcome::Failed(description.to_string()));
        self.notify.notify_waiters();
    }

    fn set_canceled(&self) {
        *self.outcome.lock().unwrap() = Some(DirectiveOutcome::Canceled);
        self.notify.notify_waiters();
    }
}

/// Records arbitration requests and hands focus transitions back to the
/// captured observer on demand.
pub struct MockFocusHandler {
    acquires: Mutex<Vec<(String, String)>>,
    releases: Mutex<Vec<String>>,
    observer: Mutex<Option<Arc<dyn ChannelObserver>>>,
    pub notify: Notify,
}

impl MockFocusHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            acquires: Mutex::new(Vec::new()),
            releases: Mutex::new(Vec::new()),
            observer: Mutex::new(None),
            notify: Notify::new(),
        })
    }

    pub fn acquires(&self) -> Vec<(String, String)> {
        self.acquires.lock().unwrap().clone()
    }

    pub fn releases(&self) -> Vec<String> {
        self.releases.lock().unwrap().clone()
    }

    /// Wait until the agent has requested focus, returning its observer.
    pub async fn wait_for_acquire(&self) -> Arc<dyn ChannelObserver> {
        wait_until(&self.notify, "an acquire request", || {
            self.observer.lock().unwrap().is_some()
        })
        .await;
        self.observer.lock().unwrap().clone().unwrap()
    }

    pub async fn wait_for_release(&self) {
        wait_until(&self.notify, "a release request", || {
            !self.releases().is_empty()
        })
        .await;
    }
}

impl FocusHandler for MockFocusHandler {
    fn acquire_channel(
        &self,
        channel_name: &str,
        observer: Arc<dyn ChannelObserver>,
        activity_id: &str,
    ) -> bool {
        self.acquires
            .lock()
            .unwrap()
            .push((channel_name.to_string(), activity_id.to_string()));
        *self.observer.lock().unwrap() = Some(observer);
        self.notify.notify_waiters();
        true
    }

    fn release_channel(
        &self,
        channel_name: &str,
        _observer: &Arc<dyn ChannelObserver>,
    ) -> oneshot::Receiver<bool> {
        self.releases.lock().unwrap().push(channel_name.to_string());
        self.notify.notify_waiters();
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(true);
        rx
    }

    fn stop_foreground_activity(&self) {}
}

/// Build a `Speak` directive with a well-formed payload.
pub fn speak_directive(message_id: &str, token: &str) -> Arc<Directive> {
    let payload = json!({
        "token": token,
        "format": "AUDIO_MPEG",
        "url": format!("cid:{token}-audio"),
    })
    .to_string();
    speak_directive_with_payload(message_id, &payload)
}

pub fn speak_directive_with_payload(message_id: &str, payload: &str) -> Arc<Directive> {
    Arc::new(Directive {
        header: DirectiveHeader {
            namespace: "SpeechSynthesizer".to_string(),
            name: "Speak".to_string(),
            message_id: message_id.to_string(),
            dialog_request_id: None,
        },
        payload: payload.to_string(),
    })
}

pub fn info_with_result(
    directive: Arc<Directive>,
    result: &Arc<MockDirectiveResult>,
) -> DirectiveInfo {
    DirectiveInfo {
        directive,
        result: Some(Arc::clone(result) as Arc<dyn DirectiveHandlerResult>),
    }
}

/// Agent wired to mock collaborators, with the focus handler mocked out.
pub struct AgentHarness {
    pub player: Arc<MockMediaPlayer>,
    pub sender: Arc<MockMessageSender>,
    pub focus: Arc<MockFocusHandler>,
    pub context: Arc<MockContextManager>,
    pub attachments: Arc<MockAttachmentManager>,
    pub exceptions: Arc<MockExceptionSender>,
    pub agent: Arc<SpeechSynthesizer>,
}

impl AgentHarness {
    pub fn new() -> Self {
        Self::with_config(SpeechSynthesizerConfig::default())
    }

    pub fn with_config(config: SpeechSynthesizerConfig) -> Self {
        let player = MockMediaPlayer::new();
        let sender = MockMessageSender::new();
        let focus = MockFocusHandler::new();
        let context = MockContextManager::new();
        let attachments = MockAttachmentManager::new();
        let exceptions = MockExceptionSender::new();
        let agent = SpeechSynthesizer::new(
            Arc::clone(&player) as Arc<dyn MediaPlayer>,
            Arc::clone(&sender) as Arc<dyn MessageSender>,
            Arc::clone(&focus) as Arc<dyn FocusHandler>,
            Arc::clone(&context) as Arc<dyn ContextManager>,
            Arc::clone(&attachments) as Arc<dyn AttachmentManager>,
            Arc::clone(&exceptions) as Arc<dyn ExceptionEncounteredSender>,
            config,
        );
        Self {
            player,
            sender,
            focus,
            context,
            attachments,
            exceptions,
            agent,
        }
    }
}
