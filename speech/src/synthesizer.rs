//! The SpeechSynthesizer capability agent.
//!
//! Playback is a state machine driven by three serialized input streams:
//! inbound `Speak` directives, focus transitions from the focus manager, and
//! media player callbacks. Externally-invoked methods only post work onto the
//! agent's executor; the one exception is `on_focus_changed`, which also
//! awaits confirmation that playback reached the state the new focus demands,
//! so the focus manager can treat a completed callback as a completed
//! handover.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use vesper_core::{
    AttachmentManager, AttachmentReader, BlockingPolicy, CapabilityAgent, ChannelObserver,
    ContextManager, ContextRequestError, ContextRequester, Directive,
    DirectiveHandlerConfiguration, DirectiveHandlerResult, DirectiveInfo, EventMessage,
    ExceptionEncounteredSender, ExceptionErrorType, Executor, FocusHandler, FocusState,
    MediaPlayer, MediaPlayerObserver, MediaPlayerStatus, MessageSender, NamespaceAndName,
    ReaderPolicy, StateProvider, StateRefreshPolicy, DIALOG_CHANNEL_NAME,
};

use crate::config::SpeechSynthesizerConfig;
use crate::types::{SpeechSynthesizerObserver, SpeechSynthesizerState};

/// Directive namespace handled by this agent.
pub const NAMESPACE: &str = "SpeechSynthesizer";

/// The one directive this agent handles.
const SPEAK: &str = "Speak";

/// Context state name published to the context manager.
const SPEECH_STATE: &str = "SpeechState";

const SPEECH_STARTED: &str = "SpeechStarted";
const SPEECH_FINISHED: &str = "SpeechFinished";

/// The only audio format the speech player accepts.
const SUPPORTED_FORMAT: &str = "AUDIO_MPEG";

/// Url scheme for attachments delivered alongside the directive.
const CID_URL_PREFIX: &str = "cid:";

/// Payload of a `Speak` directive.
#[derive(Debug, Default, Deserialize)]
struct SpeakPayload {
    #[serde(default)]
    token: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    url: String,
}

/// Per-directive record: the validated token, the resolved audio stream, and
/// whether a `SpeechFinished` event is still owed.
struct SpeakDirectiveInfo {
    directive: Arc<Directive>,
    result: Option<Arc<dyn DirectiveHandlerResult>>,
    token: String,
    attachment_reader: Mutex<Option<Box<dyn AttachmentReader>>>,
    send_playback_finished: AtomicBool,
}

impl SpeakDirectiveInfo {
    /// Release the Speak-specific resources.
    fn clear(&self) {
        *self.attachment_reader.lock().unwrap() = None;
    }
}

/// Capability agent for the `SpeechSynthesizer` namespace.
pub struct SpeechSynthesizer {
    weak_self: Weak<SpeechSynthesizer>,
    speech_player: Arc<dyn MediaPlayer>,
    message_sender: Arc<dyn MessageSender>,
    focus_manager: Arc<dyn FocusHandler>,
    context_manager: Arc<dyn ContextManager>,
    attachment_manager: Arc<dyn AttachmentManager>,
    exception_sender: Arc<dyn ExceptionEncounteredSender>,
    observers: Mutex<Vec<Arc<dyn SpeechSynthesizerObserver>>>,
    /// Confirmed playback state. A watch channel so focus callbacks can await
    /// the transition the player eventually reports.
    current_state: watch::Sender<SpeechSynthesizerState>,
    /// State the synthesizer must transition to, set by focus changes.
    desired_state: Mutex<SpeechSynthesizerState>,
    /// Every pre-handled directive, keyed by message id.
    directives: DashMap<String, Arc<SpeakDirectiveInfo>>,
    /// The directive currently being spoken. Mutated only on the executor.
    current_info: Mutex<Option<Arc<SpeakDirectiveInfo>>>,
    /// Token of the current or most recent Speak, for context publication.
    latest_token: Mutex<String>,
    executor: Executor,
    config: SpeechSynthesizerConfig,
}

impl SpeechSynthesizer {
    /// Create the agent and register it as the player's observer. Must be
    /// called from within a tokio runtime.
    pub fn new(
        speech_player: Arc<dyn MediaPlayer>,
        message_sender: Arc<dyn MessageSender>,
        focus_manager: Arc<dyn FocusHandler>,
        context_manager: Arc<dyn ContextManager>,
        attachment_manager: Arc<dyn AttachmentManager>,
        exception_sender: Arc<dyn ExceptionEncounteredSender>,
        config: SpeechSynthesizerConfig,
    ) -> Arc<Self> {
        let (current_state, _) = watch::channel(SpeechSynthesizerState::Finished);
        let agent = Arc::new_cyclic(|weak_self: &Weak<Self>| Self {
            weak_self: weak_self.clone(),
            speech_player,
            message_sender,
            focus_manager,
            context_manager,
            attachment_manager,
            exception_sender,
            observers: Mutex::new(Vec::new()),
            current_state,
            desired_state: Mutex::new(SpeechSynthesizerState::Finished),
            directives: DashMap::new(),
            current_info: Mutex::new(None),
            latest_token: Mutex::new(String::new()),
            executor: Executor::new("speech_synthesizer"),
            config,
        });
        let player_observer: Weak<dyn MediaPlayerObserver> = agent.weak_self.clone();
        agent.speech_player.set_observer(player_observer);
        agent
    }

    /// Subscribe an observer to state transitions.
    pub fn add_observer(&self, observer: Arc<dyn SpeechSynthesizerObserver>) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            agent.observers.lock().unwrap().push(observer);
        });
    }

    fn agent(&self) -> Option<Arc<Self>> {
        self.weak_self.upgrade()
    }

    fn channel_observer(&self) -> Option<Arc<dyn ChannelObserver>> {
        self.agent().map(|agent| agent as Arc<dyn ChannelObserver>)
    }

    fn current_info(&self) -> Option<Arc<SpeakDirectiveInfo>> {
        self.current_info.lock().unwrap().clone()
    }

    /// Replace the current directive, removing the previous one from the
    /// in-flight map and releasing its resources.
    fn set_current_info(&self, info: Option<Arc<SpeakDirectiveInfo>>) {
        let mut current = self.current_info.lock().unwrap();
        if let Some(old) = current.take() {
            self.directives.remove(&old.directive.header.message_id);
            old.clear();
        }
        if let Some(info) = &info {
            *self.latest_token.lock().unwrap() = info.token.clone();
        }
        *current = info;
    }

    fn notify_observers(&self, state: SpeechSynthesizerState) {
        let observers = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.on_state_changed(state);
        }
    }

    /// Validate the directive and resolve its attachment. On error, returns
    /// the exception type and description to report.
    fn make_speak_info(
        &self,
        info: &DirectiveInfo,
    ) -> std::result::Result<Arc<SpeakDirectiveInfo>, (ExceptionErrorType, String)> {
        let directive = &info.directive;
        if directive.header.name != SPEAK {
            return Err((
                ExceptionErrorType::UnsupportedOperation,
                format!("Unexpected directive {}", directive.namespace_and_name()),
            ));
        }
        let payload: SpeakPayload = serde_json::from_str(&directive.payload).map_err(|e| {
            (
                ExceptionErrorType::UnexpectedInformationReceived,
                format!("Payload is not valid JSON: {e}"),
            )
        })?;
        if payload.token.is_empty() {
            return Err((
                ExceptionErrorType::UnexpectedInformationReceived,
                "Payload is missing the token property".to_string(),
            ));
        }
        if payload.format.is_empty() {
            return Err((
                ExceptionErrorType::UnexpectedInformationReceived,
                "Payload is missing the format property".to_string(),
            ));
        }
        if payload.format != SUPPORTED_FORMAT {
            return Err((
                ExceptionErrorType::UnexpectedInformationReceived,
                format!("Unsupported audio format: {}", payload.format),
            ));
        }
        if payload.url.is_empty() {
            return Err((
                ExceptionErrorType::UnexpectedInformationReceived,
                "Payload is missing the url property".to_string(),
            ));
        }
        let Some(content_id) = payload.url.strip_prefix(CID_URL_PREFIX) else {
            return Err((
                ExceptionErrorType::UnexpectedInformationReceived,
                format!("Unsupported url scheme: {}", payload.url),
            ));
        };
        let Some(reader) = self
            .attachment_manager
            .create_reader(content_id, ReaderPolicy::Blocking)
        else {
            return Err((
                ExceptionErrorType::UnexpectedInformationReceived,
                format!("Speech attachment unavailable: {content_id}"),
            ));
        };
        Ok(Arc::new(SpeakDirectiveInfo {
            directive: Arc::clone(directive),
            result: info.result.clone(),
            token: payload.token,
            attachment_reader: Mutex::new(Some(reader)),
            send_playback_finished: AtomicBool::new(true),
        }))
    }

    async fn send_exception_and_report_failed(
        &self,
        info: &DirectiveInfo,
        error: ExceptionErrorType,
        message: String,
    ) {
        warn!(
            target: "speech_synthesizer",
            message_id = %info.directive.header.message_id,
            error = %message,
            "Cannot handle Speak directive"
        );
        self.exception_sender
            .send_exception_encountered(info.directive.unparsed(), error, message.clone())
            .await;
        if let Some(result) = &info.result {
            result.set_failed(&message);
        }
    }

    async fn execute_handle_immediately(&self, directive: Arc<Directive>) {
        let info = DirectiveInfo {
            directive,
            result: None,
        };
        match self.make_speak_info(&info) {
            Ok(speak_info) => {
                self.directives.insert(
                    speak_info.directive.header.message_id.clone(),
                    Arc::clone(&speak_info),
                );
                self.execute_handle_after_validation(speak_info).await;
            }
            Err((error, message)) => {
                self.send_exception_and_report_failed(&info, error, message)
                    .await;
            }
        }
    }

    async fn execute_pre_handle(&self, info: DirectiveInfo) {
        if info.result.is_none() {
            warn!(
                target: "speech_synthesizer",
                message_id = %info.directive.header.message_id,
                "Pre-handle without a result sink; dropping directive"
            );
            return;
        }
        let message_id = info.directive.header.message_id.clone();
        if self.directives.contains_key(&message_id) {
            self.send_exception_and_report_failed(
                &info,
                ExceptionErrorType::UnexpectedInformationReceived,
                format!("Directive already pre-handled: {message_id}"),
            )
            .await;
            return;
        }
        match self.make_speak_info(&info) {
            Ok(speak_info) => {
                debug!(target: "speech_synthesizer", message_id = %message_id, token = %speak_info.token, "Speak staged");
                self.directives.insert(message_id, speak_info);
            }
            Err((error, message)) => {
                self.send_exception_and_report_failed(&info, error, message)
                    .await;
            }
        }
    }

    async fn execute_handle(&self, info: DirectiveInfo) {
        let message_id = &info.directive.header.message_id;
        let Some(speak_info) = self
            .directives
            .get(message_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            warn!(
                target: "speech_synthesizer",
                message_id = %message_id,
                "Handle for a directive that was never pre-handled"
            );
            if let Some(result) = &info.result {
                result.set_failed("Speak directive was not pre-handled");
            }
            return;
        };
        self.execute_handle_after_validation(speak_info).await;
    }

    async fn execute_handle_after_validation(&self, speak_info: Arc<SpeakDirectiveInfo>) {
        info!(target: "speech_synthesizer", token = %speak_info.token, "Handling Speak");
        self.set_current_info(Some(Arc::clone(&speak_info)));
        let Some(observer) = self.channel_observer() else {
            return;
        };
        if !self
            .focus_manager
            .acquire_channel(DIALOG_CHANNEL_NAME, observer, &speak_info.token)
        {
            warn!(
                target: "speech_synthesizer",
                token = %speak_info.token,
                "Could not acquire the dialog channel"
            );
            self.set_handling_failed("Could not acquire the dialog channel");
        }
    }

    async fn execute_cancel(&self, info: DirectiveInfo) {
        let message_id = &info.directive.header.message_id;
        let Some(speak_info) = self
            .directives
            .get(message_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            debug!(target: "speech_synthesizer", message_id = %message_id, "Cancel for unknown directive");
            return;
        };
        let is_current = self
            .current_info()
            .is_some_and(|current| Arc::ptr_eq(&current, &speak_info));
        info!(target: "speech_synthesizer", token = %speak_info.token, is_current, "Canceling Speak");

        if !is_current {
            // Staged but never started; drop it outright.
            speak_info.clear();
            self.directives.remove(message_id);
            if let Some(result) = &speak_info.result {
                result.set_canceled();
            }
            return;
        }

        if *self.current_state.borrow() == SpeechSynthesizerState::Playing {
            self.stop_playing().await;
            // SpeechStarted already went out; emit the paired SpeechFinished
            // before dropping the directive.
            if speak_info
                .send_playback_finished
                .swap(false, Ordering::SeqCst)
            {
                self.send_event(SPEECH_FINISHED, &speak_info.token).await;
            }
        } else {
            speak_info
                .send_playback_finished
                .store(false, Ordering::SeqCst);
        }
        self.release_foreground_focus();
        if let Some(result) = &speak_info.result {
            result.set_canceled();
        }
        self.set_current_info(None);
    }

    async fn execute_deregistered(&self) {
        info!(target: "speech_synthesizer", "Deregistered; flushing state");
        if *self.current_state.borrow() == SpeechSynthesizerState::Playing {
            self.stop_playing().await;
        }
        self.release_foreground_focus();
        self.set_current_info(None);
        self.directives.clear();
    }

    /// Drive the player toward the desired state.
    async fn execute_state_change(&self) {
        let desired = *self.desired_state.lock().unwrap();
        debug!(target: "speech_synthesizer", desired = %desired, "Executing state change");
        match desired {
            SpeechSynthesizerState::Playing => self.start_playing().await,
            SpeechSynthesizerState::Finished => {
                if *self.current_state.borrow() == SpeechSynthesizerState::Playing {
                    self.stop_playing().await;
                }
            }
        }
    }

    async fn start_playing(&self) {
        let Some(info) = self.current_info() else {
            warn!(target: "speech_synthesizer", "Foreground with no Speak to play");
            self.release_foreground_focus();
            return;
        };
        let reader = info.attachment_reader.lock().unwrap().take();
        let Some(reader) = reader else {
            self.execute_playback_error("Speech attachment is no longer readable".to_string())
                .await;
            return;
        };
        if self.speech_player.set_source(reader) == MediaPlayerStatus::Failure {
            self.execute_playback_error("Setting the speech source failed".to_string())
                .await;
            return;
        }
        if self.speech_player.play() == MediaPlayerStatus::Failure {
            self.execute_playback_error("Starting speech playback failed".to_string())
                .await;
        }
    }

    async fn stop_playing(&self) {
        if self.speech_player.stop() == MediaPlayerStatus::Failure {
            self.execute_playback_error("Stopping speech playback failed".to_string())
                .await;
        }
    }

    async fn execute_playback_started(&self) {
        debug!(target: "speech_synthesizer", "Playback started");
        self.current_state
            .send_replace(SpeechSynthesizerState::Playing);
        self.execute_provide_state(SpeechSynthesizerState::Playing, None)
            .await;
        if let Some(info) = self.current_info() {
            self.send_event(SPEECH_STARTED, &info.token).await;
        }
        self.notify_observers(SpeechSynthesizerState::Playing);
    }

    async fn execute_playback_finished(&self) {
        debug!(target: "speech_synthesizer", "Playback finished");
        self.current_state
            .send_replace(SpeechSynthesizerState::Finished);
        self.execute_provide_state(SpeechSynthesizerState::Finished, None)
            .await;
        if let Some(info) = self.current_info() {
            if info.send_playback_finished.swap(false, Ordering::SeqCst) {
                self.send_event(SPEECH_FINISHED, &info.token).await;
            }
        }
        self.release_foreground_focus();
        self.set_handling_completed();
        self.notify_observers(SpeechSynthesizerState::Finished);
    }

    async fn execute_playback_error(&self, error: String) {
        warn!(target: "speech_synthesizer", error = %error, "Playback error");
        self.current_state
            .send_replace(SpeechSynthesizerState::Finished);
        self.release_foreground_focus();
        self.set_handling_failed(&error);
        self.notify_observers(SpeechSynthesizerState::Finished);
    }

    /// Publish the playback state to the context manager. `state_request_token`
    /// is set when answering a `provide_state` request.
    async fn execute_provide_state(
        &self,
        state: SpeechSynthesizerState,
        state_request_token: Option<u32>,
    ) {
        let token = self
            .current_info()
            .map(|info| info.token.clone())
            .unwrap_or_else(|| self.latest_token.lock().unwrap().clone());
        let json_state = json!({
            "token": token,
            "offsetInMilliseconds": self.speech_player.offset_ms(),
            "playerActivity": state.to_string(),
        })
        .to_string();
        if let Err(error) = self
            .context_manager
            .set_state(
                NamespaceAndName::new(NAMESPACE, SPEECH_STATE),
                json_state,
                StateRefreshPolicy::Never,
                state_request_token,
            )
            .await
        {
            warn!(target: "speech_synthesizer", error = %error, "Failed to publish speech state");
        }
    }

    async fn send_event(&self, name: &str, token: &str) {
        debug!(target: "speech_synthesizer", event = %name, token = %token, "Sending event");
        let message = EventMessage::new(NAMESPACE, name, json!({ "token": token }));
        self.message_sender.send_message(message).await;
    }

    fn set_handling_completed(&self) {
        if let Some(info) = self.current_info() {
            debug!(target: "speech_synthesizer", token = %info.token, "Speak completed");
            if let Some(result) = &info.result {
                result.set_completed();
            }
        }
        self.set_current_info(None);
    }

    fn set_handling_failed(&self, description: &str) {
        if let Some(info) = self.current_info() {
            if let Some(result) = &info.result {
                result.set_failed(description);
            }
        }
        self.set_current_info(None);
    }

    /// Release the dialog channel. Safe to call even when focus was never
    /// granted or has already moved on: the focus manager's owner check makes
    /// the release a no-op unless this agent actually holds the channel.
    fn release_foreground_focus(&self) {
        if let Some(observer) = self.channel_observer() {
            // Fire-and-forget; arbitration resolves on the focus manager's
            // executor.
            let _ = self
                .focus_manager
                .release_channel(DIALOG_CHANNEL_NAME, &observer);
        }
    }
}

impl CapabilityAgent for SpeechSynthesizer {
    fn get_configuration(&self) -> DirectiveHandlerConfiguration {
        let mut configuration = DirectiveHandlerConfiguration::new();
        configuration.insert(
            NamespaceAndName::new(NAMESPACE, SPEAK),
            BlockingPolicy::BlockingMedium,
        );
        configuration
    }

    fn handle_directive_immediately(&self, directive: Arc<Directive>) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            agent.execute_handle_immediately(directive).await;
        });
    }

    fn pre_handle_directive(&self, info: DirectiveInfo) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            agent.execute_pre_handle(info).await;
        });
    }

    fn handle_directive(&self, info: DirectiveInfo) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            agent.execute_handle(info).await;
        });
    }

    fn cancel_directive(&self, info: DirectiveInfo) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            agent.execute_cancel(info).await;
        });
    }

    fn on_deregistered(&self) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            agent.execute_deregistered().await;
        });
    }
}

#[async_trait]
impl ChannelObserver for SpeechSynthesizer {
    /// The only blocking entry point: after scheduling the state change this
    /// waits, bounded by the configured timeout, until the player confirms
    /// the state the new focus demands.
    async fn on_focus_changed(&self, new_focus: FocusState) {
        let desired = {
            let mut desired_state = self.desired_state.lock().unwrap();
            *desired_state = match new_focus {
                FocusState::Foreground => SpeechSynthesizerState::Playing,
                FocusState::Background | FocusState::None => SpeechSynthesizerState::Finished,
            };
            *desired_state
        };
        info!(target: "speech_synthesizer", focus = %new_focus, desired = %desired, "Focus changed");
        if *self.current_state.borrow() == desired {
            return;
        }
        let Some(agent) = self.agent() else { return };
        let mut confirmations = self.current_state.subscribe();
        self.executor.submit(async move {
            agent.execute_state_change().await;
        });
        let wait_result = timeout(
            self.config.state_change_timeout,
            confirmations.wait_for(|state| *state == desired),
        )
        .await;
        match wait_result {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => {
                warn!(target: "speech_synthesizer", "State channel closed during focus handover")
            }
            Err(_) => warn!(
                target: "speech_synthesizer",
                desired = %desired,
                "Timed out waiting for the playback state transition"
            ),
        }
    }
}

impl MediaPlayerObserver for SpeechSynthesizer {
    fn on_playback_started(&self) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            agent.execute_playback_started().await;
        });
    }

    fn on_playback_finished(&self) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            agent.execute_playback_finished().await;
        });
    }

    fn on_playback_error(&self, error: String) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            agent.execute_playback_error(error).await;
        });
    }
}

impl StateProvider for SpeechSynthesizer {
    fn provide_state(&self, state_request_token: u32) {
        let Some(agent) = self.agent() else { return };
        self.executor.submit(async move {
            let state = *agent.current_state.borrow();
            agent
                .execute_provide_state(state, Some(state_request_token))
                .await;
        });
    }
}

impl ContextRequester for SpeechSynthesizer {
    fn on_context_available(&self, json_context: String) {
        // This agent never requests context; log and move on.
        self.executor.submit(async move {
            warn!(
                target: "speech_synthesizer",
                bytes = json_context.len(),
                "Unexpected context available"
            );
        });
    }

    fn on_context_failure(&self, error: ContextRequestError) {
        self.executor.submit(async move {
            warn!(target: "speech_synthesizer", error = ?error, "Context request failed");
        });
    }
}
