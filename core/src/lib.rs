// Vesper Core Library
// Shared interfaces and runtime utilities for the Vesper voice client SDK

pub mod agent;
pub mod directive;
pub mod executor;
pub mod interfaces;
pub mod utils;

// Export core types
pub use agent::CapabilityAgent;
pub use directive::{
    BlockingPolicy, Directive, DirectiveHandlerConfiguration, DirectiveHandlerResult,
    DirectiveHeader, DirectiveInfo, NamespaceAndName,
};
pub use executor::Executor;
pub use interfaces::attachment::{AttachmentManager, AttachmentReader, ReaderPolicy};
pub use interfaces::context::{
    ContextManager, ContextRequestError, ContextRequester, StateProvider, StateRefreshPolicy,
};
pub use interfaces::exception::{ExceptionEncounteredSender, ExceptionErrorType};
pub use interfaces::focus::{
    ChannelObserver, FocusHandler, FocusState, ALERTS_CHANNEL_NAME, CONTENT_CHANNEL_NAME,
    DIALOG_CHANNEL_NAME,
};
pub use interfaces::media_player::{MediaPlayer, MediaPlayerObserver, MediaPlayerStatus};
pub use interfaces::message::{EventMessage, MessageSender};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VesperError {
    #[error("Focus error: {0}")]
    FocusError(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Attachment error: {0}")]
    AttachmentError(String),

    #[error("Media player error: {0}")]
    MediaPlayerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VesperError>;
