//! Collaborator contracts consumed and exposed by capability agents.
//!
//! - `focus`: channel focus states, observer callback, arbitration entry point
//! - `media_player`: playback engine surface and its observer callbacks
//! - `context`: context manager sink, state provider, context request replies
//! - `message`: outbound event messages
//! - `attachment`: binary attachment readers
//! - `exception`: directive failure reporting

pub mod attachment;
pub mod context;
pub mod exception;
pub mod focus;
pub mod media_player;
pub mod message;

pub use attachment::{AttachmentManager, AttachmentReader, ReaderPolicy};
pub use context::{
    ContextManager, ContextRequestError, ContextRequester, StateProvider, StateRefreshPolicy,
};
pub use exception::{ExceptionEncounteredSender, ExceptionErrorType};
pub use focus::{ChannelObserver, FocusHandler, FocusState};
pub use media_player::{MediaPlayer, MediaPlayerObserver, MediaPlayerStatus};
pub use message::{EventMessage, MessageSender};
