//! Binary attachment access.

use crate::Result;

/// How a reader behaves when it catches up with the attachment writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderPolicy {
    /// `read` waits for more data until the attachment is closed.
    Blocking,
    /// `read` returns what is available immediately.
    NonBlocking,
}

/// Stream over binary attachment content.
pub trait AttachmentReader: Send {
    /// Read up to `buf.len()` bytes into `buf`. Returns the number of bytes
    /// read; 0 means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Factory for readers over received attachments.
pub trait AttachmentManager: Send + Sync {
    /// Create a reader over the attachment identified by `content_id`, or
    /// `None` when no such attachment exists.
    fn create_reader(
        &self,
        content_id: &str,
        policy: ReaderPolicy,
    ) -> Option<Box<dyn AttachmentReader>>;
}
