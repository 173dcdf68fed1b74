//! Reporting directives the client could not process.

use std::fmt;

use async_trait::async_trait;

/// Error categories reportable to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionErrorType {
    UnexpectedInformationReceived,
    UnsupportedOperation,
    InternalError,
}

impl fmt::Display for ExceptionErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionErrorType::UnexpectedInformationReceived => {
                write!(f, "UNEXPECTED_INFORMATION_RECEIVED")
            }
            ExceptionErrorType::UnsupportedOperation => write!(f, "UNSUPPORTED_OPERATION"),
            ExceptionErrorType::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// Notifies the service that a directive could not be handled.
#[async_trait]
pub trait ExceptionEncounteredSender: Send + Sync {
    async fn send_exception_encountered(
        &self,
        unparsed_directive: String,
        error: ExceptionErrorType,
        message: String,
    );
}
