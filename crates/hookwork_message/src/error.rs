//! Error types for message correlation.

use core::time::Duration;

use thiserror::Error;

use crate::id::MessageId;

/// Why a message ended in the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageFailure {
    /// The provider pipeline failed while handling the payload.
    #[error("processing failed: {0}")]
    Processing(String),

    /// The system stopped before the message was processed.
    #[error("aborted by shutdown")]
    Shutdown,
}

/// Errors returned to callers of a [`MessageSystem`](crate::MessageSystem).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The id was never issued, was already consumed, or was swept by retention.
    #[error("unknown message id: {0}")]
    UnknownId(MessageId),

    /// The message system no longer accepts messages.
    #[error("message system is stopped")]
    Stopped,

    /// The message reached the `Failed` state.
    #[error("message {id} failed: {failure}")]
    Failed {
        /// The failed message.
        id: MessageId,
        /// The recorded failure.
        failure: MessageFailure,
    },

    /// A caller-supplied wait deadline elapsed. The message stays in the
    /// table and can still be retrieved later.
    #[error("timed out after {timeout:?} waiting for message {id}")]
    Timeout {
        /// The message being waited on.
        id: MessageId,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The provider side of this system is already attached.
    #[error("the inbox of this message system was already taken")]
    InboxTaken,
}

impl MessageError {
    /// Returns `true` if the message was aborted because the system stopped.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            Self::Failed {
                failure: MessageFailure::Shutdown,
                ..
            }
        )
    }
}
