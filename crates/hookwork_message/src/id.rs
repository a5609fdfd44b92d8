//! Message identifiers and states.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of a message within one [`MessageSystem`](crate::MessageSystem).
///
/// Ids are issued from a monotonic counter and never reused for the
/// lifetime of the issuing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Lifecycle state of a message.
///
/// A message moves from `Pending` to one terminal state at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageState {
    /// Queued or being processed.
    Pending,
    /// Processed; a result is stored.
    Completed,
    /// Processing failed or the system stopped first.
    Failed,
}

impl MessageState {
    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}
