//! Cross-context message correlation for Hookwork (Layer 1).
//!
//! A [`MessageSystem`] lets any caller, on any thread, hand a payload to a
//! provider running somewhere else and get back exactly the result produced
//! for that payload:
//!
//! - [`send_to_provider`](MessageSystem::send_to_provider) registers a pending
//!   message under a fresh [`MessageId`] and queues the payload (never blocks)
//! - [`retrieve_result`](MessageSystem::retrieve_result) reads the outcome
//!   without blocking, distinguishing "not ready" from "unknown id"
//! - [`send_wait_answer`](MessageSystem::send_wait_answer) sends and suspends
//!   until that one message is settled, then consumes it
//!
//! The provider side drains payloads through an [`Inbox`] and settles each
//! message exactly once with [`Inbox::resolve`].
//!
//! # Example
//!
//! ```
//! use hookwork_message::{MessageSystem, Retrieved};
//!
//! let messages: MessageSystem<u32, u32> = MessageSystem::new();
//! let mut inbox = messages.inbox().unwrap();
//!
//! let id = messages.send_to_provider(21).unwrap();
//! assert_eq!(messages.retrieve_result(id), Ok(Retrieved::NotReady));
//!
//! let envelope = inbox.blocking_recv().unwrap();
//! inbox.resolve(envelope.id, Ok(envelope.payload * 2));
//!
//! assert_eq!(messages.retrieve_result(id), Ok(Retrieved::Ready(42)));
//! ```

mod error;
mod id;
mod system;

pub use error::{MessageError, MessageFailure};
pub use id::{MessageId, MessageState};
pub use system::{Envelope, Inbox, MessageSystem, MessageSystemConfig, Retrieved};
