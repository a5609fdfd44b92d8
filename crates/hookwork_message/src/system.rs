//! The correlation table and its two faces: [`MessageSystem`] for callers and
//! [`Inbox`] for the provider pipeline.
//!
//! # Locking
//!
//! The table sits behind one [`parking_lot::Mutex`], independent of any async
//! scheduler, so every operation is callable from runtime tasks and from
//! foreign threads alike. Settling a message wakes its waiters two ways:
//!
//! - async waiters hold a per-message `oneshot` receiver
//! - blocking waiters park on a shared [`Condvar`] tied to the table mutex
//!
//! Ids are allocated and payloads enqueued while the lock is held, so queue
//! order always equals id order.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::{MessageError, MessageFailure};
use crate::id::{MessageId, MessageState};

// ─────────────────────────────────────────────────────────────────────────────
// Public value types
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a [`MessageSystem`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSystemConfig {
    /// How long a settled message is kept after it reached its terminal
    /// state. Expired messages are swept on the next send. `None` keeps them
    /// until consumed by [`take_result`](MessageSystem::take_result) or
    /// [`send_wait_answer`](MessageSystem::send_wait_answer).
    pub retention: Option<Duration>,
}

/// Non-blocking read of a message outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieved<R> {
    /// The message completed with this result.
    Ready(R),
    /// The message is still pending.
    NotReady,
}

impl<R> Retrieved<R> {
    /// Returns `true` if a result is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns the result, if ready.
    #[must_use]
    pub fn into_ready(self) -> Option<R> {
        match self {
            Self::Ready(result) => Some(result),
            Self::NotReady => None,
        }
    }
}

/// A payload travelling from a caller to the provider, tagged with its id.
#[derive(Debug)]
pub struct Envelope<P> {
    /// Id to settle once processing finishes.
    pub id: MessageId,
    /// The caller's payload.
    pub payload: P,
}

// ─────────────────────────────────────────────────────────────────────────────
// Correlation table
// ─────────────────────────────────────────────────────────────────────────────

struct Entry<R> {
    /// `None` while pending.
    outcome: Option<Result<R, MessageFailure>>,
    /// Async waiters to wake on settle.
    waiters: Vec<oneshot::Sender<()>>,
    /// Threads parked in `wait_for_blocking` on this message.
    parked: usize,
    /// Someone was waiting when the message settled and has yet to consume
    /// it; the retention sweep leaves it alone.
    claimed: bool,
    settled_at: Option<Instant>,
}

impl<R> Entry<R> {
    fn pending() -> Self {
        Self {
            outcome: None,
            waiters: Vec::new(),
            parked: 0,
            claimed: false,
            settled_at: None,
        }
    }

    fn state(&self) -> MessageState {
        match &self.outcome {
            None => MessageState::Pending,
            Some(Ok(_)) => MessageState::Completed,
            Some(Err(_)) => MessageState::Failed,
        }
    }

    fn settle(&mut self, outcome: Result<R, MessageFailure>) {
        self.outcome = Some(outcome);
        self.settled_at = Some(Instant::now());
        self.waiters.retain(|waiter| !waiter.is_closed());
        self.claimed = self.parked > 0 || !self.waiters.is_empty();
        for waiter in self.waiters.drain(..) {
            // A dropped receiver means the waiter gave up; nothing to wake.
            let _ = waiter.send(());
        }
    }
}

struct Table<P, R> {
    entries: HashMap<MessageId, Entry<R>>,
    /// `None` once the system is stopped.
    sender: Option<mpsc::UnboundedSender<Envelope<P>>>,
}

impl<P, R> Table<P, R> {
    fn is_pending(&self, id: MessageId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.outcome.is_none())
    }

    /// Removes and returns the outcome if the message is terminal.
    ///
    /// Returns `None` while the message is pending.
    fn consume(&mut self, id: MessageId) -> Option<Result<R, MessageError>> {
        match self.entries.get(&id).map(Entry::state) {
            None => Some(Err(MessageError::UnknownId(id))),
            Some(MessageState::Pending) => None,
            Some(_) => self
                .entries
                .remove(&id)
                .and_then(|entry| entry.outcome)
                .map(|outcome| outcome.map_err(|failure| MessageError::Failed { id, failure })),
        }
    }

    /// Drops settled messages older than `retention`, except those a waiter
    /// is about to consume.
    fn sweep(&mut self, retention: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, entry| {
            entry.claimed
                || entry
                    .settled_at
                    .is_none_or(|at| now.duration_since(at) < retention)
        });
    }

    fn park(&mut self, id: MessageId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.parked += 1;
        }
    }

    fn unpark(&mut self, id: MessageId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.parked = entry.parked.saturating_sub(1);
        }
    }
}

struct Shared<P, R> {
    next_id: AtomicU64,
    table: Mutex<Table<P, R>>,
    /// Signalled whenever any message settles; blocking waiters re-check.
    settled: Condvar,
    /// Provider end of the queue, until an [`Inbox`] takes it.
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Envelope<P>>>>,
    config: MessageSystemConfig,
}

impl<P, R> Shared<P, R> {
    fn shutdown(&self) -> usize {
        let aborted = {
            let mut table = self.table.lock();
            table.sender = None;
            let mut aborted = 0;
            for entry in table.entries.values_mut().filter(|e| e.outcome.is_none()) {
                entry.settle(Err(MessageFailure::Shutdown));
                aborted += 1;
            }
            aborted
        };
        self.settled.notify_all();
        aborted
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MessageSystem
// ─────────────────────────────────────────────────────────────────────────────

/// Caller-facing handle of a correlation table.
///
/// Cheap to clone; all clones share one table. Every method is safe to call
/// concurrently from any thread. A payload sent before the provider starts is
/// queued and processed once it does.
pub struct MessageSystem<P, R> {
    shared: Arc<Shared<P, R>>,
}

impl<P, R> Clone for MessageSystem<P, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P, R> Default for MessageSystem<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> fmt::Debug for MessageSystem<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.shared.table.lock();
        f.debug_struct("MessageSystem")
            .field("messages", &table.entries.len())
            .field("stopped", &table.sender.is_none())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl<P, R> MessageSystem<P, R> {
    /// Creates a message system with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MessageSystemConfig::default())
    }

    /// Creates a message system with the given configuration.
    #[must_use]
    pub fn with_config(config: MessageSystemConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                next_id: AtomicU64::new(0),
                table: Mutex::new(Table {
                    entries: HashMap::new(),
                    sender: Some(sender),
                }),
                settled: Condvar::new(),
                receiver: Mutex::new(Some(receiver)),
                config,
            }),
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &MessageSystemConfig {
        &self.shared.config
    }

    /// Attaches the provider side of this system.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::InboxTaken`] if an inbox was already attached.
    pub fn inbox(&self) -> Result<Inbox<P, R>, MessageError> {
        let receiver = self
            .shared
            .receiver
            .lock()
            .take()
            .ok_or(MessageError::InboxTaken)?;
        Ok(Inbox {
            receiver,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Registers a new pending message and queues its payload.
    ///
    /// Returns immediately with the message id.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Stopped`] after [`shutdown`](Self::shutdown).
    pub fn send_to_provider(&self, payload: P) -> Result<MessageId, MessageError> {
        let mut table = self.shared.table.lock();
        let sender = table.sender.as_ref().ok_or(MessageError::Stopped)?;

        let id = MessageId::new(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        sender
            .send(Envelope { id, payload })
            .map_err(|_| MessageError::Stopped)?;
        table.entries.insert(id, Entry::pending());

        if let Some(retention) = self.shared.config.retention {
            table.sweep(retention);
        }

        tracing::trace!(message_id = %id, "message queued");
        Ok(id)
    }

    /// Returns the current state of a message, or `None` for an unknown id.
    #[must_use]
    pub fn state(&self, id: MessageId) -> Option<MessageState> {
        self.shared.table.lock().entries.get(&id).map(Entry::state)
    }

    /// Number of messages still pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared
            .table
            .lock()
            .entries
            .values()
            .filter(|e| e.outcome.is_none())
            .count()
    }

    /// Number of messages held in the table, pending or settled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.table.lock().entries.len()
    }

    /// Returns `true` if the table holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.table.lock().sender.is_none()
    }

    /// Stops accepting messages and fails every pending one with
    /// [`MessageFailure::Shutdown`], releasing all waiters.
    ///
    /// Returns the number of aborted messages. Idempotent.
    pub fn shutdown(&self) -> usize {
        let aborted = self.shared.shutdown();
        if aborted > 0 {
            tracing::info!(aborted, "message system stopped, pending messages aborted");
        } else {
            tracing::debug!("message system stopped");
        }
        aborted
    }
}

impl<P, R: Clone> MessageSystem<P, R> {
    /// Reads a message outcome without blocking and without consuming it.
    ///
    /// Repeated calls on a settled message return the same value.
    ///
    /// # Errors
    ///
    /// - [`MessageError::UnknownId`] if the id is not in the table
    /// - [`MessageError::Failed`] if the message failed
    pub fn retrieve_result(&self, id: MessageId) -> Result<Retrieved<R>, MessageError> {
        let table = self.shared.table.lock();
        let entry = table.entries.get(&id).ok_or(MessageError::UnknownId(id))?;
        match &entry.outcome {
            None => Ok(Retrieved::NotReady),
            Some(Ok(result)) => Ok(Retrieved::Ready(result.clone())),
            Some(Err(failure)) => Err(MessageError::Failed {
                id,
                failure: failure.clone(),
            }),
        }
    }
}

impl<P, R> MessageSystem<P, R> {
    /// Like [`retrieve_result`](MessageSystem::retrieve_result), but removes
    /// a settled message from the table. Afterwards the id is unknown.
    ///
    /// # Errors
    ///
    /// Same as [`retrieve_result`](MessageSystem::retrieve_result).
    pub fn take_result(&self, id: MessageId) -> Result<Retrieved<R>, MessageError> {
        match self.shared.table.lock().consume(id) {
            None => Ok(Retrieved::NotReady),
            Some(outcome) => outcome.map(Retrieved::Ready),
        }
    }

    /// Suspends until the message settles, then consumes and returns it.
    ///
    /// Only the calling task is suspended.
    ///
    /// # Errors
    ///
    /// - [`MessageError::UnknownId`] if the id is not in the table
    /// - [`MessageError::Failed`] if the message failed or was aborted
    pub async fn wait_for(&self, id: MessageId) -> Result<R, MessageError> {
        loop {
            let settled = {
                let mut table = self.shared.table.lock();
                if let Some(outcome) = table.consume(id) {
                    return outcome;
                }
                let (tx, rx) = oneshot::channel();
                if let Some(entry) = table.entries.get_mut(&id) {
                    entry.waiters.push(tx);
                }
                rx
            };
            // Woken or the entry was dropped; either way re-check the table.
            let _ = settled.await;
        }
    }

    /// Parks the calling thread until the message settles, then consumes and
    /// returns it.
    ///
    /// Must not be called from inside an async runtime worker. Use
    /// [`wait_for`](Self::wait_for) there.
    ///
    /// # Errors
    ///
    /// Same as [`wait_for`](Self::wait_for), plus [`MessageError::Timeout`]
    /// when `timeout` elapses first.
    pub fn wait_for_blocking(
        &self,
        id: MessageId,
        timeout: Option<Duration>,
    ) -> Result<R, MessageError> {
        let deadline = timeout.map(|limit| (limit, Instant::now() + limit));
        let mut table = self.shared.table.lock();
        loop {
            if let Some(outcome) = table.consume(id) {
                return outcome;
            }
            table.park(id);
            let timed_out = match deadline {
                Some((_, at)) => self.shared.settled.wait_until(&mut table, at).timed_out(),
                None => {
                    self.shared.settled.wait(&mut table);
                    false
                }
            };
            table.unpark(id);
            if let (true, Some((limit, _))) = (timed_out, deadline) {
                return table.consume(id).unwrap_or(Err(MessageError::Timeout {
                    id,
                    timeout: limit,
                }));
            }
        }
    }

    /// Sends a payload and suspends until its result is available.
    ///
    /// The message is consumed: a later
    /// [`retrieve_result`](MessageSystem::retrieve_result) on its id reports
    /// [`MessageError::UnknownId`].
    ///
    /// # Errors
    ///
    /// See [`send_to_provider`](Self::send_to_provider) and
    /// [`wait_for`](Self::wait_for).
    pub async fn send_wait_answer(&self, payload: P) -> Result<R, MessageError> {
        let id = self.send_to_provider(payload)?;
        self.wait_for(id).await
    }

    /// [`send_wait_answer`](Self::send_wait_answer) with a deadline.
    ///
    /// On timeout the message stays in the table.
    ///
    /// # Errors
    ///
    /// As [`send_wait_answer`](Self::send_wait_answer), plus
    /// [`MessageError::Timeout`].
    pub async fn send_wait_answer_timeout(
        &self,
        payload: P,
        timeout: Duration,
    ) -> Result<R, MessageError> {
        let id = self.send_to_provider(payload)?;
        match tokio::time::timeout(timeout, self.wait_for(id)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(MessageError::Timeout { id, timeout }),
        }
    }

    /// Blocking-thread counterpart of [`send_wait_answer`](Self::send_wait_answer)
    /// for callers outside any async runtime.
    ///
    /// # Errors
    ///
    /// See [`wait_for_blocking`](Self::wait_for_blocking).
    pub fn send_wait_answer_blocking(
        &self,
        payload: P,
        timeout: Option<Duration>,
    ) -> Result<R, MessageError> {
        let id = self.send_to_provider(payload)?;
        self.wait_for_blocking(id, timeout)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbox
// ─────────────────────────────────────────────────────────────────────────────

/// Provider end of a [`MessageSystem`].
///
/// Yields payloads in submission order and settles them. Dropping the inbox
/// shuts the system down, since nothing could settle its messages anymore.
pub struct Inbox<P, R> {
    receiver: mpsc::UnboundedReceiver<Envelope<P>>,
    shared: Arc<Shared<P, R>>,
}

impl<P, R> fmt::Debug for Inbox<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox").finish_non_exhaustive()
    }
}

impl<P, R> Inbox<P, R> {
    /// Receives the next pending payload.
    ///
    /// Payloads whose message was already settled (aborted by shutdown) are
    /// skipped. Returns `None` once the system is stopped and drained.
    pub async fn recv(&mut self) -> Option<Envelope<P>> {
        loop {
            let envelope = self.receiver.recv().await?;
            if self.shared.table.lock().is_pending(envelope.id) {
                return Some(envelope);
            }
            tracing::trace!(message_id = %envelope.id, "skipping settled message");
        }
    }

    /// Blocking counterpart of [`recv`](Self::recv) for dedicated threads.
    pub fn blocking_recv(&mut self) -> Option<Envelope<P>> {
        loop {
            let envelope = self.receiver.blocking_recv()?;
            if self.shared.table.lock().is_pending(envelope.id) {
                return Some(envelope);
            }
            tracing::trace!(message_id = %envelope.id, "skipping settled message");
        }
    }

    /// Settles a pending message and wakes everyone waiting on it.
    ///
    /// Returns `false` without changing anything if the message is unknown
    /// or already terminal.
    pub fn resolve(&self, id: MessageId, outcome: Result<R, MessageFailure>) -> bool {
        {
            let mut table = self.shared.table.lock();
            let Some(entry) = table.entries.get_mut(&id) else {
                tracing::debug!(message_id = %id, "resolved message no longer tracked");
                return false;
            };
            if entry.outcome.is_some() {
                tracing::debug!(message_id = %id, state = ?entry.state(), "message already settled");
                return false;
            }
            entry.settle(outcome);
            tracing::trace!(message_id = %id, state = ?entry.state(), "message settled");
        }
        self.shared.settled.notify_all();
        true
    }

    /// Returns a caller-facing handle to the same system.
    #[must_use]
    pub fn message_system(&self) -> MessageSystem<P, R> {
        MessageSystem {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P, R> Drop for Inbox<P, R> {
    fn drop(&mut self) {
        let aborted = self.shared.shutdown();
        if aborted > 0 {
            tracing::info!(aborted, "inbox dropped, pending messages aborted");
        }
    }
}
