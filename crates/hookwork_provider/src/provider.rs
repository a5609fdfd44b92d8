//! The object-safe [`Provider`] contract and the [`ProviderHandle`] returned
//! by a launch.

use core::fmt;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// The three provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Timer-driven acquisition on the cooperative runtime.
    Periodic,
    /// Acquisition that may block, on a dedicated thread.
    Blocking,
    /// Message-driven processing for external callers.
    Complex,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Periodic => "periodic",
            Self::Blocking => "blocking",
            Self::Complex => "complex",
        })
    }
}

/// Lifecycle state of a launched provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderState {
    /// Launched, loop not yet entered.
    Starting,
    /// Running cycles or serving messages.
    Running,
    /// The loop has exited. No further cycles or messages are processed.
    Stopped,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// A provider that can be handed to the system.
///
/// Implemented by [`PeriodicProvider`](crate::PeriodicProvider),
/// [`BlockingProvider`](crate::BlockingProvider) and
/// [`ComplexProvider`](crate::ComplexProvider). The trait is object safe so
/// heterogeneous providers can be registered together.
pub trait Provider: Send + 'static {
    /// Unique name of the provider.
    fn name(&self) -> &str;

    /// Which kind of provider this is.
    fn kind(&self) -> ProviderKind;

    /// Number of registered hooks.
    fn hook_count(&self) -> usize;

    /// Starts the provider. It runs until `shutdown` is cancelled.
    ///
    /// Loop-bound providers are spawned onto the tokio runtime of the
    /// caller; thread-bound providers get their own OS thread.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider cannot be started.
    fn launch(self: Box<Self>, shutdown: CancellationToken) -> Result<ProviderHandle, ProviderError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// ProviderHandle
// ─────────────────────────────────────────────────────────────────────────────

enum Worker {
    Task(tokio::task::JoinHandle<()>),
    Thread(std::thread::JoinHandle<()>),
}

/// Handle to a launched provider.
pub struct ProviderHandle {
    name: String,
    kind: ProviderKind,
    state: watch::Receiver<ProviderState>,
    worker: Worker,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ProviderHandle {
    pub(crate) fn task(
        name: String,
        kind: ProviderKind,
        state: watch::Receiver<ProviderState>,
        task: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            kind,
            state,
            worker: Worker::Task(task),
        }
    }

    pub(crate) fn thread(
        name: String,
        kind: ProviderKind,
        state: watch::Receiver<ProviderState>,
        thread: std::thread::JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            kind,
            state,
            worker: Worker::Thread(thread),
        }
    }

    /// Provider name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider kind.
    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProviderState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProviderState> {
        self.state.clone()
    }

    /// Waits until the provider reaches [`ProviderState::Stopped`].
    ///
    /// Also returns if the provider's worker died without reporting.
    pub async fn stopped(&mut self) {
        let _ = self
            .state
            .wait_for(|state| *state == ProviderState::Stopped)
            .await;
    }

    /// Waits for the provider to stop and reaps its task or thread.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Panicked`] if the worker panicked.
    pub async fn join(mut self) -> Result<(), ProviderError> {
        self.stopped().await;
        let name = self.name;
        match self.worker {
            Worker::Task(task) => task.await.map_err(|error| {
                let message = if error.is_panic() {
                    hookwork_core::panic_message(error.into_panic().as_ref())
                } else {
                    error.to_string()
                };
                ProviderError::Panicked { name, message }
            }),
            Worker::Thread(thread) => match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(panic)) => Err(ProviderError::Panicked {
                    name,
                    message: hookwork_core::panic_message(panic.as_ref()),
                }),
                Err(error) => Err(ProviderError::Panicked {
                    name,
                    message: error.to_string(),
                }),
            },
        }
    }
}

/// Creates the state channel every provider reports through.
pub(crate) fn state_channel() -> (watch::Sender<ProviderState>, watch::Receiver<ProviderState>) {
    watch::channel(ProviderState::Starting)
}
