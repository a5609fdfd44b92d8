//! Message-driven provider that serves external callers.

use core::fmt;
use core::future::Future;
use core::panic::AssertUnwindSafe;

use futures::FutureExt;
use hookwork_core::{Hook, HookSet, ResultGatherer, panic_message};
use hookwork_message::{Inbox, MessageFailure, MessageSystem, MessageSystemConfig};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::Binding;
use crate::error::{ProcessingError, ProviderError};
use crate::provider::{Provider, ProviderHandle, ProviderKind, ProviderState, state_channel};
use crate::source::MessageHandler;

/// The message system type of a complex provider driven by `H`.
pub type MessagesOf<H> =
    MessageSystem<<H as MessageHandler>::Payload, <H as MessageHandler>::Reply>;

/// A provider that processes messages submitted through its
/// [`MessageSystem`].
///
/// Messages are handled one at a time in submission order:
///
/// ```text
/// payload → preprocess_data → hooks (fan-out/gather) → postprocess_result → reply
/// ```
///
/// A failing or panicking stage fails that message only. Messages sent
/// before the provider starts are buffered and processed once it runs.
/// When shutdown is requested every message still pending, including the
/// one in flight, is failed with [`MessageFailure::Shutdown`] at once. The
/// same happens when the provider is dropped without ever being served.
///
/// # Example
///
/// ```
/// use hookwork_core::hook_fn;
/// use hookwork_provider::{ComplexProvider, Passthrough};
///
/// let provider = ComplexProvider::new("echo", Passthrough::<u64, bool>::new())
///     .with_hook(hook_fn("even", |n: &u64| Ok(n % 2 == 0)));
///
/// // Hand this to callers on any thread before or after the provider starts.
/// let messages = provider.message_system();
/// assert_eq!(messages.pending_count(), 0);
/// ```
pub struct ComplexProvider<H: MessageHandler> {
    name: String,
    handler: H,
    hooks: HookSet<H::Item, H::Output>,
    messages: MessagesOf<H>,
    binding: Binding,
    gatherer: ResultGatherer,
}

impl<H: MessageHandler> fmt::Debug for ComplexProvider<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplexProvider")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .field("messages", &self.messages)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl<H: MessageHandler> ComplexProvider<H> {
    /// Creates a complex provider bound to the shared runtime.
    pub fn new(name: impl Into<String>, handler: H) -> Self {
        Self {
            name: name.into(),
            handler,
            hooks: HookSet::new(),
            messages: MessageSystem::new(),
            binding: Binding::default(),
            gatherer: ResultGatherer::new(),
        }
    }

    /// Replaces the message system with a fresh one using `config`.
    ///
    /// The old system is shut down: handles obtained earlier from
    /// [`message_system`](Self::message_system) see their messages fail, so
    /// configure before handing one out.
    #[must_use]
    pub fn with_message_config(mut self, config: MessageSystemConfig) -> Self {
        let replaced = core::mem::replace(&mut self.messages, MessageSystem::with_config(config));
        replaced.shutdown();
        self
    }

    /// Chooses where the pipeline runs.
    #[must_use]
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }

    /// Replaces the gatherer used for fan-out.
    #[must_use]
    pub fn with_gatherer(mut self, gatherer: ResultGatherer) -> Self {
        self.gatherer = gatherer;
        self
    }

    /// Appends a hook, builder style.
    #[must_use]
    pub fn with_hook(mut self, hook: impl Hook<H::Item, H::Output>) -> Self {
        self.hooks.add(hook);
        self
    }

    /// Appends a hook. The same hook type may be added more than once; each
    /// instance gets its own slot in every result set.
    pub fn add_hook(&mut self, hook: impl Hook<H::Item, H::Output>) -> &mut Self {
        self.hooks.add(hook);
        self
    }

    /// Returns a handle external callers use to submit payloads.
    #[must_use]
    pub fn message_system(&self) -> MessagesOf<H> {
        self.messages.clone()
    }

    /// Registered hooks, in dispatch order.
    #[must_use]
    pub fn hooks(&self) -> &HookSet<H::Item, H::Output> {
        &self.hooks
    }

    /// Where the pipeline runs.
    #[must_use]
    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Serves messages on the current task until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Messages`] if the message system was already
    /// attached to another consumer.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ProviderError> {
        let inbox = self.attach()?;
        let (state, _) = state_channel();
        self.serve(inbox, shutdown, state).await;
        Ok(())
    }

    fn attach(&self) -> Result<Inbox<H::Payload, H::Reply>, ProviderError> {
        self.messages.inbox().map_err(|source| ProviderError::Messages {
            name: self.name.clone(),
            source,
        })
    }

    async fn serve(
        self,
        mut inbox: Inbox<H::Payload, H::Reply>,
        shutdown: CancellationToken,
        state: watch::Sender<ProviderState>,
    ) {
        state.send_replace(ProviderState::Running);
        tracing::info!(
            provider = %self.name,
            binding = ?self.binding,
            hooks = self.hooks.len(),
            buffered = self.messages.pending_count(),
            "complex provider started"
        );

        let mut handled: u64 = 0;
        loop {
            let envelope = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                next = inbox.recv() => match next {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let id = envelope.id;
            let processing = self.process(envelope.payload);
            tokio::pin!(processing);
            let outcome = tokio::select! {
                outcome = &mut processing => outcome,
                () = shutdown.cancelled() => {
                    // Callers are released now; the late outcome is discarded by `resolve`.
                    let aborted = self.messages.shutdown();
                    tracing::debug!(provider = %self.name, message_id = %id, aborted, "shutdown during processing");
                    processing.await
                }
            };
            if let Err(failure) = &outcome {
                tracing::warn!(provider = %self.name, message_id = %id, failure = %failure, "message failed");
            }
            if !inbox.resolve(id, outcome) {
                tracing::debug!(provider = %self.name, message_id = %id, "discarding result for a settled message");
            }
            handled += 1;
        }

        let aborted = self.messages.shutdown();
        drop(inbox);
        state.send_replace(ProviderState::Stopped);
        tracing::info!(provider = %self.name, handled, aborted, "complex provider stopped");
    }

    async fn process(&self, payload: H::Payload) -> Result<H::Reply, MessageFailure> {
        let item = contain(self.handler.preprocess_data(payload)).await?;
        let results = self.gatherer.gather(&item, &self.hooks).await;
        contain(self.handler.postprocess_result(results)).await
    }
}

impl<H: MessageHandler> Provider for ComplexProvider<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Complex
    }

    fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    fn launch(self: Box<Self>, shutdown: CancellationToken) -> Result<ProviderHandle, ProviderError> {
        let provider = *self;
        let name = provider.name.clone();
        let inbox = provider.attach()?;
        let (state, observer) = state_channel();

        match provider.binding {
            Binding::Loop => {
                let runtime = tokio::runtime::Handle::try_current()
                    .map_err(|_| ProviderError::NoRuntime { name: name.clone() })?;
                let task = runtime.spawn(provider.serve(inbox, shutdown, state));
                Ok(ProviderHandle::task(name, ProviderKind::Complex, observer, task))
            }
            Binding::Thread => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|source| ProviderError::Spawn {
                        name: name.clone(),
                        source,
                    })?;
                let thread = std::thread::Builder::new()
                    .name(format!("hookwork-{name}"))
                    .spawn(move || runtime.block_on(provider.serve(inbox, shutdown, state)))
                    .map_err(|source| ProviderError::Spawn {
                        name: name.clone(),
                        source,
                    })?;
                Ok(ProviderHandle::thread(name, ProviderKind::Complex, observer, thread))
            }
        }
    }
}

/// A provider dropped without being served (never launched, rejected by the
/// server, or discarded after a failed launch) stops its message system, so
/// callers waiting on it are released with [`MessageFailure::Shutdown`].
impl<H: MessageHandler> Drop for ComplexProvider<H> {
    fn drop(&mut self) {
        if !self.messages.is_stopped() {
            let aborted = self.messages.shutdown();
            tracing::debug!(provider = %self.name, aborted, "complex provider dropped");
        }
    }
}

/// Runs a handler stage, turning errors and panics into a message failure.
async fn contain<T>(
    stage: impl Future<Output = Result<T, ProcessingError>>,
) -> Result<T, MessageFailure> {
    match AssertUnwindSafe(stage).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(MessageFailure::Processing(error.to_string())),
        Err(panic) => Err(MessageFailure::Processing(format!(
            "handler panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}
