//! Provider whose acquisition may block, run on a dedicated thread.

use core::fmt;
use core::time::Duration;
use std::time::Instant;

use hookwork_core::{Hook, HookSet, ResultGatherer};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::CycleConfig;
use crate::cycle::{check_budget, dispatch};
use crate::error::ProviderError;
use crate::provider::{Provider, ProviderHandle, ProviderKind, ProviderState, state_channel};
use crate::source::BlockingSource;

/// A provider that owns an OS thread and loops `acquire → fan-out → callback`.
///
/// Blocking in [`BlockingSource::get_content`] stalls only this provider.
/// The fan-out runs on a current-thread runtime private to the provider
/// thread, so async hooks work unchanged. Shutdown is observed between
/// cycles and during the pacing sleep; an acquisition already blocked in
/// `get_content` is allowed to finish.
pub struct BlockingProvider<S: BlockingSource> {
    name: String,
    source: S,
    hooks: HookSet<S::Item, S::Output>,
    config: CycleConfig,
    gatherer: ResultGatherer,
}

impl<S: BlockingSource> fmt::Debug for BlockingProvider<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingProvider")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: BlockingSource> BlockingProvider<S> {
    /// Creates a blocking provider with [`CycleConfig::blocking`] defaults.
    pub fn new(name: impl Into<String>, source: S) -> Self {
        Self {
            name: name.into(),
            source,
            hooks: HookSet::new(),
            config: CycleConfig::blocking(),
            gatherer: ResultGatherer::new(),
        }
    }

    /// Replaces the cycle configuration.
    #[must_use]
    pub fn with_config(mut self, config: CycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a minimum time between cycle starts.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.config.period = period;
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
    pub fn with_hook(mut self, hook: impl Hook<S::Item, S::Output>) -> Self {
        self.hooks.add(hook);
        self
    }

    /// Appends a hook. The same hook type may be added more than once; each
    /// instance gets its own slot in every result set.
    pub fn add_hook(&mut self, hook: impl Hook<S::Item, S::Output>) -> &mut Self {
        self.hooks.add(hook);
        self
    }

    /// Registered hooks, in dispatch order.
    #[must_use]
    pub fn hooks(&self) -> &HookSet<S::Item, S::Output> {
        &self.hooks
    }

    /// Active cycle configuration.
    #[must_use]
    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Runs cycles on the calling thread until `shutdown` is cancelled.
    ///
    /// Must not be called from within an async context.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Spawn`] if the provider's runtime cannot be
    /// built.
    pub fn run(self, shutdown: CancellationToken) -> Result<(), ProviderError> {
        let (state, _) = state_channel();
        let runtime = self.runtime()?;
        self.drive(&runtime, &shutdown, &state);
        Ok(())
    }

    fn runtime(&self) -> Result<Runtime, ProviderError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| ProviderError::Spawn {
                name: self.name.clone(),
                source,
            })
    }

    fn drive(
        mut self,
        runtime: &Runtime,
        shutdown: &CancellationToken,
        state: &watch::Sender<ProviderState>,
    ) {
        state.send_replace(ProviderState::Running);
        tracing::info!(
            provider = %self.name,
            period = ?self.config.period,
            hooks = self.hooks.len(),
            "blocking provider started"
        );

        let mut next_start = Instant::now();
        let mut cycles: u64 = 0;

        loop {
            if !self.config.period.is_zero() {
                let wake = tokio::time::Instant::from_std(next_start);
                let cancelled = runtime.block_on(async {
                    tokio::select! {
                        biased;
                        () = shutdown.cancelled() => true,
                        () = tokio::time::sleep_until(wake) => false,
                    }
                });
                if cancelled {
                    break;
                }
            }
            if shutdown.is_cancelled() {
                break;
            }

            let started = Instant::now();
            next_start = started + self.config.period;

            let content = self.source.get_content();
            check_budget(&self.name, started.elapsed(), self.config.acquire_budget);

            let report = runtime.block_on(dispatch(&self.name, &self.gatherer, &self.hooks, content));
            self.source.result_callback(report);

            cycles += 1;
            tracing::trace!(provider = %self.name, cycle = cycles, elapsed = ?started.elapsed(), "cycle complete");
        }

        state.send_replace(ProviderState::Stopped);
        tracing::info!(provider = %self.name, cycles, "blocking provider stopped");
    }
}

impl<S: BlockingSource> Provider for BlockingProvider<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Blocking
    }

    fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    fn launch(self: Box<Self>, shutdown: CancellationToken) -> Result<ProviderHandle, ProviderError> {
        let provider = *self;
        let name = provider.name.clone();
        let (state, observer) = state_channel();

        let thread = std::thread::Builder::new()
            .name(format!("hookwork-{name}"))
            .spawn(move || match provider.runtime() {
                Ok(runtime) => provider.drive(&runtime, &shutdown, &state),
                Err(error) => {
                    tracing::error!(error = %error, "blocking provider could not start");
                    state.send_replace(ProviderState::Stopped);
                }
            })
            .map_err(|source| ProviderError::Spawn {
                name: name.clone(),
                source,
            })?;

        Ok(ProviderHandle::thread(name, ProviderKind::Blocking, observer, thread))
    }
}
