//! Timer-driven provider on the shared cooperative runtime.

use core::fmt;
use core::time::Duration;
use std::time::Instant;

use hookwork_core::{Hook, HookSet, ResultGatherer};
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::CycleConfig;
use crate::cycle::{check_budget, dispatch};
use crate::error::ProviderError;
use crate::provider::{Provider, ProviderHandle, ProviderKind, ProviderState, state_channel};
use crate::source::ContentSource;

/// A provider that acquires an item every `period` and fans it out to its
/// hooks.
///
/// Cycles never overlap: the next tick is awaited only after the previous
/// cycle's callback returned. A cycle that overruns the period is followed
/// immediately by the next one, without a burst of catch-up cycles.
///
/// # Example
///
/// ```no_run
/// # use async_trait::async_trait;
/// # use hookwork_provider::{AcquisitionError, ContentSource};
/// # struct Counter(u64);
/// # #[async_trait]
/// # impl ContentSource for Counter {
/// #     type Item = u64;
/// #     type Output = bool;
/// #     async fn get_content(&mut self) -> Result<u64, AcquisitionError> { Ok(self.0) }
/// # }
/// use std::time::Duration;
/// use hookwork_core::hook_fn;
/// use hookwork_provider::PeriodicProvider;
///
/// let provider = PeriodicProvider::new("counter", Counter(0))
///     .with_period(Duration::from_secs(1))
///     .with_hook(hook_fn("even", |n: &u64| Ok(n % 2 == 0)));
/// ```
pub struct PeriodicProvider<S: ContentSource> {
    name: String,
    source: S,
    hooks: HookSet<S::Item, S::Output>,
    config: CycleConfig,
    gatherer: ResultGatherer,
}

impl<S: ContentSource> fmt::Debug for PeriodicProvider<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicProvider")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: ContentSource> PeriodicProvider<S> {
    /// Creates a periodic provider with [`CycleConfig::periodic`] defaults.
    pub fn new(name: impl Into<String>, source: S) -> Self {
        Self {
            name: name.into(),
            source,
            hooks: HookSet::new(),
            config: CycleConfig::periodic(),
            gatherer: ResultGatherer::new(),
        }
    }

    /// Replaces the cycle configuration.
    #[must_use]
    pub fn with_config(mut self, config: CycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the cycle period.
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

    /// Runs cycles on the current task until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let (state, _) = state_channel();
        self.drive(shutdown, state).await;
    }

    async fn drive(mut self, shutdown: CancellationToken, state: watch::Sender<ProviderState>) {
        state.send_replace(ProviderState::Running);
        tracing::info!(
            provider = %self.name,
            period = ?self.config.period,
            hooks = self.hooks.len(),
            "periodic provider started"
        );

        let mut ticker = pacer(self.config.period);
        let mut cycles: u64 = 0;

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = tick(ticker.as_mut()) => {}
            }
            // A cycle never starts once shutdown has been requested.
            if shutdown.is_cancelled() {
                break;
            }

            let started = Instant::now();
            let content = self.source.get_content().await;
            check_budget(&self.name, started.elapsed(), self.config.acquire_budget);

            let report = dispatch(&self.name, &self.gatherer, &self.hooks, content).await;
            self.source.result_callback(report).await;

            cycles += 1;
            tracing::trace!(provider = %self.name, cycle = cycles, elapsed = ?started.elapsed(), "cycle complete");
        }

        state.send_replace(ProviderState::Stopped);
        tracing::info!(provider = %self.name, cycles, "periodic provider stopped");
    }
}

impl<S: ContentSource> Provider for PeriodicProvider<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Periodic
    }

    fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    fn launch(self: Box<Self>, shutdown: CancellationToken) -> Result<ProviderHandle, ProviderError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ProviderError::NoRuntime {
            name: self.name.clone(),
        })?;
        let name = self.name.clone();
        let (state, observer) = state_channel();
        let task = runtime.spawn((*self).drive(shutdown, state));
        Ok(ProviderHandle::task(name, ProviderKind::Periodic, observer, task))
    }
}

/// Builds the interval for `period`, or `None` for back-to-back cycles.
fn pacer(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}
