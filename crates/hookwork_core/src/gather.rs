//! Fan-out/gather over a [`HookSet`].
//!
//! [`ResultGatherer::gather`] invokes every hook of a set concurrently on the
//! same item and joins them into a [`ResultSet`]:
//!
//! - The result set has exactly one entry per registered hook.
//! - Entry `i` always belongs to hook `i`, whatever order the hooks finish in.
//! - A failing, panicking or timed-out hook yields a [`HookFailure`] at its
//!   own index and never disturbs the other entries.
//! - `gather` completes only after every hook has completed.
//!
//! The gatherer holds configuration only, no state between calls.

use core::any::Any;
use core::ops::Index;
use core::panic::AssertUnwindSafe;
use core::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Instrument;

use crate::hook::{Hook, HookError};
use crate::set::HookSet;

// ─────────────────────────────────────────────────────────────────────────────
// HookFailure
// ─────────────────────────────────────────────────────────────────────────────

/// A hook failure captured at the gather barrier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookFailure {
    /// The hook returned an error.
    #[error("hook '{hook}' failed: {error}")]
    Error {
        /// Name of the failing hook.
        hook: String,
        /// The error it returned.
        error: HookError,
    },
    /// The hook panicked while processing the item.
    #[error("hook '{hook}' panicked: {message}")]
    Panicked {
        /// Name of the panicking hook.
        hook: String,
        /// Panic payload, if it was a string.
        message: String,
    },
    /// The hook did not finish within [`GatherConfig::hook_timeout`].
    #[error("hook '{hook}' timed out after {timeout:?}")]
    TimedOut {
        /// Name of the hook.
        hook: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },
}

impl HookFailure {
    /// Returns the name of the hook that failed.
    #[must_use]
    pub fn hook(&self) -> &str {
        match self {
            Self::Error { hook, .. } | Self::Panicked { hook, .. } | Self::TimedOut { hook, .. } => {
                hook
            }
        }
    }
}

/// Outcome of one hook for one item.
pub type HookOutcome<O> = Result<O, HookFailure>;

// ─────────────────────────────────────────────────────────────────────────────
// ResultSet
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered hook outcomes for one data item.
///
/// Index `i` holds the outcome of the hook registered at position `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet<O> {
    outcomes: Vec<HookOutcome<O>>,
}

impl<O> ResultSet<O> {
    /// Builds a result set from outcomes already in hook order.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<HookOutcome<O>>) -> Self {
        Self { outcomes }
    }

    /// Number of entries (equal to the number of hooks at dispatch time).
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns `true` if the provider had no hooks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns the outcome of the hook at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HookOutcome<O>> {
        self.outcomes.get(index)
    }

    /// Iterates outcomes in hook order.
    pub fn iter(&self) -> core::slice::Iter<'_, HookOutcome<O>> {
        self.outcomes.iter()
    }

    /// Iterates successful outputs, skipping failures.
    pub fn successes(&self) -> impl Iterator<Item = &O> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    /// Iterates failures together with their hook index.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &HookFailure)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().err().map(|f| (i, f)))
    }

    /// Returns `true` if every hook succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }

    /// Consumes the set, returning the outcomes in hook order.
    #[must_use]
    pub fn into_outcomes(self) -> Vec<HookOutcome<O>> {
        self.outcomes
    }
}

impl<O> Index<usize> for ResultSet<O> {
    type Output = HookOutcome<O>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.outcomes[index]
    }
}

impl<O> IntoIterator for ResultSet<O> {
    type Item = HookOutcome<O>;
    type IntoIter = std::vec::IntoIter<HookOutcome<O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

impl<'a, O> IntoIterator for &'a ResultSet<O> {
    type Item = &'a HookOutcome<O>;
    type IntoIter = core::slice::Iter<'a, HookOutcome<O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GatherConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a [`ResultGatherer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherConfig {
    /// Optional deadline for each hook. `None` waits for every hook
    /// indefinitely. Requires a tokio runtime with the time driver enabled.
    pub hook_timeout: Option<Duration>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ResultGatherer
// ─────────────────────────────────────────────────────────────────────────────

/// Concurrent fan-out/gather primitive.
///
/// All hooks are polled concurrently on the calling task. Suspension happens
/// only inside the hooks themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultGatherer {
    config: GatherConfig,
}

impl ResultGatherer {
    /// Creates a gatherer with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gatherer with the given configuration.
    #[must_use]
    pub fn with_config(config: GatherConfig) -> Self {
        Self { config }
    }

    /// Sets the per-hook deadline.
    #[must_use]
    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.config.hook_timeout = Some(timeout);
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &GatherConfig {
        &self.config
    }

    /// Runs every hook in `hooks` on `item` and gathers the ordered results.
    pub async fn gather<I, O>(&self, item: &I, hooks: &HookSet<I, O>) -> ResultSet<O>
    where
        I: Send + Sync + 'static,
        O: Send + 'static,
    {
        let span = tracing::debug_span!("gather", hooks = hooks.len());
        let timeout = self.config.hook_timeout;

        async move {
            let calls = hooks
                .iter()
                .map(|(name, hook)| invoke(name, hook, item, timeout));
            let outcomes = join_all(calls).await;
            tracing::debug!("gather complete");
            ResultSet::from_outcomes(outcomes)
        }
        .instrument(span)
        .await
    }
}

/// Invokes one hook, converting errors, panics and timeouts into failures.
async fn invoke<I, O>(
    name: &str,
    hook: &dyn Hook<I, O>,
    item: &I,
    timeout: Option<Duration>,
) -> HookOutcome<O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    let call = AssertUnwindSafe(hook.process(item)).catch_unwind();

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(hook = %name, timeout = ?limit, "hook timed out");
                return Err(HookFailure::TimedOut {
                    hook: name.to_owned(),
                    timeout: limit,
                });
            }
        },
        None => call.await,
    };

    match result {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(error)) => {
            tracing::warn!(hook = %name, error = %error, "hook failed");
            Err(HookFailure::Error {
                hook: name.to_owned(),
                error,
            })
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(hook = %name, panic = %message, "hook panicked");
            Err(HookFailure::Panicked {
                hook: name.to_owned(),
                message,
            })
        }
    }
}

/// Extracts a printable message from a panic payload.
#[must_use]
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
