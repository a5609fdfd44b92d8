//! Provider configuration.

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Pacing and guard settings for a content-acquisition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Minimum time between the starts of two consecutive cycles.
    ///
    /// Cycles never overlap. When a cycle overruns the period the next one
    /// starts as soon as the previous completes. Zero runs cycles
    /// back-to-back.
    pub period: Duration,

    /// Time the acquisition step is expected to stay under.
    ///
    /// Exceeding it is logged as a warning. Meant for periodic providers,
    /// whose acquisition shares the cooperative context with every other
    /// loop-bound provider.
    pub acquire_budget: Option<Duration>,
}

impl CycleConfig {
    /// Default period of a periodic provider.
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

    /// Default acquisition budget of a periodic provider.
    pub const DEFAULT_ACQUIRE_BUDGET: Duration = Duration::from_millis(100);

    /// Defaults for periodic providers: a 5 s period and a 100 ms
    /// acquisition budget.
    #[must_use]
    pub const fn periodic() -> Self {
        Self {
            period: Self::DEFAULT_PERIOD,
            acquire_budget: Some(Self::DEFAULT_ACQUIRE_BUDGET),
        }
    }

    /// Defaults for blocking providers: back-to-back cycles, no budget.
    #[must_use]
    pub const fn blocking() -> Self {
        Self {
            period: Duration::ZERO,
            acquire_budget: None,
        }
    }

    /// Sets the cycle period.
    #[must_use]
    pub const fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets or clears the acquisition budget.
    #[must_use]
    pub const fn with_acquire_budget(mut self, budget: Option<Duration>) -> Self {
        self.acquire_budget = budget;
        self
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self::periodic()
    }
}

/// Where a complex provider runs its processing pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    /// On the shared cooperative runtime, alongside periodic providers.
    #[default]
    Loop,
    /// On a dedicated OS thread with its own runtime.
    Thread,
}
