use core::time::Duration;

use hookwork_core_plugins::TracingPlugin;
use hookwork_provider::{BlockingProvider, ComplexProvider, PeriodicProvider};
use hookwork_system::{Plugin, PluginGroup, PluginGroupBuilder, Server};

use crate::{Counter, DIVISORS, Sensor, TextualChecker, divisible_by};

/// Registers the `counter`, `sensor` and `checker` providers.
///
/// # Resources Provided
///
/// | Resource | Description |
/// |----------|-------------|
/// | [`CheckerMessages`](crate::CheckerMessages) | Submits text to `checker` |
#[derive(Debug, Clone)]
pub struct DivisibilityPlugin {
    period: Duration,
    sensor_latency: Duration,
}

impl Default for DivisibilityPlugin {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            sensor_latency: Duration::from_millis(750),
        }
    }
}

impl DivisibilityPlugin {
    /// Sets how often `counter` produces a number.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets how long each `sensor` read blocks.
    #[must_use]
    pub fn with_sensor_latency(mut self, latency: Duration) -> Self {
        self.sensor_latency = latency;
        self
    }
}

impl Plugin for DivisibilityPlugin {
    fn build(&self, server: &mut Server) {
        let mut counter = PeriodicProvider::new("counter", Counter::default()).with_period(self.period);
        let mut sensor = BlockingProvider::new("sensor", Sensor::new(self.sensor_latency));
        let mut checker = ComplexProvider::new("checker", TextualChecker);
        for divisor in DIVISORS {
            counter = counter.with_hook(divisible_by(divisor));
            sensor = sensor.with_hook(divisible_by(divisor));
            checker = checker.with_hook(divisible_by(divisor));
        }

        server.insert_resource(checker.message_system());
        for result in [
            server.register(counter).map(drop),
            server.register(sensor).map(drop),
            server.register(checker).map(drop),
        ] {
            if let Err(error) = result {
                tracing::error!(error = %error, "provider not registered");
            }
        }
    }

    fn ready(&self, server: &mut Server) {
        tracing::info!(providers = ?server.provider_names(), "divisibility providers registered");
    }
}

/// Logging plus [`DivisibilityPlugin`].
#[derive(Debug, Clone, Default)]
pub struct DivisibilityPlugins {
    /// Plugin that owns the providers.
    pub divisibility: DivisibilityPlugin,
}

impl PluginGroup for DivisibilityPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::new()
            .add(TracingPlugin::default())
            .add(self.divisibility)
    }
}
