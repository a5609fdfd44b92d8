use core::time::Duration;
use std::thread;

use async_trait::async_trait;
use hookwork_provider::{AcquisitionError, BlockingSource, ContentSource, CycleReport};

/// Yields 1, 2, 3, ... once per period.
#[derive(Debug, Default)]
pub struct Counter {
    next: u64,
}

#[async_trait]
impl ContentSource for Counter {
    type Item = u64;
    type Output = String;

    async fn get_content(&mut self) -> Result<u64, AcquisitionError> {
        self.next += 1;
        Ok(self.next)
    }

    async fn result_callback(&mut self, report: CycleReport<String>) {
        log_report("counter", self.next, report);
    }
}

/// Simulates a device read that blocks the calling thread.
#[derive(Debug)]
pub struct Sensor {
    latency: Duration,
    reading: u64,
}

impl Sensor {
    /// Creates a sensor whose every read blocks for `latency`.
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self { latency, reading: 0 }
    }
}

impl BlockingSource for Sensor {
    type Item = u64;
    type Output = String;

    fn get_content(&mut self) -> Result<u64, AcquisitionError> {
        thread::sleep(self.latency);
        self.reading = (self.reading * 7 + 3) % 101;
        // Every tenth reading is a simulated bus error.
        if self.reading % 10 == 0 {
            return Err(AcquisitionError::new(format!("bus error at {}", self.reading)));
        }
        Ok(self.reading)
    }

    fn result_callback(&mut self, report: CycleReport<String>) {
        log_report("sensor", self.reading, report);
    }
}

fn log_report(source: &str, item: u64, report: CycleReport<String>) {
    match report {
        Ok(results) => {
            let verdicts: Vec<String> = results
                .into_iter()
                .map(|outcome| outcome.unwrap_or_else(|failure| failure.to_string()))
                .collect();
            tracing::info!(source, item, ?verdicts, "checked");
        }
        Err(error) => tracing::warn!(source, error = %error, "acquisition failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_counts_from_one() {
        let mut counter = Counter::default();
        assert_eq!(counter.get_content().await, Ok(1));
        assert_eq!(counter.get_content().await, Ok(2));
    }

    #[test]
    fn sensor_reports_bus_errors() {
        let mut sensor = Sensor::new(Duration::ZERO);
        let readings: Vec<_> = (0..200).map(|_| sensor.get_content()).collect();
        assert!(readings.iter().any(Result::is_ok));
        assert!(readings.iter().any(Result::is_err));
    }
}
