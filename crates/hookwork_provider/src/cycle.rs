//! Steps shared by the periodic and blocking cycle loops.

use core::time::Duration;

use hookwork_core::{HookSet, ResultGatherer};

use crate::error::AcquisitionError;
use crate::source::CycleReport;

/// Warns when acquisition exceeded the configured budget.
pub(crate) fn check_budget(provider: &str, elapsed: Duration, budget: Option<Duration>) {
    if let Some(budget) = budget
        && elapsed > budget
    {
        tracing::warn!(
            provider = %provider,
            elapsed = ?elapsed,
            budget = ?budget,
            "acquisition exceeded its budget and stalled the shared runtime"
        );
    }
}

/// Fans an acquired item out to every hook, or passes an acquisition failure
/// through untouched.
pub(crate) async fn dispatch<I, O>(
    provider: &str,
    gatherer: &ResultGatherer,
    hooks: &HookSet<I, O>,
    content: Result<I, AcquisitionError>,
) -> CycleReport<O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    match content {
        Ok(item) => Ok(gatherer.gather(&item, hooks).await),
        Err(error) => {
            tracing::warn!(provider = %provider, error = %error, "skipping cycle");
            Err(error)
        }
    }
}
