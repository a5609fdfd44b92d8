//! Integration tests for the fan-out/gather barrier.
//!
//! These tests verify:
//! - Result index `i` always belongs to hook `i`, regardless of completion order
//! - Failing, panicking and slow hooks are contained at their own index
//! - Hooks run concurrently and the barrier waits for all of them

use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use hookwork_core::{
    Hook, HookError, HookFailure, HookSet, ResultGatherer, async_hook_fn, hook_fn,
};
use proptest::prelude::*;

// ─────────────────────────────────────────────────────────────────────────────
// Test Hooks
// ─────────────────────────────────────────────────────────────────────────────

/// Sleeps for a fixed latency, then reports its own index.
struct Delayed {
    name: String,
    index: usize,
    latency: Duration,
}

#[async_trait]
impl Hook<u64, usize> for Delayed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _item: &u64) -> Result<usize, HookError> {
        tokio::time::sleep(self.latency).await;
        Ok(self.index)
    }
}

fn delayed_set(latencies: &[u64]) -> HookSet<u64, usize> {
    let mut hooks = HookSet::new();
    for (index, ms) in latencies.iter().enumerate() {
        hooks.add(Delayed {
            name: format!("delayed-{index}"),
            index,
            latency: Duration::from_millis(*ms),
        });
    }
    hooks
}

/// Always panics.
struct Exploding;

#[async_trait]
impl Hook<u64, usize> for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    async fn process(&self, _item: &u64) -> Result<usize, HookError> {
        panic!("kaboom");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ordering
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_hook_finishing_first_keeps_order() {
    let mut hooks = HookSet::new();
    hooks
        .add(async_hook_fn("div2", |n: u64| async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(format!("divisible by 2: {}", if n % 2 == 0 { "yes" } else { "no" }))
        }))
        .add(hook_fn("div3", |n: &u64| {
            Ok(format!("divisible by 3: {}", if n % 3 == 0 { "yes" } else { "no" }))
        }));

    let results = ResultGatherer::new().gather(&4, &hooks).await;

    assert_eq!(
        results.into_outcomes(),
        vec![
            Ok("divisible by 2: yes".to_string()),
            Ok("divisible by 3: no".to_string()),
        ]
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// For any hook latencies, entry `i` of the result set is hook `i`'s output.
    #[test]
    fn prop_results_follow_registration_order(
        latencies in prop::collection::vec(0_u64..15, 0..8)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("tokio runtime");
        let hooks = delayed_set(&latencies);

        let results = rt.block_on(ResultGatherer::new().gather(&0, &hooks));

        prop_assert_eq!(results.len(), latencies.len());
        for (i, outcome) in results.iter().enumerate() {
            prop_assert_eq!(outcome, &Ok(i));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure Containment
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_hook_never_hides_other_results() {
    let mut hooks = HookSet::new();
    hooks
        .add(hook_fn("ok-before", |n: &u64| Ok(n + 1)))
        .add(hook_fn("always-fails", |_: &u64| -> Result<u64, HookError> {
            Err(HookError::new("refused"))
        }))
        .add(hook_fn("ok-after", |n: &u64| Ok(n * 10)));

    let gatherer = ResultGatherer::new();
    for n in 0..100_u64 {
        let results = gatherer.gather(&n, &hooks).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok(n + 1));
        assert_eq!(
            results[1],
            Err(HookFailure::Error {
                hook: "always-fails".into(),
                error: HookError::new("refused"),
            })
        );
        assert_eq!(results[2], Ok(n * 10));
    }
}

#[tokio::test]
async fn panicking_hook_is_captured_at_its_index() {
    let mut hooks = delayed_set(&[1]);
    hooks.add(Exploding);

    let results = ResultGatherer::new().gather(&0, &hooks).await;

    assert_eq!(results[0], Ok(0));
    match &results[1] {
        Err(HookFailure::Panicked { hook, message }) => {
            assert_eq!(hook, "exploding");
            assert_eq!(message, "kaboom");
        }
        other => panic!("expected panic failure, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_hook_times_out_without_blocking_others() {
    let hooks = delayed_set(&[5, 500, 5]);
    let gatherer = ResultGatherer::new().with_hook_timeout(Duration::from_millis(50));

    let results = gatherer.gather(&0, &hooks).await;

    assert_eq!(results[0], Ok(0));
    assert_eq!(
        results[1],
        Err(HookFailure::TimedOut {
            hook: "delayed-1".into(),
            timeout: Duration::from_millis(50),
        })
    );
    assert_eq!(results[2], Ok(2));
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn hooks_run_concurrently() {
    let hooks = delayed_set(&[100, 100, 100, 100]);

    let started = Instant::now();
    let results = ResultGatherer::new().gather(&0, &hooks).await;
    let elapsed = started.elapsed();

    assert!(results.all_succeeded());
    assert!(
        elapsed < Duration::from_millis(350),
        "hooks appear serialized: {elapsed:?}"
    );
}

#[tokio::test]
async fn barrier_waits_for_every_hook() {
    let finished = Arc::new(AtomicUsize::new(0));
    let mut hooks = HookSet::new();
    for i in 0..5_u64 {
        let finished = Arc::clone(&finished);
        hooks.add(async_hook_fn(format!("h{i}"), move |_: u64| {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }
        }));
    }

    let results = ResultGatherer::new().gather(&0, &hooks).await;

    assert_eq!(results.len(), 5);
    assert_eq!(finished.load(Ordering::SeqCst), 5);
}
