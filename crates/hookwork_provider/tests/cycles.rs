//! Integration tests for periodic and blocking cycle loops.
//!
//! These tests verify:
//! - Cycles of one provider never overlap, even when hooks outlast the period
//! - A periodic cycle starts once per period, or right away after an overrun
//! - Shutdown during a fan-out still delivers the complete result set
//! - Acquisition failures skip the fan-out and reach the callback
//! - A blocking acquisition never stalls providers on the shared runtime
//! - Providers stop promptly once shutdown is requested

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use hookwork_core::{async_hook_fn, hook_fn};
use hookwork_provider::{
    AcquisitionError, BlockingProvider, BlockingSource, CancellationToken, ContentSource,
    CycleReport, PeriodicProvider, Provider, ProviderError, ProviderKind, ProviderState,
};
use parking_lot::Mutex;
use tokio::time::Instant;

// ─────────────────────────────────────────────────────────────────────────────
// Test sources
// ─────────────────────────────────────────────────────────────────────────────

/// Counts up and cancels `stop` after `limit` completed cycles.
struct Counter {
    next: u64,
    limit: u64,
    in_cycle: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    reports: Arc<Mutex<Vec<CycleReport<String>>>>,
    stop: CancellationToken,
}

impl Counter {
    fn new(limit: u64, stop: &CancellationToken) -> Self {
        Self {
            next: 0,
            limit,
            in_cycle: Arc::new(AtomicBool::new(false)),
            overlaps: Arc::new(AtomicUsize::new(0)),
            reports: Arc::new(Mutex::new(Vec::new())),
            stop: stop.clone(),
        }
    }
}

#[async_trait]
impl ContentSource for Counter {
    type Item = u64;
    type Output = String;

    async fn get_content(&mut self) -> Result<u64, AcquisitionError> {
        if self.in_cycle.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.next += 1;
        if self.next % 3 == 0 {
            return Err(AcquisitionError::new(format!("sensor offline at {}", self.next)));
        }
        Ok(self.next)
    }

    async fn result_callback(&mut self, report: CycleReport<String>) {
        self.in_cycle.store(false, Ordering::SeqCst);
        let mut reports = self.reports.lock();
        reports.push(report);
        if reports.len() as u64 >= self.limit {
            self.stop.cancel();
        }
    }
}

fn divisibility(d: u64) -> impl hookwork_core::Hook<u64, String> {
    hook_fn(format!("div{d}"), move |n: &u64| {
        let verdict = if n % d == 0 { "yes" } else { "no" };
        Ok(format!("divisible by {d}: {verdict}"))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Periodic
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn periodic_cycles_never_overlap() {
    let stop = CancellationToken::new();
    let source = Counter::new(50, &stop);
    let overlaps = Arc::clone(&source.overlaps);
    let reports = Arc::clone(&source.reports);

    // Each hook outlasts the period several times over.
    let provider = PeriodicProvider::new("counter", source)
        .with_period(Duration::from_millis(2))
        .with_hook(async_hook_fn("slow", |n: u64| async move {
            tokio::time::sleep(Duration::from_millis(6)).await;
            Ok(n.to_string())
        }));

    tokio::time::timeout(Duration::from_secs(10), provider.run(stop))
        .await
        .expect("provider did not stop");

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(reports.lock().len(), 50);
}

#[tokio::test]
async fn acquisition_failure_skips_fan_out() {
    let stop = CancellationToken::new();
    let source = Counter::new(6, &stop);
    let reports = Arc::clone(&source.reports);
    let invocations = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&invocations);

    let provider = PeriodicProvider::new("flaky", source)
        .with_period(Duration::from_millis(1))
        .with_hook(hook_fn("count", move |n: &u64| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(n.to_string())
        }));
    provider.run(stop).await;

    let reports = reports.lock();
    assert_eq!(reports.len(), 6);
    for (cycle, report) in reports.iter().enumerate() {
        let n = cycle as u64 + 1;
        if n % 3 == 0 {
            let error = report.as_ref().unwrap_err();
            assert_eq!(error.message(), format!("sensor offline at {n}"));
        } else {
            let results = report.as_ref().unwrap();
            assert_eq!(results[0], Ok(n.to_string()));
        }
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn periodic_result_sets_follow_hook_order() {
    let stop = CancellationToken::new();
    let source = Counter::new(2, &stop);
    let reports = Arc::clone(&source.reports);

    PeriodicProvider::new("divisibility", source)
        .with_period(Duration::from_millis(1))
        .with_hook(divisibility(2))
        .with_hook(divisibility(3))
        .run(stop)
        .await;

    let reports = reports.lock();
    let second = reports[1].as_ref().unwrap();
    assert_eq!(
        second.iter().cloned().collect::<Vec<_>>(),
        vec![
            Ok("divisible by 2: yes".to_string()),
            Ok("divisible by 3: no".to_string()),
        ]
    );
}

#[tokio::test]
async fn cancelled_before_start_runs_no_cycle() {
    let stop = CancellationToken::new();
    let source = Counter::new(10, &stop);
    let reports = Arc::clone(&source.reports);
    stop.cancel();

    PeriodicProvider::new("idle", source).run(stop).await;

    assert!(reports.lock().is_empty());
}

#[tokio::test]
async fn launched_periodic_reports_state() {
    let stop = CancellationToken::new();
    let source = Counter::new(u64::MAX, &CancellationToken::new());
    let reports = Arc::clone(&source.reports);

    let provider: Box<dyn Provider> = Box::new(
        PeriodicProvider::new("observed", source)
            .with_period(Duration::from_millis(5))
            .with_hook(divisibility(2)),
    );
    assert_eq!(provider.kind(), ProviderKind::Periodic);
    assert_eq!(provider.hook_count(), 1);

    let handle = provider.launch(stop.clone()).unwrap();
    let mut state = handle.subscribe();
    state
        .wait_for(|s| *s == ProviderState::Running)
        .await
        .unwrap();

    while reports.lock().len() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    stop.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle.join())
        .await
        .expect("provider did not stop")
        .unwrap();
    assert_eq!(*state.borrow(), ProviderState::Stopped);
}

#[test]
fn loop_bound_launch_needs_a_runtime() {
    let source = Counter::new(1, &CancellationToken::new());
    let provider = Box::new(PeriodicProvider::new("orphan", source));

    let error = provider.launch(CancellationToken::new()).unwrap_err();
    assert!(matches!(error, ProviderError::NoRuntime { name } if name == "orphan"));
}

/// Records when each cycle starts; cancels `stop` after `limit` cycles.
struct Stopwatch {
    starts: Arc<Mutex<Vec<Instant>>>,
    reports: Arc<Mutex<Vec<CycleReport<String>>>>,
    limit: usize,
    stop: CancellationToken,
}

impl Stopwatch {
    fn new(limit: usize, stop: &CancellationToken) -> Self {
        Self {
            starts: Arc::new(Mutex::new(Vec::new())),
            reports: Arc::new(Mutex::new(Vec::new())),
            limit,
            stop: stop.clone(),
        }
    }
}

#[async_trait]
impl ContentSource for Stopwatch {
    type Item = u64;
    type Output = String;

    async fn get_content(&mut self) -> Result<u64, AcquisitionError> {
        let mut starts = self.starts.lock();
        starts.push(Instant::now());
        Ok(starts.len() as u64)
    }

    async fn result_callback(&mut self, report: CycleReport<String>) {
        let mut reports = self.reports.lock();
        reports.push(report);
        if reports.len() >= self.limit {
            self.stop.cancel();
        }
    }
}

fn sleeper(name: &str, delay: Duration) -> impl hookwork_core::Hook<u64, String> {
    async_hook_fn(name, move |n: u64| async move {
        tokio::time::sleep(delay).await;
        Ok(n.to_string())
    })
}

fn gaps(starts: &[Instant]) -> Vec<Duration> {
    starts.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

#[tokio::test(start_paused = true)]
async fn quick_cycles_start_once_per_period() {
    let period = Duration::from_millis(20);
    let work = Duration::from_millis(5);
    let stop = CancellationToken::new();
    let source = Stopwatch::new(6, &stop);
    let starts = Arc::clone(&source.starts);

    PeriodicProvider::new("steady", source)
        .with_period(period)
        .with_hook(sleeper("work", work))
        .run(stop)
        .await;

    let gaps = gaps(&starts.lock());
    assert_eq!(gaps.len(), 5);
    for gap in gaps {
        // Start to start, not end to start.
        assert!(gap >= period && gap < period + work, "gap {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn an_overrunning_cycle_is_followed_immediately() {
    let period = Duration::from_millis(10);
    let work = Duration::from_millis(25);
    let stop = CancellationToken::new();
    let source = Stopwatch::new(5, &stop);
    let starts = Arc::clone(&source.starts);

    PeriodicProvider::new("overrun", source)
        .with_period(period)
        .with_hook(sleeper("work", work))
        .run(stop)
        .await;

    let gaps = gaps(&starts.lock());
    assert_eq!(gaps.len(), 4);
    for gap in gaps {
        // No catch-up burst and no extra wait for the next period.
        assert!(gap >= work && gap < work + period, "gap {gap:?}");
    }
}

#[tokio::test]
async fn shutdown_during_fan_out_delivers_the_whole_result_set() {
    let stop = CancellationToken::new();
    let source = Stopwatch::new(usize::MAX, &CancellationToken::new());
    let reports = Arc::clone(&source.reports);
    let requester = stop.clone();

    PeriodicProvider::new("interrupted", source)
        .with_period(Duration::from_millis(1))
        .with_hook(sleeper("fast", Duration::ZERO))
        .with_hook(async_hook_fn("stopper", move |n: u64| {
            let stop = requester.clone();
            async move {
                stop.cancel();
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(format!("finished {n}"))
            }
        }))
        .run(stop)
        .await;

    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    let results = reports[0].as_ref().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], Ok("1".to_string()));
    assert_eq!(results[1], Ok("finished 1".to_string()));
}

#[tokio::test]
async fn the_same_hook_type_can_run_twice_in_one_cycle() {
    let stop = CancellationToken::new();
    let source = Stopwatch::new(1, &stop);
    let reports = Arc::clone(&source.reports);

    let provider = PeriodicProvider::new("twice", source)
        .with_hook(sleeper("echo", Duration::ZERO))
        .with_hook(sleeper("echo", Duration::ZERO));
    assert_eq!(provider.hook_count(), 2);
    provider.run(stop).await;

    let reports = reports.lock();
    let results = reports[0].as_ref().unwrap();
    assert_eq!(
        results.iter().cloned().collect::<Vec<_>>(),
        vec![Ok("1".to_string()), Ok("1".to_string())]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Blocking
// ─────────────────────────────────────────────────────────────────────────────

/// Blocks the calling thread for `delay` per acquisition.
struct SlowSensor {
    delay: Duration,
    readings: u64,
    verdicts: Arc<Mutex<Vec<String>>>,
}

impl BlockingSource for SlowSensor {
    type Item = u64;
    type Output = String;

    fn get_content(&mut self) -> Result<u64, AcquisitionError> {
        std::thread::sleep(self.delay);
        self.readings += 1;
        Ok(self.readings)
    }

    fn result_callback(&mut self, report: CycleReport<String>) {
        if let Ok(results) = report {
            self.verdicts
                .lock()
                .extend(results.into_iter().filter_map(Result::ok));
        }
    }
}

#[tokio::test]
async fn blocking_acquisition_does_not_stall_the_shared_runtime() {
    let stop = CancellationToken::new();
    let verdicts = Arc::new(Mutex::new(Vec::new()));

    let sensor = SlowSensor {
        delay: Duration::from_millis(300),
        readings: 0,
        verdicts: Arc::clone(&verdicts),
    };
    let blocking = Box::new(BlockingProvider::new("sensor", sensor).with_hook(divisibility(2)))
        .launch(stop.clone())
        .unwrap();
    assert_eq!(blocking.kind(), ProviderKind::Blocking);

    let ticks = Counter::new(u64::MAX, &CancellationToken::new());
    let reports = Arc::clone(&ticks.reports);
    let periodic = Box::new(PeriodicProvider::new("ticker", ticks).with_period(Duration::from_millis(5)))
        .launch(stop.clone())
        .unwrap();

    // Well inside the sensor's first acquisition.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(
        reports.lock().len() >= 5,
        "periodic provider stalled: {} cycles",
        reports.lock().len()
    );

    stop.cancel();
    tokio::time::timeout(Duration::from_secs(2), periodic.join())
        .await
        .unwrap()
        .unwrap();
    // The acquisition in progress finishes, then the loop exits.
    tokio::time::timeout(Duration::from_secs(2), blocking.join())
        .await
        .unwrap()
        .unwrap();
    assert!(verdicts.lock().len() <= 1);
}

#[tokio::test]
async fn blocking_provider_runs_cycles_back_to_back() {
    let stop = CancellationToken::new();
    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let sensor = SlowSensor {
        delay: Duration::from_millis(1),
        readings: 0,
        verdicts: Arc::clone(&verdicts),
    };

    let mut handle = Box::new(
        BlockingProvider::new("sensor", sensor)
            .with_hook(divisibility(2))
            .with_hook(divisibility(3)),
    )
    .launch(stop.clone())
    .unwrap();

    while verdicts.lock().len() < 6 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    stop.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle.stopped())
        .await
        .expect("blocking provider did not stop");
    assert_eq!(handle.state(), ProviderState::Stopped);

    let verdicts = verdicts.lock();
    assert_eq!(verdicts[0], "divisible by 2: no");
    assert_eq!(verdicts[1], "divisible by 3: no");
    assert_eq!(verdicts[2], "divisible by 2: yes");
    assert_eq!(verdicts[3], "divisible by 3: no");
    assert_eq!(verdicts[4], "divisible by 2: no");
    assert_eq!(verdicts[5], "divisible by 3: yes");
}

#[test]
fn blocking_provider_runs_on_the_calling_thread() {
    let stop = CancellationToken::new();
    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let sensor = SlowSensor {
        delay: Duration::ZERO,
        readings: 0,
        verdicts: Arc::clone(&verdicts),
    };

    let canceller = {
        let stop = stop.clone();
        let verdicts = Arc::clone(&verdicts);
        std::thread::spawn(move || {
            while verdicts.lock().len() < 3 {
                std::thread::sleep(Duration::from_millis(1));
            }
            stop.cancel();
        })
    };

    BlockingProvider::new("inline", sensor)
        .with_hook(divisibility(2))
        .run(stop)
        .unwrap();
    canceller.join().unwrap();

    assert!(verdicts.lock().len() >= 3);
}
