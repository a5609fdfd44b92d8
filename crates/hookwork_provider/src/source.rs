//! User-implemented stages of the three provider kinds.
//!
//! | Provider kind | Stage trait |
//! |---------------|-------------|
//! | Periodic | [`ContentSource`] |
//! | Blocking | [`BlockingSource`] |
//! | Complex | [`MessageHandler`] |

use core::fmt;
use core::marker::PhantomData;

use async_trait::async_trait;
use hookwork_core::ResultSet;

use crate::error::{AcquisitionError, ProcessingError};

/// What a cycle hands to the result callback.
///
/// `Ok` carries the ordered hook outcomes for the acquired item. `Err`
/// means acquisition failed and no hook ran this cycle.
pub type CycleReport<O> = Result<ResultSet<O>, AcquisitionError>;

// ─────────────────────────────────────────────────────────────────────────────
// Periodic
// ─────────────────────────────────────────────────────────────────────────────

/// Content acquisition for a [`PeriodicProvider`](crate::PeriodicProvider).
///
/// Both methods run on the shared cooperative runtime and must not block
/// the thread. Long waits belong in a [`BlockingSource`].
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use hookwork_provider::{AcquisitionError, ContentSource, CycleReport};
///
/// struct Counter(u64);
///
/// #[async_trait]
/// impl ContentSource for Counter {
///     type Item = u64;
///     type Output = String;
///
///     async fn get_content(&mut self) -> Result<u64, AcquisitionError> {
///         self.0 += 1;
///         Ok(self.0)
///     }
///
///     async fn result_callback(&mut self, report: CycleReport<String>) {
///         if let Ok(results) = report {
///             tracing::info!(answers = results.len(), "cycle done");
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait ContentSource: Send + 'static {
    /// The data item fanned out to hooks.
    type Item: Send + Sync + 'static;

    /// What each hook returns.
    type Output: Send + 'static;

    /// Acquires the next data item.
    async fn get_content(&mut self) -> Result<Self::Item, AcquisitionError>;

    /// Receives the outcome of a cycle. Does nothing by default.
    async fn result_callback(&mut self, _report: CycleReport<Self::Output>) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Blocking
// ─────────────────────────────────────────────────────────────────────────────

/// Content acquisition for a [`BlockingProvider`](crate::BlockingProvider).
///
/// Runs on the provider's dedicated thread, so `get_content` may block for
/// as long as it needs to.
pub trait BlockingSource: Send + 'static {
    /// The data item fanned out to hooks.
    type Item: Send + Sync + 'static;

    /// What each hook returns.
    type Output: Send + 'static;

    /// Acquires the next data item, blocking the provider thread.
    fn get_content(&mut self) -> Result<Self::Item, AcquisitionError>;

    /// Receives the outcome of a cycle. Does nothing by default.
    fn result_callback(&mut self, _report: CycleReport<Self::Output>) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Complex
// ─────────────────────────────────────────────────────────────────────────────

/// The preprocess and postprocess stages of a
/// [`ComplexProvider`](crate::ComplexProvider).
///
/// Each message goes `Payload → preprocess_data → Item → hooks →
/// ResultSet<Output> → postprocess_result → Reply`. An error in either
/// stage fails that message only.
///
/// Both stages are required. Handlers that need only one of them can be
/// built from a function: [`preprocess_fn`] replies with the [`ResultSet`]
/// itself, [`postprocess_fn`] fans the payload out unchanged, and
/// [`Passthrough`] does neither.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// What external callers submit.
    type Payload: Send + 'static;

    /// The data item fanned out to hooks.
    type Item: Send + Sync + 'static;

    /// What each hook returns.
    type Output: Send + 'static;

    /// What external callers get back.
    type Reply: Clone + Send + 'static;

    /// Turns a submitted payload into the data item.
    async fn preprocess_data(&self, payload: Self::Payload) -> Result<Self::Item, ProcessingError>;

    /// Turns the gathered hook outcomes into the reply.
    async fn postprocess_result(
        &self,
        results: ResultSet<Self::Output>,
    ) -> Result<Self::Reply, ProcessingError>;
}

/// Identity handler: the payload is the item and the reply is the
/// [`ResultSet`] itself.
pub struct Passthrough<I, O> {
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O> Passthrough<I, O> {
    /// Creates the identity handler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<I, O> Default for Passthrough<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> fmt::Debug for Passthrough<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passthrough")
    }
}

#[async_trait]
impl<I, O> MessageHandler for Passthrough<I, O>
where
    I: Send + Sync + 'static,
    O: Clone + Send + 'static,
{
    type Payload = I;
    type Item = I;
    type Output = O;
    type Reply = ResultSet<O>;

    async fn preprocess_data(&self, payload: I) -> Result<I, ProcessingError> {
        Ok(payload)
    }

    async fn postprocess_result(&self, results: ResultSet<O>) -> Result<ResultSet<O>, ProcessingError> {
        Ok(results)
    }
}

/// Handler built by [`preprocess_fn`].
pub struct PreprocessFn<F, P, I, O> {
    func: F,
    _marker: PhantomData<fn(P) -> (I, O)>,
}

/// Creates a handler that converts each payload with `func` and replies with
/// the gathered [`ResultSet`].
///
/// # Example
///
/// ```
/// use hookwork_core::hook_fn;
/// use hookwork_provider::{ComplexProvider, ProcessingError, preprocess_fn};
///
/// let parse = preprocess_fn::<String, u64, bool, _>(|text| {
///     text.trim().parse::<u64>().map_err(|e| ProcessingError::new(e.to_string()))
/// });
/// let provider = ComplexProvider::new("parser", parse)
///     .with_hook(hook_fn("even", |n: &u64| Ok(n % 2 == 0)));
/// assert_eq!(provider.hooks().len(), 1);
/// ```
pub fn preprocess_fn<P, I, O, F>(func: F) -> PreprocessFn<F, P, I, O>
where
    F: Fn(P) -> Result<I, ProcessingError> + Send + Sync + 'static,
{
    PreprocessFn {
        func,
        _marker: PhantomData,
    }
}

impl<F, P, I, O> fmt::Debug for PreprocessFn<F, P, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PreprocessFn")
    }
}

#[async_trait]
impl<F, P, I, O> MessageHandler for PreprocessFn<F, P, I, O>
where
    F: Fn(P) -> Result<I, ProcessingError> + Send + Sync + 'static,
    P: Send + 'static,
    I: Send + Sync + 'static,
    O: Clone + Send + 'static,
{
    type Payload = P;
    type Item = I;
    type Output = O;
    type Reply = ResultSet<O>;

    async fn preprocess_data(&self, payload: P) -> Result<I, ProcessingError> {
        (self.func)(payload)
    }

    async fn postprocess_result(&self, results: ResultSet<O>) -> Result<ResultSet<O>, ProcessingError> {
        Ok(results)
    }
}

/// Handler built by [`postprocess_fn`].
pub struct PostprocessFn<F, I, O, R> {
    func: F,
    _marker: PhantomData<fn(I, O) -> R>,
}

/// Creates a handler that fans each payload out unchanged and turns the
/// gathered [`ResultSet`] into the reply with `func`.
pub fn postprocess_fn<I, O, R, F>(func: F) -> PostprocessFn<F, I, O, R>
where
    F: Fn(ResultSet<O>) -> Result<R, ProcessingError> + Send + Sync + 'static,
{
    PostprocessFn {
        func,
        _marker: PhantomData,
    }
}

impl<F, I, O, R> fmt::Debug for PostprocessFn<F, I, O, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PostprocessFn")
    }
}

#[async_trait]
impl<F, I, O, R> MessageHandler for PostprocessFn<F, I, O, R>
where
    F: Fn(ResultSet<O>) -> Result<R, ProcessingError> + Send + Sync + 'static,
    I: Send + Sync + 'static,
    O: Send + 'static,
    R: Clone + Send + 'static,
{
    type Payload = I;
    type Item = I;
    type Output = O;
    type Reply = R;

    async fn preprocess_data(&self, payload: I) -> Result<I, ProcessingError> {
        Ok(payload)
    }

    async fn postprocess_result(&self, results: ResultSet<O>) -> Result<R, ProcessingError> {
        (self.func)(results)
    }
}
