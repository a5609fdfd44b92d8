//! The [`Hook`] trait.
//!
//! A hook transforms one data item into one result. Hooks are invoked
//! concurrently with the other hooks of the same provider, so they only ever
//! see the item through a shared reference and must not assume exclusive
//! access to any provider-owned state.
//!
//! # Implementing a hook
//!
//! ```
//! use async_trait::async_trait;
//! use hookwork_core::{Hook, HookError};
//!
//! struct DivisibleBy(u64);
//!
//! #[async_trait]
//! impl Hook<u64, String> for DivisibleBy {
//!     fn name(&self) -> &str {
//!         "divisible_by"
//!     }
//!
//!     async fn process(&self, item: &u64) -> Result<String, HookError> {
//!         if self.0 == 0 {
//!             return Err(HookError::new("divisor is zero"));
//!         }
//!         let verdict = if item % self.0 == 0 { "yes" } else { "no" };
//!         Ok(format!("divisible by {}: {verdict}", self.0))
//!     }
//! }
//! ```
//!
//! For quick hooks, [`hook_fn`] and [`async_hook_fn`] wrap closures.

use core::fmt;
use core::future::Future;
use core::marker::PhantomData;

use async_trait::async_trait;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// HookError
// ─────────────────────────────────────────────────────────────────────────────

/// Error returned by a hook's [`process`](Hook::process).
///
/// The gather barrier wraps it into a
/// [`HookFailure::Error`](crate::HookFailure::Error) at the hook's index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    /// Creates a new hook error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of work that turns one data item `I` into one result `O`.
///
/// Hooks are stateless with respect to dispatch. They may carry private
/// configuration, and any interior state they keep must tolerate concurrent
/// calls since a provider runs all of its hooks on the same item at once.
#[async_trait]
pub trait Hook<I, O>: Send + Sync + 'static {
    /// Name used in logs and failure reports.
    ///
    /// Names need not be unique; a hook is identified by its position in its
    /// [`HookSet`](crate::HookSet).
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Processes one data item.
    async fn process(&self, item: &I) -> Result<O, HookError>;
}

/// Boxed hooks, such as those built by a factory, register like any other.
#[async_trait]
impl<I, O> Hook<I, O> for Box<dyn Hook<I, O>>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn process(&self, item: &I) -> Result<O, HookError> {
        (**self).process(item).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Closure adapters
// ─────────────────────────────────────────────────────────────────────────────

/// Hook backed by a synchronous closure. Created by [`hook_fn`].
pub struct FnHook<I, O, F> {
    name: String,
    func: F,
    _marker: PhantomData<fn(&I) -> O>,
}

impl<I, O, F> fmt::Debug for FnHook<I, O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHook").field("name", &self.name).finish()
    }
}

/// Wraps a synchronous closure as a named [`Hook`].
///
/// The closure runs inline on the gathering task, so it should be quick.
///
/// # Example
///
/// ```
/// use hookwork_core::hook_fn;
///
/// let hook = hook_fn("is_even", |n: &u64| Ok(n % 2 == 0));
/// ```
pub fn hook_fn<I, O, F>(name: impl Into<String>, func: F) -> FnHook<I, O, F>
where
    F: Fn(&I) -> Result<O, HookError> + Send + Sync + 'static,
{
    FnHook {
        name: name.into(),
        func,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<I, O, F> Hook<I, O> for FnHook<I, O, F>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
    F: Fn(&I) -> Result<O, HookError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, item: &I) -> Result<O, HookError> {
        (self.func)(item)
    }
}

/// Hook backed by an async closure. Created by [`async_hook_fn`].
pub struct AsyncFnHook<I, O, F> {
    name: String,
    func: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O, F> fmt::Debug for AsyncFnHook<I, O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnHook")
            .field("name", &self.name)
            .finish()
    }
}

/// Wraps an async closure as a named [`Hook`].
///
/// The closure receives its own clone of the item so the returned future can
/// be `'static`.
///
/// # Example
///
/// ```
/// use hookwork_core::async_hook_fn;
/// use std::time::Duration;
///
/// let hook = async_hook_fn("slow_double", |n: u64| async move {
///     tokio::time::sleep(Duration::from_millis(1)).await;
///     Ok(n * 2)
/// });
/// ```
pub fn async_hook_fn<I, O, F, Fut>(name: impl Into<String>, func: F) -> AsyncFnHook<I, O, F>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, HookError>> + Send + 'static,
{
    AsyncFnHook {
        name: name.into(),
        func,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<I, O, F, Fut> Hook<I, O> for AsyncFnHook<I, O, F>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, HookError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, item: &I) -> Result<O, HookError> {
        (self.func)(item.clone()).await
    }
}
