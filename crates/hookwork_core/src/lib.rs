//! The hook contract and fan-out/gather barrier for Hookwork (Layer 1).
//!
//! `hookwork_core` provides the pieces every provider builds on:
//!
//! - [`hook`] - The [`Hook`] trait and closure adapters
//! - [`set`] - [`HookSet`], the ordered per-provider hook registry
//! - [`gather`] - [`ResultGatherer`] and the ordered [`ResultSet`]
//!
//! # Architecture
//!
//! - **Layer 1** (`hookwork_core`, `hookwork_message`): dispatch and correlation primitives
//! - **Layer 2** (`hookwork_provider`): Periodic, Blocking and Complex provider loops
//! - **Layer 3** (`hookwork_system`): the orchestrator and plugins
//!
//! # Example
//!
//! ```
//! use hookwork_core::{HookSet, ResultGatherer, hook_fn};
//!
//! let mut hooks = HookSet::new();
//! hooks
//!     .add(hook_fn("div2", |n: &u64| Ok(n % 2 == 0)))
//!     .add(hook_fn("div3", |n: &u64| Ok(n % 3 == 0)));
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let results = rt.block_on(ResultGatherer::new().gather(&4, &hooks));
//!
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[0], Ok(true));
//! assert_eq!(results[1], Ok(false));
//! ```

/// Hook trait and closure adapters.
pub mod hook;

/// Ordered hook registry.
pub mod set;

/// Concurrent fan-out with ordered gather.
pub mod gather;

pub use gather::{
    GatherConfig, HookFailure, HookOutcome, ResultGatherer, ResultSet, panic_message,
};
pub use hook::{AsyncFnHook, FnHook, Hook, HookError, async_hook_fn, hook_fn};
pub use set::HookSet;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::gather::*;
    pub use crate::hook::*;
    pub use crate::set::*;
}
