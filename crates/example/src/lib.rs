//! Divisibility checks served by all three provider kinds.
//!
//! ```text
//!   counter (Periodic)  ──┐
//!   sensor  (Blocking)  ──┼──▶ div2, div3, div5 ──▶ ordered verdicts
//!   checker (Complex)   ──┘         ▲
//!        ▲                          │
//!        └── foreign threads: send_wait_answer_blocking("12")
//! ```
//!
//! [`DivisibilityPlugin`] registers the three providers and stores the
//! checker's message system as the [`CheckerMessages`] resource so callers
//! outside the server can reach it.

mod handler;
mod plugin;
mod sources;

pub use handler::{CheckerMessages, TextualChecker};
pub use plugin::{DivisibilityPlugin, DivisibilityPlugins};
pub use sources::{Counter, Sensor};

use hookwork_core::{Hook, HookError, hook_fn};

/// Hook answering whether an item is divisible by `divisor`.
pub fn divisible_by(divisor: u64) -> impl Hook<u64, String> {
    hook_fn(format!("div{divisor}"), move |n: &u64| {
        if divisor == 0 {
            return Err(HookError::new("divisor is zero"));
        }
        let verdict = if n % divisor == 0 { "yes" } else { "no" };
        Ok(format!("divisible by {divisor}: {verdict}"))
    })
}

/// Divisors every provider checks, in result order.
pub const DIVISORS: [u64; 3] = [2, 3, 5];
