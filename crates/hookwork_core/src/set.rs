//! Ordered hook registry.
//!
//! A [`HookSet`] is the ordered, append-only list of hooks a provider owns.
//! Registration order is the index order of every [`ResultSet`](crate::ResultSet)
//! gathered over the set.
//!
//! A hook's identity is its index, not its name: two instances of the same
//! hook type may be registered side by side, and names only label logs and
//! failures.
//!
//! Hooks are added during setup. Once a provider starts, it moves its set
//! behind a shared reference, so the list is read-only for the whole time
//! dispatch can observe it.

use core::fmt;

use crate::hook::Hook;

// ─────────────────────────────────────────────────────────────────────────────
// HookSet
// ─────────────────────────────────────────────────────────────────────────────

/// Entry in the hook set.
struct HookEntry<I, O> {
    /// Name captured at registration time.
    name: String,
    hook: Box<dyn Hook<I, O>>,
}

/// Ordered collection of hooks processing items of type `I` into `O`.
///
/// # Example
///
/// ```
/// use hookwork_core::{HookSet, hook_fn};
///
/// let mut hooks = HookSet::new();
/// hooks
///     .add(hook_fn("first", |n: &i32| Ok(*n)))
///     .add(hook_fn("second", |n: &i32| Ok(n + 1)))
///     .add(hook_fn("first", |n: &i32| Ok(-n)));
///
/// assert_eq!(hooks.names(), vec!["first", "second", "first"]);
/// assert_eq!(hooks.position("first"), Some(0));
/// ```
pub struct HookSet<I, O> {
    entries: Vec<HookEntry<I, O>>,
}

impl<I, O> Default for HookSet<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> fmt::Debug for HookSet<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("hooks", &self.names())
            .finish()
    }
}

impl<I, O> HookSet<I, O> {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a hook to the end of the set.
    pub fn add(&mut self, hook: impl Hook<I, O>) -> &mut Self
    where
        I: 'static,
        O: 'static,
    {
        self.add_boxed(Box::new(hook))
    }

    /// Appends an already boxed hook, e.g. one built by a factory.
    pub fn add_boxed(&mut self, hook: Box<dyn Hook<I, O>>) -> &mut Self
    where
        I: 'static,
        O: 'static,
    {
        let name = hook.name().to_owned();
        tracing::debug!(hook = %name, index = self.entries.len(), "registered hook");
        self.entries.push(HookEntry { name, hook });
        self
    }

    /// Returns the number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the hook names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Returns the registration index of the first hook with this name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Returns `true` if a hook with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterates `(name, hook)` pairs in registration order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &dyn Hook<I, O>)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.hook.as_ref()))
    }
}
