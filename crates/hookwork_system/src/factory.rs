//! Alias-based construction of hooks and providers.
//!
//! Applications that load their wiring from configuration register a
//! constructor under one or more aliases, then build instances by alias with
//! JSON arguments.
//!
//! ```
//! use hookwork_core::{Hook, hook_fn};
//! use hookwork_system::factory::HookFactory;
//! use serde_json::json;
//!
//! let mut hooks: HookFactory<u64, bool> = HookFactory::new();
//! hooks
//!     .register(&["divisible", "div"], |args| {
//!         let by: u64 = serde_json::from_value(args["by"].clone())?;
//!         Ok(hook_fn(format!("div{by}"), move |n: &u64| Ok(n % by == 0)))
//!     })
//!     .unwrap();
//!
//! let hook = hooks.create("div", &json!({ "by": 3 })).unwrap();
//! assert_eq!(hook.name(), "div3");
//! assert_eq!(hooks.aliases().collect::<Vec<_>>(), vec!["divisible", "div"]);
//! ```

use std::sync::Arc;

use hookwork_core::Hook;
use hookwork_provider::Provider;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::FactoryError;

type Constructor<T> = dyn Fn(&Value) -> Result<T, serde_json::Error> + Send + Sync;

/// Alias → constructor table shared by both factories.
struct Registry<T> {
    constructors: IndexMap<String, Arc<Constructor<T>>>,
}

impl<T> Registry<T> {
    fn new() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// Binds every alias or none of them.
    fn register(
        &mut self,
        aliases: &[&str],
        constructor: Arc<Constructor<T>>,
    ) -> Result<(), FactoryError> {
        for (i, alias) in aliases.iter().enumerate() {
            if self.constructors.contains_key(*alias) || aliases[..i].contains(alias) {
                return Err(FactoryError::DuplicateAlias((*alias).to_owned()));
            }
        }
        for alias in aliases {
            self.constructors
                .insert((*alias).to_owned(), Arc::clone(&constructor));
        }
        Ok(())
    }

    fn create(&self, alias: &str, args: &Value) -> Result<T, FactoryError> {
        let constructor = self
            .constructors
            .get(alias)
            .ok_or_else(|| FactoryError::UnknownAlias(alias.to_owned()))?;
        constructor(args).map_err(|error| FactoryError::InvalidArguments {
            alias: alias.to_owned(),
            message: error.to_string(),
        })
    }

    fn aliases(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookFactory
// ─────────────────────────────────────────────────────────────────────────────

/// Builds hooks of one item/output type by alias.
pub struct HookFactory<I, O> {
    registry: Registry<Box<dyn Hook<I, O>>>,
}

impl<I, O> Default for HookFactory<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> core::fmt::Debug for HookFactory<I, O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HookFactory")
            .field("aliases", &self.registry.aliases().collect::<Vec<_>>())
            .finish()
    }
}

impl<I, O> HookFactory<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Registers `constructor` under every alias in `aliases`.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::DuplicateAlias`] if any alias is already
    /// bound; no alias is registered in that case.
    pub fn register<H, F>(
        &mut self,
        aliases: &[&str],
        constructor: F,
    ) -> Result<&mut Self, FactoryError>
    where
        H: Hook<I, O>,
        F: Fn(&Value) -> Result<H, serde_json::Error> + Send + Sync + 'static,
    {
        let erased: Arc<Constructor<Box<dyn Hook<I, O>>>> = Arc::new(move |args: &Value| {
            constructor(args).map(|hook| Box::new(hook) as Box<dyn Hook<I, O>>)
        });
        self.registry.register(aliases, erased)?;
        Ok(self)
    }

    /// Builds a hook by alias.
    ///
    /// # Errors
    ///
    /// [`FactoryError::UnknownAlias`] or [`FactoryError::InvalidArguments`].
    pub fn create(&self, alias: &str, args: &Value) -> Result<Box<dyn Hook<I, O>>, FactoryError> {
        self.registry.create(alias, args)
    }

    /// Registered aliases, in registration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.registry.aliases()
    }

    /// Returns true if `alias` is registered.
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.registry.constructors.contains_key(alias)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProviderFactory
// ─────────────────────────────────────────────────────────────────────────────

/// Builds providers of any kind by alias.
pub struct ProviderFactory {
    registry: Registry<Box<dyn Provider>>,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("aliases", &self.registry.aliases().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Registers `constructor` under every alias in `aliases`.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::DuplicateAlias`] if any alias is already
    /// bound; no alias is registered in that case.
    pub fn register<P, F>(
        &mut self,
        aliases: &[&str],
        constructor: F,
    ) -> Result<&mut Self, FactoryError>
    where
        P: Provider,
        F: Fn(&Value) -> Result<P, serde_json::Error> + Send + Sync + 'static,
    {
        let erased: Arc<Constructor<Box<dyn Provider>>> = Arc::new(move |args: &Value| {
            constructor(args).map(|provider| Box::new(provider) as Box<dyn Provider>)
        });
        self.registry.register(aliases, erased)?;
        Ok(self)
    }

    /// Builds a provider by alias.
    ///
    /// # Errors
    ///
    /// [`FactoryError::UnknownAlias`] or [`FactoryError::InvalidArguments`].
    pub fn create(&self, alias: &str, args: &Value) -> Result<Box<dyn Provider>, FactoryError> {
        self.registry.create(alias, args)
    }

    /// Registered aliases, in registration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.registry.aliases()
    }

    /// Returns true if `alias` is registered.
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.registry.constructors.contains_key(alias)
    }
}
