//! Orchestrator for Hookwork providers (Layer 3).
//!
//! - [`server`] - [`Server`](server::Server): registers providers, runs the
//!   cooperative runtime, stops everything on request
//! - [`plugin`] - the build → ready → cleanup plugin lifecycle
//! - [`factory`] - alias-based construction of hooks and providers
//!
//! # Architecture
//!
//! - **Layer 1** (`hookwork_core`, `hookwork_message`): dispatch and correlation primitives
//! - **Layer 2** (`hookwork_provider`): Periodic, Blocking and Complex provider loops
//! - **Layer 3** (`hookwork_system`): the orchestrator and plugins

/// Error types.
pub mod error;

/// Alias factories for hooks and providers.
pub mod factory;

/// Control handle for a running server.
pub mod handle;

/// Plugin lifecycle.
pub mod plugin;

/// The orchestrator.
pub mod server;

pub use error::{FactoryError, ServerError};
pub use factory::{HookFactory, ProviderFactory};
pub use handle::ServerHandle;
pub use plugin::{Plugin, PluginGroup, PluginGroupBuilder, PluginId, Plugins};
pub use server::Server;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::error::{FactoryError, ServerError};
    pub use crate::factory::{HookFactory, ProviderFactory};
    pub use crate::handle::ServerHandle;
    pub use crate::plugin::{Plugin, PluginGroup, PluginGroupBuilder, PluginId, Plugins};
    pub use crate::server::Server;
}
