//! Error types for the orchestrator and factories.

use hookwork_provider::ProviderError;
use thiserror::Error;

/// Errors raised by the [`Server`](crate::server::Server) and its handle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A provider with this name is already registered.
    #[error("a provider named '{name}' is already registered")]
    DuplicateProvider {
        /// The conflicting name.
        name: String,
    },

    /// `run` was called on a server that already ran.
    #[error("the server is already running or has already run")]
    AlreadyRunning,

    /// The server has stopped and no longer accepts providers.
    #[error("the server is not running")]
    NotRunning,

    /// The cooperative runtime could not be built.
    #[error("failed to build the cooperative runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// A provider failed to launch.
    #[error(transparent)]
    Launch(#[from] ProviderError),
}

/// Errors raised by [`HookFactory`](crate::factory::HookFactory) and
/// [`ProviderFactory`](crate::factory::ProviderFactory).
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The alias is already bound to a constructor.
    #[error("alias '{0}' is already registered")]
    DuplicateAlias(String),

    /// No constructor is registered under this alias.
    #[error("no constructor registered for alias '{0}'")]
    UnknownAlias(String),

    /// The constructor rejected its arguments.
    #[error("invalid arguments for '{alias}': {message}")]
    InvalidArguments {
        /// Alias being constructed.
        alias: String,
        /// Why the arguments were rejected.
        message: String,
    },
}
