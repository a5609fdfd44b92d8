//! # Hookwork Internal Library
//!
//! Re-exports the Hookwork crates for convenience.

/// Layer 1: hooks and the fan-out/gather barrier.
pub use hookwork_core;

/// Layer 1: cross-context message correlation.
pub use hookwork_message;

/// Layer 2: Periodic, Blocking and Complex providers.
pub use hookwork_provider;

/// Layer 3: the orchestrator and plugins.
pub use hookwork_system;

/// Infrastructure plugins.
pub use hookwork_core_plugins;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use hookwork_core::prelude::*;
    pub use hookwork_core_plugins::{TracingConfig, TracingFormat, TracingPlugin};
    pub use hookwork_message::{
        MessageError, MessageFailure, MessageId, MessageState, MessageSystem,
        MessageSystemConfig, Retrieved,
    };
    pub use hookwork_provider::prelude::*;
    pub use hookwork_system::prelude::*;
}
