//! Provider loops for Hookwork (Layer 2).
//!
//! A provider obtains data items and fans each one out to its hooks through
//! a [`ResultGatherer`](hookwork_core::ResultGatherer). Three kinds exist:
//!
//! | Kind | Source of items | Runs on |
//! |------|-----------------|---------|
//! | [`PeriodicProvider`] | [`ContentSource`], once per period | shared cooperative runtime |
//! | [`BlockingProvider`] | [`BlockingSource`], back-to-back | its own OS thread |
//! | [`ComplexProvider`] | external callers via [`MessageSystem`](hookwork_message::MessageSystem) | shared runtime or own thread ([`Binding`]) |
//!
//! Every kind implements the object-safe [`Provider`] trait. Launching one
//! yields a [`ProviderHandle`] that reports [`ProviderState`] transitions.
//! All providers stop when their
//! [`CancellationToken`](tokio_util::sync::CancellationToken) is cancelled.

mod blocking;
mod complex;
mod config;
mod cycle;
mod error;
mod periodic;
mod provider;
mod source;

pub use blocking::BlockingProvider;
pub use complex::{ComplexProvider, MessagesOf};
pub use config::{Binding, CycleConfig};
pub use error::{AcquisitionError, ProcessingError, ProviderError};
pub use periodic::PeriodicProvider;
pub use provider::{Provider, ProviderHandle, ProviderKind, ProviderState};
pub use source::{
    BlockingSource, ContentSource, CycleReport, MessageHandler, Passthrough, PostprocessFn,
    PreprocessFn, postprocess_fn, preprocess_fn,
};

pub use tokio_util::sync::CancellationToken;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        AcquisitionError, Binding, BlockingProvider, BlockingSource, CancellationToken,
        ComplexProvider, ContentSource, CycleConfig, CycleReport, MessageHandler, Passthrough,
        PeriodicProvider, ProcessingError, Provider, ProviderError, ProviderHandle, ProviderKind,
        ProviderState, postprocess_fn, preprocess_fn,
    };
}
