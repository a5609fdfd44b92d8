//! Error types for providers and their user-supplied stages.

use hookwork_message::MessageError;
use thiserror::Error;

/// Failure reported by a content source while acquiring a data item.
///
/// The cycle is skipped and the error is handed to the source's result
/// callback; the provider keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("acquisition failed: {message}")]
pub struct AcquisitionError {
    message: String,
}

impl AcquisitionError {
    /// Creates an acquisition error with the given message.
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

impl From<String> for AcquisitionError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for AcquisitionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failure in a message handler's preprocess or postprocess stage.
///
/// Fails only the message being processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProcessingError {
    message: String,
}

impl ProcessingError {
    /// Creates a processing error with the given message.
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

impl From<String> for ProcessingError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ProcessingError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Errors raised while launching or joining a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A loop-bound provider was launched outside a tokio runtime.
    #[error("provider '{name}' must be launched from within a tokio runtime")]
    NoRuntime {
        /// Provider name.
        name: String,
    },

    /// The dedicated worker thread could not be spawned.
    #[error("failed to spawn worker thread for provider '{name}': {source}")]
    Spawn {
        /// Provider name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The provider's message system could not be attached.
    #[error("message system of provider '{name}' is unavailable: {source}")]
    Messages {
        /// Provider name.
        name: String,
        /// Underlying message error.
        #[source]
        source: MessageError,
    },

    /// The provider's task or thread panicked.
    #[error("provider '{name}' panicked: {message}")]
    Panicked {
        /// Provider name.
        name: String,
        /// Panic payload, if it was a string.
        message: String,
    },
}
