//! Cloneable control handle for a [`Server`](crate::server::Server).

use hookwork_provider::Provider;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::ServerError;

/// Requests delivered to the running orchestrator.
pub(crate) enum Command {
    AddProvider {
        provider: Box<dyn Provider>,
        reply: oneshot::Sender<Result<(), ServerError>>,
    },
}

/// Controls a server from any thread or task.
///
/// Obtained from [`Server::handle`](crate::server::Server::handle) before
/// the server runs; it stays valid for the whole run.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    shutdown: CancellationToken,
    commands: mpsc::UnboundedSender<Command>,
}

impl ServerHandle {
    pub(crate) fn new(shutdown: CancellationToken, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { shutdown, commands }
    }

    /// Requests shutdown.
    ///
    /// Periodic and blocking providers finish their current cycle and stop.
    /// Every message still pending in a complex provider fails with
    /// "aborted by shutdown". [`Server::run`](crate::server::Server::run)
    /// returns once every provider has stopped.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("stop requested");
        }
        self.shutdown.cancel();
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Waits until stop has been requested.
    pub async fn stop_requested(&self) {
        self.shutdown.cancelled().await;
    }

    /// Adds a provider to the running server, which launches it at once.
    ///
    /// Calls made before the server runs are queued and applied when it
    /// starts.
    ///
    /// # Errors
    ///
    /// - [`ServerError::DuplicateProvider`] if the name is taken
    /// - [`ServerError::Launch`] if the provider fails to start
    /// - [`ServerError::NotRunning`] if the server has stopped
    pub async fn add_provider(&self, provider: impl Provider) -> Result<(), ServerError> {
        self.submit(Box::new(provider))?
            .await
            .map_err(|_| ServerError::NotRunning)?
    }

    /// Blocking version of [`add_provider`](Self::add_provider) for threads
    /// outside the cooperative runtime.
    ///
    /// # Errors
    ///
    /// Same as [`add_provider`](Self::add_provider).
    pub fn add_provider_blocking(&self, provider: impl Provider) -> Result<(), ServerError> {
        self.submit(Box::new(provider))?
            .blocking_recv()
            .map_err(|_| ServerError::NotRunning)?
    }

    fn submit(
        &self,
        provider: Box<dyn Provider>,
    ) -> Result<oneshot::Receiver<Result<(), ServerError>>, ServerError> {
        if self.shutdown.is_cancelled() {
            return Err(ServerError::NotRunning);
        }
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::AddProvider { provider, reply })
            .map_err(|_| ServerError::NotRunning)?;
        Ok(answer)
    }
}
