//! The orchestrator that registers, starts and stops providers.
//!
//! # Lifecycle
//!
//! 1. **Registration** - providers via [`Server::register`], plugins via
//!    [`Server::add_plugins`]
//! 2. **Build / Ready** - [`Server::finish`] runs the plugin phases in
//!    dependency order
//! 3. **Run** - [`Server::run`] starts a single-threaded cooperative
//!    runtime, launches every provider and blocks until stopped
//! 4. **Stop** - [`ServerHandle::stop`] ends every provider; `run` waits
//!    for all of them, then calls plugin `cleanup()` in reverse order
//!
//! Periodic providers and loop-bound complex providers share the
//! cooperative runtime. Blocking providers and thread-bound complex
//! providers get their own OS threads.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use hookwork_core::hook_fn;
//! use hookwork_provider::{ComplexProvider, Passthrough};
//! use hookwork_system::server::Server;
//!
//! let provider = ComplexProvider::new("parity", Passthrough::<u64, bool>::new())
//!     .with_hook(hook_fn("even", |n: &u64| Ok(n % 2 == 0)));
//! let messages = provider.message_system();
//!
//! let mut server = Server::new();
//! server.register(provider).unwrap();
//! let handle = server.handle();
//!
//! let caller = std::thread::spawn(move || {
//!     let reply = messages.send_wait_answer_blocking(4, Some(Duration::from_secs(5)));
//!     handle.stop();
//!     reply
//! });
//!
//! server.run().unwrap();
//! let reply = caller.join().unwrap().unwrap();
//! assert_eq!(reply[0], Ok(true));
//! ```

use core::any::{Any, TypeId};

use hashbrown::{HashMap, HashSet};
use hookwork_provider::{Provider, ProviderHandle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ServerError;
use crate::handle::{Command, ServerHandle};
use crate::plugin::{Plugin, PluginId, Plugins};

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// Type-erased resource for dynamic storage.
type BoxedResource = Box<dyn Any + Send + Sync>;

/// Represents the build state of the server.
///
/// The server progresses through these states linearly:
/// `NotStarted` → `Building` → `Built`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BuildState {
    #[default]
    NotStarted,
    Building,
    Built,
}

struct PluginEntry {
    id: PluginId,
    plugin: Box<dyn Plugin>,
    name: String,
}

/// Registers providers and plugins, runs them, and stops them.
pub struct Server {
    /// Providers waiting for [`run`](Self::run), in registration order.
    providers: Vec<Box<dyn Provider>>,

    /// Every provider name ever registered, for duplicate detection.
    provider_names: HashSet<String>,

    /// Shared configuration stored by plugins.
    resources: HashMap<TypeId, BoxedResource>,

    /// Plugins pending build (not yet sorted).
    pending_plugins: Vec<PluginEntry>,

    /// Plugins that have been built, in sorted order.
    built_plugins: Vec<PluginEntry>,

    /// Set of plugin IDs that have been added (for duplicate detection).
    plugin_ids: HashSet<PluginId>,

    build_state: BuildState,

    shutdown: CancellationToken,
    commands: mpsc::UnboundedSender<Command>,
    /// Taken by the first `run`.
    inbox: Option<mpsc::UnboundedReceiver<Command>>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Server {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Server")
            .field("providers", &self.provider_names())
            .field("build_state", &self.build_state)
            .field("stopping", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server with no providers and no plugins.
    #[must_use]
    pub fn new() -> Self {
        let (commands, inbox) = mpsc::unbounded_channel();
        Self {
            providers: Vec::new(),
            provider_names: HashSet::new(),
            resources: HashMap::new(),
            pending_plugins: Vec::new(),
            built_plugins: Vec::new(),
            plugin_ids: HashSet::new(),
            build_state: BuildState::NotStarted,
            shutdown: CancellationToken::new(),
            commands,
            inbox: Some(inbox),
        }
    }

    /// Returns a handle to stop the server or add providers while it runs.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle::new(self.shutdown.clone(), self.commands.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Provider Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers a provider to be launched by [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::DuplicateProvider`] if the name is taken.
    pub fn register(&mut self, provider: impl Provider) -> Result<&mut Self, ServerError> {
        self.register_boxed(Box::new(provider))
    }

    /// Registers an already boxed provider, e.g. one built by a
    /// [`ProviderFactory`](crate::factory::ProviderFactory).
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_boxed(&mut self, provider: Box<dyn Provider>) -> Result<&mut Self, ServerError> {
        self.claim_name(provider.as_ref())?;
        tracing::debug!(
            provider = %provider.name(),
            kind = %provider.kind(),
            hooks = provider.hook_count(),
            "registered provider"
        );
        self.providers.push(provider);
        Ok(self)
    }

    /// Names of the providers waiting to be launched, in registration order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    fn claim_name(&mut self, provider: &dyn Provider) -> Result<(), ServerError> {
        if !self.provider_names.insert(provider.name().to_owned()) {
            return Err(ServerError::DuplicateProvider {
                name: provider.name().to_owned(),
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plugin Management
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds one or more plugins to the server.
    ///
    /// # Panics
    ///
    /// Panics if a unique plugin is added twice.
    pub fn add_plugins<P: Plugins>(&mut self, plugins: P) -> &mut Self {
        plugins.add_to_server(self);
        self
    }

    pub(crate) fn add_plugin_boxed(&mut self, id: PluginId, plugin: Box<dyn Plugin>) {
        let name = plugin.name().to_owned();

        if plugin.is_unique() && self.plugin_ids.contains(&id) {
            panic!(
                "Plugin '{}' is unique and was already added.\n\
                 If you intended to add this plugin multiple times, \
                 set `is_unique()` to return `false`.",
                name
            );
        }
        self.plugin_ids.insert(id);

        let entry = PluginEntry { id, plugin, name };

        // Plugins added by another plugin's build() are built immediately.
        if self.build_state == BuildState::Building {
            entry.plugin.build(self);
            self.built_plugins.push(entry);
        } else {
            self.pending_plugins.push(entry);
        }
    }

    /// Returns true if a plugin of the given type has been added.
    #[must_use]
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        self.plugin_ids.contains(&PluginId::of::<P>())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────────────────────

    /// Stores a resource, replacing and returning any previous value.
    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, resource: R) -> Option<R> {
        self.resources
            .insert(TypeId::of::<R>(), Box::new(resource))
            .and_then(|old| old.downcast::<R>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns the resource of type `R`, if stored.
    #[must_use]
    pub fn resource<R: Send + Sync + 'static>(&self) -> Option<&R> {
        self.resources
            .get(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_ref::<R>())
    }

    /// Returns true if a resource of type `R` is stored.
    #[must_use]
    pub fn contains_resource<R: Send + Sync + 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<R>())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns whether [`finish`](Self::finish) has completed.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.build_state == BuildState::Built
    }

    /// Builds and readies all plugins in dependency order.
    ///
    /// Called by [`run`](Self::run) if not called before.
    ///
    /// # Panics
    ///
    /// - If a plugin's dependency is not satisfied
    /// - If there is a circular dependency between plugins
    /// - If called more than once
    pub fn finish(&mut self) {
        if self.build_state != BuildState::NotStarted {
            panic!("Server::finish() was already called. Cannot build twice.");
        }

        let sorted = self.sort_plugins_by_dependencies();

        self.build_state = BuildState::Building;
        for entry in sorted {
            entry.plugin.build(self);
            self.built_plugins.push(entry);
        }

        // Plugins are moved out while they run so they can take `&mut self`.
        let plugins = core::mem::take(&mut self.built_plugins);
        for entry in &plugins {
            entry.plugin.ready(self);
        }
        let added_during_ready = core::mem::replace(&mut self.built_plugins, plugins);
        self.built_plugins.extend(added_during_ready);

        self.build_state = BuildState::Built;
        tracing::debug!(plugins = self.built_plugins.len(), "plugins ready");
    }

    /// Runs plugin cleanup in reverse dependency order.
    ///
    /// Called by [`run`](Self::run) after every provider has stopped.
    pub fn cleanup(&mut self) {
        let plugins = core::mem::take(&mut self.built_plugins);
        for entry in plugins.iter().rev() {
            tracing::trace!(plugin = %entry.name, "cleanup");
            entry.plugin.cleanup(self);
        }
        self.built_plugins = plugins;
    }

    /// Runs the server on a new single-threaded cooperative runtime,
    /// blocking the calling thread until it is stopped.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Runtime`] if the runtime cannot be built
    /// - [`ServerError::AlreadyRunning`] if the server already ran
    /// - [`ServerError::Launch`] if a registered provider fails to start;
    ///   providers already started are stopped first
    pub fn run(&mut self) -> Result<(), ServerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ServerError::Runtime)?;
        runtime.block_on(self.serve())
    }

    /// Runs the server on the caller's tokio runtime until it is stopped.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run), minus [`ServerError::Runtime`].
    pub async fn serve(&mut self) -> Result<(), ServerError> {
        let mut inbox = self.inbox.take().ok_or(ServerError::AlreadyRunning)?;
        if !self.is_built() {
            self.finish();
        }

        let shutdown = self.shutdown.clone();
        let mut running: Vec<ProviderHandle> = Vec::with_capacity(self.providers.len());

        for provider in core::mem::take(&mut self.providers) {
            match provider.launch(shutdown.child_token()) {
                Ok(handle) => running.push(handle),
                Err(error) => {
                    tracing::error!(error = %error, "provider failed to launch; stopping");
                    shutdown.cancel();
                    inbox.close();
                    join_providers(running).await;
                    self.cleanup();
                    return Err(error.into());
                }
            }
        }
        tracing::info!(providers = running.len(), "server running");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                command = inbox.recv() => match command {
                    Some(Command::AddProvider { provider, reply }) => {
                        let result = self.admit(provider, &shutdown).map(|handle| running.push(handle));
                        let _ = reply.send(result);
                    }
                    None => break,
                },
            }
        }

        tracing::info!(providers = running.len(), "server stopping");
        inbox.close();
        while let Ok(Command::AddProvider { reply, .. }) = inbox.try_recv() {
            let _ = reply.send(Err(ServerError::NotRunning));
        }

        join_providers(running).await;
        self.cleanup();
        tracing::info!("server stopped");
        Ok(())
    }

    /// Launches a provider added while running.
    fn admit(
        &mut self,
        provider: Box<dyn Provider>,
        shutdown: &CancellationToken,
    ) -> Result<ProviderHandle, ServerError> {
        self.claim_name(provider.as_ref())?;
        let name = provider.name().to_owned();
        let handle = provider.launch(shutdown.child_token())?;
        tracing::info!(provider = %name, kind = %handle.kind(), "provider added at runtime");
        Ok(handle)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal: Dependency Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Sorts pending plugins by dependencies using Kahn's algorithm.
    ///
    /// # Panics
    ///
    /// - If a plugin's dependency is not found
    /// - If there is a circular dependency
    fn sort_plugins_by_dependencies(&mut self) -> Vec<PluginEntry> {
        let pending = core::mem::take(&mut self.pending_plugins);
        let n = pending.len();

        // Non-unique plugins may appear more than once; dependents wait for all of them.
        let mut indices_of: HashMap<PluginId, Vec<usize>> = HashMap::new();
        for (i, entry) in pending.iter().enumerate() {
            indices_of.entry(entry.id).or_default().push(i);
        }

        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, entry) in pending.iter().enumerate() {
            for dep in entry.plugin.dependencies() {
                match indices_of.get(&dep) {
                    Some(instances) => {
                        for &dep_idx in instances {
                            dependents[dep_idx].push(i);
                            in_degree[i] += 1;
                        }
                    }
                    None => panic!(
                        "Plugin '{}' requires '{}' which was not added.\n\
                         Add {} before {}, or use a plugin group that includes it.",
                        entry.name,
                        dep.type_name(),
                        dep.type_name(),
                        entry.name
                    ),
                }
            }
        }

        // Lowest index first keeps independent plugins in insertion order.
        let mut ready: Vec<usize> = (0..n).rev().filter(|&i| in_degree[i] == 0).collect();
        let mut order: Vec<usize> = Vec::with_capacity(n);
        while let Some(idx) = ready.pop() {
            order.push(idx);
            for &dependent in dependents[idx].iter().rev() {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }

        if order.len() != n {
            let in_cycle: Vec<&str> = in_degree
                .iter()
                .enumerate()
                .filter(|(_, deg)| **deg > 0)
                .map(|(i, _)| pending[i].name.as_str())
                .collect();
            panic!(
                "Circular dependency detected among plugins: {:?}\n\
                 Break the cycle by extracting shared functionality into a separate plugin.",
                in_cycle
            );
        }

        let mut slots: Vec<Option<PluginEntry>> = pending.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect()
    }
}

/// Waits for every provider to stop, logging any that ended abnormally.
async fn join_providers(handles: Vec<ProviderHandle>) {
    let joins = handles.into_iter().map(|handle| async move {
        let name = handle.name().to_owned();
        (name, handle.join().await)
    });
    for (name, result) in futures::future::join_all(joins).await {
        match result {
            Ok(()) => tracing::debug!(provider = %name, "provider stopped"),
            Err(error) => {
                tracing::error!(provider = %name, error = %error, "provider ended abnormally");
            }
        }
    }
}
