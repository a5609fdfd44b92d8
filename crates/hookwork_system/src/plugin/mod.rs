//! Plugin lifecycle for the orchestrator.
//!
//! Plugins are how applications package setup: a plugin registers providers,
//! installs logging or stores shared configuration on the [`Server`].
//!
//! # Example
//!
//! ```
//! use hookwork_core::hook_fn;
//! use hookwork_provider::{ComplexProvider, Passthrough};
//! use hookwork_system::plugin::Plugin;
//! use hookwork_system::server::Server;
//!
//! struct EchoPlugin;
//!
//! impl Plugin for EchoPlugin {
//!     fn build(&self, server: &mut Server) {
//!         let provider = ComplexProvider::new("echo", Passthrough::<u64, u64>::new())
//!             .with_hook(hook_fn("identity", |n: &u64| Ok(*n)));
//!         if let Err(error) = server.register(provider) {
//!             tracing::error!(%error, "echo provider not registered");
//!         }
//!     }
//! }
//!
//! let mut server = Server::new();
//! server.add_plugins(EchoPlugin);
//! server.finish();
//! assert_eq!(server.provider_names(), vec!["echo"]);
//! ```

use core::any::TypeId;

use crate::server::Server;

// ─────────────────────────────────────────────────────────────────────────────
// PluginId
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies a plugin by its concrete type.
///
/// [`Plugin::dependencies`] names other plugins by id, and unique plugins
/// are detected by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId {
    type_id: TypeId,
    type_name: &'static str,
}

impl PluginId {
    /// The id of plugin type `P`.
    #[must_use]
    pub fn of<P: Plugin>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: core::any::type_name::<P>(),
        }
    }

    /// The `TypeId` of the plugin type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The plugin type's name, used in panic messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of setup for the orchestrator.
///
/// | Phase | When | Order |
/// |-------|------|-------|
/// | `build` | [`Server::finish`], before any provider starts | dependencies first |
/// | `ready` | right after every plugin is built | dependencies first |
/// | `cleanup` | after [`Server::run`] has joined every provider | dependents first |
pub trait Plugin: Send + Sync + 'static {
    /// Registers providers and resources.
    fn build(&self, server: &mut Server);

    /// Runs once every plugin is built, so resources inserted by any plugin
    /// are visible.
    fn ready(&self, _server: &mut Server) {}

    /// Runs after every provider has stopped.
    fn cleanup(&self, _server: &mut Server) {}

    /// Name used in logs and panic messages. Defaults to the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Plugins that must be built before this one.
    ///
    /// [`Server::finish`] panics if one of them was never added.
    fn dependencies(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Whether adding this plugin type a second time panics. Defaults to
    /// `true`.
    fn is_unique(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugins
// ─────────────────────────────────────────────────────────────────────────────

/// What [`Server::add_plugins`] accepts: one [`Plugin`] or a whole
/// [`PluginGroupBuilder`].
pub trait Plugins {
    /// Hands every contained plugin to `server`.
    fn add_to_server(self, server: &mut Server);
}

impl<P: Plugin> Plugins for P {
    fn add_to_server(self, server: &mut Server) {
        let id = PluginId::of::<P>();
        server.add_plugin_boxed(id, Box::new(self));
    }
}

impl Plugins for PluginGroupBuilder {
    fn add_to_server(self, server: &mut Server) {
        for boxed in self.plugins {
            server.add_plugin_boxed(boxed.id, boxed.plugin);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PluginGroup
// ─────────────────────────────────────────────────────────────────────────────

/// A named bundle of plugins, e.g. logging plus an application's providers.
pub trait PluginGroup {
    /// Expands the bundle so it can be adjusted before it is added.
    fn build(self) -> PluginGroupBuilder;
}

/// A plugin erased together with the id of its concrete type.
pub(crate) struct BoxedPlugin {
    pub(crate) id: PluginId,
    pub(crate) plugin: Box<dyn Plugin>,
}

/// An ordered, editable list of plugins.
///
/// # Example
///
/// ```
/// use hookwork_system::plugin::{Plugin, PluginGroupBuilder};
/// use hookwork_system::server::Server;
///
/// struct Sensors;
/// impl Plugin for Sensors {
///     fn build(&self, _server: &mut Server) {}
/// }
///
/// struct Console;
/// impl Plugin for Console {
///     fn build(&self, _server: &mut Server) {}
/// }
///
/// // Headless deployment: same bundle, no console.
/// let plugins = PluginGroupBuilder::new()
///     .add(Sensors)
///     .add(Console)
///     .disable::<Console>();
/// assert!(plugins.contains::<Sensors>());
///
/// Server::new().add_plugins(plugins).finish();
/// ```
#[derive(Default)]
pub struct PluginGroupBuilder {
    plugins: Vec<BoxedPlugin>,
}

impl PluginGroupBuilder {
    /// An empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `plugin`.
    #[must_use]
    #[expect(
        clippy::should_implement_trait,
        reason = "This is a builder method, not std::ops::Add"
    )]
    pub fn add<P: Plugin>(mut self, plugin: P) -> Self {
        self.plugins.push(BoxedPlugin {
            id: PluginId::of::<P>(),
            plugin: Box::new(plugin),
        });
        self
    }

    /// Removes a plugin from the group by type. No-op if absent.
    #[must_use]
    pub fn disable<P: Plugin>(mut self) -> Self {
        let id = PluginId::of::<P>();
        self.plugins.retain(|p| p.id != id);
        self
    }

    /// Returns true if the group contains a plugin of type `P`.
    #[must_use]
    pub fn contains<P: Plugin>(&self) -> bool {
        let id = PluginId::of::<P>();
        self.plugins.iter().any(|p| p.id == id)
    }

    /// Number of plugins in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
