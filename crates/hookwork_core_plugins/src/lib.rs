//! Infrastructure plugins for Hookwork servers.
//!
//! - [`TracingPlugin`] - Installs the `tracing` subscriber and exposes its
//!   configuration as the [`TracingConfig`] resource
//!
//! # Example
//!
//! ```no_run
//! use hookwork_core_plugins::TracingPlugin;
//! use hookwork_system::Server;
//! use tracing::Level;
//!
//! let mut server = Server::new();
//! server.add_plugins(TracingPlugin::default().with_level(Level::DEBUG));
//! server.run().unwrap();
//! ```

mod tracing_plugin;

pub use tracing_plugin::{TracingConfig, TracingFormat, TracingPlugin};
