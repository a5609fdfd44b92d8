//! Logging configuration plugin.
//!
//! # Lifecycle
//!
//! - **`build()`** inserts the [`TracingConfig`] resource so other plugins
//!   can read the intended configuration while they build.
//! - **`ready()`** installs the global subscriber. Installing late lets every
//!   plugin's build run before output starts.
//! - **`cleanup()`** logs the shutdown; the subscriber stays installed.
//!
//! # Filter resolution
//!
//! 1. An explicit [`TracingPlugin::with_env_filter`] directive wins.
//! 2. Otherwise `RUST_LOG` is used when it is set and parses.
//! 3. Otherwise everything at or above the configured level is shown.

use hookwork_system::{Plugin, Server};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracingFormat {
    /// Multi-line human-readable output (default).
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// Newline-delimited JSON for log aggregation.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig Resource
// ─────────────────────────────────────────────────────────────────────────────

/// The logging configuration a server was built with.
///
/// Read it with [`Server::resource`]:
///
/// ```
/// use hookwork_core_plugins::{TracingConfig, TracingPlugin};
/// use hookwork_system::Server;
/// use tracing::Level;
///
/// let mut server = Server::new();
/// server.add_plugins(TracingPlugin::default().with_level(Level::WARN));
/// server.finish();
///
/// let config = server.resource::<TracingConfig>().unwrap();
/// assert_eq!(config.level, Level::WARN);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Fallback level when no filter directive applies.
    pub level: Level,
    /// Output format.
    pub format: TracingFormat,
    /// Explicit filter directive, if one was configured.
    pub env_filter: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// Installs a `tracing-subscriber` registry for the whole process.
///
/// If a global subscriber is already installed (another plugin, a test
/// harness), installation is skipped silently.
///
/// # Resources Provided
///
/// | Resource | Description |
/// |----------|-------------|
/// | [`TracingConfig`] | The configuration in effect |
///
/// # Example
///
/// ```
/// use hookwork_core_plugins::{TracingFormat, TracingPlugin};
/// use tracing::Level;
///
/// // Development
/// let dev = TracingPlugin::default()
///     .with_level(Level::DEBUG)
///     .with_span_events(true);
///
/// // Production
/// let prod = TracingPlugin::default()
///     .with_format(TracingFormat::Json)
///     .with_env_filter("hookwork_provider=info,hookwork_message=warn");
/// ```
#[derive(Debug, Clone)]
pub struct TracingPlugin {
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingPlugin {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingPlugin {
    /// Creates a plugin logging at `INFO` in the pretty format.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets an explicit filter directive, overriding `RUST_LOG`.
    ///
    /// Format: `target=level,target=level,...`. A directive that fails to
    /// parse falls back to the configured level.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Emits span enter/exit events, e.g. around each `gather`.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    fn filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str());
        match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        }
    }
}

impl Plugin for TracingPlugin {
    fn build(&self, server: &mut Server) {
        server.insert_resource(TracingConfig {
            level: self.level,
            format: self.format,
            env_filter: self.env_filter.clone(),
        });
    }

    fn ready(&self, _server: &mut Server) {
        let registry = tracing_subscriber::registry().with(self.filter());
        let fmt = tracing_subscriber::fmt::layer().with_span_events(self.span_events());

        // Err means a subscriber is already installed.
        let installed = match self.format {
            TracingFormat::Pretty => registry.with(fmt.pretty()).try_init(),
            TracingFormat::Compact => registry.with(fmt.compact()).try_init(),
            TracingFormat::Json => registry.with(fmt.json()).try_init(),
        }
        .is_ok();

        tracing::info!(
            level = %self.level,
            format = ?self.format,
            installed,
            "tracing configured"
        );
    }

    fn cleanup(&self, _server: &mut Server) {
        tracing::info!("tracing plugin shutting down");
    }
}
