//! Tracing subscriber initialization.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether to install a console subscriber at all.
    #[serde(default = "default_console_output")]
    pub console_output: bool,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Filter directives used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_console_output() -> bool {
    true
}

fn default_filter() -> String {
    "info,herald=debug".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            console_output: default_console_output(),
            json: false,
            filter: default_filter(),
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Returns `false`
/// when output is disabled or a global subscriber was already installed.
pub fn init_tracing(config: &TelemetryConfig) -> bool {
    if !config.console_output {
        return false;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    if installed.is_ok() {
        tracing::info!(json = config.json, filter = %config.filter, "Tracing initialized");
    }

    installed.is_ok()
}
