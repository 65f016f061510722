use serde::Deserialize;

/// Log output configuration.
///
/// ```toml
/// [telemetry]
/// filter = "info,vaultgate_gateway=debug"
/// ```
///
/// `RUST_LOG` takes precedence over `filter` when set.
#[derive(Debug, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit ANSI colour codes.
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            ansi: default_ansi(),
        }
    }
}

fn default_filter() -> String {
    "info".to_owned()
}

fn default_ansi() -> bool {
    true
}
