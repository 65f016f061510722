use thiserror::Error;

/// Errors that can occur when running the Vaultgate server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. reading the configuration file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An engine-level error surfaced by a subcommand.
    #[error("gateway error: {0}")]
    Gateway(#[from] vaultgate_gateway::GatewayError),

    /// The state backend could not be reached or initialized.
    #[error("state error: {0}")]
    State(#[from] vaultgate_state::StateError),

    /// The platform client could not be built.
    #[error("telegram error: {0}")]
    Telegram(#[from] vaultgate_telegram::TelegramError),
}
