use thiserror::Error;

use vaultgate_gateway::GatewayError;

/// Errors from setting up or driving a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("configuration error: {0}")]
    Configuration(String),
}
