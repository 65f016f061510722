//! Operator-facing surface of Vaultgate: configuration, logging set-up and
//! wiring of the engine to its state backend and platform gateway.

pub mod config;
pub mod engine;
pub mod error;
pub mod state_factory;
pub mod telemetry;
