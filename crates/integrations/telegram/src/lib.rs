//! Telegram delivery gateway for Vaultgate.
//!
//! This crate implements the [`Gateway`](vaultgate_provider::Gateway) trait
//! on top of the [Telegram Bot API](https://core.telegram.org/bots/api):
//! deliveries use `copyMessage`, relocation into the storage chat uses
//! `forwardMessage`, and scheduled removals use `deleteMessage`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use vaultgate_telegram::{TelegramConfig, TelegramGateway};
//!
//! let config = TelegramConfig::new("123456:ABC-DEF").with_protect_content(true);
//! let gateway = TelegramGateway::new(config).expect("client builds");
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod types;

pub use config::TelegramConfig;
pub use error::TelegramError;
pub use gateway::TelegramGateway;
pub use types::ChatRef;
