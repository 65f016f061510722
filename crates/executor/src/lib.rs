pub mod config;
pub mod executor;
pub mod retry;
pub mod throttle;

pub use config::ExecutorConfig;
pub use executor::{DeliveryExecutor, SendOutcome, SendReport};
pub use retry::RetryStrategy;
pub use throttle::{Throttle, ThroughputWindow};
