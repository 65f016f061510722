pub mod error;
pub mod gateway;
pub mod log;

pub use error::{DeliveryError, FailureClass};
pub use gateway::{DynGateway, Gateway};
pub use log::LogGateway;
