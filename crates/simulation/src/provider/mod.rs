//! Test gateways for simulation testing.
//!
//! These gateways record calls, simulate failures and script per-recipient
//! behaviour so scenarios can be checked end to end.

mod failing;
mod recording;

pub use failing::{FailingGateway, FailureType};
pub use recording::{CallKind, CapturedCall, FailureMode, RecordingGateway};
