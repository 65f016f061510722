//! Vaultgate Simulation Framework
//!
//! Tools for exercising the engine in a controlled, single-process
//! environment:
//!
//! - Recording gateways that capture every call for verification
//! - Failing gateways that simulate platform error scenarios
//! - A harness with in-memory state and a manual clock
//! - Assertions for access results, broadcast summaries and throughput
//!
//! # Quick Start
//!
//! ```no_run
//! use vaultgate_simulation::prelude::*;
//! use vaultgate_core::SubjectId;
//!
//! #[tokio::main]
//! async fn main() {
//!     let harness = SimulationHarness::start().unwrap();
//!     let id = harness.store(42).await.unwrap();
//!
//!     let user = SubjectId::new("1001");
//!     let token = harness.vaultgate().issue_token(&user).await.unwrap();
//!     harness
//!         .vaultgate()
//!         .request_access(&user, &id, Some(&token.secret))
//!         .await
//!         .assert_delivered();
//!
//!     harness.gateway().assert_delivered_to("1001");
//! }
//! ```

pub mod assertions;
mod error;
pub mod harness;
pub mod provider;

pub use assertions::{AccessResultExt, BroadcastSummaryExt, SideEffectAssertions};
pub use error::SimulationError;
pub use harness::{ADMIN, STORAGE_CHAT, SimulationHarness, SimulationHarnessBuilder};
pub use provider::{
    CallKind, CapturedCall, FailingGateway, FailureMode, FailureType, RecordingGateway,
};

/// Prelude module for convenient imports.
///
/// ```
/// use vaultgate_simulation::prelude::*;
/// ```
pub mod prelude {
    pub use crate::assertions::{AccessResultExt, BroadcastSummaryExt, SideEffectAssertions};
    pub use crate::error::SimulationError;
    pub use crate::harness::{ADMIN, STORAGE_CHAT, SimulationHarness, SimulationHarnessBuilder};
    pub use crate::provider::{
        CallKind, CapturedCall, FailingGateway, FailureMode, FailureType, RecordingGateway,
    };
}
