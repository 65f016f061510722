pub mod clock;
pub mod content;
pub mod deletion;
pub mod error;
pub mod ids;
pub mod link;
pub mod location;
pub mod privilege;
pub mod recipient;
pub mod token;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use content::ContentReference;
pub use deletion::DeletionObligation;
pub use error::ParseError;
pub use link::{AccessLink, LinkTarget};
pub use location::Location;
pub use privilege::{PrivilegeSource, StaticPrivileges};
pub use recipient::Recipient;
pub use token::{AccessToken, DEFAULT_TOKEN_VALIDITY_HOURS};
pub use types::{BatchId, LogicalId, Namespace, SubjectId};
