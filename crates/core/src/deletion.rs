use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::Location;

/// A delivered copy that must be removed once `fire_at` has passed.
///
/// A stored obligation is pending. Resolving it removes the record, so a
/// resolved obligation never comes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionObligation {
    pub location: Location,
    pub fire_at: DateTime<Utc>,
}

impl DeletionObligation {
    #[must_use]
    pub fn pending(location: Location, fire_at: DateTime<Utc>) -> Self {
        Self { location, fire_at }
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_at_fire_time() {
        let now = Utc::now();
        let ob = DeletionObligation::pending(Location::new("1", 2), now);
        assert!(ob.is_due(now));
        assert!(ob.is_due(now + chrono::Duration::seconds(1)));
    }

    #[test]
    fn not_due_before_fire_at() {
        let now = Utc::now();
        let ob = DeletionObligation::pending(
            Location::new("1", 2),
            now + chrono::Duration::seconds(5),
        );
        assert!(!ob.is_due(now));
    }
}
